use crate::projection::Projection;
use crate::request::Request;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// A countdown that releases waiters when it reaches zero.
#[derive(Debug)]
pub struct Latch {
    count: Mutex<usize>,
    zero: Condvar,
}

impl Latch {
    pub fn new(count: usize) -> Self {
        Latch {
            count: Mutex::new(count),
            zero: Condvar::new(),
        }
    }

    pub fn count(&self) -> usize {
        *self.count.lock().unwrap()
    }

    /// Decrements the count, waking every waiter when it reaches zero. Does nothing at zero.
    pub fn count_down(&self) {
        let mut count = self.count.lock().unwrap();
        if *count > 0 {
            *count -= 1;
            if *count == 0 {
                self.zero.notify_all();
            }
        }
    }

    /// Blocks until the count reaches zero.
    pub fn wait(&self) {
        let mut count = self.count.lock().unwrap();
        while *count > 0 {
            count = self.zero.wait(count).unwrap();
        }
    }

    /// Blocks until the count reaches zero or the timeout passes. Returns true if it reached zero.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let count = self.count.lock().unwrap();
        let (count, _) = self.zero.wait_timeout_while(count, timeout, |c| *c > 0).unwrap();
        *count == 0
    }
}

/// One request sent to (or satisfied on behalf of) a single source.
#[derive(Clone, Debug)]
pub struct ProjectedEntry {
    request: Arc<Mutex<Request>>,
    projection: Option<Arc<Projection>>,
    same_location: bool,
    complete: bool,
}

impl ProjectedEntry {
    /// Locks and returns the projected request.
    pub fn request(&self) -> MutexGuard<'_, Request> {
        self.request.lock().unwrap()
    }

    pub(crate) fn shared_request(&self) -> Arc<Mutex<Request>> {
        self.request.clone()
    }

    /// Projection the request went through; `None` for placeholder results.
    pub fn projection(&self) -> Option<&Arc<Projection>> {
        self.projection.as_ref()
    }

    /// True when the request targets the same path in its source as the original.
    pub fn is_same_location(&self) -> bool {
        self.same_location
    }

    /// True when the request already carries its results and is never sent to a source.
    pub fn is_complete(&self) -> bool {
        self.complete
    }
}

/// An original request plus the requests it was forked into, still open for additions.
pub struct FederatedRequest {
    original: Request,
    projected: Vec<ProjectedEntry>,
}

impl FederatedRequest {
    pub fn new(original: Request) -> Self {
        FederatedRequest {
            original,
            projected: Vec::new(),
        }
    }

    pub fn original(&self) -> &Request {
        &self.original
    }

    pub fn original_mut(&mut self) -> &mut Request {
        &mut self.original
    }

    /// Adds a projected request.
    ///
    /// # Arguments
    ///
    /// * `request` - Request aimed at a source, or already holding placeholder results.
    /// * `same_location` - Whether the request targets the original's path in its source.
    /// * `complete` - Whether the request already has its results.
    /// * `projection` - Projection the request goes through; `None` for placeholder results.
    pub fn add(&mut self, request: Request, same_location: bool, complete: bool, projection: Option<Arc<Projection>>) {
        self.projected.push(ProjectedEntry {
            request: Arc::new(Mutex::new(request)),
            projection,
            same_location,
            complete,
        });
    }

    pub fn len(&self) -> usize {
        self.projected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projected.is_empty()
    }

    /// Fixes the set of projected requests and sizes the latch to the incomplete ones.
    pub fn freeze(self) -> FrozenFederatedRequest {
        let incomplete = self.projected.iter().filter(|p| !p.complete).count();
        FrozenFederatedRequest {
            original: self.original,
            entries: self.projected,
            latch: Arc::new(Latch::new(incomplete)),
        }
    }
}

/// A federated request whose projected requests are fixed and may be in flight.
pub struct FrozenFederatedRequest {
    original: Request,
    entries: Vec<ProjectedEntry>,
    latch: Arc<Latch>,
}

impl FrozenFederatedRequest {
    pub fn original(&self) -> &Request {
        &self.original
    }

    pub fn original_mut(&mut self) -> &mut Request {
        &mut self.original
    }

    pub fn entries(&self) -> &[ProjectedEntry] {
        &self.entries
    }

    pub fn latch(&self) -> &Arc<Latch> {
        &self.latch
    }

    pub fn has_incomplete_requests(&self) -> bool {
        self.entries.iter().any(|e| !e.complete)
    }

    /// Blocks until every incomplete request has been executed.
    pub fn wait(&self) {
        self.latch.wait();
    }

    pub fn into_parts(self) -> (Request, Vec<ProjectedEntry>) {
        (self.original, self.entries)
    }
}
