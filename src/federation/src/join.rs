use crate::federated_request::{FrozenFederatedRequest, ProjectedEntry};
use crate::projection::Projection;
use crate::request::{Request, RequestType};
use common::{Location, Path, Property, RepoError, Segment};
use crossbeam::channel::Receiver;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

type UnknownRequestHandler = Box<dyn FnMut(&mut Request, &Request) + Send>;

/// Merges the results of forked requests back into their original requests.
pub struct JoinRequestProcessor {
    on_unknown: UnknownRequestHandler,
    time_to_expire: Option<Duration>,
}

impl Default for JoinRequestProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl JoinRequestProcessor {
    /// Creates a processor that fails an original when a projected request does not fit it.
    pub fn new() -> Self {
        Self::with_unknown_request_handler(|original, projected| {
            original.set_error(RepoError::InvalidRequest(format!(
                "Cannot join '{}' into '{}'",
                projected.request_type(),
                original.request_type()
            )));
        })
    }

    /// Creates a processor with a custom handler for projected requests whose kind does not fit
    /// the original request.
    ///
    /// # Arguments
    ///
    /// * `handler` - Called with the original and the projected request.
    pub fn with_unknown_request_handler<F>(handler: F) -> Self
    where
        F: FnMut(&mut Request, &Request) + Send + 'static,
    {
        JoinRequestProcessor {
            on_unknown: Box::new(handler),
            time_to_expire: None,
        }
    }

    /// Limits how long a join waits for forked requests; `None` waits indefinitely.
    ///
    /// An original whose forked requests are still running when the time passes fails with a
    /// `SourceError` instead of being merged.
    pub fn with_time_to_expire(mut self, time_to_expire: Option<Duration>) -> Self {
        self.time_to_expire = time_to_expire;
        self
    }

    /// Joins every request from an iterator.
    pub fn process_all<I: IntoIterator<Item = FrozenFederatedRequest>>(&mut self, requests: I) -> Vec<Request> {
        requests.into_iter().map(|r| self.process(r)).collect()
    }

    /// Joins requests from a queue until every sender has gone away.
    pub fn process_queue<F: FnMut(Request)>(&mut self, queue: &Receiver<FrozenFederatedRequest>, mut on_joined: F) {
        for federated in queue.iter() {
            on_joined(self.process(federated));
        }
    }

    /// Waits for the forked requests to finish and merges their results into the original.
    pub fn process(&mut self, federated: FrozenFederatedRequest) -> Request {
        match self.time_to_expire {
            Some(timeout) if !federated.latch().wait_timeout(timeout) => {
                let (mut original, _) = federated.into_parts();
                warn!("{} expired after {:?}", original, timeout);
                let error = RepoError::SourceError(format!("{} expired after {:?}", original, timeout));
                original.set_error(error);
                return original;
            }
            Some(_) => {}
            None => federated.wait(),
        }
        let (mut original, entries) = federated.into_parts();
        if original.has_error() || original.is_cancelled() || entries.is_empty() {
            debug!("passing {} through", original);
            return original;
        }
        if entries.len() == 1 && entries[0].is_same_location() {
            debug!("passing results of {} through from a single source", original);
            original.copy_results_from(&*entries[0].request());
            return original;
        }
        if matches!(original.request_type(), RequestType::CreateNode { .. }) {
            join_create(&mut original, &entries[0]);
        } else {
            self.merge(&mut original, &entries);
        }
        original
    }

    fn merge(&mut self, original: &mut Request, entries: &[ProjectedEntry]) {
        let kind = original.request_type().clone();
        let mut federated_path = original.at().path().cloned();
        let mut actual = original.at().clone();
        let mut sns: HashMap<String, usize> = HashMap::new();
        let mut merged = 0;
        for entry in entries {
            let source = entry.request();
            if source.has_error() {
                continue;
            }
            if source.is_cancelled() {
                debug!("{} cancelled because a projected request was cancelled", original);
                original.cancel();
                return;
            }
            let projection = entry.projection();
            let verifies_child = *source.request_type() == RequestType::VerifyNodeExists
                && matches!(kind, RequestType::ReadNode | RequestType::ReadAllChildren);
            if verifies_child {
                if let Some(in_source) = source.actual_location() {
                    let child = child_with_sns(in_source, federated_path.as_ref(), &mut sns, projection, true);
                    if let Some(child) = child {
                        if federated_path.is_none() {
                            federated_path = child.path().and_then(|p| p.parent());
                        }
                        original.add_child(child);
                    }
                }
                merged += 1;
                continue;
            }
            if *source.request_type() != kind {
                (self.on_unknown)(original, &*source);
                merged += 1;
                continue;
            }
            if let Some(in_source) = source.actual_location() {
                actual = merge_ids(actual, in_source);
                actual = determine_actual_location(actual, in_source, projection);
                if federated_path.is_none() {
                    federated_path = actual.path().cloned();
                }
            }
            for child in source.children() {
                if let Some(child) = child_with_sns(child, federated_path.as_ref(), &mut sns, projection, false) {
                    original.add_child(child);
                }
            }
            original.add_properties(source.properties().iter().cloned());
            merged += 1;
        }
        if merged == 0 {
            set_path_not_found(original, entries);
            return;
        }
        if !actual.has_path() {
            if let Some(path) = federated_path {
                actual = actual.at_path(path);
            }
        }
        original.set_actual_location(actual);
    }
}

/// Adds the identification properties found in the source, keeping distinct values in order.
fn merge_ids(mut actual: Location, in_source: &Location) -> Location {
    for property in in_source.id_properties() {
        let merged = match actual.id_property(property.name()) {
            Some(existing) => {
                let mut values = existing.values().to_vec();
                for value in property.values() {
                    if !values.contains(value) {
                        values.push(value.clone());
                    }
                }
                Property::new(property.name(), values)
            }
            None => property.clone(),
        };
        actual = actual.with_id_property(merged);
    }
    actual
}

/// Fills in the path of a location known only by identifier.
fn determine_actual_location(actual: Location, in_source: &Location, projection: Option<&Arc<Projection>>) -> Location {
    if actual.has_path() {
        return actual;
    }
    let projection = match projection {
        Some(projection) => projection,
        None => return merge_ids(in_source.clone(), &actual),
    };
    let in_repository = in_source
        .path()
        .and_then(|p| projection.paths_in_repository(p).into_iter().next());
    match in_repository {
        Some(path) => actual.at_path(path),
        None => actual,
    }
}

/// Places a child reported by a source under the federated parent, numbering same-name siblings
/// across every source in the order they are seen.
///
/// The name of a verified child comes from its location in the repository, since the source
/// location may be the root of a branch.
fn child_with_sns(
    child: &Location,
    parent: Option<&Path>,
    sns: &mut HashMap<String, usize>,
    projection: Option<&Arc<Projection>>,
    verified: bool,
) -> Option<Location> {
    let in_source = child.path()?;
    let mut name = in_source.last_segment().map(|s| s.name().to_string());
    let mut parent = parent.cloned();
    if verified || name.is_none() || parent.is_none() {
        let in_repository = projection.and_then(|p| p.paths_in_repository(in_source).into_iter().next());
        if let Some(in_repository) = in_repository {
            if let Some(segment) = in_repository.last_segment() {
                name = Some(segment.name().to_string());
            }
            if parent.is_none() {
                parent = in_repository.parent();
            }
        }
    }
    let (name, parent) = (name?, parent?);
    let index = sns.entry(name.clone()).or_insert(0);
    *index += 1;
    Some(child.at_path(parent.child_segment(Segment::with_index(&name, *index))))
}

/// Fails the original with the deepest ancestor that any source reported as existing.
fn set_path_not_found(original: &mut Request, entries: &[ProjectedEntry]) {
    let mut lowest = Path::root();
    let mut other_error = None;
    let mut not_found = false;
    for entry in entries {
        let source = entry.request();
        match source.error() {
            Some(RepoError::PathNotFound { lowest_existing, .. }) => {
                not_found = true;
                if let Some(projection) = entry.projection() {
                    for path in projection.paths_in_repository(lowest_existing) {
                        if path.is_at_or_below(&lowest) {
                            lowest = path;
                        }
                    }
                }
            }
            Some(error) => {
                if other_error.is_none() {
                    other_error = Some(error.clone());
                }
            }
            None => {}
        }
    }
    match other_error {
        Some(error) if !not_found => original.set_error(error),
        _ => {
            let path = original.at().path().cloned().unwrap_or_else(Path::root);
            original.set_error(RepoError::PathNotFound {
                path,
                lowest_existing: lowest,
            });
        }
    }
}

/// Reports the created node at its location in the federated workspace.
fn join_create(original: &mut Request, entry: &ProjectedEntry) {
    let source = entry.request();
    if let Some(error) = source.error() {
        original.set_error(error.clone());
        return;
    }
    if source.is_cancelled() {
        original.cancel();
        return;
    }
    let created = source.actual_location().and_then(|in_source| {
        let path = in_source.path()?;
        let projection = entry.projection()?;
        let in_repository = projection.paths_in_repository(path).into_iter().next()?;
        Some(in_source.at_path(in_repository))
    });
    match created {
        Some(location) => original.set_actual_location(location),
        None => original.set_error(RepoError::InvalidRequest(format!(
            "Unable to project the node created by {} into the federated workspace",
            original
        ))),
    }
}
