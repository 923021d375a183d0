use crate::connection::{RepositoryConnection, RepositoryConnectionFactory};
use crate::federated_request::{FederatedRequest, FrozenFederatedRequest, Latch};
use crate::projector::{PlaceholderNode, ProjectedNode};
use crate::repository::FederatedRepository;
use crate::request::{Request, RequestType};
use common::{Location, Path, RepoError};
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::collections::HashMap;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// A projected request handed to a source worker.
struct Task {
    request: Arc<Mutex<Request>>,
    latch: Arc<Latch>,
}

/// The queue and worker thread for one source.
struct SourceChannel {
    sender: Sender<Task>,
    worker: JoinHandle<()>,
}

impl SourceChannel {
    fn start(source: &str, factory: Arc<dyn RepositoryConnectionFactory>, retry_limit: u32) -> Self {
        let (sender, receiver) = unbounded();
        let source = source.to_string();
        let worker = thread::spawn(move || run_channel(source, factory, receiver, retry_limit));
        SourceChannel { sender, worker }
    }
}

/// Executes every task sent to one source, in order, on a lazily opened connection.
fn run_channel(
    source: String,
    factory: Arc<dyn RepositoryConnectionFactory>,
    receiver: Receiver<Task>,
    retry_limit: u32,
) {
    info!("channel for source '{}' started", source);
    let mut connection: Option<Box<dyn RepositoryConnection>> = None;
    for task in receiver.iter() {
        {
            let mut request = task.request.lock().unwrap();
            if !request.is_cancelled() {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    execute(&source, &*factory, &mut connection, &mut request, retry_limit)
                }));
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!("{} failed in source '{}': {}", *request, source, e);
                        request.set_error(e);
                    }
                    Err(_) => {
                        // The connection may be half way through a call; open a new one next time.
                        connection = None;
                        error!("connection to source '{}' panicked executing {}", source, *request);
                        request.set_error(RepoError::SourceError(format!(
                            "connection to source '{}' panicked",
                            source
                        )));
                    }
                }
            }
        }
        task.latch.count_down();
    }
    if let Some(mut connection) = connection {
        connection.close();
    }
    info!("channel for source '{}' stopped", source);
}

fn execute(
    source: &str,
    factory: &dyn RepositoryConnectionFactory,
    connection: &mut Option<Box<dyn RepositoryConnection>>,
    request: &mut Request,
    retry_limit: u32,
) -> Result<(), RepoError> {
    let mut attempts = 0;
    loop {
        let current = match connection.take() {
            Some(current) => current,
            None => factory.create_connection(source)?,
        };
        let current = connection.insert(current);
        match current.execute(request) {
            Err(RepoError::SourceError(msg)) if attempts < retry_limit => {
                attempts += 1;
                debug!("retrying {} in source '{}' after: {}", request, source, msg);
                if let Some(mut failed) = connection.take() {
                    failed.close();
                }
            }
            result => return result,
        }
    }
}

/// Splits federated requests into requests against each source and runs them concurrently.
///
/// Each source gets its own worker thread, started on first use, so requests to one source run
/// in submission order while different sources proceed in parallel. Every processed request is
/// sent, frozen, to the `completed` channel whether or not anything was dispatched.
pub struct ForkRequestProcessor {
    repository: Arc<FederatedRepository>,
    channels: HashMap<String, SourceChannel>,
    completed: Sender<FrozenFederatedRequest>,
}

impl ForkRequestProcessor {
    /// Creates a processor.
    ///
    /// # Arguments
    ///
    /// * `repository` - Repository whose workspaces project the requests.
    /// * `completed` - Receives every forked request, ready to be joined.
    pub fn new(repository: Arc<FederatedRepository>, completed: Sender<FrozenFederatedRequest>) -> Self {
        ForkRequestProcessor {
            repository,
            channels: HashMap::new(),
            completed,
        }
    }

    pub fn process_all<I: IntoIterator<Item = Request>>(&mut self, requests: I) {
        for request in requests {
            self.process(request);
        }
    }

    /// Forks one request.
    ///
    /// A request that cannot be projected gets an error and is forwarded with no projected
    /// requests.
    pub fn process(&mut self, request: Request) {
        let kind = request.request_type().clone();
        let requires_update = !request.is_read_only();
        let mut federated = FederatedRequest::new(request);
        let repository = self.repository.clone();
        if let Some(node) = project(&repository, federated.original_mut(), requires_update) {
            match kind {
                RequestType::ReadNode | RequestType::ReadAllChildren => fork_with_children(&mut federated, &node),
                RequestType::CreateNode { .. } => fork_create(&mut federated, &node),
                _ => fork_simple(&mut federated, &node),
            }
        }
        self.submit(federated);
    }

    fn submit(&mut self, federated: FederatedRequest) {
        let frozen = federated.freeze();
        for entry in frozen.entries().iter().filter(|e| !e.is_complete()) {
            let source = match entry.projection() {
                Some(projection) => projection.source_name().to_string(),
                None => {
                    frozen.latch().count_down();
                    continue;
                }
            };
            debug!("submitting {} to source '{}'", *entry.request(), source);
            let task = Task {
                request: entry.shared_request(),
                latch: frozen.latch().clone(),
            };
            if let Err(e) = self.channel(&source).send(task) {
                let task = e.into_inner();
                task.request.lock().unwrap().set_error(RepoError::SourceError(format!(
                    "Source '{}' is not accepting requests",
                    source
                )));
                task.latch.count_down();
            }
        }
        if self.completed.send(frozen).is_err() {
            warn!("no join processor is accepting forked requests");
        }
    }

    fn channel(&mut self, source: &str) -> &Sender<Task> {
        let repository = &self.repository;
        &self
            .channels
            .entry(source.to_string())
            .or_insert_with(|| {
                SourceChannel::start(source, repository.connection_factory().clone(), repository.retry_limit())
            })
            .sender
    }

    /// Stops every source worker after it drains its queue.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        for (source, channel) in self.channels.drain() {
            drop(channel.sender);
            if channel.worker.join().is_err() {
                error!("channel for source '{}' panicked", source);
            }
        }
    }
}

impl Drop for ForkRequestProcessor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Projects the request's location, recording an error on the request when that fails.
fn project(repository: &FederatedRepository, request: &mut Request, requires_update: bool) -> Option<ProjectedNode> {
    let workspace = match repository.workspace(request.workspace()) {
        Ok(workspace) => workspace,
        Err(e) => {
            info!("cannot process {}: {}", request, e);
            request.set_error(e);
            return None;
        }
    };
    let node = workspace.project(request.at(), requires_update);
    if node.is_none() {
        info!(
            "{} cannot be projected into workspace '{}' of '{}'",
            request.at(),
            workspace.name(),
            repository.name()
        );
        let path = request.at().path().cloned().unwrap_or_else(Path::root);
        request.set_error(RepoError::PathNotFound {
            path,
            lowest_existing: Path::root(),
        });
    }
    node
}

fn push_down(federated: &mut FederatedRequest, node: &ProjectedNode) {
    if let ProjectedNode::Proxy(proxy) = node {
        let pushed = federated
            .original()
            .rebased(proxy.location().clone(), proxy.workspace_name());
        federated.add(
            pushed,
            proxy.is_same_location_as_original(),
            false,
            Some(proxy.projection().clone()),
        );
    }
}

fn fork_simple(federated: &mut FederatedRequest, node: &ProjectedNode) {
    for projected in node.iter() {
        match projected {
            ProjectedNode::Placeholder(placeholder) => {
                let original = federated.original();
                let mut result = original.rebased(original.at().clone(), original.workspace());
                result.set_actual_location(placeholder.location().clone());
                match original.request_type() {
                    RequestType::ReadAllProperties => result.add_properties(placeholder.properties().to_vec()),
                    RequestType::ReadProperty(name) => {
                        if let Some(property) = placeholder.property(name) {
                            result.set_property(property.clone());
                        }
                    }
                    _ => {}
                }
                federated.add(result, true, true, None);
            }
            ProjectedNode::Proxy(_) => push_down(federated, projected),
        }
    }
}

fn placeholder_result(
    original: &Request,
    placeholder: &PlaceholderNode,
    children: Vec<Location>,
    with_properties: bool,
) -> Request {
    let mut result = original.rebased(placeholder.location().clone(), original.workspace());
    result.add_children(children);
    if with_properties {
        result.add_properties(placeholder.properties().to_vec());
    }
    result.set_actual_location(placeholder.location().clone());
    result
}

/// Forks a read of a node's children.
///
/// A placeholder's own children are known, except for proxies: those are verified in their
/// source so the join can report their real locations. The verifications are interleaved with
/// placeholder results to keep the children in order.
fn fork_with_children(federated: &mut FederatedRequest, node: &ProjectedNode) {
    for projected in node.iter() {
        let placeholder = match projected {
            ProjectedNode::Placeholder(placeholder) => placeholder,
            ProjectedNode::Proxy(_) => {
                push_down(federated, projected);
                continue;
            }
        };
        let mut children: Vec<Location> = Vec::new();
        let mut first = true;
        for child in placeholder.children() {
            if let ProjectedNode::Placeholder(child) = child {
                children.push(child.location().clone());
                continue;
            }
            if !children.is_empty() {
                let result = placeholder_result(federated.original(), placeholder, mem::take(&mut children), first);
                first = false;
                federated.add(result, true, true, None);
            }
            for proxy in child.iter().map_while(|c| c.as_proxy()) {
                let verify = Request::verify_node_exists(proxy.location().clone(), proxy.workspace_name());
                federated.add(
                    verify,
                    proxy.is_same_location_as_original(),
                    false,
                    Some(proxy.projection().clone()),
                );
            }
        }
        if !children.is_empty() || first {
            let result = placeholder_result(federated.original(), placeholder, children, first);
            federated.add(result, true, true, None);
        }
    }
}

/// Sends a create to the first proxy; a parent that only exists as a placeholder cannot have
/// children created under it.
fn fork_create(federated: &mut FederatedRequest, node: &ProjectedNode) {
    match node.iter().find(|n| n.is_proxy()) {
        Some(proxy) => push_down(federated, proxy),
        None => {
            let original = federated.original_mut();
            let error = RepoError::InvalidRequest(format!(
                "Cannot create a node under {}, which is not stored in any source",
                original.at()
            ));
            info!("{}: {}", original, error);
            original.set_error(error);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::join::JoinRequestProcessor;
    use crate::projection::{PathRule, Projection};
    use crate::repository::FederatedWorkspace;
    use crate::testutil::{loc, path, MemorySource};
    use common::testutil::init;
    use common::{Property, Value};
    use std::time::Duration;

    fn projection(source: &str, rule: &str, read_only: bool) -> Projection {
        Projection::new(source, None, read_only, vec![PathRule::parse(rule).unwrap()])
    }

    fn source() -> MemorySource {
        MemorySource::new()
            .with_nodes("main", &["/a/x", "/b"])
            .with_nodes("branch", &["/c", "/d/e"])
            .with_nodes("archive", &["/old/one", "/old/two"])
    }

    fn repository(source: MemorySource) -> Arc<FederatedRepository> {
        let workspaces = vec![
            FederatedWorkspace::new(
                "default",
                vec![projection("main", "/ => /", false), projection("branch", "/branch => /", false)],
            )
            .unwrap(),
            FederatedWorkspace::new("archive", vec![projection("archive", "/library/archive => /old", true)]).unwrap(),
            FederatedWorkspace::new("broken", vec![projection("missing", "/ => /", false)]).unwrap(),
        ];
        Arc::new(FederatedRepository::new("fed", workspaces, Arc::new(source)).unwrap().with_retry_limit(1))
    }

    /// Forks and joins the requests, returning the joined originals in order.
    fn run(repository: Arc<FederatedRepository>, requests: Vec<Request>) -> Vec<Request> {
        init();
        let (sender, receiver) = unbounded();
        let time_to_expire = repository.time_to_expire();
        let mut fork = ForkRequestProcessor::new(repository, sender);
        fork.process_all(requests);
        fork.close();
        let mut join = JoinRequestProcessor::new().with_time_to_expire(time_to_expire);
        let mut joined = Vec::new();
        join.process_queue(&receiver, |r| joined.push(r));
        joined
    }

    #[test]
    fn test_read_root_of_branched_mirror() {
        let source = source();
        let root_id = source.id_of("main", "/");
        let joined = run(repository(source), vec![Request::read_node(loc("/"), None)]);
        let root = &joined[0];
        assert!(!root.has_error(), "{:?}", root.error());
        assert_eq!(vec![loc("/a"), loc("/b"), loc("/branch")], paths_only(root.children()));
        let actual = root.actual_location().unwrap();
        assert_eq!(Some(&path("/")), actual.path());
        assert_eq!(Some(root_id), actual.id());
    }

    fn paths_only(children: &[Location]) -> Vec<Location> {
        children.iter().map(|c| Location::with_path(c.path().unwrap().clone())).collect()
    }

    #[test]
    fn test_reads_inside_a_branch() {
        let source = source();
        let d_id = source.id_of("branch", "/d");
        let joined = run(
            repository(source),
            vec![
                Request::read_all_children(loc("/branch/d"), None),
                Request::verify_node_exists(loc("/branch/d"), Some("default")),
                Request::read_node(loc("/a"), None),
            ],
        );
        assert_eq!(vec![loc("/branch/d/e")], paths_only(joined[0].children()));
        assert_eq!(Some(&path("/branch/d")), joined[1].actual_location().unwrap().path());
        assert_eq!(Some(d_id), joined[1].actual_location().unwrap().id());
        assert_eq!(vec![loc("/a/x")], paths_only(joined[2].children()));
    }

    #[test]
    fn test_offset_placeholders_and_proxies() {
        let joined = run(
            repository(source()),
            vec![
                Request::read_node(loc("/"), Some("archive")),
                Request::read_node(loc("/library"), Some("archive")),
                Request::read_all_children(loc("/library/archive"), Some("archive")),
                Request::read_all_properties(loc("/library"), Some("archive")),
            ],
        );
        assert_eq!(vec![loc("/library")], paths_only(joined[0].children()));
        assert_eq!(vec![loc("/library/archive")], paths_only(joined[1].children()));
        assert!(joined[1].property(common::property::PRIMARY_TYPE).is_some());
        assert_eq!(
            vec![loc("/library/archive/one"), loc("/library/archive/two")],
            paths_only(joined[2].children())
        );
        assert_eq!(2, joined[3].properties().len());
    }

    #[test]
    fn test_failures_are_reported_on_the_request() {
        let joined = run(
            repository(source()),
            vec![
                Request::read_node(loc("/a"), Some("nowhere")),
                Request::read_node(loc("/elsewhere"), Some("archive")),
                Request::read_node(loc("/a/x/y/z"), None),
                Request::read_node(loc("/a"), Some("broken")),
            ],
        );
        match joined[0].error() {
            Some(RepoError::InvalidWorkspace { workspace, .. }) => assert_eq!("nowhere", workspace),
            other => panic!("unexpected {:?}", other),
        }
        match joined[1].error() {
            Some(RepoError::PathNotFound { lowest_existing, .. }) => assert!(lowest_existing.is_root()),
            other => panic!("unexpected {:?}", other),
        }
        match joined[2].error() {
            Some(RepoError::PathNotFound { path: p, lowest_existing }) => {
                assert_eq!(&path("/a/x/y/z"), p);
                assert_eq!(&path("/a/x"), lowest_existing);
            }
            other => panic!("unexpected {:?}", other),
        }
        match joined[3].error() {
            Some(RepoError::SourceError(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_create_node() {
        let source = source();
        let properties = vec![Property::single("title", Value::String(String::from("new")))];
        let joined = run(
            repository(source.clone()),
            vec![
                Request::create_node(loc("/branch/d"), None, "f", properties.clone()),
                Request::create_node(loc("/library"), Some("archive"), "f", properties.clone()),
                Request::create_node(loc("/library/archive"), Some("archive"), "f", properties),
            ],
        );
        assert!(!joined[0].has_error(), "{:?}", joined[0].error());
        assert_eq!(Some(&path("/branch/d/f")), joined[0].actual_location().unwrap().path());
        assert!(source.exists("branch", "/d/f"));

        match joined[1].error() {
            Some(RepoError::InvalidRequest(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
        match joined[2].error() {
            Some(RepoError::PathNotFound { .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert!(!source.exists("archive", "/old/f"));
    }

    #[test]
    fn test_read_property() {
        let source = source();
        source.set_property("main", "/b", Property::single("title", Value::Long(7)));
        let joined = run(
            repository(source),
            vec![
                Request::read_property(loc("/b"), None, "title"),
                Request::read_property(loc("/b"), None, "missing"),
            ],
        );
        assert_eq!(Some(&Value::Long(7)), joined[0].property("title").unwrap().first_value());
        assert!(joined[1].properties().is_empty());
        assert!(!joined[1].has_error());
    }

    /// Delegates to an in-memory source but panics on any request under `/boom`.
    struct Panicking(MemorySource);

    struct PanickingConnection(Box<dyn RepositoryConnection>);

    impl RepositoryConnectionFactory for Panicking {
        fn create_connection(&self, source_name: &str) -> Result<Box<dyn RepositoryConnection>, RepoError> {
            Ok(Box::new(PanickingConnection(self.0.create_connection(source_name)?)))
        }
    }

    impl RepositoryConnection for PanickingConnection {
        fn source_name(&self) -> &str {
            self.0.source_name()
        }

        fn execute(&mut self, request: &mut Request) -> Result<(), RepoError> {
            if request.at().path().map_or(false, |p| p.is_at_or_below(&path("/boom"))) {
                panic!("connection lost mid request");
            }
            self.0.execute(request)
        }
    }

    #[test]
    fn test_panicking_connection_fails_request() {
        let source = MemorySource::new().with_nodes("main", &["/a", "/boom"]);
        let workspaces = vec![FederatedWorkspace::new("default", vec![projection("main", "/ => /", false)]).unwrap()];
        let repository = Arc::new(
            FederatedRepository::new("fed", workspaces, Arc::new(Panicking(source)))
                .unwrap()
                .with_time_to_expire(Some(Duration::from_secs(5))),
        );
        let joined = run(
            repository,
            vec![
                Request::read_node(loc("/boom"), None),
                Request::read_node(loc("/a"), None),
            ],
        );
        assert_eq!(2, joined.len());
        match joined[0].error() {
            Some(RepoError::SourceError(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert!(!joined[1].has_error(), "{:?}", joined[1].error());
        assert_eq!(Some(&path("/a")), joined[1].actual_location().unwrap().path());
    }
}
