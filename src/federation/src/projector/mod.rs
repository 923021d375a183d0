use crate::projection::Projection;
use common::{Location, Property};
use std::fmt;
use std::sync::Arc;

mod branched;
mod mirror;
mod offset;
mod placeholder;

pub use branched::BranchedMirrorProjector;
pub use mirror::MirrorProjector;
pub use offset::OffsetMirrorProjector;
pub use placeholder::GeneralProjector;

/// Resolves locations in a federated workspace to the nodes that back them.
pub trait Projector: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Projects a federated location onto its sources.
    ///
    /// Returns `None` when nothing backs the location.
    ///
    /// # Arguments
    ///
    /// * `location` - Location in the federated workspace.
    /// * `requires_update` - True when the caller will change the content, so read-only
    ///   projections are skipped.
    fn project(&self, location: &Location, requires_update: bool) -> Option<ProjectedNode>;
}

/// Picks the most specific projector that handles the projections.
pub fn projector_for(projections: &[Arc<Projection>]) -> Box<dyn Projector> {
    if let Some(projector) = MirrorProjector::with_projections(projections) {
        return Box::new(projector);
    }
    if let Some(projector) = BranchedMirrorProjector::with_projections(projections) {
        return Box::new(projector);
    }
    if let Some(projector) = OffsetMirrorProjector::with_projections(projections) {
        return Box::new(projector);
    }
    Box::new(GeneralProjector::new(projections))
}

/// True for a projection with the single rule `/ => /`.
pub(crate) fn is_mirror(projection: &Projection) -> bool {
    match projection.rules() {
        [rule] => {
            rule.repository_path().is_root() && rule.source_path().is_root() && !rule.has_exceptions()
        }
        _ => false,
    }
}

/// A node in a source standing in for a federated node.
#[derive(Clone, Debug)]
pub struct ProxyNode {
    projection: Arc<Projection>,
    location: Location,
    federated_location: Location,
    next: Option<Box<ProjectedNode>>,
}

impl ProxyNode {
    /// Creates a new proxy.
    ///
    /// # Arguments
    ///
    /// * `projection` - Projection that maps the federated location into the source.
    /// * `location` - Location in the source.
    /// * `federated_location` - Location in the federated workspace.
    pub fn new(projection: Arc<Projection>, location: Location, federated_location: Location) -> Self {
        ProxyNode {
            projection,
            location,
            federated_location,
            next: None,
        }
    }

    pub fn projection(&self) -> &Arc<Projection> {
        &self.projection
    }

    pub fn source_name(&self) -> &str {
        self.projection.source_name()
    }

    pub fn workspace_name(&self) -> Option<&str> {
        self.projection.workspace_name()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn federated_location(&self) -> &Location {
        &self.federated_location
    }

    /// True when the node sits at the same path in the source as in the federated workspace.
    pub fn is_same_location_as_original(&self) -> bool {
        self.location.path() == self.federated_location.path()
    }
}

/// A synthetic node that connects the federated root to where projections begin.
#[derive(Clone, Debug)]
pub struct PlaceholderNode {
    location: Location,
    properties: Vec<Property>,
    children: Vec<ProjectedNode>,
    next: Option<Box<ProjectedNode>>,
}

impl PlaceholderNode {
    pub fn new(location: Location, properties: Vec<Property>, children: Vec<ProjectedNode>) -> Self {
        PlaceholderNode {
            location,
            properties,
            children,
            next: None,
        }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name() == name)
    }

    pub fn children(&self) -> &[ProjectedNode] {
        &self.children
    }
}

/// Result of projecting a federated location: a chain of proxies and placeholders.
///
/// More than one node in the chain means several sources back the same federated node.
#[derive(Clone, Debug)]
pub enum ProjectedNode {
    Proxy(ProxyNode),
    Placeholder(PlaceholderNode),
}

impl ProjectedNode {
    /// Location of the node: in the source for a proxy, in the federated workspace for a
    /// placeholder.
    pub fn location(&self) -> &Location {
        match self {
            ProjectedNode::Proxy(proxy) => proxy.location(),
            ProjectedNode::Placeholder(placeholder) => placeholder.location(),
        }
    }

    /// Location of the node in the federated workspace.
    pub fn federated_location(&self) -> &Location {
        match self {
            ProjectedNode::Proxy(proxy) => proxy.federated_location(),
            ProjectedNode::Placeholder(placeholder) => placeholder.location(),
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self, ProjectedNode::Proxy(_))
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ProjectedNode::Placeholder(_))
    }

    pub fn as_proxy(&self) -> Option<&ProxyNode> {
        match self {
            ProjectedNode::Proxy(proxy) => Some(proxy),
            ProjectedNode::Placeholder(_) => None,
        }
    }

    pub fn as_placeholder(&self) -> Option<&PlaceholderNode> {
        match self {
            ProjectedNode::Placeholder(placeholder) => Some(placeholder),
            ProjectedNode::Proxy(_) => None,
        }
    }

    pub fn next(&self) -> Option<&ProjectedNode> {
        match self {
            ProjectedNode::Proxy(proxy) => proxy.next.as_deref(),
            ProjectedNode::Placeholder(placeholder) => placeholder.next.as_deref(),
        }
    }

    pub fn has_next(&self) -> bool {
        self.next().is_some()
    }

    fn next_slot(&mut self) -> &mut Option<Box<ProjectedNode>> {
        match self {
            ProjectedNode::Proxy(proxy) => &mut proxy.next,
            ProjectedNode::Placeholder(placeholder) => &mut placeholder.next,
        }
    }

    /// Adds a node to the end of this chain.
    pub fn append(&mut self, node: ProjectedNode) {
        let slot = self.next_slot();
        if slot.is_none() {
            *slot = Some(Box::new(node));
        } else if let Some(next) = slot {
            next.append(node);
        }
    }

    /// Iterates over this node and every node chained after it.
    pub fn iter(&self) -> Chain<'_> {
        Chain { next: Some(self) }
    }
}

/// Builds a chain by appending `node` to an optional head.
pub(crate) fn link(chain: Option<ProjectedNode>, node: ProjectedNode) -> Option<ProjectedNode> {
    Some(match chain {
        Some(mut head) => {
            head.append(node);
            head
        }
        None => node,
    })
}

pub struct Chain<'a> {
    next: Option<&'a ProjectedNode>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a ProjectedNode;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.next();
        Some(current)
    }
}

impl fmt::Display for ProjectedNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProjectedNode::Proxy(proxy) => {
                write!(f, "proxy {} => ", proxy.federated_location())?;
                if let Some(workspace) = proxy.workspace_name() {
                    write!(f, "{}@", workspace)?;
                }
                write!(f, "{}:{}", proxy.source_name(), proxy.location())
            }
            ProjectedNode::Placeholder(placeholder) => {
                let children: Vec<String> = placeholder
                    .children()
                    .iter()
                    .map(|c| c.federated_location().to_string())
                    .collect();
                write!(
                    f,
                    "placeholder {} with children [{}]",
                    placeholder.location(),
                    children.join(", ")
                )
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::{loc, projection};

    #[test]
    fn test_projector_selection() {
        let mirror = projection("main", &["/ => /"]);
        let branch = projection("branch", &["/b => /"]);
        let offset = projection("offset", &["/a/b => /"]);
        let deep = projection("deep", &["/x/y => /"]);

        assert_eq!("mirror", projector_for(&[mirror.clone()]).name());
        assert_eq!("branched mirror", projector_for(&[mirror.clone(), branch.clone()]).name());
        assert_eq!("offset mirror", projector_for(&[offset.clone()]).name());
        assert_eq!("general", projector_for(&[offset, deep]).name());
        assert_eq!("offset mirror", projector_for(&[branch]).name());
    }

    #[test]
    fn test_chain() {
        let mirror = projection("main", &["/ => /"]);
        let mut head = ProjectedNode::Proxy(ProxyNode::new(mirror.clone(), loc("/a"), loc("/a")));
        assert!(!head.has_next());
        head.append(ProjectedNode::Placeholder(PlaceholderNode::new(loc("/a"), Vec::new(), Vec::new())));
        head.append(ProjectedNode::Proxy(ProxyNode::new(mirror, loc("/b"), loc("/a"))));
        let kinds: Vec<bool> = head.iter().map(|n| n.is_proxy()).collect();
        assert_eq!(vec![true, false, true], kinds);
        assert!(head.as_proxy().unwrap().is_same_location_as_original());
        let last = head.iter().last().unwrap().as_proxy().unwrap();
        assert!(!last.is_same_location_as_original());
        assert_eq!("proxy /a => main:/b", head.iter().last().unwrap().to_string());
    }
}
