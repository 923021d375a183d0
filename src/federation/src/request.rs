use common::{Location, Name, Property, RepoError};
use std::fmt;

/// What a request asks of a node.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestType {
    VerifyNodeExists,
    ReadNode,
    ReadAllChildren,
    ReadAllProperties,
    ReadProperty(Name),
    /// Create a child with the given name and properties under the request's location.
    CreateNode { name: Name, properties: Vec<Property> },
}

impl RequestType {
    pub fn name(&self) -> &'static str {
        match self {
            RequestType::VerifyNodeExists => "verify node exists",
            RequestType::ReadNode => "read node",
            RequestType::ReadAllChildren => "read all children",
            RequestType::ReadAllProperties => "read all properties",
            RequestType::ReadProperty(_) => "read property",
            RequestType::CreateNode { .. } => "create node",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RequestType::ReadProperty(name) => write!(f, "read property '{}'", name),
            RequestType::CreateNode { name, .. } => write!(f, "create node '{}'", name),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// A request against one node, together with its results.
///
/// Results are filled in by whoever executes the request: the actual location of the node, its
/// properties and children, or an error. A cancelled request carries no results.
#[derive(Clone, Debug)]
pub struct Request {
    request_type: RequestType,
    at: Location,
    workspace: Option<String>,
    actual_location: Option<Location>,
    properties: Vec<Property>,
    children: Vec<Location>,
    error: Option<RepoError>,
    cancelled: bool,
}

impl Request {
    /// Creates a new request.
    ///
    /// # Arguments
    ///
    /// * `request_type` - What the request does.
    /// * `at` - Node the request targets; for a create this is the parent.
    /// * `workspace` - Workspace name, or `None` for the default workspace.
    pub fn new(request_type: RequestType, at: Location, workspace: Option<&str>) -> Self {
        Request {
            request_type,
            at,
            workspace: workspace.map(String::from),
            actual_location: None,
            properties: Vec::new(),
            children: Vec::new(),
            error: None,
            cancelled: false,
        }
    }

    pub fn verify_node_exists(at: Location, workspace: Option<&str>) -> Self {
        Self::new(RequestType::VerifyNodeExists, at, workspace)
    }

    pub fn read_node(at: Location, workspace: Option<&str>) -> Self {
        Self::new(RequestType::ReadNode, at, workspace)
    }

    pub fn read_all_children(at: Location, workspace: Option<&str>) -> Self {
        Self::new(RequestType::ReadAllChildren, at, workspace)
    }

    pub fn read_all_properties(at: Location, workspace: Option<&str>) -> Self {
        Self::new(RequestType::ReadAllProperties, at, workspace)
    }

    pub fn read_property(at: Location, workspace: Option<&str>, name: &str) -> Self {
        Self::new(RequestType::ReadProperty(name.to_string()), at, workspace)
    }

    pub fn create_node(under: Location, workspace: Option<&str>, name: &str, properties: Vec<Property>) -> Self {
        Self::new(
            RequestType::CreateNode {
                name: name.to_string(),
                properties,
            },
            under,
            workspace,
        )
    }

    /// Returns a request of the same kind aimed at another location and workspace, without results.
    pub fn rebased(&self, at: Location, workspace: Option<&str>) -> Self {
        Self::new(self.request_type.clone(), at, workspace)
    }

    pub fn request_type(&self) -> &RequestType {
        &self.request_type
    }

    pub fn at(&self) -> &Location {
        &self.at
    }

    pub fn workspace(&self) -> Option<&str> {
        self.workspace.as_deref()
    }

    /// True for every request that does not change content.
    pub fn is_read_only(&self) -> bool {
        !matches!(self.request_type, RequestType::CreateNode { .. })
    }

    pub fn actual_location(&self) -> Option<&Location> {
        self.actual_location.as_ref()
    }

    pub fn set_actual_location(&mut self, location: Location) {
        self.actual_location = Some(location);
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name() == name)
    }

    /// Adds a property, replacing any existing property with the same name.
    pub fn set_property(&mut self, property: Property) {
        match self.properties.iter().position(|p| p.name() == property.name()) {
            Some(idx) => self.properties[idx] = property,
            None => self.properties.push(property),
        }
    }

    pub fn add_properties<I: IntoIterator<Item = Property>>(&mut self, properties: I) {
        for property in properties {
            self.set_property(property);
        }
    }

    pub fn children(&self) -> &[Location] {
        &self.children
    }

    pub fn add_child(&mut self, child: Location) {
        self.children.push(child);
    }

    pub fn add_children<I: IntoIterator<Item = Location>>(&mut self, children: I) {
        self.children.extend(children);
    }

    /// Copies the results of another request onto this one, leaving the target untouched.
    pub fn copy_results_from(&mut self, other: &Request) {
        self.actual_location = other.actual_location.clone();
        self.properties = other.properties.clone();
        self.children = other.children.clone();
        self.error = other.error.clone();
        self.cancelled = other.cancelled;
    }

    pub fn error(&self) -> Option<&RepoError> {
        self.error.as_ref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn set_error(&mut self, error: RepoError) {
        self.error = Some(error);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Marks the request as cancelled and drops any results gathered so far.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.actual_location = None;
        self.properties.clear();
        self.children.clear();
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} at {}", self.request_type, self.at)?;
        if let Some(workspace) = &self.workspace {
            write!(f, " in '{}'", workspace)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::{Path, Value};

    fn loc(text: &str) -> Location {
        Location::with_path(Path::parse(text).unwrap())
    }

    #[test]
    fn test_set_property_replaces() {
        let mut request = Request::read_node(loc("/a"), None);
        request.set_property(Property::single("p", Value::Long(1)));
        request.add_properties(vec![
            Property::single("q", Value::Long(2)),
            Property::single("p", Value::Long(3)),
        ]);
        assert_eq!(2, request.properties().len());
        assert_eq!(Some(&Value::Long(3)), request.property("p").unwrap().first_value());
    }

    #[test]
    fn test_cancel_clears_results() {
        let mut request = Request::read_all_children(loc("/a"), Some("ws"));
        request.add_children(vec![loc("/a/b"), loc("/a/c")]);
        request.set_actual_location(loc("/a"));
        request.cancel();
        assert!(request.is_cancelled());
        assert!(request.children().is_empty());
        assert!(request.actual_location().is_none());
    }

    #[test]
    fn test_rebased_has_no_results() {
        let mut request = Request::read_property(loc("/a"), None, "title");
        request.set_property(Property::single("title", Value::String(String::from("x"))));
        request.set_error(RepoError::SourceError(String::from("down")));
        let rebased = request.rebased(loc("/b"), Some("other"));
        assert_eq!(request.request_type(), rebased.request_type());
        assert_eq!(&loc("/b"), rebased.at());
        assert_eq!(Some("other"), rebased.workspace());
        assert!(rebased.properties().is_empty());
        assert!(!rebased.has_error());
        assert_eq!("read property 'title' at /b in 'other'", rebased.to_string());
    }

    #[test]
    fn test_read_only() {
        assert!(Request::verify_node_exists(loc("/"), None).is_read_only());
        assert!(!Request::create_node(loc("/"), None, "child", Vec::new()).is_read_only());
    }
}
