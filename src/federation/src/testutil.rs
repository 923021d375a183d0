use crate::connection::{RepositoryConnection, RepositoryConnectionFactory};
use crate::projection::{PathRule, Projection};
use crate::request::{Request, RequestType};
use common::property::UUID;
use common::{Location, Path, Property, RepoError, Segment, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// A writable projection with the given rules and no workspace name.
pub(crate) fn projection(source: &str, rules: &[&str]) -> Arc<Projection> {
    let rules = rules.iter().map(|r| PathRule::parse(r).unwrap()).collect();
    Arc::new(Projection::new(source, None, false, rules))
}

pub(crate) fn path(text: &str) -> Path {
    Path::parse(text).unwrap()
}

pub(crate) fn loc(text: &str) -> Location {
    Location::with_path(path(text))
}

#[derive(Clone, Debug)]
struct NodeData {
    id: Uuid,
    properties: Vec<Property>,
    children: Vec<Path>,
}

impl NodeData {
    fn new() -> Self {
        NodeData {
            id: Uuid::new_v4(),
            properties: Vec::new(),
            children: Vec::new(),
        }
    }
}

type Nodes = BTreeMap<Path, NodeData>;

/// In-memory sources keyed by name. Unknown sources refuse connections.
#[derive(Clone, Default)]
pub(crate) struct MemorySource {
    sources: Arc<Mutex<HashMap<String, Nodes>>>,
}

impl MemorySource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds nodes (and any missing ancestors) to a source, creating the source if needed.
    pub(crate) fn with_nodes(self, source: &str, paths: &[&str]) -> Self {
        {
            let mut sources = self.sources.lock().unwrap();
            let nodes = sources.entry(source.to_string()).or_insert_with(|| {
                let mut nodes = Nodes::new();
                nodes.insert(Path::root(), NodeData::new());
                nodes
            });
            for text in paths {
                let full = path(text);
                for depth in 1..=full.len() {
                    let child = full.subpath(depth);
                    if nodes.contains_key(&child) {
                        continue;
                    }
                    nodes.insert(child.clone(), NodeData::new());
                    let parent = full.subpath(depth - 1);
                    if let Some(parent) = nodes.get_mut(&parent) {
                        parent.children.push(child);
                    }
                }
            }
        }
        self
    }

    pub(crate) fn set_property(&self, source: &str, at: &str, property: Property) {
        let mut sources = self.sources.lock().unwrap();
        let node = sources.get_mut(source).unwrap().get_mut(&path(at)).unwrap();
        node.properties.retain(|p| p.name() != property.name());
        node.properties.push(property);
    }

    pub(crate) fn id_of(&self, source: &str, at: &str) -> Uuid {
        self.sources.lock().unwrap()[source][&path(at)].id
    }

    pub(crate) fn exists(&self, source: &str, at: &str) -> bool {
        self.sources.lock().unwrap()[source].contains_key(&path(at))
    }
}

impl RepositoryConnectionFactory for MemorySource {
    fn create_connection(&self, source_name: &str) -> Result<Box<dyn RepositoryConnection>, RepoError> {
        if !self.sources.lock().unwrap().contains_key(source_name) {
            return Err(RepoError::SourceError(format!("No source named '{}'", source_name)));
        }
        Ok(Box::new(MemoryConnection {
            source_name: source_name.to_string(),
            sources: self.sources.clone(),
        }))
    }
}

struct MemoryConnection {
    source_name: String,
    sources: Arc<Mutex<HashMap<String, Nodes>>>,
}

fn lowest_existing(nodes: &Nodes, path: &Path) -> Path {
    let mut current = path.clone();
    while let Some(parent) = current.parent() {
        if nodes.contains_key(&parent) {
            return parent;
        }
        current = parent;
    }
    Path::root()
}

impl RepositoryConnection for MemoryConnection {
    fn source_name(&self) -> &str {
        &self.source_name
    }

    fn execute(&mut self, request: &mut Request) -> Result<(), RepoError> {
        let mut sources = self.sources.lock().unwrap();
        let nodes = sources
            .get_mut(&self.source_name)
            .ok_or_else(|| RepoError::SourceError(format!("Source '{}' is gone", self.source_name)))?;
        let path = match (request.at().path(), request.at().id()) {
            (Some(path), _) => path.clone(),
            (None, Some(id)) => nodes
                .iter()
                .find(|(_, n)| n.id == id)
                .map(|(p, _)| p.clone())
                .ok_or_else(|| RepoError::InvalidRequest(format!("No node with id {}", id)))?,
            (None, None) => return Err(RepoError::InvalidRequest(String::from("Empty location"))),
        };
        let node = match nodes.get(&path) {
            Some(node) => node.clone(),
            None => {
                let lowest_existing = lowest_existing(nodes, &path);
                return Err(RepoError::PathNotFound { path, lowest_existing });
            }
        };
        let actual = Location::with_path_and_id(path.clone(), node.id);
        match request.request_type().clone() {
            RequestType::VerifyNodeExists => {}
            RequestType::ReadNode => {
                request.add_properties(node.properties);
                request.add_children(node.children.into_iter().map(Location::with_path));
            }
            RequestType::ReadAllChildren => {
                request.add_children(node.children.into_iter().map(Location::with_path));
            }
            RequestType::ReadAllProperties => request.add_properties(node.properties),
            RequestType::ReadProperty(name) => {
                if let Some(property) = node.properties.into_iter().find(|p| p.name() == name) {
                    request.set_property(property);
                }
            }
            RequestType::CreateNode { name, properties } => {
                let index = node
                    .children
                    .iter()
                    .filter(|c| c.last_segment().map(|s| s.name()) == Some(name.as_str()))
                    .count()
                    + 1;
                let child = path.child_segment(Segment::with_index(&name, index));
                let mut data = NodeData::new();
                data.properties = properties;
                data.properties.push(Property::single(UUID, Value::Uuid(data.id)));
                let created = Location::with_path_and_id(child.clone(), data.id);
                nodes.insert(child.clone(), data);
                if let Some(parent) = nodes.get_mut(&path) {
                    parent.children.push(child);
                }
                request.set_actual_location(created);
                return Ok(());
            }
        }
        request.set_actual_location(actual);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source() {
        let source = MemorySource::new().with_nodes("s", &["/a/b", "/a/c"]);
        let mut connection = source.create_connection("s").unwrap();
        let mut read = Request::read_node(loc("/a"), None);
        connection.execute(&mut read).unwrap();
        assert_eq!(vec![loc("/a/b"), loc("/a/c")], read.children().to_vec());
        assert_eq!(Some(source.id_of("s", "/a")), read.actual_location().unwrap().id());

        let mut missing = Request::read_node(loc("/a/x/y"), None);
        match connection.execute(&mut missing) {
            Err(RepoError::PathNotFound { lowest_existing, .. }) => assert_eq!(path("/a"), lowest_existing),
            _ => panic!("expected path not found"),
        }
        assert!(source.create_connection("other").is_err());
    }
}
