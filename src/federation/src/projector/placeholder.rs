use super::{link, PlaceholderNode, ProjectedNode, Projector, ProxyNode};
use crate::projection::Projection;
use common::property::{PRIMARY_TYPE, UUID};
use common::{Location, Path, Property, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Primary type given to every placeholder node.
pub const PLACEHOLDER_TYPE: &str = "mode:projection";

/// Placeholder nodes keyed by their path in the federated workspace.
pub(crate) type Placeholders = HashMap<Path, PlaceholderNode>;

/// Builds the placeholders that connect the federated root to each projection's top-level paths.
///
/// Every ancestor of a top-level path gets a placeholder whose children are the next segment
/// toward that path. Projections mounted at the root contribute nothing. When a proxy and a
/// placeholder would share a child path, the proxy is kept.
///
/// # Arguments
///
/// * `projections` - Projections of a workspace, in order.
pub(crate) fn load_placeholder_nodes(projections: &[Arc<Projection>]) -> Placeholders {
    let mut ids: HashMap<Path, Uuid> = HashMap::new();
    let mut children: HashMap<Path, Vec<ProjectedNode>> = HashMap::new();
    for projection in projections {
        for top in projection.top_level_paths_in_repository() {
            if top.is_root() {
                continue;
            }
            let in_source = match projection.paths_in_source(&top).into_iter().next() {
                Some(path) => path,
                None => continue,
            };
            for depth in 0..top.len() {
                let parent = top.subpath(depth);
                let child_path = top.subpath(depth + 1);
                ids.entry(parent.clone()).or_insert_with(Uuid::new_v4);
                let child = if depth + 1 == top.len() {
                    ProjectedNode::Proxy(ProxyNode::new(
                        projection.clone(),
                        Location::with_path(in_source.clone()),
                        Location::with_path(child_path),
                    ))
                } else {
                    let id = *ids.entry(child_path.clone()).or_insert_with(Uuid::new_v4);
                    ProjectedNode::Placeholder(placeholder(child_path, id, Vec::new()))
                };
                add_child(children.entry(parent).or_default(), child);
            }
        }
    }
    children
        .into_iter()
        .map(|(path, children)| {
            let id = ids[&path];
            (path.clone(), placeholder(path, id, children))
        })
        .collect()
}

fn placeholder(path: Path, id: Uuid, children: Vec<ProjectedNode>) -> PlaceholderNode {
    let properties = vec![
        Property::single(PRIMARY_TYPE, Value::Name(PLACEHOLDER_TYPE.to_string())),
        Property::single(UUID, Value::Uuid(id)),
    ];
    PlaceholderNode::new(Location::with_path_and_id(path, id), properties, children)
}

fn add_child(children: &mut Vec<ProjectedNode>, child: ProjectedNode) {
    let existing = children
        .iter()
        .position(|c| c.federated_location().path() == child.federated_location().path());
    match existing {
        Some(idx) => {
            if child.is_proxy() && children[idx].is_placeholder() {
                children[idx] = child;
            }
        }
        None => children.push(child),
    }
}

/// Finds the placeholder for a location, by path when it has one and by identifier otherwise.
pub(crate) fn find_placeholder(placeholders: &Placeholders, location: &Location) -> Option<PlaceholderNode> {
    match location.path() {
        Some(path) => placeholders.get(path).cloned(),
        None => {
            let id = location.id()?;
            placeholders
                .values()
                .find(|p| p.location().id() == Some(id))
                .cloned()
        }
    }
}

/// Handles any set of projections: proxies from every projection that covers a location,
/// followed by the placeholder at that location if there is one.
pub struct GeneralProjector {
    projections: Vec<Arc<Projection>>,
    placeholders: Placeholders,
}

impl GeneralProjector {
    pub fn new(projections: &[Arc<Projection>]) -> Self {
        GeneralProjector {
            projections: projections.to_vec(),
            placeholders: load_placeholder_nodes(projections),
        }
    }
}

impl Projector for GeneralProjector {
    fn name(&self) -> &'static str {
        "general"
    }

    fn project(&self, location: &Location, requires_update: bool) -> Option<ProjectedNode> {
        let mut chain = None;
        if let Some(path) = location.path() {
            for projection in &self.projections {
                if requires_update && projection.is_read_only() {
                    continue;
                }
                for in_source in projection.paths_in_source(path) {
                    let proxy = ProxyNode::new(projection.clone(), Location::with_path(in_source), location.clone());
                    chain = link(chain, ProjectedNode::Proxy(proxy));
                }
            }
        }
        match find_placeholder(&self.placeholders, location) {
            Some(placeholder) => link(chain, ProjectedNode::Placeholder(placeholder)),
            None => chain,
        }
    }
}
