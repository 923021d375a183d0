use super::{is_mirror, PlaceholderNode, ProjectedNode, Projector, ProxyNode};
use crate::projection::Projection;
use common::Location;
use std::sync::Arc;

/// A mirror of one source plus branches of other sources, each mounted as a child of the root.
///
/// Branches take precedence over the mirror below their mount points. At the root the mirror's
/// proxy is chained to a placeholder whose children are the branch roots.
pub struct BranchedMirrorProjector {
    mirror: Arc<Projection>,
    branches: Vec<Arc<Projection>>,
}

impl BranchedMirrorProjector {
    /// Returns a projector when exactly one projection is a mirror and every other projection
    /// has a single rule mounted directly under the root at a distinct path.
    pub fn with_projections(projections: &[Arc<Projection>]) -> Option<Self> {
        let mut mirror = None;
        let mut branches: Vec<Arc<Projection>> = Vec::new();
        for projection in projections {
            if is_mirror(projection) {
                if mirror.is_some() {
                    return None;
                }
                mirror = Some(projection.clone());
                continue;
            }
            let rule = match projection.rules() {
                [rule] if rule.repository_path().len() == 1 => rule,
                _ => return None,
            };
            let taken = branches
                .iter()
                .any(|b| b.rules()[0].repository_path() == rule.repository_path());
            if taken {
                return None;
            }
            branches.push(projection.clone());
        }
        match mirror {
            Some(mirror) if !branches.is_empty() => Some(BranchedMirrorProjector { mirror, branches }),
            _ => None,
        }
    }

    fn mirror_proxy(&self, location: &Location, requires_update: bool) -> Option<ProjectedNode> {
        if requires_update && self.mirror.is_read_only() {
            return None;
        }
        Some(ProjectedNode::Proxy(ProxyNode::new(
            self.mirror.clone(),
            location.clone(),
            location.clone(),
        )))
    }

    fn branch_root(&self, branch: &Arc<Projection>) -> ProjectedNode {
        let rule = &branch.rules()[0];
        ProjectedNode::Proxy(ProxyNode::new(
            branch.clone(),
            Location::with_path(rule.source_path().clone()),
            Location::with_path(rule.repository_path().clone()),
        ))
    }
}

impl Projector for BranchedMirrorProjector {
    fn name(&self) -> &'static str {
        "branched mirror"
    }

    fn project(&self, location: &Location, requires_update: bool) -> Option<ProjectedNode> {
        let path = match location.path() {
            Some(path) => path,
            None => return self.mirror_proxy(location, requires_update),
        };
        if path.is_root() {
            let mut root = self.mirror_proxy(location, requires_update)?;
            let branch_roots = self.branches.iter().map(|b| self.branch_root(b)).collect();
            root.append(ProjectedNode::Placeholder(PlaceholderNode::new(
                location.clone(),
                Vec::new(),
                branch_roots,
            )));
            return Some(root);
        }
        for branch in &self.branches {
            if let Some(path_in_source) = branch.paths_in_source(path).into_iter().next() {
                if requires_update && branch.is_read_only() {
                    return None;
                }
                return Some(ProjectedNode::Proxy(ProxyNode::new(
                    branch.clone(),
                    Location::with_path(path_in_source),
                    location.clone(),
                )));
            }
        }
        self.mirror_proxy(location, requires_update)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::projection::PathRule;
    use common::Path;

    fn projection(source: &str, rule: &str, read_only: bool) -> Arc<Projection> {
        Arc::new(Projection::new(source, None, read_only, vec![PathRule::parse(rule).unwrap()]))
    }

    fn loc(text: &str) -> Location {
        Location::with_path(Path::parse(text).unwrap())
    }

    fn projector() -> BranchedMirrorProjector {
        BranchedMirrorProjector::with_projections(&[
            projection("main", "/ => /", false),
            projection("aircraft", "/Aircraft => /Data/Aircraft", false),
            projection("cars", "/Cars => /", true),
        ])
        .unwrap()
    }

    #[test]
    fn test_root_is_mirror_plus_branch_placeholder() {
        let node = projector().project(&loc("/"), false).unwrap();
        let mirror = node.as_proxy().unwrap();
        assert_eq!("main", mirror.source_name());
        assert_eq!(&loc("/"), mirror.location());
        assert!(node.has_next());

        let placeholder = node.next().unwrap().as_placeholder().unwrap();
        assert!(!node.next().unwrap().has_next());
        assert_eq!(&loc("/"), placeholder.location());
        let children: Vec<(String, Location)> = placeholder
            .children()
            .iter()
            .map(|c| {
                let proxy = c.as_proxy().unwrap();
                (proxy.source_name().to_string(), proxy.federated_location().clone())
            })
            .collect();
        assert_eq!(
            vec![
                ("aircraft".to_string(), loc("/Aircraft")),
                ("cars".to_string(), loc("/Cars")),
            ],
            children
        );
        assert_eq!(&loc("/Data/Aircraft"), placeholder.children()[0].location());
    }

    #[test]
    fn test_branches_win_below_their_roots() {
        let projector = projector();
        let node = projector.project(&loc("/Aircraft/Boeing"), false).unwrap();
        let proxy = node.as_proxy().unwrap();
        assert_eq!("aircraft", proxy.source_name());
        assert_eq!(&loc("/Data/Aircraft/Boeing"), proxy.location());
        assert_eq!(&loc("/Aircraft/Boeing"), proxy.federated_location());
        assert!(!proxy.is_same_location_as_original());
        assert!(!node.has_next());

        let node = projector.project(&loc("/Cars"), false).unwrap();
        assert_eq!(&loc("/"), node.location());

        let node = projector.project(&loc("/Other/x"), false).unwrap();
        assert_eq!("main", node.as_proxy().unwrap().source_name());
        assert!(node.as_proxy().unwrap().is_same_location_as_original());
    }

    #[test]
    fn test_read_only_branch_rejects_updates() {
        let projector = projector();
        assert!(projector.project(&loc("/Cars/x"), true).is_none());
        assert!(projector.project(&loc("/Aircraft/x"), true).is_some());
    }

    #[test]
    fn test_applicability() {
        let main = projection("main", "/ => /", false);
        assert!(BranchedMirrorProjector::with_projections(&[main.clone()]).is_none());
        let deep = projection("deep", "/a/b => /", false);
        assert!(BranchedMirrorProjector::with_projections(&[main.clone(), deep]).is_none());
        let a = projection("a", "/a => /", false);
        let again = projection("again", "/a => /x", false);
        assert!(BranchedMirrorProjector::with_projections(&[main.clone(), a.clone(), again]).is_none());
        assert!(BranchedMirrorProjector::with_projections(&[main.clone(), main, a]).is_none());
    }
}
