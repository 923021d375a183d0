use super::placeholder::{find_placeholder, load_placeholder_nodes, Placeholders};
use super::{ProjectedNode, Projector, ProxyNode};
use crate::projection::Projection;
use common::{Location, Path};
use std::sync::Arc;

/// A single source mounted below the federated root.
///
/// Content at or below the offset comes from the source. Everything above it is a chain of
/// placeholders leading down to the offset.
pub struct OffsetMirrorProjector {
    projection: Arc<Projection>,
    offset: Path,
    placeholders: Placeholders,
}

impl OffsetMirrorProjector {
    /// Returns a projector for exactly one projection with one rule whose repository path is not
    /// the root.
    pub fn with_projections(projections: &[Arc<Projection>]) -> Option<Self> {
        let projection = match projections {
            [projection] => projection,
            _ => return None,
        };
        let offset = match projection.rules() {
            [rule] if !rule.repository_path().is_root() => rule.repository_path().clone(),
            _ => return None,
        };
        Some(OffsetMirrorProjector {
            projection: projection.clone(),
            offset,
            placeholders: load_placeholder_nodes(projections),
        })
    }
}

impl Projector for OffsetMirrorProjector {
    fn name(&self) -> &'static str {
        "offset mirror"
    }

    fn project(&self, location: &Location, requires_update: bool) -> Option<ProjectedNode> {
        match location.path() {
            Some(path) if path.is_at_or_below(&self.offset) => {
                if requires_update && self.projection.is_read_only() {
                    return None;
                }
                let in_source = self.projection.paths_in_source(path).into_iter().next()?;
                Some(ProjectedNode::Proxy(ProxyNode::new(
                    self.projection.clone(),
                    Location::with_path(in_source),
                    location.clone(),
                )))
            }
            _ => find_placeholder(&self.placeholders, location).map(ProjectedNode::Placeholder),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::projection;

    fn loc(text: &str) -> Location {
        Location::with_path(Path::parse(text).unwrap())
    }

    fn projector() -> OffsetMirrorProjector {
        OffsetMirrorProjector::with_projections(&[projection("source", &["/a/b => /x $ private"])]).unwrap()
    }

    #[test]
    fn test_above_offset_is_placeholders() {
        let projector = projector();
        let root = projector.project(&loc("/"), false).unwrap();
        let root = root.as_placeholder().unwrap();
        assert_eq!(1, root.children().len());
        assert_eq!(Some(&Path::parse("/a").unwrap()), root.children()[0].location().path());
        assert!(root.children()[0].is_placeholder());

        let a = projector.project(&loc("/a"), false).unwrap();
        let children = a.as_placeholder().unwrap().children();
        assert_eq!(1, children.len());
        assert_eq!(&loc("/a/b"), children[0].federated_location());
        assert_eq!(&loc("/x"), children[0].location());

        assert!(projector.project(&loc("/c"), false).is_none());
        assert!(projector.project(&loc("/a/c"), false).is_none());
    }

    #[test]
    fn test_at_or_below_offset_is_proxy() {
        let projector = projector();
        let node = projector.project(&loc("/a/b"), false).unwrap();
        assert_eq!(&loc("/x"), node.location());
        assert!(!node.has_next());
        let node = projector.project(&loc("/a/b/c[2]/d"), false).unwrap();
        assert_eq!(&loc("/x/c[2]/d"), node.location());
        assert_eq!(&loc("/a/b/c[2]/d"), node.as_proxy().unwrap().federated_location());
        assert!(projector.project(&loc("/a/b/private/y"), false).is_none());
    }

    #[test]
    fn test_applicability() {
        assert!(OffsetMirrorProjector::with_projections(&[projection("s", &["/ => /a"])]).is_none());
        assert!(OffsetMirrorProjector::with_projections(&[projection("s", &["/a => /", "/b => /"])]).is_none());
        assert!(OffsetMirrorProjector::with_projections(&[
            projection("s", &["/a => /"]),
            projection("t", &["/b => /"])
        ])
        .is_none());
    }
}
