use super::{is_mirror, ProjectedNode, Projector, ProxyNode};
use crate::projection::Projection;
use common::Location;
use std::sync::Arc;

/// Projects every location onto the same location in a single source.
pub struct MirrorProjector {
    projection: Arc<Projection>,
}

impl MirrorProjector {
    /// Returns a projector when there is exactly one projection and it maps `/ => /`.
    pub fn with_projections(projections: &[Arc<Projection>]) -> Option<Self> {
        match projections {
            [projection] if is_mirror(projection) => Some(MirrorProjector {
                projection: projection.clone(),
            }),
            _ => None,
        }
    }
}

impl Projector for MirrorProjector {
    fn name(&self) -> &'static str {
        "mirror"
    }

    fn project(&self, location: &Location, requires_update: bool) -> Option<ProjectedNode> {
        if requires_update && self.projection.is_read_only() {
            return None;
        }
        Some(ProjectedNode::Proxy(ProxyNode::new(
            self.projection.clone(),
            location.clone(),
            location.clone(),
        )))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::projection::PathRule;
    use common::testutil::gen_random_path;
    use uuid::Uuid;

    fn mirror(read_only: bool) -> MirrorProjector {
        let rules = vec![PathRule::parse("/ => /").unwrap()];
        let projection = Arc::new(Projection::new("source", Some("ws"), read_only, rules));
        MirrorProjector::with_projections(&[projection]).unwrap()
    }

    #[test]
    fn test_every_location_maps_to_itself() {
        let projector = mirror(false);
        let mut locations: Vec<Location> = (0..10).map(|i| Location::with_path(gen_random_path(i))).collect();
        locations.push(Location::with_id(Uuid::new_v4()));
        for location in locations {
            let node = projector.project(&location, false).unwrap();
            let proxy = node.as_proxy().unwrap();
            assert_eq!(&location, node.location());
            assert_eq!(&location, proxy.federated_location());
            assert!(!node.has_next());
            assert_eq!("source", proxy.source_name());
            assert_eq!(Some("ws"), proxy.workspace_name());
        }
    }

    #[test]
    fn test_read_only_mirror_rejects_updates() {
        let projector = mirror(true);
        let location = Location::with_path(gen_random_path(2));
        assert!(projector.project(&location, false).is_some());
        assert!(projector.project(&location, true).is_none());
    }

    #[test]
    fn test_not_a_mirror() {
        let rules = vec![PathRule::parse("/a => /").unwrap()];
        let projection = Arc::new(Projection::new("source", None, false, rules));
        assert!(MirrorProjector::with_projections(&[projection.clone()]).is_none());
        let mirror = mirror(false).projection;
        assert!(MirrorProjector::with_projections(&[mirror, projection]).is_none());
    }
}
