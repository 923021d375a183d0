#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

pub mod config;
pub mod connection;
pub mod federated_request;
pub mod fork;
pub mod join;
pub mod projection;
pub mod projector;
pub mod repository;
pub mod request;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::FederationConfig;
pub use connection::{RepositoryConnection, RepositoryConnectionFactory};
pub use federated_request::{FederatedRequest, FrozenFederatedRequest, Latch, ProjectedEntry};
pub use fork::ForkRequestProcessor;
pub use join::JoinRequestProcessor;
pub use projection::{PathRule, Projection};
pub use projector::{PlaceholderNode, ProjectedNode, Projector, ProxyNode};
pub use repository::{FederatedRepository, FederatedWorkspace};
pub use request::{Request, RequestType};
