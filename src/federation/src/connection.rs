use crate::request::Request;
use common::RepoError;

/// A live connection to one source.
///
/// A connection is used by one worker thread at a time, so it only needs to be `Send`.
pub trait RepositoryConnection: Send {
    /// Name of the source this connection talks to.
    fn source_name(&self) -> &str;

    /// Executes a request, filling in its results.
    ///
    /// Errors are reported on the request by the caller, so an implementation may either return
    /// an error or record one on the request directly.
    fn execute(&mut self, request: &mut Request) -> Result<(), RepoError>;

    /// Releases the connection.
    fn close(&mut self) {}
}

/// Opens connections to sources by name.
pub trait RepositoryConnectionFactory: Send + Sync {
    fn create_connection(&self, source_name: &str) -> Result<Box<dyn RepositoryConnection>, RepoError>;
}
