//! Indexer runtime: transports, health tracking, rate limiting, and the
//! manager that fans searches out across every configured indexer.

pub mod health;
#[allow(clippy::module_inception)]
pub mod indexer;
pub mod manager;
pub mod rate_limit;
pub mod transport;

#[cfg(test)]
pub mod testing;

pub use indexer::{ConnectionTest, Indexer, IndexerStatus};
pub use manager::{IndexerManager, ManagerStatus};
pub use transport::{HttpTransport, PreparedRequest, Transport};
