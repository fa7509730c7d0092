pub mod query;
pub mod result;

pub use query::{NormalizedQuery, SearchMode, SearchQuery};
pub use result::{AudioFormat, Protocol, SearchResult};
