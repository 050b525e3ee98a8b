//! Domain types for Searsia.
//!
//! - [`SearchResult`]: the payload a resource returns for a query
//! - [`Hit`]: one entry of a search result

mod result;

pub use result::*;
