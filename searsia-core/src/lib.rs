//! # Searsia Core
//!
//! Core types, errors, and traits shared by the Searsia caching crates.
//!
//! - **Types**: search results and the hits they carry
//! - **Errors**: the error taxonomy, built with `thiserror`
//! - **Traits**: the [`Resource`] collaborator and the [`ResourceCache`] seam used by the serving layer
//!
//! ## Example
//!
//! ```rust
//! use searsia_core::{Hit, SearchResult};
//!
//! let a = SearchResult::new(vec![Hit::new("Rust")]).with_query("rust");
//! let b = SearchResult::new(vec![Hit::new("Rust")]);
//!
//! // Provenance does not take part in equality, only the hits do.
//! assert_eq!(a, b);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Result, SearsiaError};
pub use traits::*;
pub use types::*;
