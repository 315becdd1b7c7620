//! Tantivy-based lexical index over the document corpus.
//!
//! Queries are free text (term-frequency scoring); sector, domain,
//! sub-domain and project-type filters are applied natively as exact
//! term matches.

pub mod index;
pub mod tantivy_utils;

pub use index::TantivyIndexer;
