//! LanceDB-backed dense index.

pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use search::{build_predicate, LanceDenseIndex};
