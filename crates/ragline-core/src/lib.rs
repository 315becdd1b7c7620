//! Shared types, traits, configuration and corpus loading for the ragline
//! retrieval-augmented generation engine.

pub mod call;
pub mod classification;
pub mod config;
pub mod data_processor;
pub mod error;
pub mod similarity;
pub mod taxonomy;
pub mod traits;
pub mod types;
