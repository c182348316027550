//! # Health Copilot Core
//!
//! Pure logic for Health Copilot: data models, chunking, record
//! normalization, the flat inner-product index, the aligned vector store,
//! query classification, and answer assembly.
//!
//! This crate performs no network or filesystem I/O. The app crate supplies
//! embedders, the completion client, live sources, and artifact
//! persistence.

pub mod answer;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod normalize;
pub mod route;
pub mod store;

pub use error::{Error, Result};
