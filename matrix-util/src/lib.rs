//! Matrix and table utilities shared across the workspace
//!
//! - delimited, optionally gzipped, text I/O
//! - labeled dense matrices and named sparse triplets
//! - parallel column-correlation dissimilarity

pub mod common_io;
pub mod correlation;
pub mod ndarray_io;
pub mod sparse_io;
pub mod utils;
