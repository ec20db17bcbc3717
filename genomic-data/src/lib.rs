//! Genomic data structures and parsers
//!
//! This library provides reusable genomic data structures including:
//! - Genomic intervals with optional coordinates and strand
//! - An index for overlap, distance and window queries
//! - BED-like interval tables keyed by feature id

pub mod bed;
pub mod interval;
pub mod interval_index;
