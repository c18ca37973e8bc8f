//! Extraction and normalization stages shared by the sources.

pub mod classify;
pub mod datetime;
pub mod enrich;
pub mod identity;
pub mod locality;
pub mod schedule;
pub mod segment;
pub mod text;
