//! Core engine: the extract, batch and rank pipeline.

pub mod extractor;
pub mod batch;
pub mod ranker;
