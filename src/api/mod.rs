//! Contains the types and functions for the high level pipeline builder API.

mod pattern_pipeline;
mod reduce_method;

pub use pattern_pipeline::PatternPipeline;
pub use reduce_method::ReduceMethod;
