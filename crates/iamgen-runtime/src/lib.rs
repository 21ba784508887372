//! # iamgen-runtime
//!
//! Prompt contracts, reply parsing and the generate → validate → regenerate
//! loop that turns a request into a reviewed policy.

pub mod parser;
pub mod pipeline;
pub mod prompts;

pub use parser::ParseError;
pub use pipeline::{PipelineOptions, PolicyPipeline};
