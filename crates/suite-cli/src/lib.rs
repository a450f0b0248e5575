//! CLI library components for the suite compiler.

pub mod logging;
pub mod pipeline;
pub mod types;
