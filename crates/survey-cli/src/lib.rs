//! Library side of the `survey-etl` binary: configuration, logging and the
//! wave pipeline, shared with the integration tests.

pub mod config;
pub mod logging;
pub mod pipeline;
