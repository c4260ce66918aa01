//! Composition root, pipeline controller, tool surface and HTTP routes for
//! the governance service. The `vyapaar-governd` binary is the only
//! consumer that constructs a [`ServerContext`]; everything else in this
//! crate is pure plumbing around it.

pub mod context;
pub mod error;
pub mod pipeline;
pub mod routes;
pub mod tools;

pub use context::{BreakerProbe, ServerContext};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use pipeline::PipelineController;
