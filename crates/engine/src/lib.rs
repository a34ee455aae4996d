//! Publish/retrieve engine for the weft data plane.
//!
//! Ties together the convergent codec, the two-tier chunk store, and the
//! mesh placement scheduler behind a small façade:
//!
//! - [`Engine::publish`] chunks, encodes, stores, records a manifest, and
//!   computes advisory placements.
//! - [`Engine::retrieve`] reassembles content strictly, failing on any
//!   missing or corrupt chunk.

mod engine;
pub mod error;

pub use engine::{Engine, PublishOutcome};
pub use error::{EngineError, EngineResult};
