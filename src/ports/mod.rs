//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the request handler and an
//! external system. Implementations live in `src/adapters/`.

pub mod generation_service;

pub use generation_service::{GeneratedImage, GenerationParams, GenerationService};
