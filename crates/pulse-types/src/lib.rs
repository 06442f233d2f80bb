//! Pulse Domain Types
//!
//! This crate defines the domain types for the Pulse feedback engine:
//! ideas moving through a status workflow, weighted votes cast on them,
//! and NPS survey responses.
//!
//! # Key Concepts
//!
//! - **Idea**: a feedback or feature request tracked from `new` through
//!   to `shipped`, `declined` or `duplicate`.
//! - **Vote**: one user's weighted endorsement of one idea. At most one
//!   active vote exists per (idea, user) pair.
//! - **Vote weight**: an exact positive decimal, derived from the voter's
//!   plan tier when weighting is enabled.
//! - **NPS response**: a 0–10 survey score whose category is always
//!   derived from the score, never stored.
//!
//! # Architecture
//!
//! This is a pure types crate with no runtime dependencies. IDs use the
//! newtype pattern and implement `Display`, `generate()`, and `new()`.

#![deny(unsafe_code)]

mod errors;
mod ids;
mod idea;
mod nps;
mod plan;
mod vote;

pub use errors::*;
pub use ids::*;
pub use idea::*;
pub use nps::*;
pub use plan::*;
pub use vote::*;
