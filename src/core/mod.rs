//! Core domain models for buildgate
//!
//! This module defines the pipeline definition, its triggers and steps,
//! the per-run context and the terminal run record.

pub mod config;
pub mod context;
pub mod env;
pub mod error;
pub mod pipeline;
pub mod result;
pub mod state;
pub mod step;
pub mod trigger;

pub use context::*;
pub use env::*;
pub use error::*;
pub use pipeline::*;
pub use result::*;
pub use state::*;
pub use step::*;
pub use trigger::*;
