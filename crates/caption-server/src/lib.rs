//! # Caption Server Library
//!
//! Configuration, logging and metrics setup for the caption queue host
//! process. The binary in `main.rs` wires these together around a
//! [`caption_jobs::CaptionQueue`].

pub mod config;
pub mod error;
pub mod telemetry;

pub use crate::config::{AppConfig, ConfigLoader};
pub use crate::error::{ServerError, ServerResult};
