#![forbid(unsafe_code)]

//! Exam attendance per (student, subject) pair.
//!
//! [`aggregate`] is the kernel: every student is paired with every subject
//! and each pair carries the number of matching examination rows, zero when
//! there are none. [`Engine`] selects between that kernel, the same pipeline
//! expressed over `et-frame` data frames, and the canonical SQL query run by
//! SQLite. [`aggregate_with_policy`] puts a [`RuntimePolicy`] in front of any
//! engine.

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod render;
pub mod tables;

pub use aggregate::{aggregate, aggregate_with_policy};
pub use config::{RunConfig, RunReport, run};
pub use engine::Engine;
pub use error::AggregateError;
pub use et_runtime::{EvidenceLedger, RuntimeMode, RuntimePolicy};
pub use model::{AttendanceRecord, Examination, Student, Subject};
pub use render::{OutputFormat, render, render_table};
pub use tables::{Tables, TablesError};
