//! Core domain types for glint.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

mod diagnostic;
mod document;

pub use diagnostic::{Diagnostic, DiagnosticSeverity, DiagnosticsSnapshot, END_OF_LINE};
pub use document::{DocumentId, ShaderStage};
