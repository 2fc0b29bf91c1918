//! Core domain types for xcode-bsp.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies:
//! JSON-RPC identifiers, build target URIs, compiler options and the BSP wire payloads
//! exchanged with the client. Everything here can be used from any layer of the server.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

pub mod bsp;
mod ids;
mod options;
mod target;

pub use ids::JsonRpcId;
pub use options::{CompilerOptions, working_directory};
pub use target::{BuildTarget, TargetUri, TargetUriError, project_name_for};

/// Language identifiers advertised for every target.
pub const LANGUAGE_IDS: [&str; 5] = ["swift", "objective-c", "objective-cpp", "c", "cpp"];
