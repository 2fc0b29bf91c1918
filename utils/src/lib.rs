//! Shared infrastructure utilities for xcode-bsp.
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + rename) for cached
//!   `xcodebuild` output
//! - **`digest`**: SHA-256 hex digests used for cache file names and content addressing

pub mod atomic_write;
pub mod digest;

pub use atomic_write::atomic_write;
pub use digest::sha256_hex;
