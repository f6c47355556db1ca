#![forbid(unsafe_code)]

pub mod error;
pub mod hash;
pub mod join;
pub mod layout;
pub mod sidecar;
pub mod split;

/// Default number of bytes moved per read/write call.
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

// Re-exports: stable API surface
pub use error::{Result, ShardError};
pub use hash::HashAlgorithm;
pub use join::{JoinOptions, join};
pub use sidecar::Sidecar;
pub use split::{SplitOptions, split};
