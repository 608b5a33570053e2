//! gitward
//!
//! A gate for SSH-driven git operations on a shared host. Every SSH session
//! runs one command on behalf of one identity; gitward decides from a
//! declarative policy document whether that identity may read or write the
//! requested repository, and rewrites the command to name the repository's
//! physical location.
//!
//! ## Policy document
//!
//! ```text
//! gitosis
//!     decodeID = no
//!
//! @dev = alice bob
//! @ops = @dev carol
//!
//! repo @dev
//!     RW+ = app
//!     R_regex = ^mirror/
//!     map R legacy = archive/legacy-2019
//! ```
//!
//! Group membership nests; `@all` matches every identity. Within a group,
//! exact listings beat `map` directives, which beat regex listings. The
//! first group in the identity's closure with a matching rule wins.

pub mod access_control;
pub mod config;
pub mod error;
pub mod policy;
pub mod repository;
pub mod serve;
pub mod util;

// Re-export main types
pub use access_control::{AccessResolver, Grant, Mode};
pub use config::{AppConfig, load_config};
pub use error::{AppError, Result};
pub use policy::PolicyDocument;
pub use serve::{CommandGate, ServeOutcome};
