//! Serving SSH git commands
//!
//! Parses the untrusted command, decodes the identity when the policy asks
//! for it, and runs the access decision through the [`CommandGate`].

pub mod command;
pub mod gate;
pub mod identity;

pub use command::{COMMANDS_READONLY, COMMANDS_WRITE, GitCommand};
pub use gate::{CommandGate, DECODE_ID_OPTION, ServeOutcome};
pub use identity::{decode_identity, encode_identity};
