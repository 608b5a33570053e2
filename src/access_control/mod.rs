//! Access control module
//!
//! Decides whether an identity may read or write a repository.
//!
//! ## Access Control Model
//!
//! Rules live in `repo @group` sections of the policy. An identity's groups
//! are resolved transitively (groups may contain groups) and every identity
//! is a member of `@all`. The first group in that closure with a matching
//! rule decides the outcome and the physical location of the repository.
//!
//! ## Example Policy
//!
//! ```text
//! @admins = alice
//! @dev = bob @admins
//!
//! repo @dev
//!     RW+ = website
//!     RW+_regex = ^sandbox/
//!
//! repo @all
//!     R = docs
//! ```

pub mod groups;
pub mod resolver;
pub mod types;

pub use groups::{Membership, membership_closure};
pub use resolver::{AccessResolver, have_access};
pub use types::{ALL_GROUP, Grant, MatchStrategy, Mode};
