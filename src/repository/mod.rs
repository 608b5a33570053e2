//! Repository storage
//!
//! Creation of bare repositories on first authorized use, the property
//! triggers that maintain per-repository side files, and the published
//! project list.

pub mod init;
pub mod project_list;
pub mod props;

pub use init::{
    GitInitializer, RepositoryGuard, RepositoryInitializer, lock_repository, setup_pending,
};
pub use project_list::ProjectList;
pub use props::{
    DaemonTrigger, DescriptionTrigger, GitwebTrigger, OwnerTrigger, PropertyTrigger,
    default_triggers, run_triggers,
};
