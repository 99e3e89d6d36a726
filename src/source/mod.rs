//! Source deduction and the per-repository gateway/coordinator pair that
//! serializes and caches access to it.

pub mod coordinator;
pub mod deducer;
pub mod gateway;
pub mod vcs;

pub use coordinator::SourceCoordinator;
pub use deducer::{DeducedSource, Deducer, DeductionError};
pub use gateway::Gateway;
pub use vcs::{RemoteVersion, StaticRepo, StaticVcsClient, VcsClient, VcsError, VcsKind};
