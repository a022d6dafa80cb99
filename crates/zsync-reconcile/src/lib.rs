//! zsync-reconcile
//!
//! Membership reconciliation between an authoritative directory group and the
//! account list of a target system.
//!
//! - The directory is authoritative: missing accounts are created, accounts no
//!   longer in the group are deleted.
//! - Protected identities are removed from both sides before diffing; they are
//!   never created and never deleted.
//! - An empty directory snapshot is an error, never "authorize nothing".
//!
//! `plan` is pure logic with no IO. `apply` and `run_sync` only talk to the
//! outside world through the traits in [`ports`].

mod engine;
pub mod ports;
mod run;
pub mod secret;
mod types;

pub use engine::{apply, plan};
pub use ports::{AccountDirectory, AccountMutator, DirectorySource, ReportSink};
pub use run::run_sync;
pub use secret::{OsRngSecretGenerator, Secret, SecretGenerator};
pub use types::*;
