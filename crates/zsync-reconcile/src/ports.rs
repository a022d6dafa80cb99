//! Boundaries between the reconciler and the outside world.
//!
//! Concrete adapters live in their own crates (LDAP, Zabbix, CLI output).
//! Tests use in-memory doubles.

use std::collections::BTreeSet;

use crate::secret::Secret;
use crate::{
    AccountId, DirectoryMembers, GroupId, Identity, MutationFailure, RunReport, SyncError,
    TargetAccounts,
};

/// Authoritative source of who may have an account.
pub trait DirectorySource {
    /// Members of the configured group.
    ///
    /// # Errors
    /// - [`SyncError::DirectoryUnavailable`] on connect / bind / search failure.
    /// - [`SyncError::EmptyAuthoritativeSource`] when the query succeeds but
    ///   yields no members.
    fn fetch_members(&mut self) -> Result<DirectoryMembers, SyncError>;
}

/// Read side of the target system.
pub trait AccountDirectory {
    /// Current accounts keyed by alias.
    ///
    /// # Errors
    /// [`SyncError::TargetSystemUnavailable`] on login or listing failure.
    fn fetch_accounts(&mut self) -> Result<TargetAccounts, SyncError>;
}

/// Write side of the target system.
pub trait AccountMutator {
    /// Create `identity` in `group` with an initial `secret`.
    ///
    /// Must return [`MutationFailure::CreateRejected`] on refusal.
    fn create(
        &mut self,
        identity: &Identity,
        secret: &Secret,
        group: &GroupId,
    ) -> Result<AccountId, MutationFailure>;

    /// Delete every account in `ids`; returns the ids the target confirmed.
    ///
    /// Must return [`MutationFailure::DeleteRejected`] on refusal.
    /// Ids missing from the returned set are reported as failures.
    fn delete(
        &mut self,
        ids: &BTreeSet<AccountId>,
    ) -> Result<BTreeSet<AccountId>, MutationFailure>;

    /// Whether `delete` accepts more than one id per call.
    fn supports_batch_delete(&self) -> bool {
        false
    }
}

/// Presentation of a finished run.
pub trait ReportSink {
    fn emit(&mut self, report: &RunReport) -> std::io::Result<()>;
}
