use tracing::{info, warn};

use crate::ports::{AccountDirectory, AccountMutator, DirectorySource};
use crate::secret::SecretGenerator;
use crate::{apply, plan, GroupId, ProtectionPolicy, RunReport, SyncError};

/// One full reconciliation: directory snapshot, target snapshot, plan, apply.
///
/// The directory is read first; any directory failure returns before the
/// target system is contacted at all. A target failure returns before any
/// plan is computed. Only mutation rejections are non-fatal.
pub fn run_sync<S, T, G>(
    source: &mut S,
    target: &mut T,
    policy: &ProtectionPolicy,
    secrets: &G,
    group: &GroupId,
) -> Result<RunReport, SyncError>
where
    S: DirectorySource + ?Sized,
    T: AccountDirectory + AccountMutator + ?Sized,
    G: SecretGenerator + ?Sized,
{
    let members = source.fetch_members()?;
    // `plan` rejects this too, but only after the target has been queried.
    if members.is_empty() {
        return Err(SyncError::EmptyAuthoritativeSource);
    }
    info!(members = members.len(), "directory snapshot fetched");

    let accounts = target.fetch_accounts()?;
    info!(accounts = accounts.len(), "target snapshot fetched");

    let plan = plan(&members, &accounts, policy)?;
    info!(
        to_create = plan.to_create.len(),
        to_delete = plan.to_delete.len(),
        protected = policy.protected().len(),
        "reconciliation planned"
    );

    if plan.is_empty() {
        info!("directory and target already in sync");
        return Ok(RunReport::empty());
    }

    let report = apply(&plan, target, secrets, group);
    if report.has_failures() {
        warn!(
            failures = report.failures.len(),
            created = report.created,
            deleted = report.deleted,
            "reconciliation applied with failures"
        );
    } else {
        info!(
            created = report.created,
            deleted = report.deleted,
            "reconciliation applied"
        );
    }

    Ok(report)
}
