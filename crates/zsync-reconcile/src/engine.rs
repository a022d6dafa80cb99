use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::ports::AccountMutator;
use crate::secret::SecretGenerator;
use crate::{
    AccountId, DirectoryMembers, GroupId, Identity, MutationFailure, ProtectionPolicy,
    ReconciliationPlan, RunReport, SyncError, TargetAccounts,
};

/// Compute the membership delta.
///
/// - Protected identities are removed from both sides first: never created,
///   never deleted.
/// - `to_create` = directory members not present among comparable target aliases.
/// - `to_delete` = comparable target aliases no longer in the directory, as ids.
///
/// Pure and deterministic.
///
/// # Errors
/// [`SyncError::EmptyAuthoritativeSource`] when `directory_members` is empty.
pub fn plan(
    directory_members: &DirectoryMembers,
    target_accounts: &TargetAccounts,
    policy: &ProtectionPolicy,
) -> Result<ReconciliationPlan, SyncError> {
    if directory_members.is_empty() {
        return Err(SyncError::EmptyAuthoritativeSource);
    }

    let comparable_target: BTreeSet<&Identity> = target_accounts
        .keys()
        .filter(|alias| !policy.is_protected(alias))
        .collect();

    let to_create: BTreeSet<Identity> = directory_members
        .iter()
        .filter(|m| !policy.is_protected(m))
        .filter(|m| !comparable_target.contains(m))
        .cloned()
        .collect();

    let to_delete: BTreeSet<AccountId> = comparable_target
        .iter()
        .copied()
        .filter(|alias| !directory_members.contains(*alias))
        .filter_map(|alias| target_accounts.get(alias))
        .map(|account| account.id.clone())
        .collect();

    Ok(ReconciliationPlan {
        to_create,
        to_delete,
    })
}

/// Apply a plan through `mutator`.
///
/// Every create gets a fresh secret from `secrets`. Deletes go out as one batch
/// when the mutator supports it, else one call per id. A rejected operation is
/// recorded in the report and the remaining operations still run.
///
/// The returned report carries no elapsed time; see [`RunReport::with_elapsed`].
pub fn apply<M, G>(
    plan: &ReconciliationPlan,
    mutator: &mut M,
    secrets: &G,
    group: &GroupId,
) -> RunReport
where
    M: AccountMutator + ?Sized,
    G: SecretGenerator + ?Sized,
{
    let mut report = RunReport::empty();

    for identity in &plan.to_create {
        let secret = secrets.generate();
        match mutator.create(identity, &secret, group) {
            Ok(id) => {
                info!(identity = %identity, account_id = %id, group = %group, "account created");
                report.created += 1;
            }
            Err(failure) => {
                warn!(identity = %identity, error = %failure, "account create rejected");
                report.failures.push(failure);
            }
        }
    }

    if plan.to_delete.is_empty() {
        return report;
    }

    if mutator.supports_batch_delete() {
        delete_batch(mutator, &plan.to_delete, &mut report);
    } else {
        for id in &plan.to_delete {
            let single: BTreeSet<AccountId> = std::iter::once(id.clone()).collect();
            delete_batch(mutator, &single, &mut report);
        }
    }

    report
}

fn delete_batch<M>(mutator: &mut M, ids: &BTreeSet<AccountId>, report: &mut RunReport)
where
    M: AccountMutator + ?Sized,
{
    match mutator.delete(ids) {
        Ok(confirmed) => {
            let deleted = ids.intersection(&confirmed).count();
            info!(requested = ids.len(), deleted, "accounts deleted");
            report.deleted += deleted;

            let unconfirmed: BTreeSet<AccountId> = ids.difference(&confirmed).cloned().collect();
            if !unconfirmed.is_empty() {
                let failure = MutationFailure::DeleteRejected {
                    ids: unconfirmed,
                    cause: format!("target confirmed {deleted} of {} deletions", ids.len()),
                };
                warn!(error = %failure, "account delete not confirmed");
                report.failures.push(failure);
            }
        }
        Err(failure) => {
            warn!(requested = ids.len(), error = %failure, "account delete rejected");
            report.failures.push(failure);
        }
    }
}
