//! In-memory doubles shared by the scenario tests.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};

use zsync_reconcile::*;

pub fn members(names: &[&str]) -> DirectoryMembers {
    names.iter().map(|n| Identity::new(*n)).collect()
}

pub fn accounts(pairs: &[(&str, &str)]) -> TargetAccounts {
    pairs
        .iter()
        .map(|(alias, id)| (Identity::new(*alias), Account::new(*alias, *id)))
        .collect()
}

pub fn ids(raw: &[&str]) -> BTreeSet<AccountId> {
    raw.iter().map(|i| AccountId::new(*i)).collect()
}

/// Directory double: fixed answer.
pub struct FixedDirectory {
    pub answer: Result<DirectoryMembers, SyncError>,
    pub calls: usize,
}

impl FixedDirectory {
    pub fn members(names: &[&str]) -> Self {
        Self {
            answer: Ok(members(names)),
            calls: 0,
        }
    }

    pub fn failing(err: SyncError) -> Self {
        Self {
            answer: Err(err),
            calls: 0,
        }
    }
}

impl DirectorySource for FixedDirectory {
    fn fetch_members(&mut self) -> Result<DirectoryMembers, SyncError> {
        self.calls += 1;
        self.answer.clone()
    }
}

/// Target double: a mutable alias -> account map with scripted rejections.
#[derive(Default)]
pub struct MemoryTarget {
    pub accounts: TargetAccounts,
    pub next_id: u64,
    pub batch: bool,
    pub unavailable: Option<String>,
    pub reject_create: BTreeSet<Identity>,
    pub reject_delete: BTreeSet<AccountId>,
    /// Answered as success but neither deleted nor confirmed.
    pub ignore_delete: BTreeSet<AccountId>,
    pub fetch_calls: usize,
    pub create_calls: Vec<(Identity, Secret, GroupId)>,
    pub delete_calls: Vec<BTreeSet<AccountId>>,
}

impl MemoryTarget {
    pub fn with_accounts(pairs: &[(&str, &str)]) -> Self {
        Self {
            accounts: accounts(pairs),
            next_id: 1000,
            ..Self::default()
        }
    }

    pub fn batching(mut self) -> Self {
        self.batch = true;
        self
    }

    pub fn mutation_calls(&self) -> usize {
        self.create_calls.len() + self.delete_calls.len()
    }

    pub fn aliases(&self) -> BTreeSet<String> {
        self.accounts.keys().map(|i| i.as_str().to_string()).collect()
    }
}

impl AccountDirectory for MemoryTarget {
    fn fetch_accounts(&mut self) -> Result<TargetAccounts, SyncError> {
        self.fetch_calls += 1;
        match &self.unavailable {
            Some(msg) => Err(SyncError::TargetSystemUnavailable(msg.clone())),
            None => Ok(self.accounts.clone()),
        }
    }
}

impl AccountMutator for MemoryTarget {
    fn create(
        &mut self,
        identity: &Identity,
        secret: &Secret,
        group: &GroupId,
    ) -> Result<AccountId, MutationFailure> {
        self.create_calls
            .push((identity.clone(), secret.clone(), group.clone()));
        if self.reject_create.contains(identity) || self.accounts.contains_key(identity) {
            return Err(MutationFailure::CreateRejected {
                identity: identity.clone(),
                cause: "alias already exists".to_string(),
            });
        }
        self.next_id += 1;
        let id = AccountId::new(self.next_id.to_string());
        self.accounts.insert(
            identity.clone(),
            Account {
                alias: identity.clone(),
                id: id.clone(),
            },
        );
        Ok(id)
    }

    fn delete(
        &mut self,
        ids: &BTreeSet<AccountId>,
    ) -> Result<BTreeSet<AccountId>, MutationFailure> {
        self.delete_calls.push(ids.clone());
        if ids.iter().any(|i| self.reject_delete.contains(i)) {
            return Err(MutationFailure::DeleteRejected {
                ids: ids.clone(),
                cause: "no permissions to referred object".to_string(),
            });
        }
        let ignored = &self.ignore_delete;
        let mut removed = BTreeSet::new();
        self.accounts.retain(|_, acc| {
            let drop = ids.contains(&acc.id) && !ignored.contains(&acc.id);
            if drop {
                removed.insert(acc.id.clone());
            }
            !drop
        });
        Ok(removed)
    }

    fn supports_batch_delete(&self) -> bool {
        self.batch
    }
}

/// Deterministic secrets: "secret-1", "secret-2", ...
#[derive(Default)]
pub struct CountingSecrets {
    n: Cell<u32>,
}

impl SecretGenerator for CountingSecrets {
    fn generate(&self) -> Secret {
        self.n.set(self.n.get() + 1);
        Secret::new(format!("secret-{}", self.n.get()))
    }
}

/// Applies the plan's effects to a plain alias map, for property checks.
pub fn simulate(
    target: &TargetAccounts,
    plan: &ReconciliationPlan,
) -> BTreeMap<Identity, Account> {
    let mut out: TargetAccounts = target
        .iter()
        .filter(|(_, acc)| !plan.to_delete.contains(&acc.id))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    for (n, identity) in plan.to_create.iter().enumerate() {
        out.insert(
            identity.clone(),
            Account {
                alias: identity.clone(),
                id: AccountId::new(format!("new-{n}")),
            },
        );
    }
    out
}
