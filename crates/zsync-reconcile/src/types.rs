use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Accounts that exist in every target installation and must never be touched.
pub const BUILTIN_PROTECTED: &[&str] = &["Admin", "guest"];

/// Shared username / alias key linking a directory member to a target account.
///
/// Case-sensitive and compared verbatim.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(alias: impl Into<String>) -> Self {
        Self(alias.into())
    }

    /// Build an identity from a raw protocol value.
    ///
    /// Surrounding whitespace is dropped; a blank value yields `None`.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let t = raw.trim();
        if t.is_empty() {
            None
        } else {
            Some(Self(t.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Target-system account identifier. Never derived from the directory.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Target-system group new accounts are placed in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A target-system account record.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Account {
    pub alias: Identity,
    pub id: AccountId,
}

impl Account {
    pub fn new(alias: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            alias: Identity::new(alias),
            id: AccountId::new(id),
        }
    }
}

/// Directory snapshot: members of the authoritative group.
pub type DirectoryMembers = BTreeSet<Identity>;

/// Target snapshot: alias -> account.
pub type TargetAccounts = BTreeMap<Identity, Account>;

/// Identities excluded from both creation and deletion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProtectionPolicy {
    protected: BTreeSet<Identity>,
}

impl ProtectionPolicy {
    pub fn new<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            protected: identities
                .into_iter()
                .map(Identity::new)
                .collect(),
        }
    }

    /// Built-in accounts plus the identity the job authenticates as, plus any
    /// operator-supplied extras.
    pub fn for_service_account<I, S>(service_account: &str, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut policy = Self::new(BUILTIN_PROTECTED.iter().copied());
        policy.protected.insert(Identity::new(service_account));
        policy
            .protected
            .extend(extra.into_iter().map(Identity::new));
        policy
    }

    pub fn is_protected(&self, identity: &Identity) -> bool {
        self.protected.contains(identity)
    }

    pub fn protected(&self) -> &BTreeSet<Identity> {
        &self.protected
    }
}

/// Output of [`crate::plan`]. Sorted sets so application order is stable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationPlan {
    pub to_create: BTreeSet<Identity>,
    pub to_delete: BTreeSet<AccountId>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }
}

/// A single create/delete the target system refused. Non-fatal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationFailure {
    CreateRejected {
        identity: Identity,
        cause: String,
    },
    DeleteRejected {
        ids: BTreeSet<AccountId>,
        cause: String,
    },
}

impl MutationFailure {
    pub fn is_create(&self) -> bool {
        matches!(self, MutationFailure::CreateRejected { .. })
    }

    /// Number of accounts this failure covers.
    pub fn affected(&self) -> usize {
        match self {
            MutationFailure::CreateRejected { .. } => 1,
            MutationFailure::DeleteRejected { ids, .. } => ids.len(),
        }
    }
}

impl fmt::Display for MutationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationFailure::CreateRejected { identity, cause } => {
                write!(f, "create rejected for '{identity}': {cause}")
            }
            MutationFailure::DeleteRejected { ids, cause } => {
                let ids: Vec<&str> = ids.iter().map(|i| i.as_str()).collect();
                write!(f, "delete rejected for ids [{}]: {cause}", ids.join(","))
            }
        }
    }
}

impl std::error::Error for MutationFailure {}

/// Outcome of one run. Counters only reflect confirmed mutations.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub created: usize,
    pub deleted: usize,
    pub elapsed_seconds: f64,
    pub failures: Vec<MutationFailure>,
}

impl RunReport {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Same report, stamped with the wall time of the whole run.
    pub fn with_elapsed(self, elapsed: Duration) -> Self {
        Self {
            elapsed_seconds: elapsed.as_secs_f64(),
            ..self
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failed_creates(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.is_create())
            .map(MutationFailure::affected)
            .sum()
    }

    pub fn failed_deletes(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| !f.is_create())
            .map(MutationFailure::affected)
            .sum()
    }
}

/// Fatal run errors. Any of these aborts the run with no report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncError {
    /// Bad or missing configuration. Raised before any remote contact.
    Config(String),
    /// Directory connect / bind / search failed.
    DirectoryUnavailable(String),
    /// Directory answered but yielded no members. Treating this as "nobody is
    /// authorized" would delete every target account.
    EmptyAuthoritativeSource,
    /// Target system login or account listing failed.
    TargetSystemUnavailable(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Config(msg) => write!(f, "configuration error: {msg}"),
            SyncError::DirectoryUnavailable(msg) => write!(f, "directory unavailable: {msg}"),
            SyncError::EmptyAuthoritativeSource => write!(
                f,
                "directory returned no members (maybe they could not be fetched); \
                 refusing to continue as this would delete ALL target accounts"
            ),
            SyncError::TargetSystemUnavailable(msg) => {
                write!(f, "target system unavailable: {msg}")
            }
        }
    }
}

impl std::error::Error for SyncError {}
