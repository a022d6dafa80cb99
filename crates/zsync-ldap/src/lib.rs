//! zsync-ldap
//!
//! Directory side of the sync: bind, search the configured group, hand back a
//! clean set of member identities.
//!
//! The connection is synchronous and every operation is bounded by the
//! configured timeout. Failures surface as `DirectoryUnavailable`; an answer
//! with no members surfaces as `EmptyAuthoritativeSource`.

pub mod members;

use std::time::Duration;

use ldap3::{LdapConn, LdapConnSettings, LdapError, Scope, SearchEntry};
use tracing::{debug, info, warn};
use zsync_reconcile::{DirectoryMembers, DirectorySource, SyncError};

pub use members::{ldap_url, members_from_entries, normalize_filter};

/// Connection and query parameters for [`LdapDirectory`].
#[derive(Clone)]
pub struct LdapSourceConfig {
    pub url: String,
    pub port: Option<u16>,
    pub bind_dn: String,
    pub bind_password: String,
    pub base_dn: String,
    pub filter: String,
    pub member_attribute: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for LdapSourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapSourceConfig")
            .field("url", &self.url)
            .field("port", &self.port)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &"<REDACTED>")
            .field("base_dn", &self.base_dn)
            .field("filter", &self.filter)
            .field("member_attribute", &self.member_attribute)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// LDAP-backed [`DirectorySource`]. Connects per fetch; holds no connection
/// between calls.
#[derive(Debug, Clone)]
pub struct LdapDirectory {
    config: LdapSourceConfig,
    url: String,
    filter: String,
}

impl LdapDirectory {
    pub fn new(config: LdapSourceConfig) -> Self {
        let url = ldap_url(&config.url, config.port);
        let filter = normalize_filter(&config.filter);
        Self {
            config,
            url,
            filter,
        }
    }

    /// Effective connection URL (scheme, host and port).
    pub fn url(&self) -> &str {
        &self.url
    }

    fn unavailable(&self, stage: &str, e: LdapError) -> SyncError {
        SyncError::DirectoryUnavailable(format!("{stage} failed for {}: {e}", self.url))
    }

    fn search_group(&self) -> Result<Vec<SearchEntry>, SyncError> {
        let timeout = self.config.timeout;
        let settings = LdapConnSettings::new().set_conn_timeout(timeout);

        debug!(url = %self.url, "connecting to LDAP server");
        let mut ldap = LdapConn::with_settings(settings, &self.url)
            .map_err(|e| self.unavailable("connect", e))?;

        debug!(bind_dn = %self.config.bind_dn, "performing LDAP bind");
        ldap.with_timeout(timeout)
            .simple_bind(&self.config.bind_dn, &self.config.bind_password)
            .and_then(|r| r.success())
            .map_err(|e| self.unavailable("bind", e))?;

        let attrs = vec![self.config.member_attribute.as_str()];
        let (entries, _res) = ldap
            .with_timeout(timeout)
            .search(&self.config.base_dn, Scope::Subtree, &self.filter, attrs)
            .and_then(|r| r.success())
            .map_err(|e| self.unavailable("search", e))?;

        if let Err(e) = ldap.unbind() {
            warn!(error = %e, "LDAP unbind failed");
        }

        Ok(entries.into_iter().map(SearchEntry::construct).collect())
    }
}

impl DirectorySource for LdapDirectory {
    fn fetch_members(&mut self) -> Result<DirectoryMembers, SyncError> {
        let entries = self.search_group()?;
        let members = members_from_entries(&entries, &self.config.member_attribute)?;
        info!(
            base_dn = %self.config.base_dn,
            filter = %self.filter,
            members = members.len(),
            "directory group members fetched"
        );
        Ok(members)
    }
}
