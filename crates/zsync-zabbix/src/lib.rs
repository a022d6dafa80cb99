//! zsync-zabbix
//!
//! Target side of the sync: a blocking JSON-RPC client for the Zabbix user API.
//! Implements [`AccountDirectory`] (listing) and [`AccountMutator`]
//! (create / delete).
//!
//! The client logs in lazily on its first call, so a run that fails on the
//! directory side never touches the target. Passwords and the session token
//! are never logged and are redacted from `Debug`.

mod rpc;

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use zsync_reconcile::{
    Account, AccountDirectory, AccountId, AccountMutator, GroupId, Identity, MutationFailure,
    Secret, SyncError, TargetAccounts,
};

pub use rpc::{ZabbixError, API_PATH, JSONRPC_VERSION};
use rpc::{RpcRequest, RpcResponse};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Field naming of the user API.
///
/// Zabbix 5.4 renamed `user.login`'s `user` parameter and the user object's
/// `alias` field to `username`. The session token always rides in the body
/// `auth` field (accepted through 7.0); `Modern` also sends it as a Bearer
/// header, which 6.4+ reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApiSchema {
    #[default]
    Legacy,
    Modern,
}

impl ApiSchema {
    /// Name of the login parameter in `user.login`.
    pub fn login_field(self) -> &'static str {
        match self {
            ApiSchema::Legacy => "user",
            ApiSchema::Modern => "username",
        }
    }

    /// Name of the account alias on user objects.
    pub fn alias_field(self) -> &'static str {
        match self {
            ApiSchema::Legacy => "alias",
            ApiSchema::Modern => "username",
        }
    }
}

#[derive(Clone)]
pub struct ZabbixConfig {
    /// Frontend base URL, e.g. `http://zabbix.example.com`.
    pub url: String,
    pub user: String,
    pub password: String,
    pub schema: ApiSchema,
    pub timeout: Duration,
}

impl fmt::Debug for ZabbixConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZabbixConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"<REDACTED>")
            .field("schema", &self.schema)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// `{url}/api_jsonrpc.php`, tolerating a trailing slash or an URL that
/// already names the entry point.
pub fn api_endpoint(url: &str) -> String {
    let base = url.trim().trim_end_matches('/');
    if base.ends_with(API_PATH) {
        base.to_string()
    } else {
        format!("{base}{API_PATH}")
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct ZabbixClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    config: ZabbixConfig,
    token: Option<String>,
    next_id: u64,
}

impl fmt::Debug for ZabbixClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZabbixClient")
            .field("endpoint", &self.endpoint)
            .field("config", &self.config)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

#[derive(Deserialize)]
struct UserIds {
    userids: Vec<Value>,
}

impl ZabbixClient {
    /// Build the client. No request is made until the first API call.
    pub fn new(config: ZabbixConfig) -> Result<Self, ZabbixError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: api_endpoint(&config.url),
            config,
            token: None,
            next_id: 0,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    fn call(&mut self, method: &str, params: Value) -> Result<Value, ZabbixError> {
        self.next_id += 1;
        let id = self.next_id;
        let token = self.token.as_deref();

        let body = RpcRequest {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
            id,
            auth: token,
        };

        let mut req = self.http.post(&self.endpoint).json(&body);
        if let (ApiSchema::Modern, Some(t)) = (self.config.schema, token) {
            req = req.bearer_auth(t);
        }

        debug!(method, id, "zabbix api call");
        let envelope: RpcResponse = req.send()?.error_for_status()?.json()?;
        envelope.into_result()
    }

    /// `user.login`. Idempotent: a held session is reused.
    pub fn login(&mut self) -> Result<(), ZabbixError> {
        if self.token.is_some() {
            return Ok(());
        }
        let params = json!({
            (self.config.schema.login_field()): self.config.user,
            "password": self.config.password,
        });
        let result = self.call("user.login", params)?;
        let token = result
            .as_str()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ZabbixError::Decode("user.login did not return a session token".into()))?;
        self.token = Some(token.to_string());
        info!(endpoint = %self.endpoint, user = %self.config.user, "zabbix login ok");
        Ok(())
    }

    /// `user.logout`, best effort. A no-op without a session.
    pub fn logout(&mut self) {
        if self.token.is_none() {
            return;
        }
        match self.call("user.logout", json!([])) {
            Ok(_) => debug!("zabbix logout ok"),
            Err(e) => warn!(error = %e, "zabbix logout failed"),
        }
        self.token = None;
    }

    /// `user.get`: every account keyed by alias.
    pub fn users(&mut self) -> Result<TargetAccounts, ZabbixError> {
        self.login()?;
        let field = self.config.schema.alias_field();
        let result = self.call("user.get", json!({ "output": ["userid", field] }))?;
        let rows: Vec<Value> =
            serde_json::from_value(result).map_err(|e| ZabbixError::Decode(e.to_string()))?;

        let mut accounts = TargetAccounts::new();
        for row in rows {
            let id = row.get("userid").and_then(id_text).ok_or_else(|| {
                ZabbixError::Decode(format!("user.get row without userid: {row}"))
            })?;
            let Some(alias) = row.get(field).and_then(Value::as_str).and_then(Identity::from_raw)
            else {
                warn!(userid = %id, "zabbix user without {field}, ignored");
                continue;
            };
            if accounts.contains_key(&alias) {
                warn!(alias = %alias, userid = %id, "duplicate zabbix alias, keeping first");
                continue;
            }
            accounts.insert(
                alias.clone(),
                Account {
                    alias,
                    id: AccountId::new(id),
                },
            );
        }
        Ok(accounts)
    }

    /// `user.create` in a single user group. Returns the new `userid`.
    pub fn create_user(
        &mut self,
        alias: &Identity,
        password: &Secret,
        group: &GroupId,
    ) -> Result<AccountId, ZabbixError> {
        self.login()?;
        let params = json!({
            (self.config.schema.alias_field()): alias.as_str(),
            "passwd": password.expose(),
            "usrgrps": [{ "usrgrpid": group.as_str() }],
        });
        let ids = user_ids(self.call("user.create", params)?)?;
        ids.into_iter()
            .next()
            .map(AccountId::new)
            .ok_or_else(|| ZabbixError::Decode("user.create returned no userid".into()))
    }

    /// `user.delete` for every id in one request. Returns the ids Zabbix
    /// reports as deleted.
    pub fn delete_users(
        &mut self,
        ids: &BTreeSet<AccountId>,
    ) -> Result<BTreeSet<AccountId>, ZabbixError> {
        self.login()?;
        let params = Value::Array(ids.iter().map(|id| Value::from(id.as_str())).collect());
        let confirmed = user_ids(self.call("user.delete", params)?)?;
        Ok(confirmed.into_iter().map(AccountId::new).collect())
    }
}

fn id_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn user_ids(result: Value) -> Result<Vec<String>, ZabbixError> {
    let parsed: UserIds =
        serde_json::from_value(result).map_err(|e| ZabbixError::Decode(e.to_string()))?;
    Ok(parsed.userids.iter().filter_map(id_text).collect())
}

// ---------------------------------------------------------------------------
// Reconciler ports
// ---------------------------------------------------------------------------

impl AccountDirectory for ZabbixClient {
    fn fetch_accounts(&mut self) -> Result<TargetAccounts, SyncError> {
        let accounts = self
            .users()
            .map_err(|e| SyncError::TargetSystemUnavailable(format!("{}: {e}", self.endpoint)))?;
        info!(accounts = accounts.len(), "zabbix accounts fetched");
        Ok(accounts)
    }
}

impl AccountMutator for ZabbixClient {
    fn create(
        &mut self,
        identity: &Identity,
        secret: &Secret,
        group: &GroupId,
    ) -> Result<AccountId, MutationFailure> {
        self.create_user(identity, secret, group)
            .map_err(|e| MutationFailure::CreateRejected {
                identity: identity.clone(),
                cause: e.to_string(),
            })
    }

    fn delete(
        &mut self,
        ids: &BTreeSet<AccountId>,
    ) -> Result<BTreeSet<AccountId>, MutationFailure> {
        self.delete_users(ids)
            .map_err(|e| MutationFailure::DeleteRejected {
                ids: ids.clone(),
                cause: e.to_string(),
            })
    }

    fn supports_batch_delete(&self) -> bool {
        true
    }
}
