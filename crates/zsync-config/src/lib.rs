//! zsync-config
//!
//! Loads the job configuration (YAML), computes a stable config hash, flags
//! keys nothing reads, and resolves credentials into typed settings.
//!
//! Any failure here is fatal and happens before the directory or the target
//! system is contacted.

pub mod secrets;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

pub use secrets::{SecretRef, SecretString};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MEMBER_ATTRIBUTE: &str = "memberUid";

/// Leaves that hold literal credentials. Redacted before hashing so the
/// canonical JSON can be printed and the hash does not fingerprint a password.
const SECRET_POINTERS: &[&str] = &["/ldap/bind/password", "/zabbix/password"];

/// JSON-pointer prefixes the job actually reads.
///
/// Keep this in sync with the typed structs below; anything else in the file
/// is reported as unused.
const CONSUMED_POINTERS: &[&str] = &[
    "/ldap/url",
    "/ldap/port",
    "/ldap/bind/dn",
    "/ldap/bind/password",
    "/ldap/bind/password_env",
    "/ldap/base_dn",
    "/ldap/filter",
    "/ldap/member_attribute",
    "/ldap/timeout_secs",
    "/zabbix/url",
    "/zabbix/user",
    "/zabbix/password",
    "/zabbix/password_env",
    "/zabbix/usrgrpid",
    "/zabbix/schema",
    "/zabbix/protected",
    "/zabbix/timeout_secs",
    "/report/format",
];

// ---------------------------------------------------------------------------
// File shape
// ---------------------------------------------------------------------------

/// The configuration file as written by the operator.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfigFile {
    pub ldap: LdapSection,
    pub zabbix: ZabbixSection,
    #[serde(default)]
    pub report: ReportSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LdapSection {
    pub url: String,
    #[serde(default)]
    pub port: Option<u16>,
    pub bind: LdapBind,
    pub base_dn: String,
    pub filter: String,
    #[serde(default = "default_member_attribute")]
    pub member_attribute: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LdapBind {
    pub dn: String,
    #[serde(flatten)]
    pub secret: SecretRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZabbixSection {
    pub url: String,
    pub user: String,
    #[serde(flatten)]
    pub secret: SecretRef,
    pub usrgrpid: IdValue,
    #[serde(default)]
    pub schema: ZabbixSchema,
    #[serde(default)]
    pub protected: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Ids may be written as YAML numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IdValue {
    Number(u64),
    Text(String),
}

impl IdValue {
    pub fn as_string(&self) -> String {
        match self {
            IdValue::Number(n) => n.to_string(),
            IdValue::Text(s) => s.trim().to_string(),
        }
    }
}

/// Zabbix API generation.
///
/// `legacy`: `user.login` takes `user`, accounts are keyed by `alias` (< 5.4).
/// `modern`: `user.login` takes `username`, accounts keyed by `username`
/// (5.4 through 7.0; the token is also sent as a Bearer header).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ZabbixSchema {
    #[default]
    Legacy,
    Modern,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportSection {
    #[serde(default)]
    pub format: ReportFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Table,
    Kv,
    Json,
}

fn default_member_attribute() -> String {
    DEFAULT_MEMBER_ATTRIBUTE.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

// ---------------------------------------------------------------------------
// Resolved settings
// ---------------------------------------------------------------------------

/// Everything the job needs, validated and with credentials resolved.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub ldap: LdapSettings,
    pub zabbix: ZabbixSettings,
    pub report_format: ReportFormat,
}

#[derive(Debug, Clone)]
pub struct LdapSettings {
    pub url: String,
    pub port: Option<u16>,
    pub bind_dn: String,
    pub bind_password: SecretString,
    pub base_dn: String,
    pub filter: String,
    pub member_attribute: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ZabbixSettings {
    pub url: String,
    pub user: String,
    pub password: SecretString,
    pub usrgrpid: String,
    pub schema: ZabbixSchema,
    pub protected: Vec<String>,
    pub timeout_secs: u64,
}

/// Result of [`load_sync_config`].
#[derive(Debug, Clone)]
pub struct LoadedSyncConfig {
    pub config_hash: String,
    pub settings: SyncSettings,
    /// Leaf pointers present in the file that nothing reads (sorted).
    pub unused_leaf_pointers: Vec<String>,
}

/// Load, validate and resolve the configuration at `path`.
pub fn load_sync_config(path: &Path) -> Result<LoadedSyncConfig> {
    if !path.is_file() {
        bail!("config file not found: {}", path.display());
    }
    let path_s = path.to_string_lossy();
    let loaded = load_layered_yaml(&[path_s.as_ref()])?;
    resolve_loaded(loaded)
}

/// Same as [`load_sync_config`] from in-memory YAML documents (later docs
/// override earlier ones).
pub fn load_sync_config_from_strings(yaml_docs: &[&str]) -> Result<LoadedSyncConfig> {
    resolve_loaded(load_layered_yaml_from_strings(yaml_docs)?)
}

fn resolve_loaded(loaded: LoadedConfig) -> Result<LoadedSyncConfig> {
    let file: SyncConfigFile =
        serde_json::from_value(loaded.config_json.clone()).context("invalid config")?;
    let settings = resolve_settings(file)?;
    Ok(LoadedSyncConfig {
        config_hash: loaded.config_hash,
        settings,
        unused_leaf_pointers: unused_leaf_pointers(&loaded.config_json),
    })
}

fn require_non_empty(field: &str, value: &str) -> Result<String> {
    let t = value.trim();
    if t.is_empty() {
        bail!("CONFIG_MISSING_FIELD: {field} must not be empty");
    }
    Ok(t.to_string())
}

fn require_timeout(field: &str, secs: u64) -> Result<u64> {
    if secs == 0 {
        bail!("CONFIG_INVALID: {field} must be greater than zero");
    }
    Ok(secs)
}

pub fn resolve_settings(file: SyncConfigFile) -> Result<SyncSettings> {
    let SyncConfigFile {
        ldap,
        zabbix,
        report,
    } = file;

    let ldap = LdapSettings {
        url: require_non_empty("ldap.url", &ldap.url)?,
        port: ldap.port,
        bind_dn: require_non_empty("ldap.bind.dn", &ldap.bind.dn)?,
        bind_password: ldap.bind.secret.resolve("ldap.bind")?,
        base_dn: require_non_empty("ldap.base_dn", &ldap.base_dn)?,
        filter: require_non_empty("ldap.filter", &ldap.filter)?,
        member_attribute: require_non_empty("ldap.member_attribute", &ldap.member_attribute)?,
        timeout_secs: require_timeout("ldap.timeout_secs", ldap.timeout_secs)?,
    };

    let protected = zabbix
        .protected
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let zabbix = ZabbixSettings {
        url: require_non_empty("zabbix.url", &zabbix.url)?,
        user: require_non_empty("zabbix.user", &zabbix.user)?,
        password: zabbix.secret.resolve("zabbix")?,
        usrgrpid: require_non_empty("zabbix.usrgrpid", &zabbix.usrgrpid.as_string())?,
        schema: zabbix.schema,
        protected,
        timeout_secs: require_timeout("zabbix.timeout_secs", zabbix.timeout_secs)?,
    };

    Ok(SyncSettings {
        ldap,
        zabbix,
        report_format: report.format,
    })
}

// ---------------------------------------------------------------------------
// Layered YAML + hashing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    /// Canonical JSON with credential literals redacted.
    pub canonical_json: String,
    pub config_json: Value,
}

/// Merge YAML files, later ones overriding earlier ones.
///
/// The CLI passes a single file. Tests stack small overrides on a complete
/// base document instead of repeating it.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    // Earlier docs are base, later docs override.
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    if !merged.is_object() {
        bail!("invalid config: top level must be a mapping");
    }

    let canonical_json = canonicalize_json(&redact_secrets(&merged))?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn redact_secrets(v: &Value) -> Value {
    let mut out = v.clone();
    for ptr in SECRET_POINTERS {
        if let Some(slot) = out.pointer_mut(ptr) {
            if !slot.is_null() {
                *slot = Value::String("<REDACTED>".to_string());
            }
        }
    }
    out
}

fn canonicalize_json(v: &Value) -> Result<String> {
    // serde_json::Map is BTreeMap-backed, so keys serialize sorted.
    let s = serde_json::to_string(v).context("canonical json serialize failed")?;
    Ok(s)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Unused-key guard
// ---------------------------------------------------------------------------

/// Leaf pointers in `config_json` not covered by any consumed prefix.
pub fn unused_leaf_pointers(config_json: &Value) -> Vec<String> {
    let consumed: BTreeSet<&str> = CONSUMED_POINTERS.iter().copied().collect();

    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|lp| !consumed.iter().any(|cp| is_prefix_pointer(cp, lp)))
        .collect();
    unused.sort();
    unused.dedup();
    unused
}

/// `true` if `prefix` is a JSON-pointer prefix of `leaf`.
///
/// "/a/b" consumes "/a/b" and "/a/b/c" but NOT "/a/bc".
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if leaf == prefix {
        return true;
    }
    leaf.starts_with(prefix)
        && leaf
            .get(prefix.len()..prefix.len() + 1)
            .map(|c| c == "/")
            .unwrap_or(false)
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{}/{}", prefix, i);
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ => {
            let p = if prefix.is_empty() {
                "/".to_string()
            } else {
                prefix.to_string()
            };
            out.push(p);
        }
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}
