//! Credential resolution.
//!
//! # Contract
//! - Each credential is given either as a literal (`password`) or as the NAME
//!   of an environment variable holding it (`password_env`). Exactly one.
//! - Resolution happens once, at load time. Nothing else reads `std::env`.
//! - `Debug` on [`SecretString`] redacts the value.
//! - Error messages mention the config field or env var NAME, never the value.

use anyhow::{bail, Result};
use serde::Deserialize;

/// A credential value. **Redacted in `Debug` output.**
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<REDACTED>")
    }
}

/// Raw `password` / `password_env` pair as it appears in the file.
#[derive(Clone, Default, Deserialize)]
pub struct SecretRef {
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_env: Option<String>,
}

impl std::fmt::Debug for SecretRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretRef")
            .field("password", &self.password.as_ref().map(|_| "<REDACTED>"))
            .field("password_env", &self.password_env)
            .finish()
    }
}

/// Resolve a named environment variable.
/// Returns `None` if the variable is unset or its value is blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

impl SecretRef {
    /// Resolve to the actual credential. `field` is the config path used in
    /// error messages (e.g. `ldap.bind`).
    pub fn resolve(&self, field: &str) -> Result<SecretString> {
        let env_name = self
            .password_env
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        match (self.password.as_deref(), env_name) {
            (Some(_), Some(_)) => bail!(
                "CONFIG_SECRET_AMBIGUOUS: {field}: set either 'password' or 'password_env', not both"
            ),
            (Some(literal), None) => Ok(SecretString::new(literal)),
            (None, Some(var)) => match resolve_env(var) {
                Some(v) => Ok(SecretString::new(v)),
                None => bail!(
                    "SECRETS_MISSING: {field}: required env var '{var}' is not set or empty"
                ),
            },
            (None, None) => bail!(
                "CONFIG_MISSING_FIELD: {field}: one of 'password' or 'password_env' is required"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret_ref(password: Option<&str>, env: Option<&str>) -> SecretRef {
        SecretRef {
            password: password.map(str::to_string),
            password_env: env.map(str::to_string),
        }
    }

    #[test]
    fn literal_resolves_verbatim() {
        let s = secret_ref(Some("p@ss word"), None).resolve("zabbix").unwrap();
        assert_eq!(s.expose(), "p@ss word");
    }

    #[test]
    fn both_forms_is_an_error() {
        let err = secret_ref(Some("x"), Some("ZSYNC_T_BOTH"))
            .resolve("ldap.bind")
            .unwrap_err()
            .to_string();
        assert!(err.contains("CONFIG_SECRET_AMBIGUOUS"), "{err}");
        assert!(err.contains("ldap.bind"));
    }

    #[test]
    fn neither_form_is_an_error() {
        let err = secret_ref(None, None).resolve("zabbix").unwrap_err().to_string();
        assert!(err.contains("CONFIG_MISSING_FIELD"), "{err}");
    }

    #[test]
    fn env_var_is_read_and_missing_var_names_the_var() {
        std::env::set_var("ZSYNC_T_SECRET_PRESENT", "from-env");
        let s = secret_ref(None, Some("ZSYNC_T_SECRET_PRESENT"))
            .resolve("zabbix")
            .unwrap();
        assert_eq!(s.expose(), "from-env");

        std::env::remove_var("ZSYNC_T_SECRET_ABSENT");
        let err = secret_ref(None, Some("ZSYNC_T_SECRET_ABSENT"))
            .resolve("zabbix")
            .unwrap_err()
            .to_string();
        assert!(err.contains("ZSYNC_T_SECRET_ABSENT"), "{err}");
    }

    #[test]
    fn debug_is_redacted() {
        let dbg = format!("{:?}", secret_ref(Some("topsecret"), None));
        assert!(!dbg.contains("topsecret"));
        let dbg = format!("{:?}", SecretString::new("topsecret"));
        assert!(!dbg.contains("topsecret"));
    }
}
