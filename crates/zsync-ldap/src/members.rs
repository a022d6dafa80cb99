//! Normalization of the raw group search response into a clean member set.
//!
//! Pure, no IO. The search is expected to match exactly one group entry whose
//! member attribute (e.g. `memberUid` on a posixGroup) lists the identities.

use ldap3::SearchEntry;
use zsync_reconcile::{DirectoryMembers, Identity, SyncError};

/// Extract the member identities of the single group entry in `entries`.
///
/// - zero entries: [`SyncError::EmptyAuthoritativeSource`]
/// - more than one entry: [`SyncError::DirectoryUnavailable`] (ambiguous group)
/// - attribute absent or only blank values: [`SyncError::EmptyAuthoritativeSource`]
///
/// The attribute name is matched case-insensitively, values are trimmed and
/// de-duplicated.
pub fn members_from_entries(
    entries: &[SearchEntry],
    attribute: &str,
) -> Result<DirectoryMembers, SyncError> {
    let entry = match entries {
        [] => return Err(SyncError::EmptyAuthoritativeSource),
        [single] => single,
        many => {
            let dns: Vec<&str> = many.iter().map(|e| e.dn.as_str()).collect();
            return Err(SyncError::DirectoryUnavailable(format!(
                "group search matched {} entries, expected exactly one: {}",
                many.len(),
                dns.join("; ")
            )));
        }
    };

    let members: DirectoryMembers = entry
        .attrs
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case(attribute))
        .flat_map(|(_, values)| values.iter())
        .filter_map(|v| Identity::from_raw(v))
        .collect();

    if members.is_empty() {
        return Err(SyncError::EmptyAuthoritativeSource);
    }
    Ok(members)
}

/// Build the connection URL. `port` is appended only when the URL carries none.
/// A bare host gets the `ldap://` scheme.
pub fn ldap_url(url: &str, port: Option<u16>) -> String {
    let url = url.trim().trim_end_matches('/');
    let url = if url.contains("://") {
        url.to_string()
    } else {
        format!("ldap://{url}")
    };

    let Some(port) = port else {
        return url;
    };

    let authority = url
        .split_once("://")
        .map(|(_, rest)| rest.split('/').next().unwrap_or(rest))
        .unwrap_or_default();
    let has_port = match authority.rfind(']') {
        Some(close) => authority[close..].contains(':'),
        None => authority.contains(':'),
    };

    if has_port {
        url
    } else {
        format!("{url}:{port}")
    }
}

/// RFC 4515 filters are parenthesized; accept the bare `cn=*` form too.
pub fn normalize_filter(filter: &str) -> String {
    let f = filter.trim();
    if f.starts_with('(') {
        f.to_string()
    } else {
        format!("({f})")
    }
}
