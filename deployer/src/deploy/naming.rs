//! Service and repository naming

use crate::errors::DeployError;

/// Shortest accepted service name after normalization
pub const MIN_SERVICE_NAME_LEN: usize = 3;

/// Longest service name kept after normalization (one DNS label)
pub const MAX_SERVICE_NAME_LEN: usize = 63;

/// Normalize a requested service name into a `[a-z0-9-]` slug.
///
/// Letters are lowercased, every run of other characters becomes a single
/// `-`, and leading/trailing dashes are dropped.
pub fn normalize_service_name(raw: &str) -> Result<String, DeployError> {
    let mut slug = String::with_capacity(raw.len());
    let mut pending_dash = false;

    for c in raw.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    if slug.len() > MAX_SERVICE_NAME_LEN {
        slug.truncate(MAX_SERVICE_NAME_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }

    if slug.len() < MIN_SERVICE_NAME_LEN {
        return Err(DeployError::Validation(format!(
            "service name '{}' must contain at least {} letters or digits",
            raw, MIN_SERVICE_NAME_LEN
        )));
    }

    Ok(slug)
}

/// Compose a repository name unique across attempts with the same service name
pub fn compose_repo_name(prefix: &str, service_name: &str, unix_millis: i64) -> String {
    format!("{}-{}-{}", prefix, service_name, unix_millis)
}
