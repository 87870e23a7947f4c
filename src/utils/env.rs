/// Get environment variable with WRITESPACE_ prefix, falling back to unprefixed version
///
/// This helper function checks for `WRITESPACE_{key}` first, then falls back to `{key}`
/// so that conventional names like `REDIS_URL` and `SMTP_HOST` keep working.
///
/// # Examples
///
/// ```rust,ignore
/// use writespace_jobs::utils::get_env_with_prefix;
///
/// // Checks WRITESPACE_REDIS_URL first, then REDIS_URL
/// let url = get_env_with_prefix("REDIS_URL");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("WRITESPACE_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Parse an environment value, ignoring (and logging) values that don't parse
pub fn parse_env_with_prefix<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = get_env_with_prefix(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable environment value");
            None
        }
    }
}
