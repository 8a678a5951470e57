// ABOUTME: Redirect URI registration checks and exact / wildcard-suffix matching
// ABOUTME: A registered `P/*` matches `P` and anything under `P/`; everything else is exact
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use url::Url;

const WILDCARD_SUFFIX: &str = "/*";

/// Whether `candidate` is allowed by the registered `pattern`
#[must_use]
pub fn matches_pattern(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_suffix(WILDCARD_SUFFIX) {
        Some(prefix) => {
            candidate == prefix
                || candidate
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        }
        None => pattern == candidate,
    }
}

/// Whether any registered pattern allows `candidate`
#[must_use]
pub fn is_allowed(registered: &[String], candidate: &str) -> bool {
    registered
        .iter()
        .any(|pattern| matches_pattern(pattern, candidate))
}

/// Check a redirect URI pattern submitted at registration
///
/// # Errors
///
/// Returns a description of the problem when the pattern is rejected
pub fn validate_pattern(pattern: &str) -> Result<(), String> {
    let base = pattern.strip_suffix(WILDCARD_SUFFIX).unwrap_or(pattern);
    if base.contains('*') {
        tracing::warn!("Rejected redirect_uri with wildcard: {}", pattern);
        return Err(format!(
            "redirect_uri may only use '*' as a trailing '/*' segment: {pattern}"
        ));
    }

    let parsed = Url::parse(base).map_err(|e| {
        tracing::warn!("Rejected malformed redirect_uri: {}", pattern);
        format!("invalid redirect_uri {pattern}: {e}")
    })?;

    if parsed.fragment().is_some() {
        tracing::warn!("Rejected redirect_uri with fragment: {}", pattern);
        return Err(format!("redirect_uri must not contain a fragment: {pattern}"));
    }

    match parsed.scheme() {
        "https" => Ok(()),
        "http" if is_loopback(&parsed) => Ok(()),
        scheme => Err(format!(
            "redirect_uri must use https (or http on localhost), got {scheme}: {pattern}"
        )),
    }
}

fn is_loopback(url: &Url) -> bool {
    matches!(
        url.host_str(),
        Some("localhost" | "127.0.0.1" | "[::1]")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_pattern() {
        assert!(matches_pattern("https://x/cb", "https://x/cb"));
        assert!(!matches_pattern("https://x/cb", "https://x/cb/"));
        assert!(!matches_pattern("https://x/cb", "https://x/cb?evil=1"));
    }

    #[test]
    fn test_wildcard_suffix_pattern() {
        let pattern = "https://app.example.com/oauth/*";
        assert!(matches_pattern(pattern, "https://app.example.com/oauth"));
        assert!(matches_pattern(pattern, "https://app.example.com/oauth/"));
        assert!(matches_pattern(pattern, "https://app.example.com/oauth/cb/deep"));
        assert!(!matches_pattern(pattern, "https://app.example.com/oauthx"));
        assert!(!matches_pattern(pattern, "https://app.example.com.evil/oauth/cb"));
    }

    #[test]
    fn test_is_allowed_checks_every_pattern() {
        let registered = vec!["https://x/cb".to_owned(), "http://localhost:3000/*".to_owned()];
        assert!(is_allowed(&registered, "https://x/cb"));
        assert!(is_allowed(&registered, "http://localhost:3000/callback"));
        assert!(!is_allowed(&registered, "https://y/cb"));
    }

    #[test]
    fn test_validate_pattern() {
        assert!(validate_pattern("https://x/cb").is_ok());
        assert!(validate_pattern("https://x/app/*").is_ok());
        assert!(validate_pattern("http://localhost:8080/cb").is_ok());
        assert!(validate_pattern("http://127.0.0.1/cb").is_ok());
        assert!(validate_pattern("http://example.com/cb").is_err());
        assert!(validate_pattern("https://x/cb#frag").is_err());
        assert!(validate_pattern("https://*.x/cb").is_err());
        assert!(validate_pattern("not a uri").is_err());
    }
}
