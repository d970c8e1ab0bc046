//! Name sanitizers for Kubernetes resource names, environment variables and
//! data keys.
//!
//! Each sanitizer returns the input borrowed, untouched, when it is already
//! valid for the target alphabet.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static RE_DNS_VALID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([a-z0-9.-]*[a-z0-9])?$").unwrap());
static RE_DNS_INVALID_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9.-]+").unwrap());
static RE_DNS_EDGES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^a-z0-9]+|[^a-z0-9]+$").unwrap());

static RE_ENV_VALID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z_][A-Z0-9_]*$").unwrap());
static RE_ENV_EDGES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^A-Za-z0-9_]+|[^A-Za-z0-9_]+$").unwrap());
static RE_ENV_INVALID_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]+").unwrap());

static RE_KEY_VALID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w.\-]*$").unwrap());
static RE_KEY_INVALID_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w.\-]+").unwrap());

/// Lowercase, hyphen-separated name usable as a DNS label / resource name.
///
/// `foo_&!bar` → `foo-bar`, `_Foo!bar_` → `foo-bar`.
pub fn dns_safe(value: &str) -> Cow<'_, str> {
    if RE_DNS_VALID.is_match(value) {
        return Cow::Borrowed(value);
    }

    let lowered = value.to_lowercase();
    let replaced = RE_DNS_INVALID_RUN.replace_all(&lowered, "-");
    Cow::Owned(RE_DNS_EDGES.replace_all(&replaced, "").into_owned())
}

/// Uppercase, underscore-separated name usable as an environment variable.
///
/// A leading digit is preceded by an underscore: `9foo` → `_9FOO`.
/// Existing underscores are kept as-is.
pub fn env_safe(value: &str) -> Cow<'_, str> {
    if RE_ENV_VALID.is_match(value) {
        return Cow::Borrowed(value);
    }

    let upper = value.to_uppercase();
    let trimmed = RE_ENV_EDGES.replace_all(&upper, "");
    let mut result = RE_ENV_INVALID_RUN.replace_all(&trimmed, "_").into_owned();
    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, '_');
    }
    Cow::Owned(result)
}

/// Case-preserving name usable as a ConfigMap/Secret data key.
///
/// `.` and `-` are already valid; other runs become a single underscore.
pub fn key_safe(value: &str) -> Cow<'_, str> {
    if RE_KEY_VALID.is_match(value) {
        return Cow::Borrowed(value);
    }

    Cow::Owned(RE_KEY_INVALID_RUN.replace_all(value, "_").into_owned())
}
