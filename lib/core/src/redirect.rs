//! Post-login redirect target validation.
//!
//! Only same-origin relative paths are ever used as redirect targets. Anything
//! else is silently replaced by [`DEFAULT_REDIRECT`]; rejections are not
//! reported to the caller. Path traversal segments are left alone since
//! resolving them is the backend's concern.

/// Destination used when no safe redirect target is available.
pub const DEFAULT_REDIRECT: &str = "/";

/// Returns true only for relative paths that start with a single `/`.
///
/// Rejects absolute URLs (`https://host/`), protocol-relative URLs
/// (`//host/`), and the backslash variant (`/\host`) that browsers normalize
/// into a protocol-relative URL.
#[must_use]
pub fn is_safe_redirect(target: &str) -> bool {
    let Some(rest) = target.strip_prefix('/') else {
        return false;
    };
    !rest.starts_with('/') && !rest.starts_with('\\') && !target.chars().any(char::is_control)
}

/// Returns `target` if it is safe, otherwise [`DEFAULT_REDIRECT`].
#[must_use]
pub fn safe_redirect_or_default(target: Option<&str>) -> &str {
    match target {
        Some(target) if is_safe_redirect(target) => target,
        _ => DEFAULT_REDIRECT,
    }
}
