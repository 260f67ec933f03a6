//! Deterministic, DNS-safe names for every cluster object this crate creates.
//!
//! K8s object names and label values must be valid DNS-1123 labels:
//! lowercase alphanumerics and dashes, 63 bytes max, alphanumeric at both
//! ends. Service records carry free-form user text, so every derived name
//! goes through here exactly once.

const MAX_LABEL_LENGTH: usize = 63;

/// Fixed token returned when an input sanitizes to nothing.
pub const FALLBACK_NAME: &str = "svc";

/// Sanitize arbitrary text into a valid DNS label.
///
/// Lowercases, maps every character outside `[a-z0-9-]` to `-`, collapses
/// dash runs, strips leading/trailing dashes and truncates to 63 bytes.
/// Total and idempotent: every input yields a valid label, and a valid
/// label passes through unchanged.
pub fn sanitize_resource_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len().min(MAX_LABEL_LENGTH));
    let mut last_was_dash = false;
    for c in raw.chars() {
        let mapped = match c.to_ascii_lowercase() {
            c if c.is_ascii_lowercase() || c.is_ascii_digit() => c,
            _ => '-',
        };
        if mapped == '-' {
            if last_was_dash || out.is_empty() {
                continue;
            }
            last_was_dash = true;
        } else {
            last_was_dash = false;
        }
        out.push(mapped);
    }
    out.truncate(MAX_LABEL_LENGTH);
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        return FALLBACK_NAME.to_string();
    }
    out
}

/// Append `-<suffix>` to a sanitized base, reserving the suffix length from
/// the 63-byte budget before truncating the base so the result is always a
/// non-empty valid label.
pub fn suffixed_name(base: &str, suffix: &str) -> String {
    let suffix = sanitize_resource_name(suffix);
    let budget = MAX_LABEL_LENGTH - suffix.len() - 1;
    let mut name = sanitize_resource_name(base);
    if name.len() > budget {
        name.truncate(budget);
        while name.ends_with('-') {
            name.pop();
        }
    }
    if name.is_empty() {
        name.push_str(FALLBACK_NAME);
    }
    format!("{}-{}", name, suffix)
}

/// Port-scoped name (`<base>-<port>`), valid for any base length and any
/// port in [1, 65535].
pub fn build_port_name(base: &str, port: u16) -> String {
    suffixed_name(base, &port.to_string())
}

/// Parent of an absolute container path, used by the virtual file browser
/// to synthesize the `..` entry. The parent of `/` is `/`.
pub fn parent_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    match trimmed.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => trimmed[..idx].to_string(),
    }
}
