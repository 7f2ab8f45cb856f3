//! Path canonicalization.
//!
//! Paths inside the engine are always absolute, slash-delimited, without a
//! trailing slash and without empty components. `.` and `..` are kept as
//! ordinary components: every directory carries real `.`/`..` entries, so
//! resolution handles them by lookup.

/// Normalize a raw path.
///
/// Empty input and `/` both yield `/`.
pub fn canonicalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 1);
    for component in components(raw) {
        out.push('/');
        out.push_str(component);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Non-empty components of a path, in order.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

/// Split a canonical path into its parent prefix and final name.
///
/// Returns `None` for the root.
pub fn split_parent(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.trim_end_matches('/');
    let idx = trimmed.rfind('/')?;
    let name = &trimmed[idx + 1..];
    if name.is_empty() {
        return None;
    }
    let prefix = if idx == 0 { "/" } else { &trimmed[..idx] };
    Some((prefix, name))
}

/// True if `ancestor` is a strict path prefix of `path`, i.e. `path` lies
/// inside the subtree rooted at `ancestor`. Both must be canonical.
pub fn is_strict_ancestor(ancestor: &str, path: &str) -> bool {
    if ancestor == "/" {
        return path != "/";
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}
