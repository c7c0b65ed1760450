//! Path canonicalization shared by the cache keys and the daemon queries.
//!
//! Paths arrive from the shell with native separators; the daemon and the
//! cache both speak forward slashes.

pub const SEPARATOR: char = '/';

#[cfg(windows)]
pub const NATIVE_SEPARATOR: char = '\\';
#[cfg(not(windows))]
pub const NATIVE_SEPARATOR: char = '/';

pub fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

pub fn folder_of(path: &str) -> String {
    let normalized = normalize(path);
    match normalized.rfind(SEPARATOR) {
        Some(idx) => normalized[..idx].to_string(),
        None => String::new(),
    }
}

pub fn cache_key(path: &str, fold_case: bool) -> String {
    let normalized = normalize(path);
    if fold_case {
        normalized.to_lowercase()
    } else {
        normalized
    }
}

pub fn to_native(path: &str) -> String {
    to_native_with(path, NATIVE_SEPARATOR)
}

pub fn to_native_with(path: &str, separator: char) -> String {
    if separator == SEPARATOR {
        return path.to_string();
    }
    path.chars()
        .map(|ch| if ch == SEPARATOR { separator } else { ch })
        .collect()
}

/// `true` when `folder` is `root` or lies underneath it. The comparison
/// honors separator boundaries, so `C:/Cloud2` is not inside `C:/Cloud`.
pub fn is_within(folder: &str, root: &str, fold_case: bool) -> bool {
    let folder = cache_key(folder, fold_case);
    let root = cache_key(root, fold_case);
    if root.is_empty() {
        return false;
    }
    let root = root.trim_end_matches(SEPARATOR);
    if root.is_empty() {
        return folder.starts_with(SEPARATOR);
    }
    match folder.strip_prefix(root) {
        Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR),
        None => false,
    }
}

pub fn join(folder: &str, name: &str) -> String {
    let folder = folder.trim_end_matches(SEPARATOR);
    let name = name.trim_start_matches(SEPARATOR);
    if folder.is_empty() {
        return name.to_string();
    }
    format!("{folder}{SEPARATOR}{name}")
}

pub fn last_segment(path: &str) -> &str {
    let trimmed = path.trim_end_matches(SEPARATOR);
    match trimmed.rfind(SEPARATOR) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}
