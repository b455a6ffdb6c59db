/// Reports whether `path` has a segment starting with a period.
///
/// `path` is delimited by forward slashes regardless of platform. No
/// normalization happens here, so `.` and `..` segments count as hidden too.
pub fn is_hidden(path: &str) -> bool {
    path.split('/').any(|segment| segment.starts_with('.'))
}

/// Reports whether a single directory entry name is hidden.
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}
