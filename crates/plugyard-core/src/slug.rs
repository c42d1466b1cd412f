//! Version string normalization.

/// Normalize a declared version string into a version identifier.
///
/// Leading and trailing whitespace is dropped, internal whitespace runs
/// collapse to a single `-`. Case is preserved.
pub fn slugify(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Whether `component` can be used as a single directory or file name
/// without escaping its parent.
pub fn is_path_safe(component: &str) -> bool {
    !component.is_empty()
        && !component.chars().all(|c| c == '.')
        && !component.contains(['/', '\\', '\0'])
}
