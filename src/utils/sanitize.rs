use std::path::Path;

/// Characters stripped from remote names before they become path components.
pub const FORBIDDEN_CHARS: &[char] = &['"', '?', '&', '*', '@', '!', '\'', '/', '\\', '\0'];

/// Turns a remote display name into a single safe path component.
///
/// Falls back to `fallback` (normally the node id) when nothing usable is left.
pub fn sanitize_file_name(name: &str, fallback: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !FORBIDDEN_CHARS.contains(c))
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Name for a node whose sanitized name a sibling already took.
///
/// The node id goes before the extension: `report.pdf` becomes `report (id).pdf`.
pub fn disambiguate(name: &str, id: &str) -> String {
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str());
    let extension = path.extension().and_then(|e| e.to_str());
    match (stem, extension) {
        (Some(stem), Some(extension)) => format!("{} ({}).{}", stem, id, extension),
        _ => format!("{} ({})", name, id),
    }
}
