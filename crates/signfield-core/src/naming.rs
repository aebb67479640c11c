//! Output filename conventions

use std::path::Path;

/// `signed-<originalName>`
pub fn signed_document_name(original: &str) -> String {
    format!("signed-{}", file_name(original))
}

/// `config-<originalNameWithoutExtension>.json`
pub fn config_file_name(original: &str) -> String {
    let stem = Path::new(file_name(original))
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    format!("config-{}.json", stem)
}

fn file_name(original: &str) -> &str {
    Path::new(original)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(original)
}
