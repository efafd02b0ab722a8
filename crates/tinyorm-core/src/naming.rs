//! Naming helpers used to guess table columns from model names.
//!
//! Foreign keys are derived from model names (`TorrentPeer` -> `torrent_peer_id`).
//! The case conversion uses compiled regex patterns, built once and shared.

use std::sync::OnceLock;

use regex::Regex;

fn lower_upper() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([a-z0-9])([A-Z])").expect("static regex pattern"))
}

fn acronym_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").expect("static regex pattern"))
}

/// Convert `StudlyCase` or `camelCase` to `snake_case`.
///
/// ```
/// use tinyorm_core::naming::to_snake;
///
/// assert_eq!(to_snake("TorrentPreviewableFile"), "torrent_previewable_file");
/// assert_eq!(to_snake("HTTPRequest"), "http_request");
/// ```
pub fn to_snake(name: &str) -> String {
    let step = acronym_boundary().replace_all(name, "${1}_${2}");
    lower_upper()
        .replace_all(&step, "${1}_${2}")
        .to_lowercase()
}

/// Last path segment of a type name with generic arguments removed.
///
/// `app::models::Torrent` -> `Torrent`.
#[must_use]
pub fn class_basename(type_name: &str) -> &str {
    let without_generics = type_name.split('<').next().unwrap_or(type_name);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
}

/// Lowercase the first character (`TorrentPeer` -> `torrentPeer`).
#[must_use]
pub fn lcfirst(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Part of a possibly qualified column after the last dot (`t.id` -> `id`).
#[must_use]
pub fn unqualified(column: &str) -> &str {
    column.rsplit('.').next().unwrap_or(column)
}
