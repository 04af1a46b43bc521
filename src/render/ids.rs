//! Control identifier scheme.

use crate::parse::types::Section;

use super::types::ScopeFrame;

/// Raw field id → identifier-safe text. Case is kept; anything outside
/// `[A-Za-z0-9_]` becomes `_`.
pub fn sanitize_id(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "field".into() } else { cleaned }
}

/// Title → lower-case key with single underscores between words.
pub fn sanitize_title(title: &str) -> String {
    let mut key = String::with_capacity(title.len());
    for c in title.trim().chars() {
        if c.is_ascii_alphanumeric() {
            key.push(c.to_ascii_lowercase());
        } else if !key.ends_with('_') {
            key.push('_');
        }
    }
    let key = key.trim_matches('_').to_string();
    if key.is_empty() { "group".into() } else { key }
}

/// Repeat identity: `baseKey` when given, else the sanitized title.
pub fn repeat_key(section: &Section) -> String {
    match section.base_key.as_deref().map(str::trim) {
        Some(base) if !base.is_empty() => sanitize_id(base),
        _ => sanitize_title(&section.title),
    }
}

/// Prefix contributed by the innermost enclosing instance (`contacts_2_`).
pub fn scope_prefix(scope: &[ScopeFrame]) -> String {
    scope
        .last()
        .map(|frame| format!("{}{}_", frame.prefix, frame.index))
        .unwrap_or_default()
}

/// `prefix + index + "_" + rawId`.
pub fn instance_control_id(prefix: &str, index: u32, raw_id: &str) -> String {
    format!("{prefix}{index}_{}", sanitize_id(raw_id))
}

/// Identifier of a field given its enclosing instance chain.
pub fn control_id(scope: &[ScopeFrame], raw_id: &str) -> String {
    match scope.last() {
        Some(frame) => instance_control_id(&frame.prefix, frame.index, raw_id),
        None => sanitize_id(raw_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_case() {
        assert_eq!(sanitize_id("First Name"), "First_Name");
        assert_eq!(sanitize_id("a.b-c"), "a_b_c");
        assert_eq!(sanitize_id("  "), "field");
    }

    #[test]
    fn titles_collapse_separators() {
        assert_eq!(sanitize_title("  Contact -- Details "), "contact_details");
        assert_eq!(sanitize_title("!!"), "group");
    }

    #[test]
    fn scoped_ids() {
        let scope = vec![ScopeFrame {
            prefix: "contacts_".into(),
            index: 2,
        }];
        assert_eq!(control_id(&scope, "phone"), "contacts_2_phone");
        assert_eq!(control_id(&[], "phone no"), "phone_no");
        assert_eq!(scope_prefix(&scope), "contacts_2_");
    }
}
