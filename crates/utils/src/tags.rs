//! Tag/label classification shared by the resolver and the eligibility gate.
//!
//! Grounded in `original_source/app/utils.py` (`extract_para_area`,
//! `get_area_label_from_parent_project`, `extract_person_labels`,
//! `has_capsync_label`), unified here onto a single emoji-stripping
//! routine reused by every tag comparison.

/// Strip a trailing run of non-ASCII characters (an emoji suffix, typically
/// separated from the label text by whitespace) and surrounding whitespace.
pub fn strip_trailing_emoji(label: &str) -> &str {
    let mut end = label.len();
    let mut chars: Vec<(usize, char)> = label.char_indices().collect();
    while let Some((idx, ch)) = chars.pop() {
        if ch.is_ascii() {
            end = idx + ch.len_utf8();
            break;
        }
        end = idx;
    }
    label[..end].trim_end()
}

/// Whether `labels` contains the sync tag, with a configurable leading
/// sigil (e.g. `@`) treated as display-only on both sides of the
/// comparison.
pub fn has_sync_tag(labels: &[String], sync_tag: &str) -> bool {
    let normalized_tag = sync_tag.trim_start_matches('@');
    labels
        .iter()
        .any(|label| label.trim_start_matches('@') == normalized_tag)
}

/// Match a label (or a parent project name) against the closed area
/// vocabulary, case-insensitively and after stripping a trailing emoji.
pub fn match_area_label<'a>(candidate: &str, area_labels: &'a [String]) -> Option<&'a str> {
    let cleaned = strip_trailing_emoji(candidate.trim());
    area_labels
        .iter()
        .find(|area| area.eq_ignore_ascii_case(cleaned))
        .map(|s| s.as_str())
}

/// Extract the PARA area already present among a task's labels, if any.
pub fn extract_area_from_labels<'a>(labels: &[String], area_labels: &'a [String]) -> Option<&'a str> {
    labels.iter().find_map(|label| match_area_label(label, area_labels))
}

/// Extract person names from labels carrying `person_tag_marker` (e.g. the
/// label `"DougD@"` with marker `"@"` yields `"DougD"`). Unknown/unmatched
/// markers are simply absent from the result -- callers skip silently,
/// never failing the job, per the Open Questions resolution in the spec.
pub fn extract_person_labels(labels: &[String], person_tag_marker: &str) -> Vec<String> {
    if person_tag_marker.is_empty() {
        return Vec::new();
    }
    labels
        .iter()
        .filter(|label| label.contains(person_tag_marker))
        .map(|label| label.replace(person_tag_marker, "").trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn areas() -> Vec<String> {
        ["HOME", "HEALTH", "PROSPER", "WORK", "PERSONAL & FAMILY", "FINANCIAL", "FUN"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn strips_trailing_emoji_and_whitespace() {
        assert_eq!(strip_trailing_emoji("PROSPER \u{1F4C2}"), "PROSPER");
        assert_eq!(strip_trailing_emoji("HEALTH"), "HEALTH");
    }

    #[test]
    fn sync_tag_unifies_sigil_variants() {
        let labels = vec!["@capsync".to_string()];
        assert!(has_sync_tag(&labels, "capsync"));
        assert!(has_sync_tag(&labels, "@capsync"));

        let labels2 = vec!["capsync".to_string()];
        assert!(has_sync_tag(&labels2, "@capsync"));
    }

    #[test]
    fn matches_area_case_insensitively() {
        assert_eq!(match_area_label("work", &areas()), Some("WORK"));
        assert_eq!(match_area_label("Prosper \u{1F4C2}", &areas()), Some("PROSPER"));
        assert_eq!(match_area_label("not-an-area", &areas()), None);
    }

    #[test]
    fn extracts_person_labels_by_marker() {
        let labels = vec!["DougD@".to_string(), "urgent".to_string(), "VarshaA@".to_string()];
        let people = extract_person_labels(&labels, "@");
        assert_eq!(people, vec!["DougD".to_string(), "VarshaA".to_string()]);
    }

    #[test]
    fn unknown_marker_yields_no_people() {
        let labels = vec!["urgent".to_string()];
        assert!(extract_person_labels(&labels, "@").is_empty());
    }
}
