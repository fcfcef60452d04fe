//! Backlink stripping and injection, grounded in
//! `original_source/app/utils.py: strip_notion_backlink`.
//!
//! The forward payload's body must never carry the backlink line this
//! system itself appended on a previous run, or every sync would grow the
//! description by one more link. `sink_host` is the host component of the
//! configured Sink base URL.

/// Whether any line of `description` already links to the Sink.
pub fn contains_sink_link(description: &str, sink_host: &str) -> bool {
    description.lines().any(|line| line.contains(sink_host))
}

/// Removes every line referencing the Sink host, used when composing the
/// canonical body so the system's own backlink is never echoed back in.
pub fn strip_sink_backlink_lines(description: &str, sink_host: &str) -> String {
    if sink_host.is_empty() {
        return description.to_string();
    }
    description.lines().filter(|line| !line.contains(sink_host)).collect::<Vec<_>>().join("\n")
}

/// Appends the two-line backlink footer to a task
/// description, unless it is already present.
pub fn append_backlink(
    description: &str,
    task_url: &str,
    project_url: &str,
    sink_host: &str,
) -> Option<String> {
    if contains_sink_link(description, sink_host) {
        return None;
    }
    let mut updated = description.to_string();
    if !updated.is_empty() {
        updated.push_str("\n\n");
    }
    updated.push_str(&format!("View Task in Sink: {task_url}\nView Project in Sink: {project_url}"));
    Some(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_appending_when_link_already_present() {
        let description = "notes\nView Task in Sink: https://sink.example/p/1";
        assert_eq!(append_backlink(description, "https://sink.example/p/1", "https://sink.example/p/2", "sink.example"), None);
    }

    #[test]
    fn appends_both_lines_when_absent() {
        let updated = append_backlink("notes", "https://sink.example/p/1", "https://sink.example/p/2", "sink.example").unwrap();
        assert!(updated.contains("View Task in Sink: https://sink.example/p/1"));
        assert!(updated.contains("View Project in Sink: https://sink.example/p/2"));
    }

    #[test]
    fn strips_only_lines_mentioning_the_sink_host() {
        let description = "keep this\nView Task in Sink: https://sink.example/p/1\nkeep that too";
        assert_eq!(strip_sink_backlink_lines(description, "sink.example"), "keep this\nkeep that too");
    }
}
