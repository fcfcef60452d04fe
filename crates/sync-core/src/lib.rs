pub mod backlink;
pub mod error;
pub mod forward;
pub mod gate;
pub mod resolver;
pub mod reverse;

#[cfg(any(test, feature = "test-utils"))]
pub mod fakes;

pub use error::Error;
pub use forward::{build_forward_payload, ForwardPayload};
pub use gate::{auto_label_eligible, eligibility_gate, inherit_area_label, GateDecision};
pub use resolver::Resolver;
pub use reverse::{diff_against_task, ReverseSnapshot, TaskDiff};

/// Host component of a base URL (e.g. `https://sink.example/v1` ->
/// `sink.example`), used both to strip/detect backlink lines and to tag
/// the forward payload's source of truth for the Sink's identity.
pub fn host_of(base_url: &str) -> &str {
    let without_scheme = base_url.split("://").nth(1).unwrap_or(base_url);
    without_scheme.split('/').next().unwrap_or(without_scheme)
}

#[cfg(test)]
mod host_tests {
    use super::host_of;

    #[test]
    fn strips_scheme_and_path() {
        assert_eq!(host_of("https://sink.example/v1"), "sink.example");
        assert_eq!(host_of("sink.example"), "sink.example");
    }
}
