//! Failure classifier: a pure function mapping a run's failure message and
//! structured error metadata onto a `(category, retryable, reason)` triple.
//!
//! No database access, no clock, no I/O -- everything here is referentially
//! transparent so it can be unit tested without a store.

use serde_json::Value;

/// Closed set of failure categories. Determines retryability together
/// with the per-category cap in [`crate::retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    Setup,
    Model,
    Flaky,
    Permission,
    Policy,
    Timeout,
    Unknown,
    Verification,
}

impl FailureCategory {
    /// Default retryability for a category, used when a code mapping
    /// does not override it.
    pub fn default_retryable(self) -> bool {
        match self {
            FailureCategory::Setup => false,
            FailureCategory::Model => true,
            FailureCategory::Flaky => true,
            FailureCategory::Permission => false,
            FailureCategory::Policy => false,
            FailureCategory::Timeout => true,
            FailureCategory::Unknown => true,
            FailureCategory::Verification => true,
        }
    }
}

/// Result of classifying a failed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: FailureCategory,
    pub retryable: bool,
    pub reason: String,
}

/// The generic code that always falls through to message heuristics
/// rather than being a terminal mapping entry.
const FALLTHROUGH_CODE: &str = "execution_failed";

/// Closed failure-code table. Codes absent here are
/// `unknown/retryable/unclassified`.
fn code_table(code: &str) -> Option<Classification> {
    let (category, retryable, reason) = match code {
        "verification_command_unsupported_format" => {
            (FailureCategory::Setup, false, "verification_command_unsupported_format")
        }
        "verification_command_missing_make_target" => {
            (FailureCategory::Setup, false, "verification_command_missing_make_target")
        }
        "verification_command_no_test_files" => {
            (FailureCategory::Setup, false, "verification_command_no_test_files")
        }
        "verification_command_missing_script" => {
            (FailureCategory::Setup, false, "verification_command_missing_script")
        }
        "verification_command_failed" => {
            (FailureCategory::Verification, true, "verification_command_failed")
        }
        "setup_or_bootstrap_issue" => (FailureCategory::Setup, true, "setup_or_bootstrap_issue"),
        "branch_diverged_requires_recreate" => {
            (FailureCategory::Setup, false, "branch_diverged_requires_recreate")
        }
        "policy_violation" => (FailureCategory::Policy, false, "policy_violation"),
        "external_directory_permission_prompt" => {
            (FailureCategory::Permission, false, "external_directory_permission_prompt")
        }
        _ => return None,
    };
    Some(Classification {
        category,
        retryable,
        reason: reason.to_string(),
    })
}

/// Apply message-based heuristics when no code mapping applies.
fn classify_by_message(message: &str) -> Classification {
    if message.contains("branch_diverged_requires_recreate") {
        return Classification {
            category: FailureCategory::Setup,
            retryable: false,
            reason: "branch_diverged_requires_recreate".to_string(),
        };
    }
    if message.contains("ERR_PNPM_NO_SCRIPT") || message.contains("Missing script") {
        return Classification {
            category: FailureCategory::Setup,
            retryable: false,
            reason: "verification_command_missing_script".to_string(),
        };
    }
    if message.contains("No test files found") {
        return Classification {
            category: FailureCategory::Setup,
            retryable: false,
            reason: "verification_command_no_test_files".to_string(),
        };
    }
    if message.contains("Permission required") || message.contains("external_directory") {
        return Classification {
            category: FailureCategory::Permission,
            retryable: false,
            reason: "external_directory_permission_prompt".to_string(),
        };
    }

    Classification {
        category: FailureCategory::Unknown,
        retryable: true,
        reason: "unclassified".to_string(),
    }
}

/// Classify a failed run. `error_meta` is the structured `errorMeta` map
/// recorded on the run, if any.
pub fn classify(message: &str, error_meta: Option<&Value>) -> Classification {
    if let Some(code) = extract_failure_code(error_meta) {
        if code != FALLTHROUGH_CODE {
            if let Some(classification) = code_table(&code) {
                return classification;
            }
        }
    }
    classify_by_message(message)
}

/// Read `errorMeta.failureCode` out of the structured metadata, if present.
pub fn extract_failure_code(error_meta: Option<&Value>) -> Option<String> {
    error_meta?
        .get("failureCode")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Read `errorMeta.failedCommand` out of the structured metadata, if present.
pub fn extract_failed_command(error_meta: Option<&Value>) -> Option<String> {
    error_meta?
        .get("failedCommand")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Read `errorMeta.policyViolations`, stripping blank entries.
pub fn extract_policy_violations(error_meta: Option<&Value>) -> Vec<String> {
    let Some(meta) = error_meta else {
        return Vec::new();
    };
    let Some(array) = meta.get("policyViolations").and_then(Value::as_array) else {
        return Vec::new();
    };
    array
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Canonicalize a failure message into a stable signature for dedup/rate
/// limiting, prefixed with `code:<failureCode> ` when a code is present.
/// Variable substrings (UUIDs, integers, absolute paths) are replaced with
/// fixed placeholders so distinct occurrences of the same underlying
/// failure normalize to the same signature.
pub fn normalize_failure_signature(message: &str, error_meta: Option<&Value>) -> String {
    let collapsed = message.split_whitespace().collect::<Vec<_>>().join(" ");
    let canonical = canonicalize_variable_substrings(&collapsed);

    match extract_failure_code(error_meta) {
        Some(code) => format!("code:{code} {canonical}"),
        None => canonical,
    }
}

fn canonicalize_variable_substrings(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for token in input.split(' ') {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&canonicalize_token(token));
    }
    out
}

fn canonicalize_token(token: &str) -> String {
    if is_uuid(token) {
        return "<uuid>".to_string();
    }
    if is_absolute_path(token) {
        return "<path>".to_string();
    }
    if is_hex_hash(token) {
        return "<hash>".to_string();
    }
    if token.chars().all(|c| c.is_ascii_digit()) && !token.is_empty() {
        return "<int>".to_string();
    }
    token.to_string()
}

fn is_uuid(token: &str) -> bool {
    let stripped: &str = token.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-');
    let parts: Vec<&str> = stripped.split('-').collect();
    parts.len() == 5
        && [8, 4, 4, 4, 12]
            .iter()
            .zip(parts.iter())
            .all(|(len, part)| part.len() == *len && part.chars().all(|c| c.is_ascii_hexdigit()))
}

fn is_absolute_path(token: &str) -> bool {
    token.starts_with('/') && token.len() > 1
}

fn is_hex_hash(token: &str) -> bool {
    let len = token.len();
    (len == 7 || len == 40 || len == 64) && token.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_code_takes_precedence_over_message() {
        let meta = json!({"failureCode": "policy_violation"});
        let result = classify("something unrelated", Some(&meta));
        assert_eq!(result.category, FailureCategory::Policy);
        assert!(!result.retryable);
    }

    #[test]
    fn execution_failed_falls_through_to_message() {
        let meta = json!({"failureCode": "execution_failed"});
        let result = classify("Permission required: external_directory", Some(&meta));
        assert_eq!(result.category, FailureCategory::Permission);
        assert!(!result.retryable);
    }

    #[test]
    fn unknown_code_falls_through_to_message() {
        let meta = json!({"failureCode": "some_future_code"});
        let result = classify("totally opaque failure", Some(&meta));
        assert_eq!(result.category, FailureCategory::Unknown);
        assert!(result.retryable);
    }

    #[test]
    fn message_heuristic_branch_diverged() {
        let result = classify("branch_diverged_requires_recreate: cannot fast-forward", None);
        assert_eq!(result.category, FailureCategory::Setup);
        assert!(!result.retryable);
    }

    #[test]
    fn message_heuristic_missing_script() {
        let result = classify("ERR_PNPM_NO_SCRIPT test", None);
        assert_eq!(result.category, FailureCategory::Setup);
        assert_eq!(result.reason, "verification_command_missing_script");
    }

    #[test]
    fn message_heuristic_no_test_files() {
        let result = classify("No test files found matching pattern", None);
        assert_eq!(result.category, FailureCategory::Setup);
        assert_eq!(result.reason, "verification_command_no_test_files");
    }

    #[test]
    fn unrecognized_message_is_unknown_and_retryable() {
        let result = classify("the sky fell down", None);
        assert_eq!(result.category, FailureCategory::Unknown);
        assert!(result.retryable);
        assert_eq!(result.reason, "unclassified");
    }

    #[test]
    fn classify_is_deterministic() {
        let meta = json!({"failureCode": "verification_command_failed"});
        let a = classify("flaky network blip", Some(&meta));
        let b = classify("flaky network blip", Some(&meta));
        assert_eq!(a, b);
    }

    #[test]
    fn extract_policy_violations_strips_blanks() {
        let meta = json!({"policyViolations": ["no-network", "  ", "", "no-secrets"]});
        let violations = extract_policy_violations(Some(&meta));
        assert_eq!(violations, vec!["no-network", "no-secrets"]);
    }

    #[test]
    fn normalize_signature_prefixes_known_code() {
        let meta = json!({"failureCode": "verification_command_failed"});
        let sig = normalize_failure_signature("build failed", Some(&meta));
        assert!(sig.starts_with("code:verification_command_failed "));
    }

    #[test]
    fn normalize_signature_canonicalizes_uuid_and_path() {
        let sig_a = normalize_failure_signature(
            "task 550e8400-e29b-41d4-a716-446655440000 failed at /home/alice/project",
            None,
        );
        let sig_b = normalize_failure_signature(
            "task 123e4567-e89b-12d3-a456-426614174000 failed at /home/bob/other",
            None,
        );
        assert_eq!(sig_a, sig_b);
        assert!(sig_a.contains("<uuid>"));
        assert!(sig_a.contains("<path>"));
    }

    #[test]
    fn normalize_signature_canonicalizes_integers() {
        let sig_a = normalize_failure_signature("retried 3 times", None);
        let sig_b = normalize_failure_signature("retried 42 times", None);
        assert_eq!(sig_a, sig_b);
    }

    #[test]
    fn normalize_signature_stable_under_whitespace_reordering_of_runs() {
        let sig_a = normalize_failure_signature("build   failed  badly", None);
        let sig_b = normalize_failure_signature("build failed badly", None);
        assert_eq!(sig_a, sig_b);
    }
}
