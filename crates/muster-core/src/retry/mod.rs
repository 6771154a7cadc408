//! Retry policy: per-category retry caps and the resolver that combines a
//! category cap with an operator-configured global budget.

use crate::classify::FailureCategory;

/// Per-category maximum retry count. `permission` and `policy` are capped
/// at 0 so those failures are never re-queued regardless of the global
/// budget.
pub fn category_limit(category: FailureCategory) -> u32 {
    match category {
        FailureCategory::Setup => 1,
        FailureCategory::Model => 3,
        FailureCategory::Flaky => 5,
        FailureCategory::Permission => 0,
        FailureCategory::Policy => 0,
        FailureCategory::Timeout => 2,
        FailureCategory::Unknown => 2,
        FailureCategory::Verification => 3,
    }
}

/// Resolve the effective retry limit for a category given the operator's
/// `global_limit` (negative means unlimited).
pub fn resolve_retry_limit(category: FailureCategory, global_limit: i32) -> u32 {
    let cap = category_limit(category);
    if global_limit < 0 {
        return cap;
    }
    (global_limit as u32).min(cap)
}
