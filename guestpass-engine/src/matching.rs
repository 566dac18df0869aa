//! Glob-style pattern matching for capability names, targets and principal ids.

use glob_match::glob_match;

/// Check if a value matches a pattern.
///
/// Supports glob-style patterns:
/// - `*` matches any sequence of characters except `/`
/// - `**` matches across `/` boundaries (`target/**` covers a whole tree)
/// - `db.*` matches `db.read`, `db.write`, etc.
/// - `module:*` matches `module:app`, `module:db`, etc.
/// - Exact strings match exactly.
pub fn matches_pattern(pattern: &str, value: &str) -> bool {
    glob_match(pattern, value)
}
