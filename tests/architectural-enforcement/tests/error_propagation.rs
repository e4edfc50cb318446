//! Integration Test: Error Propagation
//!
//! **Policy**: Production code returns `Result` and propagates with `?`.
//! `unwrap()` and `expect()` are for tests only. Engine inputs that cannot be
//! applied are reported as outcomes, never as panics.

use architectural_enforcement::find_in_production;

fn is_unwrap(code: &str) -> bool {
    code.contains(".unwrap()") || code.contains(".expect(") || code.contains("panic!(")
}

#[test]
fn test_no_unwrap_in_production_code() {
    let violations: Vec<String> = ["solver/core/src", "solver/replay/src"]
        .iter()
        .flat_map(|dir| find_in_production(dir, is_unwrap))
        .map(|line| line.to_string())
        .collect();

    if !violations.is_empty() {
        eprintln!("\n❌ unwrap/expect/panic in production code:\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        panic!("Found {} violation(s).", violations.len());
    }
}

#[test]
fn test_unwrap_detector() {
    assert!(is_unwrap("let x = y.unwrap();"));
    assert!(is_unwrap("let x = y.expect(\"set\");"));
    assert!(!is_unwrap("let x = y.unwrap_or_default();"));
    assert!(!is_unwrap("let x = y.unwrap_or_else(|_| z);"));
}
