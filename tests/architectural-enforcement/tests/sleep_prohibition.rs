//! Integration Test: Sleep Prohibition
//!
//! **Policy**: The engine and the replay driver never sleep. Ordering between
//! display phases comes from `tokio::task::yield_now`, and waiting is done on
//! channels.

use architectural_enforcement::find_in_production;

const ENGINE_DIRS: &[&str] = &["solver/core/src", "solver/replay/src"];

fn is_sleep_call(code: &str) -> bool {
    code.contains("::sleep(") || code.contains(".sleep(") || code.contains("sleep_until(")
}

#[test]
fn test_no_sleep_in_production_code() {
    let violations: Vec<String> = ENGINE_DIRS
        .iter()
        .flat_map(|dir| find_in_production(dir, is_sleep_call))
        .map(|line| line.to_string())
        .collect();

    if !violations.is_empty() {
        eprintln!("\n❌ Sleep calls found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ Instead:");
        eprintln!("  - Await a channel (mpsc/oneshot) for the event you need");
        eprintln!("  - Use tokio::task::yield_now() to let a commit land first");

        panic!(
            "\nFound {} sleep violation(s) in production code.",
            violations.len()
        );
    }
}

#[test]
fn test_sleep_detector() {
    assert!(is_sleep_call("    tokio::time::sleep(Duration::from_millis(10)).await;"));
    assert!(is_sleep_call("std::thread::sleep(d);"));
    assert!(!is_sleep_call("tokio::task::yield_now().await;"));
}
