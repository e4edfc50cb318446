//! Integration Test: Headless Engine
//!
//! **Policy**: `solver-core` knows nothing about how answers are shown. It
//! talks to a UI only through `DisplaySurface` and `StateChange`, so it must
//! not depend on UI or terminal crates, print to stdout, or spawn OS threads.
//! The replay binary does its file and stdin I/O through tokio.

use architectural_enforcement::{
    find_in_production, manifest_dependencies, manifest_dependency_specs, workspace_root,
};

const UI_CRATES: &[&str] = &[
    "ratatui",
    "crossterm",
    "termion",
    "egui",
    "eframe",
    "iced",
    "gtk",
    "tauri",
    "wry",
    "slint",
];

#[test]
fn test_core_has_no_ui_dependencies() {
    let manifest = workspace_root().join("solver/core/Cargo.toml");
    let deps = manifest_dependencies(&manifest);
    assert!(!deps.is_empty(), "could not read {}", manifest.display());

    let offending: Vec<&String> = deps
        .iter()
        .filter(|d| UI_CRATES.contains(&d.as_str()))
        .collect();
    assert!(
        offending.is_empty(),
        "solver-core must stay headless, found UI crates: {offending:?}"
    );
}

#[test]
fn test_core_runtime_stays_embeddable() {
    let manifest = workspace_root().join("solver/core/Cargo.toml");
    let specs = manifest_dependency_specs(&manifest);

    // JSON is only parsed in tests and by the replay binary
    assert!(
        !specs.iter().any(|(name, _)| name == "serde_json"),
        "serde_json belongs in solver-core's dev-dependencies"
    );

    // The host picks the scheduler; the engine never sleeps
    let tokio = specs
        .iter()
        .find(|(name, _)| name == "tokio")
        .map(|(_, spec)| spec.as_str())
        .unwrap_or_default();
    assert!(!tokio.is_empty(), "could not read {}", manifest.display());
    for feature in ["\"rt-multi-thread\"", "\"time\"", "\"macros\""] {
        assert!(
            !tokio.contains(feature),
            "solver-core must not enable tokio feature {feature}: {tokio}"
        );
    }
}

#[test]
fn test_core_does_not_print() {
    let violations = find_in_production("solver/core/src", |code| {
        code.contains("println!") || code.contains("print!(") || code.contains("eprintln!")
    });
    assert!(
        violations.is_empty(),
        "use tracing instead of printing:\n{}",
        violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    );
}

#[test]
fn test_core_spawns_no_threads() {
    let violations = find_in_production("solver/core/src", |code| {
        code.contains("thread::spawn") || code.contains("spawn_blocking")
    });
    assert!(
        violations.is_empty(),
        "the engine is owned by a single tokio task:\n{}",
        violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    );
}

#[test]
fn test_replay_uses_async_io() {
    let violations = find_in_production("solver/replay/src", |code| {
        code.contains("std::fs::")
            || code.contains("std::net::")
            || (code.contains("io::stdin()") && !code.contains("tokio::io::stdin()"))
    });
    assert!(
        violations.is_empty(),
        "use tokio::fs / tokio::io in the replay driver:\n{}",
        violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    );
}
