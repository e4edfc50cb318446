//! Integration Test: Design Ledger Citations
//!
//! **Policy**: every "Grounded on" entry in `DESIGN.md` names its source files
//! by a path rooted at a repository directory, never a bare module path such as
//! `config/mod.rs` that several crates could contain.

use architectural_enforcement::workspace_root;

/// Backticked `.rs` paths inside "Grounded on" bullets, with their line numbers
fn grounding_citations(design: &str) -> Vec<(usize, String)> {
    let mut in_grounding = false;
    let mut out = Vec::new();
    for (idx, line) in design.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("- **") || trimmed.starts_with('#') || trimmed.is_empty() {
            in_grounding = trimmed.starts_with("- **Grounded on**");
        }
        if !in_grounding {
            continue;
        }
        for (i, token) in line.split('`').enumerate() {
            if i % 2 == 1 && token.ends_with(".rs") && token.contains('/') {
                out.push((idx + 1, token.to_string()));
            }
        }
    }
    out
}

fn is_rooted(path: &str) -> bool {
    // e.g. `conductor/core/src/events.rs`, not `config/mod.rs`
    path.split('/').count() >= 3
}

#[test]
fn test_grounding_paths_are_rooted() {
    let path = workspace_root().join("DESIGN.md");
    let design = std::fs::read_to_string(&path).unwrap_or_default();
    assert!(!design.is_empty(), "could not read {}", path.display());

    let citations = grounding_citations(&design);
    assert!(!citations.is_empty(), "no grounding citations found");

    let bare: Vec<String> = citations
        .iter()
        .filter(|(_, cited)| !is_rooted(cited))
        .map(|(line, cited)| format!("DESIGN.md:{line} - {cited}"))
        .collect();
    assert!(
        bare.is_empty(),
        "qualify grounding paths from their crate root:\n{}",
        bare.join("\n")
    );
}

#[test]
fn test_bare_module_path_is_flagged() {
    let design = "\
### `solver/core/src/policy.rs`
- **Grounded on**: `conductor/core/src/session.rs`,
  `config/mod.rs` `ConfigSource`.
- **Crates**: `serde` via `src/lib.rs`.
";
    let citations = grounding_citations(design);
    assert_eq!(
        citations,
        vec![
            (2, "conductor/core/src/session.rs".to_string()),
            (3, "config/mod.rs".to_string()),
        ]
    );
    assert!(!is_rooted(&citations[1].1));
}
