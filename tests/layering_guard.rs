//! Layering guardrails to keep the vocabulary and syntax crates independent of the generator.
//!
//! `derivgen_core` is a leaf crate: it may not depend on anything in the workspace. `derivgen_syntax` may
//! not depend on the generator or on the vocabulary. These tests scan the manifests and fail if a
//! `[dependencies]` table names a forbidden crate.

fn dependencies(manifest: &str) -> Vec<String> {
    let mut in_dependencies = false;
    let mut names = Vec::new();

    for raw_line in manifest.lines() {
        let line = raw_line.trim();
        // Track when we enter/exit the `[dependencies]` table.
        if line.starts_with('[') {
            in_dependencies = line == "[dependencies]";
            continue;
        }

        if !in_dependencies || line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Strip inline comments for robustness.
        let line_no_comment = line.split('#').next().unwrap_or("").trim();
        if let Some((name, _)) = line_no_comment.split_once('=') {
            names.push(name.trim().to_string());
        }
    }
    names
}

#[test]
fn core_vocabulary_has_no_workspace_dependencies() {
    let deps = dependencies(include_str!("../crates/derivgen_core/Cargo.toml"));
    for forbidden in ["derivgen", "derivgen_syntax"] {
        assert!(
            !deps.iter().any(|d| d == forbidden),
            "`{forbidden}` must not appear in derivgen_core's [dependencies]"
        );
    }
}

#[test]
fn syntax_crate_does_not_depend_on_generator() {
    let deps = dependencies(include_str!("../crates/derivgen_syntax/Cargo.toml"));
    for forbidden in ["derivgen", "derivgen_core"] {
        assert!(
            !deps.iter().any(|d| d == forbidden),
            "`{forbidden}` must not appear in derivgen_syntax's [dependencies]"
        );
    }
}

#[test]
fn generator_depends_on_both_layers() {
    let deps = dependencies(include_str!("../Cargo.toml"));
    assert!(deps.iter().any(|d| d == "derivgen_core"));
    assert!(deps.iter().any(|d| d == "derivgen_syntax"));
}
