use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

const CATALOG_YAML: &str = r#"version: "1.0"
commands:
  - name: docker-run
    aliases: [run]
    modes:
      - name: default
        spec: "[-d|--rm] <IMAGE> [<COMMAND> [<ARG>...]]"
  - name: branch
    modes:
      - name: list
        spec: "[-l] [-a|-r]"
        guard: { option_exists: "-l" }
      - name: delete
        spec: "(-d | -D) [-f -q] <BRANCH>..."
        guard: { one_of: ["-d", "-D"] }
        indicated_by: "'-d' existing"
"#;

fn argspec(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_argspec"))
        .args(args)
        .output()
        .expect("failed to run argspec")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn write_catalog(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("failed to write catalog");
    path
}

// ---------------------------------------------------------------------------
// Grammar inspection
// ---------------------------------------------------------------------------

#[test]
fn tokenize_prints_json_tokens() {
    let output = argspec(&["tokenize", "--format", "json", "[-d|--rm] <IMAGE>"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let tokens: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let tokens = tokens.as_array().unwrap();
    assert_eq!(tokens.len(), 6);
    assert_eq!(tokens[1]["kind"], "ShortOpt");
    assert_eq!(tokens[1]["text"], "-d");
    assert_eq!(tokens[3]["text"], "--rm");
    assert_eq!(tokens[5]["kind"], "Arg");
    assert_eq!(tokens[5]["pos"], 10);
}

#[test]
fn tokenize_error_exits_one_with_caret() {
    let output = argspec(&["tokenize", "<IMAGE"]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        stderr(&output).trim_end(),
        "error: parse error at position 6:\n<IMAGE\n      ^ unclosed arg declaration"
    );
}

#[test]
fn parse_prints_canonical_form() {
    let output = argspec(&["parse", "--format", "json", "[ -d | --rm ]   <IMAGE>"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(parsed["canonical"], "[-d|--rm] <IMAGE>");
    assert!(parsed["tree"].is_object());
}

#[test]
fn parse_reports_structural_errors() {
    let output = argspec(&["parse", "[-a"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("^ unclosed optional group, expecting ']'"));
}

#[test]
fn conditions_lists_every_declared_symbol() {
    let output = argspec(&["conditions", "(-a | -b) [-v]"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("-a:"), "{text}");
    assert!(text.contains("  ConflictsWith(-b)"), "{text}");
    assert!(text.contains("-v: (none)"), "{text}");
}

// ---------------------------------------------------------------------------
// Check
// ---------------------------------------------------------------------------

#[test]
fn check_accepts_silently() {
    let output = argspec(&["check", "[-d|--rm] <IMAGE>", "--", "--rm", "ubuntu"]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert!(stdout(&output).is_empty());
}

#[test]
fn check_rejects_with_exit_two() {
    let output = argspec(&["check", "[-d|--rm] <IMAGE>", "--", "-d", "--rm", "ubuntu"]);
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(
        stdout(&output).trim_end(),
        "When '-d' is present, '--rm' is conflicting and not allowed"
    );
}

#[test]
fn check_json_and_allow_flags() {
    let output = argspec(&["check", "--format", "json", "[-v] <FILE>", "--", "-z", "a", "b"]);
    assert_eq!(output.status.code(), Some(2));
    let result: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(result["accepted"], false);
    let kinds: Vec<&str> = result["diagnostics"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["unrecognized_option", "surplus_argument"]);

    let relaxed = argspec(&[
        "check",
        "--allow-unknown",
        "--allow-surplus",
        "[-v] <FILE>",
        "--",
        "-z",
        "a",
        "b",
    ]);
    assert_eq!(relaxed.status.code(), Some(0), "stdout: {}", stdout(&relaxed));
}

// ---------------------------------------------------------------------------
// Catalog commands
// ---------------------------------------------------------------------------

#[test]
fn run_recognizes_through_alias() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(&dir, "commands.yml", CATALOG_YAML);
    let catalog = catalog.to_str().unwrap();

    let ok = argspec(&["run", "--catalog", catalog, "run", "--", "--rm", "alpine", "sh"]);
    assert_eq!(ok.status.code(), Some(0), "stderr: {}", stderr(&ok));

    let rejected = argspec(&[
        "run", "--catalog", catalog, "--format", "json", "branch", "--", "-d", "-f", "topic",
    ]);
    assert_eq!(rejected.status.code(), Some(2));
    let recognition: serde_json::Value = serde_json::from_str(&stdout(&rejected)).unwrap();
    assert_eq!(recognition["command"], "branch");
    assert_eq!(recognition["mode"], "delete");
    assert_eq!(
        recognition["diagnostics"][0]["message"],
        "When using 'branch' in delete style (indicated by '-d' existing), and '-f' is present, '-q' is required"
    );
}

#[test]
fn run_unknown_command_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(&dir, "commands.yml", CATALOG_YAML);

    let output = argspec(&["run", "--catalog", catalog.to_str().unwrap(), "push"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("unknown command: 'push'"));
}

#[test]
fn batch_reports_in_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(&dir, "commands.yml", CATALOG_YAML);
    let input = dir.path().join("invocations.txt");
    fs::write(
        &input,
        "# smoke batch\nrun --rm alpine\n\nrun\nfrobnicate x\nbranch -l -a\n",
    )
    .unwrap();

    let output = argspec(&[
        "batch",
        "--catalog",
        catalog.to_str().unwrap(),
        "--input",
        input.to_str().unwrap(),
        "--jobs",
        "2",
    ]);
    assert_eq!(output.status.code(), Some(2));
    let lines: Vec<String> = stdout(&output).lines().map(str::to_string).collect();
    assert_eq!(
        lines,
        vec![
            "2: run: ok",
            "4: run: '<IMAGE>' is required",
            "5: error: unknown command: 'frobnicate'",
            "6: branch: ok",
        ]
    );
    assert!(stderr(&output).contains("2 of 4 invocation(s) rejected."));
}

#[test]
fn batch_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(&dir, "commands.json", &serde_json::json!({
            "version": "1.0",
            "commands": [
                { "name": "cp", "modes": [{ "name": "default", "spec": "[-r] <SRC> <DST>" }] }
            ]
        })
        .to_string(),
    );
    let input = dir.path().join("invocations.txt");
    fs::write(&input, "cp -r a b\ncp a\n").unwrap();

    let output = argspec(&[
        "batch",
        "--catalog",
        catalog.to_str().unwrap(),
        "--input",
        input.to_str().unwrap(),
        "--format",
        "json",
    ]);
    assert_eq!(output.status.code(), Some(2));
    let results: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["line"], 1);
    assert!(results[0]["recognition"]["diagnostics"].as_array().unwrap().is_empty());
    assert_eq!(
        results[1]["recognition"]["diagnostics"][0]["message"],
        "'<DST>' is required"
    );
}

// ---------------------------------------------------------------------------
// Validate
// ---------------------------------------------------------------------------

#[test]
fn validate_accepts_good_catalogs() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_catalog(&dir, "a.yml", CATALOG_YAML);
    let second = write_catalog(
        &dir,
        "b.yaml",
        "version: \"1.0\"\ncommands:\n  - name: ls\n    modes: [{ name: default, spec: \"[-l] [<DIR>...]\" }]\n",
    );

    let output = argspec(&["validate", first.to_str().unwrap(), second.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        stdout(&output).trim_end(),
        "Validated 2 catalog file(s) for 3 command(s)."
    );
}

#[test]
fn validate_rejects_broken_spec() {
    let dir = tempfile::tempdir().unwrap();
    let broken = write_catalog(
        &dir,
        "broken.yml",
        "version: \"1.0\"\ncommands:\n  - name: tool\n    modes: [{ name: default, spec: \"(-a)\" }]\n",
    );

    let output = argspec(&["validate", broken.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("invalid spec for 'tool' mode 'default'"), "{err}");
}
