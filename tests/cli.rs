//! CLI test cases.
//!
//! Most of these run with `--pdf-backend none --ocr none`, so they behave the
//! same whether or not poppler and tesseract are installed. Tests that need the
//! real tools are marked `#[ignore]`.

use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;

/// A three-page PDF with one line of text per page.
static THREE_PAGES: &str = "tests/fixtures/three-pages.pdf";

/// Create a new `Command` with our binary.
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("pdf-playground").unwrap();
    // Don't pick up pipelines from the developer's environment.
    cmd.env_remove("SURYA_COMMAND")
        .env_remove("DOCLING_COMMAND")
        .env_remove("MINERU_COMMAND");
    cmd
}

/// Run a command and parse its standard output as JSON.
fn json_output(cmd: &mut Command) -> Value {
    let output = cmd.output().unwrap();
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_help() {
    cmd().arg("--help").assert().success();
}

#[test]
fn test_version() {
    cmd().arg("--version").assert().success();
}

#[test]
fn test_health_without_backends() {
    let report = json_output(
        cmd()
            .arg("health")
            .arg("--pdf-backend")
            .arg("none")
            .arg("--ocr")
            .arg("none"),
    );
    assert_eq!(report["status"], "ok");
    assert_eq!(report["pdf_backend"]["active"], false);
    assert!(report["pdf_backend"]["reason"].is_string());
    assert_eq!(report["ocr"]["active"], false);
    assert_eq!(
        report["engines"],
        serde_json::json!(["surya", "docling", "mineru"])
    );
    assert_eq!(report["pipelines"]["docling"], false);
}

#[test]
fn test_health_reports_configured_pipelines() {
    let report = json_output(
        cmd()
            .env("MINERU_COMMAND", "mineru-bridge --fast")
            .args(["health", "--pdf-backend", "none", "--ocr", "none"]),
    );
    assert_eq!(report["pipelines"]["mineru"], true);
    assert_eq!(report["pipelines"]["surya"], false);
}

#[test]
fn test_schema() {
    for schema_type in ["ExtractResponse", "HealthReport", "PipelineOutput"] {
        cmd()
            .arg("schema")
            .arg(schema_type)
            .assert()
            .success()
            .stdout(predicate::str::contains(schema_type));
    }
}

#[test]
fn test_extract_rejects_empty_files() {
    let dir = tempfile::TempDir::with_prefix("cli-test").unwrap();
    let path = dir.path().join("empty.pdf");
    std::fs::write(&path, b"").unwrap();
    cmd()
        .arg("extract")
        .arg(&path)
        .args(["--pdf-backend", "none", "--ocr", "none"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("empty file"));
}

#[test]
fn test_extract_rejects_non_pdf_files() {
    cmd()
        .arg("extract")
        .arg("Cargo.toml")
        .args(["--pdf-backend", "none", "--ocr", "none"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported format"));
}

#[test]
fn test_extract_placeholder_mode() {
    let response = json_output(cmd().arg("extract").arg(THREE_PAGES).args([
        "--pdf-backend",
        "none",
        "--ocr",
        "none",
        "--models",
        "Docling,foo",
    ]));

    // The fixture is small, so the synthetic document has one page.
    assert_eq!(response["pages"], 1);
    let models = response["models"].as_object().unwrap();
    assert_eq!(models.keys().collect::<Vec<_>>(), vec!["docling", "foo"]);
    for output in models.values() {
        assert_eq!(output["meta"]["tier"], "placeholder");
        assert_eq!(output["meta"]["confidence"], 0.25);
        assert_eq!(output["meta"]["block_count"], 0);
        let images = output["annotated_images"].as_array().unwrap();
        assert_eq!(images.len(), 1);
        assert!(
            images[0]
                .as_str()
                .unwrap()
                .starts_with("data:image/png;base64,")
        );
    }
    assert!(
        models["foo"]["text_markdown"]
            .as_str()
            .unwrap()
            .starts_with("# Page 1 (Surya, placeholder)")
    );
}

#[test]
fn test_extract_writes_output_file() {
    let dir = tempfile::TempDir::with_prefix("cli-test").unwrap();
    let out = dir.path().join("out.json");
    cmd()
        .arg("extract")
        .arg(THREE_PAGES)
        .args(["--pdf-backend", "none", "--ocr", "none", "--models", "mineru"])
        .arg("-o")
        .arg(&out)
        .assert()
        .success();
    let response: Value = serde_json::from_slice(&std::fs::read(&out).unwrap()).unwrap();
    assert!(response["models"]["mineru"].is_object());
}

#[test]
fn test_extract_rejects_inverted_ranges() {
    cmd()
        .arg("extract")
        .arg(THREE_PAGES)
        .args(["--pdf-backend", "none", "--ocr", "none"])
        .args(["--page-start", "3", "--page-end", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid page range"));
}

#[test]
#[ignore = "Requires poppler-utils to be installed"]
fn test_extract_docling_pages_two_and_three() {
    let response = json_output(cmd().arg("extract").arg(THREE_PAGES).args([
        "--pdf-backend",
        "poppler",
        "--ocr",
        "none",
        "--models",
        "docling",
        "--page-start",
        "2",
        "--page-end",
        "3",
    ]));
    assert_eq!(response["pages"], 2);
    let docling = &response["models"]["docling"];
    assert_eq!(docling["meta"]["tier"], "native_text");
    assert!(docling["meta"].get("confidence").is_none());
    assert_eq!(docling["annotated_images"].as_array().unwrap().len(), 2);
    let text = docling["text_markdown"].as_str().unwrap();
    assert!(text.contains("Page 2 heading"));
    assert!(text.contains("Page 3 heading"));
    assert!(!text.contains("Page 1 heading"));
}
