//! Integration tests for `shelf add --file`.
//!
//! Text files import as-is; PDFs go through text extraction and either
//! import with `doc_type = "pdf"` or fail cleanly without writing anything.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn shelf_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_shelf"))
}

/// Minimal PDF whose page draws "shelf test phrase".
/// Builds body then xref with correct byte offsets so pdf-extract can parse it.
fn minimal_pdf_with_phrase() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(b"4 0 obj << /Length 45 >> stream\nBT /F1 12 Tf 100 700 Td (shelf test phrase) Tj ET\nendstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn setup_file_support_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    fs::create_dir_all(root.join("files")).unwrap();

    let config_content = format!(
        r#"[storage]
root = "{}/data"

[embedding]
provider = "hash"
dims = 64
"#,
        root.display()
    );
    let config_path = root.join("shelf.toml");
    fs::write(&config_path, config_content).unwrap();
    (tmp, config_path)
}

fn run_shelf(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(shelf_binary())
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run shelf: {}", e));
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn list_json(config_path: &Path) -> Vec<serde_json::Value> {
    let (stdout, stderr, success) = run_shelf(config_path, &["list", "--json"]);
    assert!(success, "list failed: {}", stderr);
    serde_json::from_str::<serde_json::Value>(&stdout)
        .unwrap()
        .as_array()
        .unwrap()
        .clone()
}

#[test]
fn text_file_import_uses_stem_as_title() {
    let (tmp, config_path) = setup_file_support_env();
    let path = tmp.path().join("files/reading-list.md");
    fs::write(&path, "# Reading list\n\nDune, Solaris, Piranesi\n").unwrap();

    let (stdout, stderr, success) =
        run_shelf(&config_path, &["add", "--file", path.to_str().unwrap()]);
    assert!(success, "add --file failed: stdout={}, stderr={}", stdout, stderr);

    let docs = list_json(&config_path);
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["title"], "reading-list");
    assert!(docs[0]["content"].as_str().unwrap().contains("Solaris"));
    assert_eq!(docs[0]["source"], path.display().to_string());
}

#[test]
fn explicit_title_overrides_file_stem() {
    let (tmp, config_path) = setup_file_support_env();
    let path = tmp.path().join("files/untitled.txt");
    fs::write(&path, "some body text").unwrap();

    let (_, stderr, success) = run_shelf(
        &config_path,
        &["add", "--file", path.to_str().unwrap(), "--title", "Named"],
    );
    assert!(success, "add failed: {}", stderr);
    assert_eq!(list_json(&config_path)[0]["title"], "Named");
}

#[test]
fn pdf_import_is_tagged_or_rejected_cleanly() {
    let (tmp, config_path) = setup_file_support_env();
    let path = tmp.path().join("files/report.pdf");
    fs::write(&path, minimal_pdf_with_phrase()).unwrap();

    let (_, stderr, success) = run_shelf(&config_path, &["add", "--file", path.to_str().unwrap()]);

    let docs = list_json(&config_path);
    if success {
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["doc_type"], "pdf");
        assert_eq!(docs[0]["title"], "report");
    } else {
        // Minimal hand-built PDFs may yield no extractable text.
        assert!(stderr.contains("Failed to import"), "stderr: {}", stderr);
        assert!(docs.is_empty());
    }
}

#[test]
fn corrupt_pdf_writes_nothing() {
    let (tmp, config_path) = setup_file_support_env();
    let path = tmp.path().join("files/broken.pdf");
    fs::write(&path, b"%PDF-1.4 this is not really a pdf").unwrap();

    let (_, stderr, success) = run_shelf(&config_path, &["add", "--file", path.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("Failed to import"), "stderr: {}", stderr);
    assert!(list_json(&config_path).is_empty());
}

#[test]
fn binary_file_is_rejected() {
    let (tmp, config_path) = setup_file_support_env();
    let path = tmp.path().join("files/image.bin");
    fs::write(&path, [0xffu8, 0xd8, 0xff, 0xe0, 0x00, 0x10]).unwrap();

    let (_, stderr, success) = run_shelf(&config_path, &["add", "--file", path.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("UTF-8"), "stderr: {}", stderr);
}

#[test]
fn missing_file_is_an_error() {
    let (tmp, config_path) = setup_file_support_env();
    let path = tmp.path().join("files/nope.txt");
    let (_, _, success) = run_shelf(&config_path, &["add", "--file", path.to_str().unwrap()]);
    assert!(!success);
}
