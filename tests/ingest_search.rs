use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn vdx_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("vdx");
    path
}

fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buf);
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("word/document.xml", options).unwrap();
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
            .collect();
        write!(
            writer,
            r#"<?xml version="1.0"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        )
        .unwrap();
        writer.finish().unwrap();
    }
    buf.into_inner()
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let docs_dir = root.join("docs");
    fs::create_dir_all(&docs_dir).unwrap();
    fs::write(
        docs_dir.join("rust.docx"),
        docx_bytes(&[
            "Rust is a systems programming language.",
            "Cargo manages crates and builds.",
        ]),
    )
    .unwrap();
    fs::write(
        docs_dir.join("python.docx"),
        docx_bytes(&[
            "Python is used for machine learning.",
            "PyTorch is a deep learning framework.",
        ]),
    )
    .unwrap();

    let config_content = format!(
        r#"[ingest]
root = "{root}/docs"

[chunking]
chunk_size = 200
chunk_overlap = 40

[embedding]
provider = "hash"
dims = 64

[index]
dir = "{root}/index"

[server]
bind = "127.0.0.1:7431"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("vdx.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_vdx(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = vdx_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        // The test environment must never touch a real bucket.
        .env_remove("S3_BUCKET_NAME")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run vdx binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn ingest_then_search_finds_indexed_content() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_vdx(&config_path, &["ingest"]);
    assert!(success, "ingest failed:\n{}\n{}", stdout, stderr);
    assert!(stdout.contains("2 document(s) processed"), "{}", stdout);

    // Both index files exist on disk
    let index_dir = tmp.path().join("index");
    assert!(index_dir.join("vector_database.vec").exists());
    assert!(index_dir.join("vector_database.docstore").exists());

    // Persisted metadata carries provenance for every chunk
    let docstore = fs::read_to_string(index_dir.join("vector_database.docstore")).unwrap();
    let chunks: serde_json::Value = serde_json::from_str(&docstore).unwrap();
    let chunks = chunks.as_array().unwrap();
    assert!(!chunks.is_empty());
    for chunk in chunks {
        let meta = &chunk["metadata"];
        assert_eq!(meta["source_type"], "local");
        let file_name = meta["file_name"].as_str().unwrap();
        assert!(
            file_name == "rust.docx" || file_name == "python.docx",
            "unexpected file_name {}",
            file_name
        );
    }

    // Identical text embeds identically under the hash provider, so an
    // exact chunk text is its own nearest neighbor.
    let (stdout, stderr, success) = run_vdx(
        &config_path,
        &["search", "Rust is a systems programming language.", "--k", "1"],
    );
    assert!(success, "search failed:\n{}\n{}", stdout, stderr);
    assert!(stdout.contains("rust.docx"), "{}", stdout);
    assert!(stdout.contains("Rust is a systems"), "{}", stdout);
}

#[test]
fn reingest_appends_to_existing_index() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_vdx(&config_path, &["ingest"]);
    assert!(success, "{}", stdout);
    let first_total = extract_vector_count(&stdout);

    let (stdout, _, success) = run_vdx(&config_path, &["ingest"]);
    assert!(success, "{}", stdout);
    let second_total = extract_vector_count(&stdout);

    assert_eq!(second_total, first_total * 2, "{}", stdout);
}

#[test]
fn corrupt_document_does_not_abort_the_run() {
    let (tmp, config_path) = setup_test_env();
    fs::write(tmp.path().join("docs/broken.pdf"), b"not a pdf at all").unwrap();

    let (stdout, stderr, success) = run_vdx(&config_path, &["ingest"]);
    assert!(success, "ingest failed:\n{}\n{}", stdout, stderr);
    assert!(stdout.contains("2 document(s) processed"), "{}", stdout);
    assert!(stdout.contains("1 failed"), "{}", stdout);
    assert!(stdout.contains("broken.pdf"), "{}", stdout);
}

#[test]
fn dry_run_reports_counts_without_writing_index() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_vdx(&config_path, &["ingest", "--dry-run"]);
    assert!(success, "{}\n{}", stdout, stderr);
    assert!(stdout.contains("Dry run"), "{}", stdout);
    assert!(!tmp.path().join("index").exists());
}

#[test]
fn limit_caps_local_documents() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_vdx(&config_path, &["ingest", "--limit", "1"]);
    assert!(success, "{}\n{}", stdout, stderr);
    assert!(stdout.contains("1 document(s) processed"), "{}", stdout);
}

#[test]
fn search_without_index_fails_cleanly() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_vdx(&config_path, &["search", "anything"]);
    assert!(!success);
    assert!(stderr.contains("not found"), "{}", stderr);
}

/// Pulls N out of "Index '...' saved to ... (N vectors, +M)".
fn extract_vector_count(stdout: &str) -> usize {
    let line = stdout
        .lines()
        .find(|l| l.contains("vectors, +"))
        .unwrap_or_else(|| panic!("no index summary line in:\n{}", stdout));
    let start = line.rfind('(').unwrap() + 1;
    let rest = &line[start..];
    let end = rest.find(' ').unwrap();
    rest[..end].parse().unwrap()
}
