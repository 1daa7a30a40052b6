use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn setup_test_env(extra: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    fs::write(
        root.join("grounding.txt"),
        "Acme Corp, Berlin.\n\nSalary: 80k-110k EUR.\n\nBenefits: 30 vacation days.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/jobpost.sqlite"

[source]
path = "{root}/grounding.txt"

[server]
bind = "127.0.0.1:4004"
{extra}
"#,
        root = root.display(),
        extra = extra,
    );

    let config_path = config_dir.join("jobpost.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_jobpost(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_jobpost"))
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("OPENAI_API_KEY")
        .output()
        .expect("failed to run jobpost binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_jobpost(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/jobpost.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env("");

    let (_, _, first) = run_jobpost(&config_path, &["init"]);
    assert!(first, "first init failed");
    let (_, _, second) = run_jobpost(&config_path, &["init"]);
    assert!(second, "second init failed (not idempotent)");
}

#[test]
fn test_list_empty() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_jobpost(&config_path, &["list"]);
    assert!(success, "list failed: {}", stderr);
    assert!(stdout.contains("No job postings recorded."));
}

#[test]
fn test_delete_commands_succeed_on_empty_store() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_jobpost(&config_path, &["delete", "missing-id"]);
    assert!(success, "delete failed: {}", stderr);
    assert!(stdout.contains("nothing to delete"));

    let (stdout, _, success) = run_jobpost(&config_path, &["delete-all"]);
    assert!(success);
    assert!(stdout.contains("Deleted 0 job postings"));

    let (stdout, _, success) = run_jobpost(&config_path, &["clear-chunks"]);
    assert!(success);
    assert!(stdout.contains("Deleted 0 embedded chunks"));
}

#[test]
fn test_ingest_fails_when_embeddings_disabled() {
    let (_tmp, config_path) = setup_test_env("");

    let (_, stderr, success) = run_jobpost(&config_path, &["ingest"]);
    assert!(!success);
    assert!(stderr.contains("disabled"), "stderr: {}", stderr);
}

#[test]
fn test_create_blank_query_rejected() {
    let (_tmp, config_path) = setup_test_env("");

    let (_, stderr, success) = run_jobpost(&config_path, &["create", "  "]);
    assert!(!success);
    assert!(stderr.contains("user_query"), "stderr: {}", stderr);
}

#[test]
fn test_openai_provider_requires_api_key() {
    let (_tmp, config_path) = setup_test_env(
        "[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\ndims = 1536\n",
    );

    let (_, stderr, success) = run_jobpost(&config_path, &["list"]);
    assert!(!success);
    assert!(stderr.contains("OPENAI_API_KEY"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_rejected() {
    let (_tmp, config_path) =
        setup_test_env("[chunking]\nmax_chunk_size = 50\noverlap = 50\n");

    let (_, stderr, success) = run_jobpost(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("overlap"), "stderr: {}", stderr);
}
