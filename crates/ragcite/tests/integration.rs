use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

const HANDBOOK: &str = "Employee Handbook\n\n\
Vacation Policy: Full-time employees accrue fifteen days of paid vacation per year. \
Unused vacation days carry over up to a maximum of five days. \
Requests must be submitted two weeks in advance.\n\n\
Remote Work: Employees may work remotely up to three days per week. \
Managers approve remote schedules each quarter. \
Equipment for home offices is reimbursed up to 500 dollars.\n\n\
Security: Laptops must use full disk encryption. \
Passwords rotate every ninety days. \
Report lost devices to the help desk immediately.";

fn ragcite_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_ragcite"))
}

fn setup_test_env(config: &str) -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let doc_path = root.join("handbook.txt");
    fs::write(&doc_path, HANDBOOK).unwrap();

    let config_path = root.join("ragcite.toml");
    fs::write(&config_path, config).unwrap();

    (tmp, config_path, doc_path)
}

fn run_ragcite(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ragcite_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("COHERE_API_KEY")
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ragcite binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Parse a stream of concatenated JSON documents.
fn json_stream(stdout: &str) -> Vec<Value> {
    serde_json::Deserializer::from_str(stdout)
        .into_iter::<Value>()
        .collect::<Result<_, _>>()
        .unwrap_or_else(|e| panic!("stdout is not JSON ({}): {}", e, stdout))
}

#[test]
fn test_chunk_json_reports_chunks_and_stats() {
    let (_tmp, config, doc) =
        setup_test_env("[chunking]\nchunk_size = 200\nchunk_overlap = 30\n");
    let (stdout, stderr, ok) = run_ragcite(&config, &["chunk", doc.to_str().unwrap(), "--json"]);
    assert!(ok, "chunk failed: {}", stderr);

    let value = &json_stream(&stdout)[0];
    let chunks = value["chunks"].as_array().unwrap();
    assert!(chunks.len() > 1);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk["chunk_index"], Value::from(i));
        assert_eq!(chunk["total_chunks"], Value::from(chunks.len()));
        assert!(chunk["text"].as_str().unwrap().chars().count() <= 200);
    }
    assert_eq!(value["validation_stats"]["total_chunks"], Value::from(chunks.len()));
    assert_eq!(value["chunking_params"]["chunk_overlap"], Value::from(30));
}

#[test]
fn test_chunk_human_output() {
    let (_tmp, config, doc) = setup_test_env("");
    let (stdout, _, ok) = run_ragcite(&config, &["chunk", doc.to_str().unwrap()]);
    assert!(ok);
    assert!(stdout.contains("1 chunk(s)"));
    assert!(stdout.contains("Quality:"));
}

#[test]
fn test_ask_json_answers_with_citations() {
    let (_tmp, config, doc) =
        setup_test_env("[chunking]\nchunk_size = 220\nchunk_overlap = 20\n\n[retrieval]\ntop_k = 3\n");
    let (stdout, stderr, ok) = run_ragcite(
        &config,
        &[
            "ask",
            doc.to_str().unwrap(),
            "How many vacation days do employees accrue?",
            "--json",
        ],
    );
    assert!(ok, "ask failed: {}", stderr);

    let payloads = json_stream(&stdout);
    assert_eq!(payloads.len(), 2);

    let upload = &payloads[0];
    assert_eq!(upload["success"], Value::Bool(true));
    assert!(upload["chunks_created"].as_u64().unwrap() > 1);

    let answer = &payloads[1];
    assert_eq!(answer["success"], Value::Bool(true));
    let citations = answer["citations"].as_array().unwrap();
    assert!(!citations.is_empty());
    assert!(citations.len() <= 3);
    for (i, c) in citations.iter().enumerate() {
        assert_eq!(c["id"], Value::from(i + 1));
        assert!(c["source"].as_str().unwrap().ends_with("handbook.txt"));
        assert_eq!(c["title"], Value::from("handbook"));
    }
    assert!(answer["answer"].as_str().unwrap().contains("[1]"));
    assert_eq!(answer["citation_validation"]["is_valid"], Value::Bool(true));
    assert_eq!(answer["stats"]["chunks_reranked"], Value::from(citations.len()));
    assert_eq!(answer["citation_stats"]["total_citations"], Value::from(citations.len()));
    assert!(answer["stats"]["estimated_cost"].as_f64().unwrap() > 0.0);
}

#[test]
fn test_ask_failed_question_exits_non_zero() {
    // Nothing listens on port 1, so generation fails after retrieval.
    let (_tmp, config, doc) = setup_test_env(
        "[generator]\nprovider = \"ollama\"\nurl = \"http://127.0.0.1:1\"\ntimeout_secs = 2\n",
    );
    let (stdout, stderr, ok) = run_ragcite(
        &config,
        &["ask", doc.to_str().unwrap(), "How often do passwords rotate?", "--json"],
    );
    assert!(!ok, "failed question still exited 0: {}", stdout);
    assert!(stderr.contains("1 of 1 questions failed"));

    let payloads = json_stream(&stdout);
    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads[0]["success"], Value::Bool(true));
    assert_eq!(payloads[1]["success"], Value::Bool(false));
    assert_eq!(payloads[1]["stage"], Value::from("generate"));
    assert_eq!(payloads[1]["code"], Value::from("upstream_fatal"));
}

#[test]
fn test_ask_multiple_questions_reuses_document() {
    let (_tmp, config, doc) = setup_test_env("");
    let (stdout, _, ok) = run_ragcite(
        &config,
        &[
            "ask",
            doc.to_str().unwrap(),
            "How often do passwords rotate?",
            "How many remote days are allowed?",
            "--title",
            "Handbook",
        ],
    );
    assert!(ok);
    assert!(stdout.contains("Indexed \"Handbook\""));
    assert_eq!(stdout.matches("Q: ").count(), 2);
    assert!(stdout.contains("## Sources"));
    assert!(stdout.contains("[1]"));
}

#[test]
fn test_ask_empty_document_fails_at_upload() {
    let (tmp, config, _) = setup_test_env("");
    let empty = tmp.path().join("empty.txt");
    fs::write(&empty, "   \n  ").unwrap();

    let (stdout, _, ok) = run_ragcite(&config, &["ask", empty.to_str().unwrap(), "anything?", "--json"]);
    assert!(!ok);
    let payload = &json_stream(&stdout)[0];
    assert_eq!(payload["success"], Value::Bool(false));
    assert_eq!(payload["stage"], Value::from("uploaded"));
    assert_eq!(payload["code"], Value::from("invalid_input"));
}

#[test]
fn test_info_reports_fallback_without_credentials() {
    let (_tmp, config, _) = setup_test_env("[reranker]\nprovider = \"cohere\"\n");
    let (stdout, stderr, ok) = run_ragcite(&config, &["info", "--json"]);
    assert!(ok, "info failed: {}", stderr);

    let info = &json_stream(&stdout)[0];
    assert_eq!(info["reranker"]["provider"], Value::from("cohere"));
    assert_eq!(info["reranker"]["credential_configured"], Value::Bool(false));
    assert_eq!(info["embedder"]["model"], Value::from("feature-hash"));
    assert_eq!(info["generator"]["provider"], Value::from("extractive"));
    assert_eq!(info["generator"]["model"], Value::Null);
    assert_eq!(info["documents_uploaded"], Value::from(0));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, config, _) = setup_test_env("[chunking]\nchunk_size = 100\nchunk_overlap = 200\n");
    let (_, stderr, ok) = run_ragcite(&config, &["info"]);
    assert!(!ok);
    assert!(stderr.contains("chunk_overlap"));
}

#[test]
fn test_missing_document_file() {
    let (tmp, config, _) = setup_test_env("");
    let missing = tmp.path().join("nope.txt");
    let (_, stderr, ok) = run_ragcite(&config, &["chunk", missing.to_str().unwrap()]);
    assert!(!ok);
    assert!(stderr.contains("Failed to read document"));
}
