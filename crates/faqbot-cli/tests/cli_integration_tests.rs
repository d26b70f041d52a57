//! CLI integration tests for faqbot
//!
//! Tests the faqbot CLI commands end-to-end using assert_cmd. Every test
//! runs offline against a throwaway config directory.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const KNOWLEDGE: &str = r#"[
  {
    "id": 1,
    "question": "How do I reset my password?",
    "answer": "Use the reset link on the login page.",
    "status": "published"
  },
  {
    "id": 2,
    "question": "How long does shipping take?",
    "answer": "Shipping takes five business days.",
    "status": "published",
    "category_id": 7
  },
  {
    "id": 3,
    "question": "Password rules draft",
    "answer": "Not final.",
    "status": "draft"
  }
]"#;

/// Helper to create a command isolated from the user's config and keys
#[allow(deprecated)]
fn faqbot_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("faqbot").unwrap();
    cmd.current_dir(dir.path());
    cmd.env("FAQBOT_CONFIG_DIR", dir.path().join("config"));
    cmd.env_remove("FAQBOT_API_KEY");
    cmd.env_remove("OPENAI_API_KEY");
    cmd.env("RUST_LOG", "off");
    cmd
}

fn write_knowledge(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("faq.json");
    fs::write(&path, KNOWLEDGE).unwrap();
    path
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    faqbot_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("moderate"));
}

#[test]
fn test_moderate_flags_disallowed_term() {
    let dir = TempDir::new().unwrap();
    faqbot_cmd(&dir)
        .args(["moderate", "I hate this"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("flagged"))
        .stdout(predicate::str::contains("hate"));
}

#[test]
fn test_moderate_json_clean() {
    let dir = TempDir::new().unwrap();
    let output = faqbot_cmd(&dir)
        .args(["moderate", "How do I reset my password?", "--format", "json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["flagged"], false);
    assert_eq!(json["categories"]["inappropriate"], false);
}

#[test]
fn test_ask_hello_offline_greets() {
    let dir = TempDir::new().unwrap();
    faqbot_cmd(&dir)
        .args(["ask", "hello", "--offline"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello! How can I help you today?"))
        .stdout(predicate::str::contains("provider: deterministic"));
}

#[test]
fn test_ask_surfaces_knowledge_answer() {
    let dir = TempDir::new().unwrap();
    let knowledge = write_knowledge(dir.path());

    let output = faqbot_cmd(&dir)
        .args(["ask", "How do I reset my password?", "--offline", "--format", "json"])
        .arg("--knowledge")
        .arg(&knowledge)
        .output()
        .unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["provider_used"], "deterministic");
    assert_eq!(json["relevant_entries"][0]["entry_id"], 1);
    assert!(
        json["text"]
            .as_str()
            .unwrap()
            .contains("Use the reset link on the login page.")
    );
    assert_eq!(json["moderation"]["flagged"], false);
}

#[test]
fn test_ask_blank_message_fails() {
    let dir = TempDir::new().unwrap();
    faqbot_cmd(&dir)
        .args(["ask", "   ", "--offline"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("message must not be empty"));
}

#[test]
fn test_index_writes_vectors() {
    let dir = TempDir::new().unwrap();
    let knowledge = write_knowledge(dir.path());
    let output = dir.path().join("indexed.json");

    faqbot_cmd(&dir)
        .args(["index", "--offline"])
        .arg(&knowledge)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Indexed 3 of 3 entries (384 dimensions)"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(json[0]["question_vector"].as_array().unwrap().len(), 384);
    assert_eq!(json[2]["answer_vector"].as_array().unwrap().len(), 384);
}

#[test]
fn test_search_keyword_and_category() {
    let dir = TempDir::new().unwrap();
    let knowledge = write_knowledge(dir.path());

    faqbot_cmd(&dir)
        .args(["search", "password", "--offline"])
        .arg("--knowledge")
        .arg(&knowledge)
        .assert()
        .success()
        .stdout(predicate::str::contains("#1 How do I reset my password?"))
        .stdout(predicate::str::contains("Password rules draft").not());

    faqbot_cmd(&dir)
        .args(["search", "shipping", "--offline", "--category", "7"])
        .arg("--knowledge")
        .arg(&knowledge)
        .assert()
        .success()
        .stdout(predicate::str::contains("#2 How long does shipping take?"))
        .stdout(predicate::str::contains("reset my password").not());
}

#[test]
fn test_config_list_shows_defaults() {
    let dir = TempDir::new().unwrap();
    faqbot_cmd(&dir)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("retrieval.top_k = 3"))
        .stdout(predicate::str::contains("context.max_turns = 5"));
}

#[test]
fn test_config_set_get_reset() {
    let dir = TempDir::new().unwrap();

    faqbot_cmd(&dir)
        .args(["config", "set", "retrieval.top_k", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set retrieval.top_k = 7"));

    faqbot_cmd(&dir)
        .args(["config", "get", "retrieval.top_k"])
        .assert()
        .success()
        .stdout(predicate::str::diff("7\n"));

    faqbot_cmd(&dir)
        .args(["config", "reset"])
        .assert()
        .success();

    faqbot_cmd(&dir)
        .args(["config", "get", "retrieval.top_k"])
        .assert()
        .success()
        .stdout(predicate::str::diff("3\n"));
}

#[test]
fn test_config_rejects_unknown_provider() {
    let dir = TempDir::new().unwrap();
    faqbot_cmd(&dir)
        .args(["config", "set", "generation.strategies", "hosted,magic"])
        .assert()
        .failure();
}
