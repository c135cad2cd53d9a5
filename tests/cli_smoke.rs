use std::path::Path;
use std::process::Output;

use serde_json::json;
use tempfile::tempdir;
use tokio::process::Command;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mock_openrouter() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "id": "openai/gpt-5-mini",
                "pricing": { "prompt": "0.001", "completion": "0.002", "request": "0" }
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "done" }, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5 }
        })))
        .mount(&server)
        .await;
    server
}

async fn chatset(server: &MockServer, args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_chatset"))
        .args(args)
        .current_dir(cwd)
        .env("OPENROUTER_API_KEY", "sk-test")
        .env("OPENROUTER_BASE_URL", server.uri())
        .env_remove("RUST_LOG")
        .output()
        .await
        .unwrap()
}

fn row_count(path: &Path) -> usize {
    let raw = std::fs::read_to_string(path).unwrap();
    raw.lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
        .count()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn generate_writes_rows_and_reports_spend() {
    let server = mock_openrouter().await;
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("prompts.txt"), "first\n\nsecond\n").unwrap();

    let out = chatset(
        &server,
        &[
            "generate",
            "--model",
            "openai/gpt-5-mini",
            "-i",
            "prompts.txt",
            "-o",
            "out.jsonl",
            "-j",
            "2",
            "--no-progress",
        ],
        dir.path(),
    )
    .await;

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(out.status.success(), "stderr: {stderr}");
    assert!(stderr.contains("2 completed: 2 ok, 0 failed, spend $0.0400"), "stderr: {stderr}");
    // The run banner comes before any progress output.
    assert!(
        stderr.starts_with("[generate] 2 prompts from prompts.txt -> out.jsonl"),
        "stderr: {stderr}"
    );
    assert_eq!(row_count(&dir.path().join("out.jsonl")), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn generate_reads_yaml_config() {
    let server = mock_openrouter().await;
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("prompts.txt"), "a\nb\nc\n").unwrap();
    std::fs::write(
        dir.path().join("run.yaml"),
        "model: openai/gpt-5-mini\n\
         input: prompts.txt\n\
         output: from-config.jsonl\n\
         system_prompt: Be brief.\n\
         store_system: true\n\
         concurrency: 2\n",
    )
    .unwrap();

    // The flag overrides the output path from the file.
    let out = chatset(
        &server,
        &["generate", "--config", "run.yaml", "-o", "out.jsonl", "--no-progress"],
        dir.path(),
    )
    .await;

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(out.status.success(), "stderr: {stderr}");
    assert!(!dir.path().join("from-config.jsonl").exists());

    let raw = std::fs::read_to_string(dir.path().join("out.jsonl")).unwrap();
    let rows: Vec<serde_json::Value> = raw
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows.len(), 3);
    for row in rows {
        assert_eq!(row["messages"][0]["role"], "system");
        assert_eq!(row["messages"][0]["content"], "Be brief.");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn generate_fails_without_model_or_input() {
    let server = mock_openrouter().await;
    let dir = tempdir().unwrap();

    let out = chatset(
        &server,
        &["generate", "-i", "prompts.txt", "-o", "out.jsonl", "--no-progress"],
        dir.path(),
    )
    .await;
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("model"));

    let out = chatset(
        &server,
        &[
            "generate",
            "--model",
            "openai/gpt-5-mini",
            "-i",
            "missing.txt",
            "-o",
            "out.jsonl",
            "--no-progress",
        ],
        dir.path(),
    )
    .await;
    assert!(!out.status.success());
    assert!(!dir.path().join("out.jsonl").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pricing_command_prints_catalog_rates() {
    let server = mock_openrouter().await;
    let dir = tempdir().unwrap();

    let out = chatset(&server, &["pricing", "--model", "openai/gpt-5-mini"], dir.path()).await;
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("completion: $0.0020000000/token"), "stdout: {stdout}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn no_store_system_flag_overrides_config_file() {
    let server = mock_openrouter().await;
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("prompts.txt"), "a\n").unwrap();
    std::fs::write(
        dir.path().join("run.yaml"),
        "model: openai/gpt-5-mini\n\
         input: prompts.txt\n\
         output: out.jsonl\n\
         system_prompt: Be brief.\n\
         store_system: true\n",
    )
    .unwrap();

    let out = chatset(
        &server,
        &["generate", "--config", "run.yaml", "--no-store-system", "--no-progress"],
        dir.path(),
    )
    .await;
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(out.status.success(), "stderr: {stderr}");

    let raw = std::fs::read_to_string(dir.path().join("out.jsonl")).unwrap();
    let row: serde_json::Value = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
    assert_eq!(row["messages"][0]["role"], "user");
    assert_eq!(row["messages"].as_array().unwrap().len(), 2);

    let out = chatset(
        &server,
        &[
            "generate",
            "--config",
            "run.yaml",
            "--store-system",
            "--no-store-system",
        ],
        dir.path(),
    )
    .await;
    assert!(!out.status.success(), "conflicting flags must be rejected");
}
