//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the Slack Web API and run the
//! full crawl cycle end-to-end over real HTTP.

use serde_json::{json, Value};
use slack_harvest::api::SlackApi;
use slack_harvest::cache::EntityCache;
use slack_harvest::config::{parse_config, Config};
use slack_harvest::crawler::{crawl, Coordinator, IndexRecord, RecordKind};
use slack_harvest::extract::{ContentExtractor, ExtractError};
use slack_harvest::storage::{MemoryStorage, RecordSink, SqliteStorage, StorageResult};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

const TOKEN: &str = "xoxb-test";

/// Builds a config pointing at the mock server
fn create_test_config(server: &MockServer, channels: &str, extra: &str) -> Config {
    parse_config(&format!(
        r#"
[slack]
token = "{token}"
api-base-url = "{base}/"
channels = "{channels}"

[crawler]
thread-count = 2
queue-capacity = 4
shutdown-grace-secs = 5

[output]
database-path = ":memory:"

{extra}
"#,
        token = TOKEN,
        base = server.uri(),
        channels = channels,
        extra = extra
    ))
    .expect("test config should parse")
}

/// GET on a Web API method carrying the bearer token
fn slack_method(name: &str) -> MockBuilder {
    Mock::given(method("GET"))
        .and(path(format!("/{}", name)))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
}

fn ok(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

/// Mounts `users.list`, `conversations.list` and `team.info`
async fn mount_workspace(server: &MockServer) {
    mount_directory(server).await;

    slack_method("team.info")
        .respond_with(ok(json!({
            "ok": true,
            "team": {"id": "T1", "name": "Acme", "domain": "acme"}
        })))
        .mount(server)
        .await;
}

/// Mounts `users.list` and `conversations.list`
async fn mount_directory(server: &MockServer) {
    slack_method("users.list")
        .respond_with(ok(json!({
            "ok": true,
            "members": [
                {"id": "U1", "name": "alice", "profile": {"display_name": "Alice"}},
                {"id": "U2", "name": "bob", "real_name": "Bob Builder"}
            ],
            "response_metadata": {"next_cursor": ""}
        })))
        .mount(server)
        .await;

    slack_method("conversations.list")
        .respond_with(ok(json!({
            "ok": true,
            "channels": [
                {"id": "C1", "name": "general", "is_channel": true},
                {"id": "C2", "name": "random", "is_channel": true}
            ],
            "response_metadata": {"next_cursor": ""}
        })))
        .mount(server)
        .await;
}

async fn mount_history(server: &MockServer, channel: &str, messages: Value) {
    slack_method("conversations.history")
        .and(query_param("channel", channel))
        .respond_with(ok(json!({
            "ok": true,
            "messages": messages,
            "response_metadata": {"next_cursor": ""}
        })))
        .mount(server)
        .await;
}

async fn mount_files(server: &MockServer, channel: &str, files: Value) {
    slack_method("files.list")
        .and(query_param("channel", channel))
        .respond_with(ok(json!({
            "ok": true,
            "files": files,
            "paging": {"count": 100, "total": 1, "page": 1, "pages": 1}
        })))
        .mount(server)
        .await;
}

struct CountingExtractor(AtomicUsize);

impl ContentExtractor for CountingExtractor {
    fn extract(&self, bytes: &[u8], _mimetype: &str) -> Result<String, ExtractError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Sink that panics on one message text and stores the rest
struct PanickingSink {
    inner: Arc<MemoryStorage>,
    trigger: &'static str,
}

impl RecordSink for PanickingSink {
    fn store(&self, record: &IndexRecord) -> StorageResult<()> {
        if record.text == self.trigger {
            panic!("sink cannot store {:?}", record.text);
        }
        self.inner.store(record)
    }
}

#[tokio::test]
async fn test_full_crawl_messages_threads_and_files() {
    let server = MockServer::start().await;
    mount_workspace(&server).await;

    mount_history(
        &server,
        "C1",
        json!([
            {"type": "message", "ts": "100.000100", "user": "U1", "text": "first",
             "attachments": [{"fallback": "preview one"}, {"fallback": ""}, {"fallback": "preview two"}]},
            {"type": "message", "ts": "200.000200", "thread_ts": "200.000200", "user": "U2", "text": "parent"},
            {"type": "message", "ts": "300.000300", "user": "U1", "text": "third"}
        ]),
    )
    .await;
    mount_history(&server, "C2", json!([])).await;

    slack_method("conversations.replies")
        .and(query_param("channel", "C1"))
        .and(query_param("ts", "200.000200"))
        .respond_with(ok(json!({
            "ok": true,
            "messages": [
                {"type": "message", "ts": "200.000200", "thread_ts": "200.000200", "user": "U2", "text": "parent"},
                {"type": "message", "ts": "201.000000", "thread_ts": "200.000200", "user": "U1", "text": "reply one"},
                {"type": "message", "ts": "202.000000", "thread_ts": "200.000200", "user": "U2", "text": "reply two"},
                {"type": "message", "ts": "203.000000", "thread_ts": "200.000200", "user": "U1",
                 "text": "also in channel", "subtype": "thread_broadcast", "is_thread_broadcast": true}
            ],
            "response_metadata": {"next_cursor": ""}
        })))
        .expect(1)
        .mount(&server)
        .await;

    mount_files(&server, "C1", json!([])).await;
    mount_files(
        &server,
        "C2",
        json!([{
            "id": "F1",
            "name": "notes.txt",
            "title": "Meeting notes",
            "mimetype": "text/plain",
            "size": 11,
            "timestamp": 1700000000,
            "user": "U1",
            "url_private_download": format!("{}/download/F1/notes.txt", server.uri()),
            "permalink": "https://acme.slack.com/files/U1/F1/notes.txt"
        }]),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/download/F1/notes.txt"))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello world"))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(
        &server,
        "*",
        r#"
[files]
enabled = true
mime-types = ["text/.*"]

[default-fields]
source = "slack"
"#,
    );
    let storage = Arc::new(MemoryStorage::new());
    let coordinator = Coordinator::new(config, storage.clone(), storage.clone()).unwrap();

    let summary = coordinator.run().await.unwrap();

    assert!(storage.failures().is_empty(), "unexpected failures: {:?}", storage.failures());
    assert_eq!(summary.channels, 2);
    assert_eq!(summary.messages, 3);
    assert_eq!(summary.replies, 2);
    assert_eq!(summary.files, 1);
    assert_eq!(summary.indexed, 6);
    assert_eq!(summary.failed, 0);

    let records = storage.records();
    assert_eq!(records.len(), 6);

    let first = records.iter().find(|r| r.text == "first").unwrap();
    assert_eq!(first.user, "Alice");
    assert_eq!(first.channel, "general");
    assert_eq!(first.permalink, "https://acme.slack.com/archives/C1/p100000100");
    assert_eq!(first.timestamp, 100_000);
    assert_eq!(first.attachments, "preview one\npreview two");
    assert_eq!(first.fields.get("source").map(String::as_str), Some("slack"));

    let replies: Vec<_> = records.iter().filter(|r| r.kind == RecordKind::Reply).collect();
    assert_eq!(replies.len(), 2);
    assert!(replies.iter().all(|r| r.text.starts_with("reply")));
    assert!(records.iter().all(|r| r.text != "also in channel"));

    let parent = records.iter().find(|r| r.text == "parent").unwrap();
    assert_eq!(parent.user, "Bob Builder");
    assert_eq!(parent.kind, RecordKind::Message);

    let file = records.iter().find(|r| r.kind == RecordKind::File).unwrap();
    assert_eq!(file.title, "Meeting notes");
    assert_eq!(file.text, "hello world");
    assert_eq!(file.user, "Alice");
    assert_eq!(file.channel, "random");
    assert_eq!(file.timestamp, 1_700_000_000_000);
}

#[tokio::test]
async fn test_oversized_file_is_rejected_before_download() {
    let server = MockServer::start().await;
    mount_workspace(&server).await;
    mount_history(&server, "C1", json!([])).await;
    mount_history(&server, "C2", json!([])).await;
    mount_files(&server, "C2", json!([])).await;
    mount_files(
        &server,
        "C1",
        json!([{
            "id": "F9",
            "name": "dump.log",
            "mimetype": "text/plain",
            "size": 1000,
            "timestamp": 1700000000,
            "url_private_download": format!("{}/download/F9/dump.log", server.uri()),
            "permalink": "https://acme.slack.com/files/U1/F9/dump.log"
        }]),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/download/F9/dump.log"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(1000)))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(
        &server,
        "*",
        r#"
[files]
enabled = true
max-size = 100
"#,
    );
    let storage = Arc::new(MemoryStorage::new());
    let extractor = Arc::new(CountingExtractor(AtomicUsize::new(0)));
    let coordinator = Coordinator::new(config, storage.clone(), storage.clone())
        .unwrap()
        .with_extractor(extractor.clone());

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.indexed, 0);
    assert_eq!(extractor.0.load(Ordering::SeqCst), 0);

    let failures = storage.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].classification, "FileTooLarge");
    assert_eq!(failures[0].url, "https://acme.slack.com/files/U1/F9/dump.log");
}

#[tokio::test]
async fn test_unresolvable_channel_name_is_skipped() {
    let server = MockServer::start().await;
    mount_workspace(&server).await;
    mount_history(
        &server,
        "C1",
        json!([{"type": "message", "ts": "1.000001", "user": "U1", "text": "hi"}]),
    )
    .await;

    slack_method("conversations.info")
        .and(query_param("channel", "missing"))
        .respond_with(ok(json!({"ok": false, "error": "channel_not_found"})))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, "#general, missing", "");
    let storage = Arc::new(MemoryStorage::new());
    let coordinator = Coordinator::new(config, storage.clone(), storage.clone()).unwrap();

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.channels, 1);
    assert_eq!(summary.indexed, 1);
    assert_eq!(storage.records()[0].channel, "general");
}

#[tokio::test]
async fn test_api_error_stops_pagination_without_failing_run() {
    let server = MockServer::start().await;
    mount_workspace(&server).await;

    // More specific mock first: wiremock serves the first match
    slack_method("conversations.history")
        .and(query_param("channel", "C1"))
        .and(query_param("cursor", "page2"))
        .respond_with(ok(json!({
            "ok": false,
            "error": "ratelimited",
            "messages": [{"type": "message", "ts": "9.000000", "user": "U1", "text": "never"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    slack_method("conversations.history")
        .and(query_param("channel", "C1"))
        .respond_with(ok(json!({
            "ok": true,
            "messages": [{"type": "message", "ts": "1.000000", "user": "U1", "text": "kept"}],
            "response_metadata": {"next_cursor": "page2"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, "general", "");
    let storage = Arc::new(MemoryStorage::new());
    let coordinator = Coordinator::new(config, storage.clone(), storage.clone()).unwrap();

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.messages, 1);
    let records = storage.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].text, "kept");
}

#[tokio::test]
async fn test_files_are_paged_by_number() {
    let server = MockServer::start().await;
    mount_workspace(&server).await;
    mount_history(&server, "C1", json!([])).await;

    slack_method("files.list")
        .and(query_param("channel", "C1"))
        .and(query_param("page", "1"))
        .respond_with(ok(json!({
            "ok": true,
            "files": [{"id": "F1", "mimetype": "image/png", "size": 10}],
            "paging": {"count": 1, "total": 2, "page": 1, "pages": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;
    slack_method("files.list")
        .and(query_param("channel", "C1"))
        .and(query_param("page", "2"))
        .respond_with(ok(json!({
            "ok": true,
            "files": [{"id": "F2", "mimetype": "image/png", "size": 10}],
            "paging": {"count": 1, "total": 2, "page": 2, "pages": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(
        &server,
        "general",
        r#"
[files]
enabled = true
mime-types = ["text/.*"]
"#,
    );
    let storage = Arc::new(MemoryStorage::new());
    let coordinator = Coordinator::new(config, storage.clone(), storage.clone()).unwrap();

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.files, 2);
    assert_eq!(summary.skipped, 2);
    assert!(storage.records().is_empty());
    assert!(storage.failures().is_empty());
}

#[tokio::test]
async fn test_undecodable_response_aborts_run() {
    let server = MockServer::start().await;
    mount_workspace(&server).await;

    slack_method("conversations.history")
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let config = create_test_config(&server, "general", "");
    let storage = Arc::new(MemoryStorage::new());
    let coordinator = Coordinator::new(config, storage.clone(), storage.clone()).unwrap();

    let err = coordinator.run().await.unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.classification(), "DecodeError");
}

#[tokio::test]
async fn test_prefetch_keys_entities_by_id_and_name() {
    let server = MockServer::start().await;
    mount_workspace(&server).await;

    slack_method("users.info").respond_with(ok(json!({"ok": false, "error": "user_not_found"})))
        .expect(0)
        .mount(&server)
        .await;
    slack_method("conversations.info")
        .respond_with(ok(json!({"ok": false, "error": "channel_not_found"})))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server, "*", "");
    let api = Arc::new(SlackApi::new(&config.slack, config.page_size.clone()).unwrap());
    let cache = EntityCache::new(api, &config.cache);

    let counts = cache.prefetch(config.slack.conversation_types()).await.unwrap();
    assert_eq!(counts.users, 2);
    assert_eq!(counts.channels, 2);

    assert_eq!(cache.user("U1").await.unwrap(), cache.user("alice").await.unwrap());
    assert_eq!(cache.channel("C2").await.unwrap(), cache.channel("random").await.unwrap());
    assert_eq!(cache.stats().api_calls, 0);
}

#[tokio::test]
async fn test_crawl_into_sqlite_records_run() {
    let server = MockServer::start().await;
    mount_workspace(&server).await;
    mount_history(
        &server,
        "C1",
        json!([{"type": "message", "ts": "5.000000", "user": "U2", "text": "stored"}]),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");
    let mut config = create_test_config(&server, "general", "");
    config.output.database_path = db_path.display().to_string();

    let summary = crawl(config, "test-hash").await.unwrap();
    assert_eq!(summary.indexed, 1);

    let storage = SqliteStorage::new(Path::new(&db_path)).unwrap();
    let records = storage.load_records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].permalink, "https://acme.slack.com/archives/C1/p5000000");

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.config_hash, "test-hash");
    assert_eq!(run.status.to_db_string(), "completed");
}

#[tokio::test]
async fn test_panicking_item_is_recorded_as_failure() {
    let server = MockServer::start().await;
    mount_workspace(&server).await;
    mount_history(
        &server,
        "C1",
        json!([
            {"type": "message", "ts": "10.000000", "user": "U1", "text": "boom"},
            {"type": "message", "ts": "11.000000", "user": "U1", "text": "fine"}
        ]),
    )
    .await;

    let config = create_test_config(&server, "general", "");
    let storage = Arc::new(MemoryStorage::new());
    let sink = Arc::new(PanickingSink {
        inner: storage.clone(),
        trigger: "boom",
    });
    let coordinator = Coordinator::new(config, sink, storage.clone()).unwrap();

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.messages, 2);
    assert_eq!(summary.indexed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.panicked, 1);
    assert_eq!(summary.indexed + summary.skipped + summary.failed, summary.discovered());

    let failures = storage.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].classification, "Panic");
    assert_eq!(failures[0].url, "https://acme.slack.com/archives/C1/p10000000");
    assert!(failures[0].message.contains("sink cannot store"));

    let records = storage.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].text, "fine");
}

#[tokio::test]
async fn test_permalink_looked_up_without_team_metadata() {
    let server = MockServer::start().await;
    mount_directory(&server).await;

    slack_method("team.info")
        .respond_with(ok(json!({"ok": false, "error": "missing_scope"})))
        .expect(1)
        .mount(&server)
        .await;
    slack_method("chat.getPermalink")
        .and(query_param("channel", "C1"))
        .and(query_param("message_ts", "42.000100"))
        .respond_with(ok(json!({
            "ok": true,
            "channel": "C1",
            "permalink": "https://acme.enterprise.slack.com/archives/C1/p42000100"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_history(
        &server,
        "C1",
        json!([{"type": "message", "ts": "42.000100", "user": "U1", "text": "linked"}]),
    )
    .await;

    let config = create_test_config(&server, "general", "");
    let storage = Arc::new(MemoryStorage::new());
    let coordinator = Coordinator::new(config, storage.clone(), storage.clone()).unwrap();

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.indexed, 1);
    let records = storage.records();
    assert_eq!(
        records[0].permalink,
        "https://acme.enterprise.slack.com/archives/C1/p42000100"
    );
}

#[tokio::test]
async fn test_incomplete_file_is_refreshed_with_files_info() {
    let server = MockServer::start().await;
    mount_workspace(&server).await;
    mount_history(&server, "C1", json!([])).await;
    mount_files(
        &server,
        "C1",
        json!([{"id": "F7", "name": "todo.txt", "mimetype": "text/plain", "size": 5}]),
    )
    .await;

    slack_method("files.info")
        .and(query_param("file", "F7"))
        .respond_with(ok(json!({
            "ok": true,
            "file": {
                "id": "F7",
                "name": "todo.txt",
                "mimetype": "text/plain",
                "size": 5,
                "timestamp": 1700000100,
                "user": "U2",
                "url_private_download": format!("{}/download/F7/todo.txt", server.uri()),
                "permalink": "https://acme.slack.com/files/U2/F7/todo.txt"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download/F7/todo.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ship"))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(
        &server,
        "general",
        r#"
[files]
enabled = true
"#,
    );
    let storage = Arc::new(MemoryStorage::new());
    let coordinator = Coordinator::new(config, storage.clone(), storage.clone()).unwrap();

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.indexed, 1);
    let records = storage.records();
    assert_eq!(records[0].kind, RecordKind::File);
    assert_eq!(records[0].text, "ship");
    assert_eq!(records[0].user, "Bob Builder");
    assert_eq!(records[0].permalink, "https://acme.slack.com/files/U2/F7/todo.txt");
}

#[tokio::test]
async fn test_extraction_failure_reported_when_not_ignored() {
    struct RejectingExtractor;

    impl ContentExtractor for RejectingExtractor {
        fn extract(&self, _bytes: &[u8], _mimetype: &str) -> Result<String, ExtractError> {
            Err(ExtractError::Failed("truncated archive".to_string()))
        }
    }

    let server = MockServer::start().await;
    mount_workspace(&server).await;
    mount_history(&server, "C1", json!([])).await;
    mount_files(
        &server,
        "C1",
        json!([{
            "id": "F8",
            "mimetype": "application/zip",
            "size": 3,
            "url_private_download": format!("{}/download/F8/a.zip", server.uri()),
            "permalink": "https://acme.slack.com/files/U1/F8/a.zip"
        }]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/download/F8/a.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_string("PK!"))
        .mount(&server)
        .await;

    let config = create_test_config(
        &server,
        "general",
        r#"
[files]
enabled = true
ignore-error = false
"#,
    );
    let storage = Arc::new(MemoryStorage::new());
    let coordinator = Coordinator::new(config, storage.clone(), storage.clone())
        .unwrap()
        .with_extractor(Arc::new(RejectingExtractor));

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert!(storage.records().is_empty());
    let failures = storage.failures();
    assert_eq!(failures[0].classification, "ExtractionFailed");
    assert_eq!(failures[0].url, "https://acme.slack.com/files/U1/F8/a.zip");
}
