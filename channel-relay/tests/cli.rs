use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::fs::write;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRETS: [(&str, &str); 5] = [
    ("TELEGRAM_API_ID", "123456"),
    ("TELEGRAM_API_HASH", "hash"),
    ("GEMINI_API_KEY", "gemini-key"),
    ("FB_PAGE_ID", "PAGE"),
    ("LONG_LIVED_USER_TOKEN", "LONG_TOKEN"),
];

const ONE_POST: &str = r#"<section class="tgme_channel_history js-message_history">
<div class="tgme_widget_message js-widget_message" data-post="toolbox/100">
<div class="tgme_widget_message_text js-message_text" dir="auto">A brand new tool for everyone <a href="https://example.com">here</a></div>
</div>
</section>"#;

#[test]
fn missing_secret_fails_at_startup() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("channel-relay").expect("Binary exists");
    cmd.current_dir(dir.path()).arg("run").env_clear();
    for (key, value) in SECRETS.iter().filter(|(k, _)| *k != "GEMINI_API_KEY") {
        cmd.env(key, value);
    }

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("GEMINI_API_KEY must be set"));
}

async fn mount_services(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/s/toolbox"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ONE_POST))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [ { "content": { "parts": [ { "text": "Alat baharu untuk semua!" } ] } } ]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v19.0/me/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [ { "id": "PAGE", "access_token": "PAGE_TOKEN" } ]
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v19.0/PAGE/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "PAGE_1" })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn run_relays_once_and_is_idempotent_on_rerun() {
    let server = MockServer::start().await;
    mount_services(&server).await;

    let dir = tempdir().unwrap();
    let audit_path = dir.path().join("results.json");
    let config_path = dir.path().join("relay.yaml");
    let uri = server.uri();
    write(
        &config_path,
        format!(
            "relay:\n  channel: toolbox\n  batch_limit: 5\n  pace_millis: 0\n  audit_path: {audit}\n  media_dir: {media}\nendpoints:\n  telegram_base: {uri}\n  gemini_base: {uri}\n  graph_base: {uri}\n",
            audit = audit_path.display(),
            media = dir.path().display(),
        ),
    )
    .unwrap();

    for _ in 0..2 {
        let config_path = config_path.clone();
        let cwd = dir.path().to_path_buf();
        let status = tokio::task::spawn_blocking(move || {
            let mut cmd = Command::cargo_bin("channel-relay").expect("Binary exists");
            cmd.current_dir(cwd)
                .arg("run")
                .arg("--config")
                .arg(config_path)
                .envs(SECRETS);
            cmd.assert().success();
        })
        .await;
        assert!(status.is_ok());
    }

    let records: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&audit_path).unwrap()).unwrap();
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["telegram_id"], 100);
    assert_eq!(records[0]["translated_caption"], "Alat baharu untuk semua!");
    assert_eq!(records[0]["fb_status"], "Posted");
    assert_eq!(
        records[0]["original_text"],
        "A brand new tool for everyone [here](https://example.com)"
    );
}

/// Collects emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use channel_relay::cli::{run, Cli, Commands};

    let cli = Cli {
        command: Commands::Run {
            config: Some(std::path::PathBuf::from("dummy.yaml")),
        },
    };

    let result = run(cli).await;
    assert!(result.is_err());

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
