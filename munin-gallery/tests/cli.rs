use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, NamedTempFile};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Config with a single archive source that cannot be reached.
fn create_unreachable_config() -> NamedTempFile {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    write(
        config.path(),
        "sources:\n  - name: offline\n    type: archive\n    url: \"http://127.0.0.1:9/plugins.tar.gz\"\n    path: plugins\nworkers: 1\n",
    )
    .expect("Writing temp config failed");
    config
}

#[test]
fn help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("munin-gallery").expect("Binary exists");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("collect").and(predicate::str::contains("inspect")));
}

#[test]
fn collect_survives_unreachable_source() {
    let config = create_unreachable_config();
    let mut cmd = Command::cargo_bin("munin-gallery").expect("Binary exists");
    cmd.arg("collect").arg("--config").arg(config.path());

    cmd.assert()
        .success()
        .stdout(
            predicate::str::contains("failed sources: offline")
                .and(predicate::str::contains("all: 0")),
        );
}

#[test]
fn collect_rejects_invalid_config() {
    let config = NamedTempFile::new().unwrap();
    write(config.path(), "queue_capacity: 0\n").unwrap();
    let mut cmd = Command::cargo_bin("munin-gallery").expect("Binary exists");
    cmd.arg("collect")
        .arg("--config")
        .arg(config.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("queue_capacity"));
}

#[test]
fn inspect_prints_plugin_details() {
    let dir = tempdir().unwrap();
    let plugin = dir.path().join("apache_accesses.in");
    write(
        &plugin,
        "#!/usr/bin/perl\n#%# family=auto\n#%# capabilities=autoconf\nprint \"graph_category webserver\\n\";\n",
    )
    .unwrap();
    write(dir.path().join("README"), "").unwrap();

    let mut cmd = Command::cargo_bin("munin-gallery").expect("Binary exists");
    cmd.arg("inspect")
        .arg(&plugin)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"name\": \"apache_accesses\"")
                .and(predicate::str::contains("\"family\": \"auto\""))
                .and(predicate::str::contains("\"webserver\""))
                .and(predicate::str::contains("\"documentation\": false")),
        );
}

#[test]
fn inspect_fails_for_missing_file() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("munin-gallery").expect("Binary exists");
    cmd.arg("inspect")
        .arg(dir.path().join("missing"))
        .assert()
        .failure();
}

/// Collects the debug representation of every emitted event.
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

    use munin_gallery::cli::{run, Cli, Commands};

    let cli = Cli {
        command: Commands::Collect {
            config: Some(std::path::PathBuf::from("does-not-exist.yaml")),
            export: None,
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
