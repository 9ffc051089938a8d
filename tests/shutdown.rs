//! Signal handling around a live run
//!
//! Signals are process-wide, so everything that raises one lives in this single
//! test binary and runs sequentially inside one test.

#![cfg(unix)]

mod common;

use common::{PlaylistFixture, http_controller};
use playlist_sync::{Config, Error, SyncMode, run_with_shutdown};
use std::time::Duration;
use tempfile::TempDir;
use tokio::signal::unix::{SignalKind, signal};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve_slowly(server: &MockServer, file: &str, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(format!("/{file}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(file.as_bytes().to_vec())
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

fn interrupt_self() {
    let status = std::process::Command::new("kill")
        .args(["-INT", &std::process::id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn first_signal_drains_second_signal_aborts() {
    // Keeps SIGINT from terminating the test process between runs
    let _guard = signal(SignalKind::interrupt()).unwrap();

    // One signal: the transfer in flight completes, nothing after it starts
    let server = MockServer::start().await;
    serve_slowly(&server, "A.mp4", Duration::from_secs(1)).await;
    serve_slowly(&server, "B.mp4", Duration::ZERO).await;

    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("mix");
    let controller = http_controller(
        PlaylistFixture::new(&server.uri(), &["A", "B"]),
        &Config::default(),
    );
    let target = dir.clone();
    let run = tokio::spawn(async move {
        run_with_shutdown(&controller, "PL1", &target, SyncMode::Resume).await
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    interrupt_self();

    let report = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(report.cancelled);
    assert_eq!(report.total(), 1);
    assert_eq!(report.succeeded, 1);
    assert!(dir.join("A.mp4").exists());
    let requested: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(requested, vec!["/A.mp4"]);

    // Two signals: the hung transfer is abandoned
    let server = MockServer::start().await;
    serve_slowly(&server, "A.mp4", Duration::from_secs(60)).await;

    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("mix");
    let controller = http_controller(
        PlaylistFixture::new(&server.uri(), &["A"]),
        &Config::default(),
    );
    let run = tokio::spawn(async move {
        run_with_shutdown(&controller, "PL1", &dir, SyncMode::Resume).await
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    interrupt_self();
    tokio::time::sleep(Duration::from_millis(300)).await;
    interrupt_self();

    let result = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(Error::Interrupted)));
}
