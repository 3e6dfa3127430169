//! Integration tests for the container fixture lifecycle.
//!
//! These tests verify definitions, lifecycle transitions, and readiness waits
//! end-to-end against Docker/Podman.
//! Tests are skipped if Docker/Podman is not available or SKIP_CONTAINER_TESTS=1.

use corral::{Container, ContainerClient, ContainerKind, ContainerState, Error};
use serial_test::serial;
use std::time::Duration;
use test_tag::tag;

/// Check if container tests should run.
fn should_run_container_tests() -> bool {
    // Skip if explicitly disabled
    if let Ok(value) = std::env::var("SKIP_CONTAINER_TESTS") {
        if value == "1" || value.eq_ignore_ascii_case("true") {
            return false;
        }
    }

    // Check if Docker or Podman is available
    std::process::Command::new("docker")
        .arg("info")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
        || std::process::Command::new("podman")
            .arg("info")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
}

/// Cleanup helper - force-removes leftover containers by name.
async fn cleanup(client: &ContainerClient, names: &[&str]) {
    for name in names {
        let _ = client.remove_container(name, true).await;
    }
}

#[tokio::test]
#[serial]
#[tag(integration, container)]
async fn test_client_connection() {
    if !should_run_container_tests() {
        eprintln!("Skipping container tests (Docker/Podman not available or SKIP_CONTAINER_TESTS=1)");
        return;
    }

    let client = ContainerClient::new().await;
    assert!(
        client.is_ok(),
        "Failed to connect to Docker/Podman: {:?}",
        client.err()
    );

    let client = client.unwrap();
    client.ping().await.expect("Failed to ping runtime");
    println!("✓ Connected to container runtime");
}

#[tokio::test]
#[serial]
#[tag(integration, container)]
async fn test_task_lifecycle() {
    if !should_run_container_tests() {
        eprintln!("Skipping container tests");
        return;
    }

    let client = ContainerClient::new().await.expect("Failed to connect");
    let name = "corral.test.task";
    cleanup(&client, &[name]).await;

    let mut task = Container::new(client.clone(), |spec| {
        spec.set_name(name);
        spec.set_kind(ContainerKind::Task);
        spec.set_image("alpine:latest");
        spec.set_command(["sleep", "30"]);
        spec.set_term_signal("SIGKILL");
    })
    .expect("Failed to build task");

    assert_eq!(task.state(), ContainerState::Defined);

    task.create().await.expect("Failed to create task");
    assert_eq!(task.state(), ContainerState::Created);
    assert!(task.id().is_some());
    println!("✓ Created task: {}", task.id().unwrap());

    task.start().await.expect("Failed to start task");
    assert_eq!(task.state(), ContainerState::Working);

    let response = task.inspect().await.expect("Failed to inspect task");
    assert_eq!(response.name.as_deref(), Some("/corral.test.task"));
    println!("✓ Task running");

    task.stop().await.expect("Failed to stop task");
    assert_eq!(task.state(), ContainerState::Stopped);

    task.destroy().await.expect("Failed to destroy task");
    assert_eq!(task.state(), ContainerState::Destroyed);
    assert_eq!(task.id(), None);
    println!("✓ Task stopped and destroyed");
}

#[tokio::test]
#[serial]
#[tag(integration, container)]
async fn test_lifecycle_guards_with_live_runtime() {
    if !should_run_container_tests() {
        eprintln!("Skipping container tests");
        return;
    }

    let client = ContainerClient::new().await.expect("Failed to connect");
    let name = "corral.test.guards";
    cleanup(&client, &[name]).await;

    let mut task = Container::new(client.clone(), |spec| {
        spec.set_name(name);
        spec.set_kind(ContainerKind::Task);
        spec.set_image("alpine:latest");
        spec.set_command(["sleep", "30"]);
        spec.set_term_signal("SIGKILL");
    })
    .expect("Failed to build task");

    task.create().await.expect("Failed to create");
    let err = task.create().await.unwrap_err();
    assert_eq!(err.to_string(), "container already created");

    task.start().await.expect("Failed to start");
    let err = task.start().await.unwrap_err();
    assert_eq!(err.to_string(), "container already started");

    task.stop().await.expect("Failed to stop");
    let err = task.stop().await.unwrap_err();
    assert_eq!(err.to_string(), "container not started");

    task.destroy().await.expect("Failed to destroy");
    let err = task.destroy().await.unwrap_err();
    assert_eq!(err.to_string(), "container not created");
    println!("✓ Lifecycle guards hold against a live runtime");
}

#[tokio::test]
#[serial]
#[tag(integration, container)]
async fn test_task_output_snapshot() {
    if !should_run_container_tests() {
        eprintln!("Skipping container tests");
        return;
    }

    let client = ContainerClient::new().await.expect("Failed to connect");
    let name = "corral.test.output";
    cleanup(&client, &[name]).await;

    let mut task = Container::new(client.clone(), |spec| {
        spec.set_name(name);
        spec.set_kind(ContainerKind::Task);
        spec.set_image("alpine:latest");
        spec.set_command(["sh", "-c", "echo hello from the task; sleep 10"]);
        spec.set_term_signal("SIGKILL");
    })
    .expect("Failed to build task");

    task.create().await.expect("Failed to create");
    task.start().await.expect("Failed to start");

    // give the shell a moment to emit the line
    tokio::time::sleep(Duration::from_millis(500)).await;

    let output = task.output().await.expect("Failed to read output");
    assert!(
        output.contains("hello from the task"),
        "Expected output not found. Got: {output}"
    );
    println!("✓ Output snapshot works");

    task.stop().await.expect("Failed to stop");
    task.destroy().await.expect("Failed to destroy");
}

#[tokio::test]
#[serial]
#[tag(integration, container)]
async fn test_attach_streams_output_deltas() {
    if !should_run_container_tests() {
        eprintln!("Skipping container tests");
        return;
    }

    let client = ContainerClient::new().await.expect("Failed to connect");
    let name = "corral.test.attach";
    cleanup(&client, &[name]).await;

    let mut task = Container::new(client.clone(), |spec| {
        spec.set_name(name);
        spec.set_kind(ContainerKind::Task);
        spec.set_image("alpine:latest");
        spec.set_command([
            "sh",
            "-c",
            "for i in 1 2 3; do echo line$i; sleep 0.2; done; sleep 30",
        ]);
        spec.set_term_signal("SIGKILL");
    })
    .expect("Failed to build task");

    task.create().await.expect("Failed to create");
    task.start().await.expect("Failed to start");

    let (tx, rx) = std::sync::mpsc::channel::<String>();
    task.attach(Some(Duration::from_millis(100)), move |delta| {
        let _ = tx.send(delta.to_string());
    })
    .await
    .expect("Failed to attach");

    tokio::time::sleep(Duration::from_secs(2)).await;
    task.detach().await;

    let collected: String = rx.try_iter().collect();
    assert!(
        collected.contains("line1") && collected.contains("line3"),
        "Expected streamed lines, got: {collected}"
    );
    println!("✓ Attached watcher streamed output deltas");

    task.stop().await.expect("Failed to stop");
    task.destroy().await.expect("Failed to destroy");
}

#[tokio::test]
#[serial]
#[tag(integration, container, slow)]
async fn test_service_readiness_wait_succeeds() {
    if !should_run_container_tests() {
        eprintln!("Skipping container tests");
        return;
    }

    let client = ContainerClient::new().await.expect("Failed to connect");
    let name = "corral.test.listener";
    cleanup(&client, &[name, "corral.test.listener.observer"]).await;

    let mut service = Container::new(client.clone(), |spec| {
        spec.set_name(name);
        spec.set_kind(ContainerKind::Service);
        spec.set_image("alpine:latest");
        // busybox netcat keeps listening in a loop so the probe always finds it
        spec.set_command(["sh", "-c", "while true; do nc -l -p 5000; done"]);
        spec.set_expose([("5000", "tcp")]);
        spec.set_ready_timeout(Duration::from_secs(30));
        spec.set_term_signal("SIGKILL");
    })
    .expect("Failed to build service");

    service.create().await.expect("Failed to create service");
    service.start().await.expect("Readiness wait failed");
    assert_eq!(service.state(), ContainerState::Ready);
    println!("✓ Service became ready");

    // the observer must not outlive the wait
    let leftover = client
        .inspect_container("corral.test.listener.observer")
        .await;
    assert!(matches!(leftover, Err(Error::NotFound(_))));
    println!("✓ Observer cleaned up");

    service.stop().await.expect("Failed to stop service");
    service.destroy().await.expect("Failed to destroy service");
}

#[tokio::test]
#[serial]
#[tag(integration, container, slow)]
async fn test_service_readiness_wait_times_out() {
    if !should_run_container_tests() {
        eprintln!("Skipping container tests");
        return;
    }

    let client = ContainerClient::new().await.expect("Failed to connect");
    let name = "corral.test.deaf";
    cleanup(&client, &[name, "corral.test.deaf.observer"]).await;

    let mut service = Container::new(client.clone(), |spec| {
        spec.set_name(name);
        spec.set_kind(ContainerKind::Service);
        spec.set_image("alpine:latest");
        // exposes a port but never listens on it
        spec.set_command(["sleep", "60"]);
        spec.set_expose([("5000", "tcp")]);
        spec.set_ready_timeout(Duration::from_secs(3));
        spec.set_term_signal("SIGKILL");
    })
    .expect("Failed to build service");

    service.create().await.expect("Failed to create service");
    let err = service.start().await.unwrap_err();

    let Error::ServicesNotReady(not_ready) = err else {
        panic!("Expected a readiness failure, got: {err}");
    };
    assert_eq!(not_ready.observations.len(), 1);
    assert!(
        not_ready.observations[0].service == name,
        "Observation names the wrong service: {:?}",
        not_ready.observations[0]
    );
    // the container keeps running; the caller decides what happens next
    assert_eq!(service.state(), ContainerState::Started);
    println!("✓ Readiness timeout reported: {not_ready}");

    let leftover = client.inspect_container("corral.test.deaf.observer").await;
    assert!(matches!(leftover, Err(Error::NotFound(_))));
    println!("✓ Observer cleaned up after failure");

    service.stop().await.expect("Failed to stop service");
    service.destroy().await.expect("Failed to destroy service");
}

#[tokio::test]
#[serial]
#[tag(integration, container)]
async fn test_service_without_tcp_ports_is_immediately_ready() {
    if !should_run_container_tests() {
        eprintln!("Skipping container tests");
        return;
    }

    let client = ContainerClient::new().await.expect("Failed to connect");
    let name = "corral.test.portless";
    cleanup(&client, &[name]).await;

    let mut service = Container::new(client.clone(), |spec| {
        spec.set_name(name);
        spec.set_kind(ContainerKind::Service);
        spec.set_image("alpine:latest");
        spec.set_command(["sleep", "30"]);
        spec.set_ready_timeout(Duration::from_secs(5));
        spec.set_term_signal("SIGKILL");
    })
    .expect("Failed to build service");

    service.create().await.expect("Failed to create service");
    service.start().await.expect("Failed to start service");
    assert_eq!(service.state(), ContainerState::Ready);
    println!("✓ Portless service ready without probing");

    service.stop().await.expect("Failed to stop service");
    service.destroy().await.expect("Failed to destroy service");
}

#[tokio::test]
#[serial]
#[tag(integration, container)]
async fn test_environment_and_command_from_definition() {
    if !should_run_container_tests() {
        eprintln!("Skipping container tests");
        return;
    }

    let client = ContainerClient::new().await.expect("Failed to connect");
    let name = "corral.test.env";
    cleanup(&client, &[name]).await;

    let mut task = Container::new(client.clone(), |spec| {
        spec.set_name(name);
        spec.set_kind(ContainerKind::Task);
        spec.set_image("alpine:latest");
        spec.set_env([("GREETING", "hello-env")]);
        spec.set_command(["sh", "-c", "echo $GREETING; sleep 10"]);
        spec.set_term_signal("SIGKILL");
    })
    .expect("Failed to build task");

    task.create().await.expect("Failed to create");
    task.start().await.expect("Failed to start");

    tokio::time::sleep(Duration::from_millis(500)).await;
    let output = task.output().await.expect("Failed to read output");
    assert!(
        output.contains("hello-env"),
        "Environment variable not applied. Got: {output}"
    );
    println!("✓ Environment variables applied from the definition");

    task.stop().await.expect("Failed to stop");
    task.destroy().await.expect("Failed to destroy");
}
