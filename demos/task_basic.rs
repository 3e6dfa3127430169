//! Basic task container example.
//!
//! This example demonstrates the core lifecycle:
//! - Defining a task container
//! - Creating and starting it
//! - Reading its output
//! - Cleaning up
//!
//! Run with: cargo run --example task_basic

use corral::{Container, ContainerClient, ContainerKind};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("corral=info")
        .init();

    println!("🐳 Task Container Example\n");

    // Step 1: Connect to Docker/Podman
    println!("1. Connecting to container runtime...");
    let client = ContainerClient::new().await?;
    println!("   ✓ Connected successfully\n");

    // Step 2: Define the task
    println!("2. Defining task container...");
    let mut task = Container::new(client, |spec| {
        spec.set_name("corral.example.task");
        spec.set_kind(ContainerKind::Task);
        spec.set_image("alpine:latest");
        spec.set_command(["sh", "-c", "echo Hello from corral!; sleep 60"]);
        spec.set_term_signal("SIGKILL");
    })?;
    println!("   ✓ Definition frozen as {}\n", task.definition().name);

    // Step 3: Create and start
    println!("3. Creating container...");
    task.create().await?;
    println!("   ✓ Created: {}\n", &task.id().unwrap_or("?")[..12]);

    println!("4. Starting container...");
    task.start().await?;
    println!("   ✓ Container is {}\n", task.state());

    // Step 4: Read output
    println!("5. Reading output...");
    tokio::time::sleep(Duration::from_millis(500)).await;
    let output = task.output().await?;
    println!("   Output: {}", output.trim());

    // Step 5: Cleanup
    println!("6. Cleaning up...");
    task.stop().await?;
    task.destroy().await?;
    println!("   ✓ Container removed\n");

    println!("✅ Example complete!");

    Ok(())
}
