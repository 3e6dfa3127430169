//! Service readiness example.
//!
//! Starts a listening service and blocks in `start()` until its exposed TCP
//! port accepts connections, probed by a disposable observer container.
//!
//! Run with: cargo run --example service_readiness

use corral::{Container, ContainerClient, ContainerKind};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("corral=info")
        .init();

    println!("🐳 Service Readiness Example\n");

    println!("1. Connecting to container runtime...");
    let client = ContainerClient::new().await?;
    println!("   ✓ Connected successfully\n");

    println!("2. Defining service container...");
    let mut service = Container::new(client, |spec| {
        spec.set_name("corral.example.listener");
        spec.set_kind(ContainerKind::Service);
        spec.set_image("alpine:latest");
        spec.set_command(["sh", "-c", "while true; do nc -l -p 5000; done"]);
        spec.set_expose([("5000", "tcp")]);
        spec.set_ready_timeout(Duration::from_secs(30));
        spec.set_term_signal("SIGKILL");
    })?;
    println!("   ✓ Definition frozen as {}\n", service.definition().name);

    println!("3. Creating container...");
    service.create().await?;
    println!("   ✓ Created: {}\n", &service.id().unwrap_or("?")[..12]);

    println!("4. Starting container (blocks until port 5000 listens)...");
    service.start().await?;
    println!("   ✓ Container is {}\n", service.state());

    println!("5. Cleaning up...");
    service.stop().await?;
    service.destroy().await?;
    println!("   ✓ Container removed\n");

    println!("✅ Example complete!");

    Ok(())
}
