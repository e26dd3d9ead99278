//! # Example: basic
//!
//! Subscribes handlers to exact and wildcard patterns, publishes through both
//! the async and the sync path, then closes the bus.
//!
//! ## Flow
//! ```text
//! subscribe("user.*")        subscribe("#")
//!        │                         │
//! publish("user.created") ──► queue ──► worker ──► both handlers
//! publish_sync("user.deleted") ─────────────────► both handlers (caller's task)
//! close() ──► drain, join workers, clear registry
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=topicbus=debug cargo run --example basic
//! ```

use tokio_util::sync::CancellationToken;
use topicbus::{Bus, BusConfig, HandlerError, HandlerFn, MessageBus, MessageRef};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 1. Build a bus, with the tracing observer when `logging` is enabled
    let builder = Bus::<String>::builder(BusConfig {
        workers: 2,
        ..BusConfig::default()
    });
    #[cfg(feature = "logging")]
    let builder = builder.with_observer(std::sync::Arc::new(topicbus::LogObserver));
    let bus = builder.build();

    // 2. Subscribe
    let users = bus.subscribe(
        "user.*",
        HandlerFn::arc(|_ctx: CancellationToken, msg: MessageRef<String>| async move {
            println!("[users] {} -> {}", msg.topic(), msg.payload());
            Ok::<_, HandlerError>(())
        }),
    )?;
    bus.subscribe(
        "#",
        HandlerFn::arc(|_ctx: CancellationToken, msg: MessageRef<String>| async move {
            println!("[all]   {} -> {}", msg.topic(), msg.payload());
            Ok::<_, HandlerError>(())
        }),
    )?;

    // 3. Publish
    let ctx = CancellationToken::new();
    bus.publish(&ctx, "user.created", "alice".into()).await?;
    bus.publish_sync(&ctx, "user.deleted", "bob".into()).await?;
    bus.publish_sync(&ctx, "order.created", "#42".into()).await?;

    // 4. Unsubscribe and close
    users.unsubscribe()?;
    bus.publish_sync(&ctx, "user.updated", "carol".into()).await?;
    bus.close().await?;
    Ok(())
}
