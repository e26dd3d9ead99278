//! # Example: persistence
//!
//! Wraps a bus in an audit layer and a file-backed persistence layer, publishes
//! a few messages, then replays them into a fresh bus.
//!
//! ## Flow
//! ```text
//! AuditableBus ─► PersistentBus(FileStore) ─► Bus
//!      │                 │
//!   history          messages.json
//!
//! new PersistentBus(same file).replay() ─► Bus
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example persistence
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use topicbus::history::{history_middleware, AuditableBus, HistoryEvent, MessageHistory};
use topicbus::store::{FileStore, MessageStore, PersistentBus};
use topicbus::{Bus, BusConfig, HandlerError, HandlerFn, HandlerRef, MessageBus, MessageRef};
use tracing_subscriber::EnvFilter;

fn printer(tag: &'static str) -> HandlerRef<String> {
    HandlerFn::arc(move |_ctx: CancellationToken, msg: MessageRef<String>| async move {
        println!("[{tag}] {} -> {}", msg.topic(), msg.payload());
        Ok::<_, HandlerError>(())
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = std::env::temp_dir().join("topicbus-demo-messages.json");
    let ctx = CancellationToken::new();

    // 1. First run: audit + persist
    let history = Arc::new(MessageHistory::<String>::new(0));
    let store = FileStore::<String>::new(&path);
    store.clear().await?;
    let bus = AuditableBus::new(
        PersistentBus::new(Bus::<String>::new(BusConfig::default()), store),
        Arc::clone(&history),
    );
    bus.use_middleware(history_middleware(Arc::clone(&history)));
    bus.subscribe("events.*", printer("live"))?;

    for name in ["signup", "login", "logout"] {
        bus.publish_sync(&ctx, &format!("events.{name}"), name.to_string()).await?;
    }
    bus.close().await?;
    println!(
        "audit: {} published, {} delivered",
        history.by_event(HistoryEvent::Published).len(),
        history.by_event(HistoryEvent::Delivered).len()
    );

    // 2. Second run: replay from the file
    let replay = PersistentBus::new(Bus::<String>::new(BusConfig::default()), FileStore::<String>::new(&path));
    replay.subscribe("events.*", printer("replay"))?;
    let count = replay.replay(&ctx).await?;
    replay.close().await?;
    println!("replayed {count} messages from {}", path.display());
    Ok(())
}
