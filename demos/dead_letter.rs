//! # Example: dead_letter
//!
//! A handler that always fails is retried `max_retries` times; the message then
//! lands in the dead-letter handler exactly once.
//!
//! ## Flow
//! ```text
//! publish("payments.charge")
//!   ├─► attempt 1 → Err ─► re-enqueue
//!   ├─► attempt 2 → Err ─► re-enqueue
//!   ├─► attempt 3 → Err ─► retries exhausted
//!   └─► dead-letter handler(msg)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=topicbus=debug cargo run --example dead_letter
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use topicbus::{Bus, BusConfig, HandlerError, HandlerFn, HandlerRef, MessageBus, MessageRef};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let dead_letter: HandlerRef<u64> =
        HandlerFn::arc(|_ctx: CancellationToken, msg: MessageRef<u64>| async move {
            println!("[dlq] {} amount={} id={}", msg.topic(), msg.payload(), msg.id());
            Ok::<_, HandlerError>(())
        });

    let bus = Bus::builder(BusConfig {
        workers: 4,
        max_retries: 3,
        ..BusConfig::default()
    })
    .with_dead_letter(dead_letter)
    .build();

    let attempts = Arc::new(AtomicU32::new(0));
    let a = Arc::clone(&attempts);
    bus.subscribe(
        "payments.*",
        HandlerFn::arc(move |_ctx: CancellationToken, msg: MessageRef<u64>| {
            let a = Arc::clone(&a);
            async move {
                let n = a.fetch_add(1, Ordering::SeqCst) + 1;
                println!("[charge] attempt {n} for {}", msg.payload());
                Err(HandlerError::fail("gateway unavailable"))
            }
        }),
    )?;

    bus.publish(&CancellationToken::new(), "payments.charge", 1999).await?;

    // close drains the queue, including re-enqueued retries
    bus.close().await?;
    println!("handler attempts: {}", attempts.load(Ordering::SeqCst));
    Ok(())
}
