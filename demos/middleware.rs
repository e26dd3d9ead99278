//! # Example: middleware
//!
//! Stacks logging, a timeout, a payload filter and a custom tagging layer.
//! The first registered layer runs outermost.
//!
//! ## Flow
//! ```text
//! logging ─► timeout(100ms) ─► filter(payload > 0) ─► tag ─► handlers
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=topicbus=debug cargo run --example middleware
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use topicbus::middleware::{self, filter_middleware, payload_filter};
use topicbus::{Bus, BusConfig, HandlerError, HandlerFn, HandlerRef, MessageBus, MessageRef};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    let bus: Bus<i64> = Bus::new(BusConfig::default());

    #[cfg(feature = "logging")]
    bus.use_middleware(middleware::logging());
    bus.use_middleware(middleware::timeout(Duration::from_millis(100)));
    bus.use_middleware(filter_middleware(payload_filter(|v: &i64| *v > 0)));
    bus.use_middleware(middleware::middleware(|next: HandlerRef<i64>| {
        HandlerFn::arc(move |ctx: CancellationToken, msg: MessageRef<i64>| {
            let next = Arc::clone(&next);
            async move {
                msg.metadata().insert("seen_by", "tagger");
                next.handle(ctx, msg).await
            }
        })
    }));

    bus.subscribe(
        "metrics.*",
        HandlerFn::arc(|_ctx: CancellationToken, msg: MessageRef<i64>| async move {
            println!(
                "[metrics] {} = {} ({:?})",
                msg.topic(),
                msg.payload(),
                msg.metadata().get("seen_by")
            );
            Ok::<_, HandlerError>(())
        }),
    )?;
    bus.subscribe(
        "metrics.slow",
        HandlerFn::arc(|ctx: CancellationToken, _msg: MessageRef<i64>| async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(1)) => Ok(()),
                _ = ctx.cancelled() => Err(HandlerError::Canceled),
            }
        }),
    )?;

    let ctx = CancellationToken::new();
    bus.publish_sync(&ctx, "metrics.cpu", 42).await?;
    bus.publish_sync(&ctx, "metrics.cpu", -1).await?; // filtered out
    if let Err(e) = bus.publish_sync(&ctx, "metrics.slow", 7).await {
        println!("[slow] {e} ({})", e.as_label());
    }

    bus.close().await?;
    Ok(())
}
