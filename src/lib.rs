//! # topicbus
//!
//! **topicbus** is an in-process publish/subscribe message bus for async Rust.
//!
//! Producers publish topic-addressed messages; consumers subscribe handlers to
//! topic patterns (`orders.*`, `#`). A fixed pool of workers drains a bounded
//! queue, runs every matching handler through the middleware chain, retries
//! failures and finally hands exhausted messages to a dead-letter handler.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   publish(topic, payload)                     publish_sync(topic, payload)
//!            │                                             │
//!            ▼                                             │
//!   ┌──────────────────┐                                   │
//!   │  EnvelopeQueue   │  bounded, closable                │
//!   │ (message+retries)│                                   │
//!   └───┬──────┬───────┘                                   │
//!       ▼      ▼      ▼                                    │
//!   worker1 worker2 workerN                                │
//!       └──────┼──────┘                                    │
//!              ▼                                           ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Dispatcher                                                       │
//! │  - Registry::handlers_for(topic)   (pattern matching)             │
//! │  - Aggregate: every handler runs, last error wins                 │
//! │  - MiddlewareChain::wrap           (m1 outermost)                 │
//! │  - catch_unwind                    (panic → HandlerError)         │
//! └──────┬──────────────────────────────────────────────┬─────────────┘
//!        ▼                                              ▼
//!   Ok ─► done                           Err ─► retries < max ─► re-enqueue
//!                                                 else ─► dead-letter handler
//! ```
//!
//! ### Decorators
//! ```text
//! BatchPublisher ─► AuditableBus ─► PersistentBus ─► Bus
//!     (buffer)        (history)       (store first)
//! ```
//! Every layer implements [`MessageBus`], so they stack in any order.
//!
//! ## Features
//! | Area              | Description                                            | Key types / traits                          |
//! |-------------------|--------------------------------------------------------|---------------------------------------------|
//! | **Bus**           | Publish (async/sync), subscribe, lifecycle.            | [`Bus`], [`BusBuilder`], [`MessageBus`]     |
//! | **Handlers**      | Message consumers as trait objects or closures.       | [`Handler`], [`HandlerFn`], [`HandlerRef`]  |
//! | **Patterns**      | Whole-segment wildcard topic matching.                 | [`pattern::matches`]                        |
//! | **Middleware**    | Cross-cutting handler wrappers, filters, timeouts.     | [`middleware::Middleware`]                  |
//! | **Observers**     | Synchronous hooks on bus activity.                     | [`observers::Observer`]                     |
//! | **Persistence**   | Store-then-publish decorator and replay.               | [`store::PersistentBus`]                    |
//! | **Audit**         | Bounded, queryable message history.                    | [`history::MessageHistory`]                 |
//! | **Batching**      | Size/time triggered publish batching.                  | [`batch::BatchPublisher`]                   |
//! | **Errors**        | Typed errors for bus, handlers and stores.             | [`BusError`], [`HandlerError`], [`StoreError`] |
//! | **Configuration** | Worker count, retries, queue capacity.                 | [`BusConfig`]                               |
//!
//! ## Optional features
//! - `logging` (default): exports [`observers::LogObserver`] and
//!   [`middleware::logging`].
//! - `sqlite`: exports `store::SqlStore`, a SQLite-backed message store.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use topicbus::{Bus, BusConfig, HandlerError, HandlerFn, HandlerRef, MessageBus, MessageRef};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dead_letter: HandlerRef<String> =
//!         HandlerFn::arc(|_ctx: CancellationToken, msg: MessageRef<String>| async move {
//!             eprintln!("gave up on {}", msg.topic());
//!             Ok::<_, HandlerError>(())
//!         });
//!
//!     let bus = Bus::builder(BusConfig::default())
//!         .with_dead_letter(dead_letter)
//!         .build();
//!
//!     bus.subscribe(
//!         "user.*",
//!         HandlerFn::arc(|_ctx: CancellationToken, msg: MessageRef<String>| async move {
//!             println!("{}: {}", msg.topic(), msg.payload());
//!             Ok::<_, HandlerError>(())
//!         }),
//!     )?;
//!
//!     let ctx = CancellationToken::new();
//!     bus.publish(&ctx, "user.created", "alice".to_string()).await?;
//!     bus.publish_sync(&ctx, "user.deleted", "bob".to_string()).await?;
//!
//!     // drains queued work before returning
//!     bus.close().await?;
//!     Ok(())
//! }
//! ```
pub mod batch;
pub mod codec;
mod config;
pub mod core;
mod error;
mod handlers;
pub mod history;
mod message;
pub mod middleware;
pub mod observers;
pub mod pattern;
pub mod store;

// ---- Public re-exports ----

pub use config::{BusConfig, DEFAULT_MAX_RETRIES, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
pub use self::core::{Bus, BusBuilder, MessageBus, Subscription, SubscriptionId};
pub use error::{BusError, HandlerError, StoreError};
pub use handlers::{Handler, HandlerFn, HandlerRef};
pub use message::{Message, MessageId, MessageRef, Metadata, Payload, Priority};

// Optional: expose the built-in tracing observer (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use observers::LogObserver;
