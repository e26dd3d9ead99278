//! # Message filters.
//!
//! A [`Filter`] is a predicate over a message. [`filter_middleware`] turns it into
//! a layer that silently skips (returns `Ok`) messages the predicate rejects.
//!
//! ```text
//! filter(msg) == true  ─► inner handler
//! filter(msg) == false ─► Ok(())  (inner handler not called)
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::Middleware;
use crate::error::HandlerError;
use crate::handlers::{Handler, HandlerRef};
use crate::message::{Message, MessageRef, Payload};

/// Predicate deciding whether a message should be processed.
pub type Filter<P> = Arc<dyn Fn(&Message<P>) -> bool + Send + Sync>;

struct Filtered<P: Payload> {
    filter: Filter<P>,
    inner: HandlerRef<P>,
}

#[async_trait]
impl<P: Payload> Handler<P> for Filtered<P> {
    async fn handle(&self, ctx: CancellationToken, msg: MessageRef<P>) -> Result<(), HandlerError> {
        if !(self.filter)(&msg) {
            return Ok(());
        }
        self.inner.handle(ctx, msg).await
    }
}

/// Creates middleware that only lets messages accepted by `filter` through.
pub fn filter_middleware<P: Payload>(filter: Filter<P>) -> Middleware<P> {
    Arc::new(move |inner: HandlerRef<P>| -> HandlerRef<P> {
        Arc::new(Filtered {
            filter: Arc::clone(&filter),
            inner,
        })
    })
}

/// Accepts messages whose topic is exactly one of `topics`.
pub fn topic_filter<P, I, S>(topics: I) -> Filter<P>
where
    P: Payload,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let topics: HashSet<String> = topics.into_iter().map(Into::into).collect();
    Arc::new(move |msg: &Message<P>| topics.contains(msg.topic()))
}

/// Accepts messages whose payload satisfies `pred`.
pub fn payload_filter<P, F>(pred: F) -> Filter<P>
where
    P: Payload,
    F: Fn(&P) -> bool + Send + Sync + 'static,
{
    Arc::new(move |msg: &Message<P>| pred(msg.payload()))
}

/// Accepts messages whose metadata has `key` set to exactly `value`.
pub fn metadata_filter<P: Payload>(key: impl Into<String>, value: impl Into<Value>) -> Filter<P> {
    let key = key.into();
    let value = value.into();
    Arc::new(move |msg: &Message<P>| msg.metadata().get(&key).as_ref() == Some(&value))
}

/// Accepts when every filter accepts (true for an empty list).
pub fn and<P: Payload>(filters: Vec<Filter<P>>) -> Filter<P> {
    Arc::new(move |msg: &Message<P>| filters.iter().all(|f| f(msg)))
}

/// Accepts when any filter accepts (false for an empty list).
pub fn or<P: Payload>(filters: Vec<Filter<P>>) -> Filter<P> {
    Arc::new(move |msg: &Message<P>| filters.iter().any(|f| f(msg)))
}

/// Inverts a filter.
pub fn not<P: Payload>(filter: Filter<P>) -> Filter<P> {
    Arc::new(move |msg: &Message<P>| !filter(msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::HandlerFn;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn msg(topic: &str, payload: i32) -> Message<i32> {
        Message::new(topic, payload)
    }

    #[test]
    fn topic_filter_is_exact() {
        let f = topic_filter::<i32, _, _>(["user.created", "user.deleted"]);
        assert!(f(&msg("user.created", 0)));
        assert!(!f(&msg("user.updated", 0)));
        assert!(!f(&msg("user.created.v2", 0)));
    }

    #[test]
    fn payload_filter_sees_payload() {
        let positive = payload_filter(|p: &i32| *p > 0);
        assert!(positive(&msg("t", 5)));
        assert!(!positive(&msg("t", -5)));
    }

    #[test]
    fn metadata_filter_requires_presence_and_equality() {
        let f = metadata_filter::<i32>("region", "eu");
        let m = msg("t", 0);
        assert!(!f(&m));
        m.metadata().insert("region", "us");
        assert!(!f(&m));
        m.metadata().insert("region", "eu");
        assert!(f(&m));
    }

    #[test]
    fn combinators() {
        let yes: Filter<i32> = Arc::new(|_: &Message<i32>| true);
        let no: Filter<i32> = Arc::new(|_: &Message<i32>| false);
        let m = msg("t", 0);

        assert!(and(vec![Arc::clone(&yes), Arc::clone(&yes)])(&m));
        assert!(!and(vec![Arc::clone(&yes), Arc::clone(&no)])(&m));
        assert!(and::<i32>(vec![])(&m));

        assert!(or(vec![Arc::clone(&no), Arc::clone(&yes)])(&m));
        assert!(!or(vec![Arc::clone(&no)])(&m));
        assert!(!or::<i32>(vec![])(&m));

        assert!(not(no)(&m));
        assert!(!not(yes)(&m));
    }

    #[tokio::test]
    async fn rejected_messages_skip_the_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let inner: HandlerRef<i32> = HandlerFn::arc(move |_ctx: CancellationToken, _msg: MessageRef<i32>| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let wrapped = filter_middleware(payload_filter(|p: &i32| p % 2 == 0))(inner);

        for n in 0..6 {
            wrapped
                .handle(CancellationToken::new(), Arc::new(msg("t", n)))
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
