//! # ObserverSet: synchronous fan-out over multiple observers
//!
//! ## What it guarantees
//! - Every hook reaches every observer, in registration order.
//! - A panic inside one observer is caught and logged; the others still run and
//!   the caller never sees it.
//!
//! ## Diagram
//! ```text
//!    notify(hook)
//!        ├──► O1::hook()   (catch_unwind)
//!        ├──► O2::hook()   (catch_unwind)
//!        └──► ON::hook()   (catch_unwind)
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

use super::{Observer, ObserverRef};
use crate::error::HandlerError;
use crate::message::{MessageRef, Payload};

/// Ordered, panic-isolating collection of observers.
pub struct ObserverSet<P: Payload> {
    observers: Vec<ObserverRef<P>>,
}

impl<P: Payload> ObserverSet<P> {
    /// Creates a set from observers in registration order.
    #[must_use]
    pub fn new(observers: Vec<ObserverRef<P>>) -> Self {
        Self { observers }
    }

    /// True if there are no observers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Number of observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    fn notify(&self, hook: &'static str, f: impl Fn(&dyn Observer<P>)) {
        for obs in &self.observers {
            let obs: &dyn Observer<P> = obs.as_ref();
            if let Err(panic_err) = panic::catch_unwind(AssertUnwindSafe(|| f(obs))) {
                warn!(
                    observer = obs.name(),
                    hook,
                    panic = %panic_message(panic_err.as_ref()),
                    "observer panicked"
                );
            }
        }
    }

    pub(crate) fn publish(&self, topic: &str, msg: &MessageRef<P>) {
        self.notify("on_publish", |o| o.on_publish(topic, msg));
    }

    pub(crate) fn subscribe(&self, pattern: &str) {
        self.notify("on_subscribe", |o| o.on_subscribe(pattern));
    }

    pub(crate) fn unsubscribe(&self, pattern: &str) {
        self.notify("on_unsubscribe", |o| o.on_unsubscribe(pattern));
    }

    pub(crate) fn message_processed(&self, msg: &MessageRef<P>, result: Result<(), &HandlerError>) {
        self.notify("on_message_processed", |o| o.on_message_processed(msg, result));
    }

    pub(crate) fn close(&self) {
        self.notify("on_close", |o| o.on_close());
    }
}

impl<P: Payload> Default for ObserverSet<P> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<P: Payload> Clone for ObserverSet<P> {
    fn clone(&self) -> Self {
        Self {
            observers: self.observers.iter().map(Arc::clone).collect(),
        }
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use std::sync::Mutex;

    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Observer<()> for Recorder {
        fn on_subscribe(&self, pattern: &str) {
            self.log.lock().unwrap().push(format!("{}:{pattern}", self.tag));
        }
    }

    struct Panicky;

    impl Observer<()> for Panicky {
        fn on_subscribe(&self, _pattern: &str) {
            panic!("observer bug");
        }
        fn name(&self) -> &'static str {
            "panicky"
        }
    }

    #[test]
    fn fans_out_in_order_and_isolates_panics() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let set = ObserverSet::new(vec![
            Arc::new(Recorder { tag: "a", log: Arc::clone(&log) }) as ObserverRef<()>,
            Arc::new(Panicky),
            Arc::new(Recorder { tag: "b", log: Arc::clone(&log) }),
        ]);
        assert_eq!(set.len(), 3);

        set.subscribe("x.*");
        assert_eq!(*log.lock().unwrap(), vec!["a:x.*", "b:x.*"]);

        let msg = Arc::new(Message::new("x.y", ()));
        set.publish("x.y", &msg);
        set.close();
    }

    #[test]
    fn panic_payloads_render() {
        let s: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let s: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(s.as_ref()), "owned");
        let s: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(s.as_ref()), "unknown panic payload");
    }
}
