//! Subscriber registry
//!
//! Synchronous in-process fan-out: callbacks fire inline with the emission
//! loop, in registration order. Subscribing returns a disposer token so a
//! subscriber can be released individually; `cleanup` drops everything.
//!
//! A callback returning an error propagates into the emitting loop, where
//! it is fatal to the feed.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Channel a subscription belongs to. Part of the disposer token so one
/// `unsubscribe` entry point can serve all four registries of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubscriptionChannel {
    Tick,
    Candle,
    OrderBook,
    Anomaly,
}

/// Disposer token returned by `subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    pub channel: SubscriptionChannel,
    pub seq: u64,
}

/// Error raised when a subscriber callback fails during fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("subscriber {seq} on {channel:?} channel failed: {reason}")]
pub struct SubscriberError {
    pub channel: SubscriptionChannel,
    pub seq: u64,
    pub reason: String,
}

/// A fallible subscriber callback.
pub type Callback<T> = Box<dyn FnMut(&T) -> Result<(), String> + Send>;

/// Ordered registry of subscribers for one record type.
///
/// Keys are monotonically assigned, so `BTreeMap` iteration is exactly
/// registration order.
pub struct SubscriberRegistry<T> {
    channel: SubscriptionChannel,
    next_seq: u64,
    subscribers: BTreeMap<u64, Callback<T>>,
}

impl<T> SubscriberRegistry<T> {
    pub fn new(channel: SubscriptionChannel) -> Self {
        Self {
            channel,
            next_seq: 0,
            subscribers: BTreeMap::new(),
        }
    }

    /// Register a callback, returning its disposer token.
    pub fn subscribe(&mut self, callback: Callback<T>) -> SubscriptionId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.subscribers.insert(seq, callback);
        SubscriptionId {
            channel: self.channel,
            seq,
        }
    }

    /// Release one subscription. Returns false if the token is unknown or
    /// belongs to a different channel.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        if id.channel != self.channel {
            return false;
        }
        self.subscribers.remove(&id.seq).is_some()
    }

    /// Fire all callbacks synchronously, in registration order.
    ///
    /// Stops at the first failing callback and reports it; earlier
    /// callbacks have already run at that point.
    pub fn emit(&mut self, value: &T) -> Result<(), SubscriberError> {
        for (seq, callback) in self.subscribers.iter_mut() {
            callback(value).map_err(|reason| SubscriberError {
                channel: self.channel,
                seq: *seq,
                reason,
            })?;
        }
        Ok(())
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Drop every subscription.
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }
}

impl<T> fmt::Debug for SubscriberRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("channel", &self.channel)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_emit_in_registration_order() {
        let mut registry: SubscriberRegistry<u32> =
            SubscriberRegistry::new(SubscriptionChannel::Tick);
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            registry.subscribe(Box::new(move |value| {
                log.lock().unwrap().push((tag, *value));
                Ok(())
            }));
        }

        registry.emit(&7).unwrap();
        let calls = log.lock().unwrap().clone();
        assert_eq!(calls, vec![("first", 7), ("second", 7), ("third", 7)]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut registry: SubscriberRegistry<u32> =
            SubscriberRegistry::new(SubscriptionChannel::Tick);
        let count = Arc::new(Mutex::new(0));

        let counter = Arc::clone(&count);
        let id = registry.subscribe(Box::new(move |_| {
            *counter.lock().unwrap() += 1;
            Ok(())
        }));

        registry.emit(&1).unwrap();
        assert!(registry.unsubscribe(id));
        registry.emit(&2).unwrap();

        assert_eq!(*count.lock().unwrap(), 1);
        // Double-release is a no-op.
        assert!(!registry.unsubscribe(id));
    }

    #[test]
    fn test_unsubscribe_rejects_wrong_channel() {
        let mut ticks: SubscriberRegistry<u32> =
            SubscriberRegistry::new(SubscriptionChannel::Tick);
        let id = ticks.subscribe(Box::new(|_| Ok(())));

        let mut candles: SubscriberRegistry<u32> =
            SubscriberRegistry::new(SubscriptionChannel::Candle);
        assert!(!candles.unsubscribe(id));
        assert!(ticks.unsubscribe(id));
    }

    #[test]
    fn test_failing_callback_propagates() {
        let mut registry: SubscriberRegistry<u32> =
            SubscriberRegistry::new(SubscriptionChannel::Anomaly);
        let reached = Arc::new(Mutex::new(false));

        registry.subscribe(Box::new(|_| Err("boom".to_string())));
        let flag = Arc::clone(&reached);
        registry.subscribe(Box::new(move |_| {
            *flag.lock().unwrap() = true;
            Ok(())
        }));

        let err = registry.emit(&1).unwrap_err();
        assert_eq!(err.reason, "boom");
        assert_eq!(err.seq, 0);
        // Fan-out stopped before the later subscriber.
        assert!(!*reached.lock().unwrap());
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut registry: SubscriberRegistry<u32> =
            SubscriberRegistry::new(SubscriptionChannel::OrderBook);
        registry.subscribe(Box::new(|_| Ok(())));
        registry.subscribe(Box::new(|_| Ok(())));
        assert_eq!(registry.len(), 2);

        registry.clear();
        assert!(registry.is_empty());
    }
}
