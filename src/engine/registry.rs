//! Subscription set and pending initial values.

use core::mem;

use heapless::{String, Vec};

use crate::topics::TopicString;

/// Maximum length of an initial-value payload.
pub const MAX_VALUE_LEN: usize = 64;

/// An owned initial-value payload.
pub type ValueString = String<MAX_VALUE_LEN>;

/// Topics to (re-)subscribe after every successful session.
///
/// Insertion order is preserved and duplicates are kept: the broker
/// collapses repeated subscriptions to the same topic, so replaying them
/// verbatim is simpler than deduplicating here and keeps subscribe-call
/// order identical to registration order.
#[derive(Default)]
pub struct SubscriptionRegistry<const MAX_TOPICS: usize> {
    topics: Vec<TopicString, MAX_TOPICS>,
}

impl<const MAX_TOPICS: usize> SubscriptionRegistry<MAX_TOPICS> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a topic. Returns `false` if the registry is full.
    pub fn add(&mut self, topic: TopicString) -> bool {
        self.topics.push(topic).is_ok()
    }

    /// Iterate the registered topics in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(|topic| topic.as_str())
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

/// Values published retained exactly once, on the first established
/// session of the process lifetime.
#[derive(Default)]
pub struct InitialValues<const MAX_ENTRIES: usize> {
    entries: Vec<(TopicString, ValueString), MAX_ENTRIES>,
}

impl<const MAX_ENTRIES: usize> InitialValues<MAX_ENTRIES> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value for a topic.
    ///
    /// Returns `false` if the table is full and the topic is new.
    pub fn upsert(&mut self, topic: TopicString, value: ValueString) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|(t, _)| *t == topic) {
            entry.1 = value;
            return true;
        }
        self.entries.push((topic, value)).is_ok()
    }

    /// Take every pending entry, leaving the table empty. The flush-once
    /// guarantee rests on this: after the first drain there is nothing
    /// left to publish.
    pub fn take_entries(&mut self) -> Vec<(TopicString, ValueString), MAX_ENTRIES> {
        mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
