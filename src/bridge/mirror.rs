//! Subscription mirroring
//!
//! For `sub` rules the bridge forwards local subscriptions upstream so the
//! remote broker sends matching traffic back. Each rule keeps one mirrored
//! entry per distinct topic, however many local clients hold it; an upstream
//! SUBSCRIBE is emitted when the first client arrives and an UNSUBSCRIBE when
//! the last one leaves.
//!
//! Entries live in an arena-backed doubly linked list indexed by topic, which
//! gives O(1) insert, O(1) removal by topic and insertion-order iteration.

use std::ops::Deref;
use std::sync::Arc;

use ahash::AHashMap;
use compact_str::CompactString;
use parking_lot::MutexGuard;
use smallvec::SmallVec;
use tracing::debug;

use crate::protocol::QoS;
use crate::topic::TopicTokens;

use super::error::{BridgeError, Result};
use super::topic::Bridge;

/// Request handed to the bridge connection layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamRequest {
    /// Subscribe to a topic on the remote broker
    Subscribe {
        bridge: Arc<str>,
        topic: String,
        qos: QoS,
    },
    /// Unsubscribe from a topic on the remote broker
    Unsubscribe { bridge: Arc<str>, topic: String },
}

/// Result of dropping a client from a mirrored entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Release {
    /// Topic not mirrored, or not held by this client
    Unknown,
    /// Other clients still hold the topic
    StillRequired,
    /// Last client gone; the entry was removed
    Removed,
}

/// One mirrored topic and the local clients requiring it
#[derive(Debug)]
struct Entry {
    topic: CompactString,
    clients: SmallVec<[Arc<str>; 2]>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Ordered set of topics mirrored upstream for one `sub` rule
#[derive(Debug, Default)]
pub struct MirroredSubscriptions {
    /// Arena of entries; `None` marks a free slot
    slots: Vec<Option<Entry>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    index: AHashMap<CompactString, usize>,
}

impl MirroredSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.index.contains_key(topic)
    }

    /// Clients currently holding a topic
    pub fn clients(&self, topic: &str) -> Option<&[Arc<str>]> {
        let slot = *self.index.get(topic)?;
        self.slots[slot].as_ref().map(|e| e.clients.as_slice())
    }

    /// Topics in insertion order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            slots: &self.slots,
            cursor: self.head,
        }
    }

    /// Record that `client_id` needs `topic`.
    ///
    /// Returns true if the topic was not mirrored before.
    pub(crate) fn acquire(&mut self, topic: &str, client_id: &str) -> Result<bool> {
        if let Some(&slot) = self.index.get(topic) {
            if let Some(entry) = self.slots[slot].as_mut() {
                if !entry.clients.iter().any(|c| c.as_ref() == client_id) {
                    entry.clients.push(Arc::from(client_id));
                }
            }
            return Ok(false);
        }

        self.index.try_reserve(1)?;
        if self.free.is_empty() {
            self.slots.try_reserve(1)?;
        }

        let entry = Entry {
            topic: CompactString::new(topic),
            clients: SmallVec::from_elem(Arc::from(client_id), 1),
            prev: self.tail,
            next: None,
        };

        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        };

        match self.tail {
            Some(tail) => {
                if let Some(prev) = self.slots[tail].as_mut() {
                    prev.next = Some(slot);
                }
            }
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.index.insert(CompactString::new(topic), slot);

        Ok(true)
    }

    /// Drop `client_id` from `topic`, removing the entry once no client needs it
    pub(crate) fn release(&mut self, topic: &str, client_id: &str) -> Release {
        let Some(&slot) = self.index.get(topic) else {
            return Release::Unknown;
        };
        let Some(entry) = self.slots[slot].as_mut() else {
            return Release::Unknown;
        };

        let Some(pos) = entry.clients.iter().position(|c| c.as_ref() == client_id) else {
            return Release::Unknown;
        };
        entry.clients.swap_remove(pos);

        if !entry.clients.is_empty() {
            return Release::StillRequired;
        }

        self.unlink(slot);
        Release::Removed
    }

    fn unlink(&mut self, slot: usize) {
        let Some(entry) = self.slots[slot].take() else {
            return;
        };

        match entry.prev {
            Some(prev) => {
                if let Some(p) = self.slots[prev].as_mut() {
                    p.next = entry.next;
                }
            }
            None => self.head = entry.next,
        }
        match entry.next {
            Some(next) => {
                if let Some(n) = self.slots[next].as_mut() {
                    n.prev = entry.prev;
                }
            }
            None => self.tail = entry.prev,
        }

        self.index.remove(entry.topic.as_str());
        self.free.push(slot);
    }
}

/// Locked, read-only view of a rule's mirrored subscriptions.
///
/// The set only changes through [`Bridge::on_local_subscribe`] and
/// [`Bridge::on_local_unsubscribe`], which keep the remote broker in step.
pub struct MirroredGuard<'a>(MutexGuard<'a, MirroredSubscriptions>);

impl<'a> MirroredGuard<'a> {
    pub(crate) fn new(guard: MutexGuard<'a, MirroredSubscriptions>) -> Self {
        Self(guard)
    }
}

impl Deref for MirroredGuard<'_> {
    type Target = MirroredSubscriptions;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Iterator over mirrored topics in insertion order
pub struct Iter<'a> {
    slots: &'a [Option<Entry>],
    cursor: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.slots[self.cursor?].as_ref()?;
        self.cursor = entry.next;
        Some(entry.topic.as_str())
    }
}

impl Bridge {
    /// Mirror a local subscription through the first `sub` rule covering it.
    ///
    /// Returns `NotFound` when no rule of this bridge covers the subscription.
    pub fn on_local_subscribe(&self, client_id: &str, tokens: &TopicTokens) -> Result<()> {
        let Some(rule) = self.sub_topics().iter().find(|r| r.subsumes(tokens)) else {
            return Err(BridgeError::NotFound);
        };
        let Some(mut mirrored) = rule.mirrored_mut() else {
            return Err(BridgeError::NotFound);
        };

        let topic = tokens.join();
        if mirrored.acquire(&topic, client_id)? {
            debug!(
                "Bridge '{}': mirroring subscription '{}' upstream",
                self.name(),
                topic
            );
            self.send_upstream(UpstreamRequest::Subscribe {
                bridge: self.shared_name(),
                topic,
                qos: rule.qos(),
            });
        }

        Ok(())
    }

    /// Release a local subscription mirrored by this bridge.
    ///
    /// The upstream subscription is withdrawn once no local client holds the
    /// topic. Returns `NotFound` when nothing was mirrored for it.
    pub fn on_local_unsubscribe(&self, client_id: &str, tokens: &TopicTokens) -> Result<()> {
        let topic = tokens.join();

        for rule in self.sub_topics().iter().filter(|r| r.subsumes(tokens)) {
            let Some(mut mirrored) = rule.mirrored_mut() else {
                continue;
            };

            match mirrored.release(&topic, client_id) {
                Release::Unknown => continue,
                Release::StillRequired => return Ok(()),
                Release::Removed => {
                    debug!(
                        "Bridge '{}': withdrawing mirrored subscription '{}'",
                        self.name(),
                        topic
                    );
                    self.send_upstream(UpstreamRequest::Unsubscribe {
                        bridge: self.shared_name(),
                        topic,
                    });
                    return Ok(());
                }
            }
        }

        Err(BridgeError::NotFound)
    }

    /// Snapshot of every mirrored topic with its rule QoS, for replay on reconnect
    pub fn mirrored_topics(&self) -> Vec<(String, QoS)> {
        self.sub_topics()
            .iter()
            .filter_map(|rule| {
                let mirrored = rule.mirrored()?;
                Some(
                    mirrored
                        .iter()
                        .map(|t| (t.to_string(), rule.qos()))
                        .collect::<Vec<_>>(),
                )
            })
            .flatten()
            .collect()
    }

    fn send_upstream(&self, request: UpstreamRequest) {
        if let Some(upstream) = self.upstream() {
            if upstream.send(request).is_err() {
                debug!("Bridge '{}': upstream channel closed", self.name());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_acquire_preserves_insertion_order() {
        let mut subs = MirroredSubscriptions::new();
        assert!(subs.is_empty());

        assert!(subs.acquire("a/1", "c1").unwrap());
        assert!(subs.acquire("a/2", "c1").unwrap());
        assert!(subs.acquire("a/3", "c2").unwrap());
        assert!(!subs.acquire("a/2", "c2").unwrap());

        assert_eq!(subs.len(), 3);
        assert_eq!(subs.iter().collect::<Vec<_>>(), vec!["a/1", "a/2", "a/3"]);
    }

    #[test]
    fn test_acquire_same_client_twice_is_idempotent() {
        let mut subs = MirroredSubscriptions::new();
        assert!(subs.acquire("a/1", "c1").unwrap());
        assert!(!subs.acquire("a/1", "c1").unwrap());
        assert_eq!(subs.clients("a/1").unwrap().len(), 1);

        assert_eq!(subs.release("a/1", "c1"), Release::Removed);
        assert!(subs.is_empty());
    }

    #[test]
    fn test_release_keeps_entry_while_required() {
        let mut subs = MirroredSubscriptions::new();
        subs.acquire("a/1", "c1").unwrap();
        subs.acquire("a/1", "c2").unwrap();

        assert_eq!(subs.release("a/1", "c1"), Release::StillRequired);
        assert!(subs.contains("a/1"));
        assert_eq!(subs.release("a/1", "c1"), Release::Unknown);
        assert_eq!(subs.release("a/1", "c2"), Release::Removed);
        assert!(!subs.contains("a/1"));
        assert_eq!(subs.release("a/1", "c2"), Release::Unknown);
    }

    #[test]
    fn test_unlink_head_middle_tail() {
        let mut subs = MirroredSubscriptions::new();
        for t in ["t/1", "t/2", "t/3", "t/4"] {
            subs.acquire(t, "c").unwrap();
        }

        assert_eq!(subs.release("t/2", "c"), Release::Removed);
        assert_eq!(subs.iter().collect::<Vec<_>>(), vec!["t/1", "t/3", "t/4"]);
        assert_eq!(subs.release("t/1", "c"), Release::Removed);
        assert_eq!(subs.iter().collect::<Vec<_>>(), vec!["t/3", "t/4"]);
        assert_eq!(subs.release("t/4", "c"), Release::Removed);
        assert_eq!(subs.iter().collect::<Vec<_>>(), vec!["t/3"]);
        assert_eq!(subs.release("t/4", "c"), Release::Unknown);

        // Freed slots are reused and order still follows insertion
        subs.acquire("t/5", "c").unwrap();
        subs.acquire("t/6", "c").unwrap();
        assert_eq!(subs.iter().collect::<Vec<_>>(), vec!["t/3", "t/5", "t/6"]);

        for t in ["t/3", "t/5", "t/6"] {
            assert_eq!(subs.release(t, "c"), Release::Removed);
        }
        assert!(subs.is_empty());
        assert_eq!(subs.len(), 0);
        assert_eq!(subs.iter().count(), 0);
    }
}
