//! Peer routing table built on a [BucketStore].

use std::{collections::BTreeSet, time::Instant};

use tracing::{debug, trace};

use crate::{
    common::{Id, Node},
    config::Config,
    store::{BucketStore, PutOutcome},
    Result,
};

#[derive(Debug, Clone, PartialEq)]
/// A [Node] and the last time it was seen.
pub struct Contact {
    node: Node,
    last_seen: Instant,
}

impl Contact {
    /// Create a contact seen just now.
    pub fn new(node: Node) -> Self {
        Contact {
            node,
            last_seen: Instant::now(),
        }
    }

    // === Getters ===

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn id(&self) -> &Id {
        self.node.id()
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }
}

#[derive(Debug)]
/// Kademlia routing table of [Contact]s, bucketed by distance to the local node.
///
/// The local node always sits alone in bucket 0. New contacts are only
/// accepted while their bucket has room, existing ones are kept.
pub struct ContactStore {
    local: Node,
    store: BucketStore<Contact>,
    /// Every contact but the local node's, oldest first.
    by_last_seen: BTreeSet<(Instant, Id)>,
}

impl ContactStore {
    /// Create a new [ContactStore] around `local`.
    ///
    /// The local Id of `config` is replaced by `local`'s Id, which must
    /// still match its identifier bit length.
    pub fn new(local: Node, config: Config) -> Result<Self> {
        let store = BucketStore::with_config(Config {
            local_id: Some(local.id().clone()),
            ..config
        })?;

        let outcome = store.put(local.id().clone(), Contact::new(local.clone()))?;
        debug_assert!(outcome.is_inserted());

        debug!(local_id = %local.id(), address = %local.address(), "Created contact store");

        Ok(ContactStore {
            local,
            store,
            by_last_seen: BTreeSet::new(),
        })
    }

    // === Getters ===

    pub fn local(&self) -> &Node {
        &self.local
    }

    /// Number of contacts, not counting the local node.
    pub fn len(&self) -> usize {
        self.by_last_seen.len()
    }

    /// Returns `true` if there are no contacts besides the local node.
    pub fn is_empty(&self) -> bool {
        self.by_last_seen.is_empty()
    }

    // === Public Methods ===

    /// Add a new contact or refresh an existing one, returns `false` if
    /// `node` is new and its bucket is full.
    pub fn add(&mut self, node: Node) -> Result<bool> {
        if node.id() == self.local.id() {
            return Ok(false);
        }

        let contact = Contact::new(node);
        let key = (contact.last_seen, contact.id().clone());

        match self.store.put(contact.id().clone(), contact)? {
            PutOutcome::Inserted => {}
            PutOutcome::Replaced(previous) => {
                self.by_last_seen
                    .remove(&(previous.last_seen, previous.id().clone()));
            }
            PutOutcome::Rejected(contact) => {
                trace!(id = %contact.id(), "Bucket is full, dropping contact");

                return Ok(false);
            }
        }

        self.by_last_seen.insert(key);

        Ok(true)
    }

    /// Mark the contact of `id` as seen just now, returns `false` if there is none.
    pub fn touch(&mut self, id: &Id) -> Result<bool> {
        if id == self.local.id() {
            return Ok(false);
        }

        match self.store.get(id)? {
            Some(contact) => self.add(contact.node),
            None => Ok(false),
        }
    }

    /// Remove the contact of `id`, returns `false` if there is none.
    ///
    /// The local node is never removed.
    pub fn remove(&mut self, id: &Id) -> Result<bool> {
        if id == self.local.id() {
            return Ok(false);
        }

        match self.store.remove(id)? {
            Some(contact) => {
                self.by_last_seen
                    .remove(&(contact.last_seen, contact.id().clone()));

                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn contains(&self, id: &Id) -> Result<bool> {
        self.store.contains_key(id)
    }

    pub fn get(&self, id: &Id) -> Result<Option<Contact>> {
        self.store.get(id)
    }

    /// All nodes, the local one first, then by distance to it.
    pub fn nodes(&self) -> Vec<Node> {
        self.store
            .values()
            .iter()
            .map(|contact| contact.node)
            .collect()
    }

    /// The contact that was seen the longest time ago, the first to check
    /// for liveness when its bucket fills up.
    pub fn least_recently_seen(&self) -> Option<Contact> {
        let (_, id) = self.by_last_seen.first()?;

        self.store.get(id).ok().flatten()
    }

    /// Up to `count` nodes closest to `target`, never including the local node.
    pub fn closest(&self, target: &Id, count: usize) -> Result<Vec<Node>> {
        Ok(self
            .store
            .closest_entries(target, count)?
            .into_iter()
            .map(|(_, contact)| contact.node)
            .collect())
    }

    /// Remove every contact but the local node.
    pub fn clear(&mut self) {
        self.store.clear();
        self.by_last_seen.clear();

        // Bucket 0 is empty again and the local Id has the store's length.
        let local = Contact::new(self.local.clone());
        let outcome = self.store.put(local.id().clone(), local);
        debug_assert!(matches!(outcome, Ok(PutOutcome::Inserted)));
    }
}
