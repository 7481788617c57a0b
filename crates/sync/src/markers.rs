//! "Recently touched" markers with per-id expiry.
//!
//! Each marker is just a deadline. The owning task sleeps until
//! [`MarkerSet::next_deadline`] and then calls [`MarkerSet::expire`], so
//! clearing the set cancels every pending expiry at once.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct MarkerSet {
    window: Duration,
    deadlines: HashMap<String, Instant>,
}

impl MarkerSet {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadlines: HashMap::new(),
        }
    }

    /// Raise (or refresh) the marker for `id`; the window restarts at `now`.
    pub fn touch(&mut self, id: &str, now: Instant) {
        self.deadlines.insert(id.to_string(), now + self.window);
    }

    pub fn is_marked(&self, id: &str, now: Instant) -> bool {
        self.deadlines
            .get(id)
            .map(|deadline| now < *deadline)
            .unwrap_or(false)
    }

    /// Earliest pending expiry, if any marker is up
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Drop every marker whose window has elapsed at `now`; returns the
    /// cleared ids.
    pub fn expire(&mut self, now: Instant) -> Vec<String> {
        let mut cleared: Vec<(Instant, String)> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, deadline)| (*deadline, id.clone()))
            .collect();
        cleared.sort();

        for (_, id) in &cleared {
            self.deadlines.remove(id);
        }
        cleared.into_iter().map(|(_, id)| id).collect()
    }

    /// Forget markers for ids that no longer exist
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.deadlines.retain(|id, _| keep(id));
    }

    /// Marked ids, oldest touch first
    pub fn ids(&self) -> Vec<String> {
        let mut entries: Vec<(&Instant, &String)> =
            self.deadlines.iter().map(|(id, d)| (d, id)).collect();
        entries.sort();
        entries.into_iter().map(|(_, id)| id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    pub fn clear(&mut self) {
        self.deadlines.clear();
    }
}
