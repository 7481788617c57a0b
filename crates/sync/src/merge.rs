//! Applies decoded stream events to the roster.

use crate::markers::MarkerSet;
use crate::protocol::{BiometricEvent, StreamEvent};
use crate::store::EntityStore;
use tokio::time::Instant;
use tracing::debug;

/// What a single merge did to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The record was marked Present and its marker raised
    Updated { id: String, time: String },
    /// The event named an id the roster does not know
    UnknownEntity { id: String },
    /// The event kind carries no attendance
    Ignored { kind: String },
}

pub struct EventMerger<'a> {
    store: &'a mut EntityStore,
    markers: &'a mut MarkerSet,
}

impl<'a> EventMerger<'a> {
    pub fn new(store: &'a mut EntityStore, markers: &'a mut MarkerSet) -> Self {
        Self { store, markers }
    }

    /// Merge one event. Status and time are overwritten, so replaying an
    /// event leaves the record unchanged.
    pub fn apply(&mut self, event: &StreamEvent, now: Instant) -> MergeOutcome {
        match event {
            StreamEvent::Biometric(ev) => self.apply_biometric(ev, now),
            StreamEvent::Other { kind } => {
                debug!("Ignoring stream event of kind '{}'", kind);
                MergeOutcome::Ignored { kind: kind.clone() }
            }
        }
    }

    fn apply_biometric(&mut self, event: &BiometricEvent, now: Instant) -> MergeOutcome {
        let time = event.time_of_day();

        if self.store.mark_present(&event.entity_id, time).is_none() {
            return MergeOutcome::UnknownEntity {
                id: event.entity_id.clone(),
            };
        }

        self.markers.touch(&event.entity_id, now);
        MergeOutcome::Updated {
            id: event.entity_id.clone(),
            time: time.to_string(),
        }
    }
}
