// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// A change in the store that invalidates whatever a client has computed
/// from it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreEvent {
    TrackersChanged { tracker_id: i64 },
    CategoriesChanged { category_id: i64 },
    RecordsChanged { tracker_id: i64 },
    /// Sent to a subscriber that fell behind and missed events.
    Resync,
}

impl StoreEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StoreEvent::TrackersChanged { .. } => "trackers_changed",
            StoreEvent::CategoriesChanged { .. } => "categories_changed",
            StoreEvent::RecordsChanged { .. } => "records_changed",
            StoreEvent::Resync => "resync",
        }
    }
}

/// Publish/subscribe channel for store changes.
#[derive(Clone, Debug)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<StoreEvent>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishing with no subscribers is not an error; the event is dropped.
    pub fn publish(&self, event: StoreEvent) {
        match self.sender.send(event) {
            Ok(receivers) => trace!("Published {} to {} subscribers.", event.name(), receivers),
            Err(_) => trace!("Published {} with no subscribers.", event.name()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
