//! Translates membership events into registry mutations.

use std::sync::Arc;

use beacon_types::{ClusterEvent, MemberEventKind};
use tracing::{debug, warn};

use crate::key::MemberKey;
use crate::registry::Registry;

/// Something that reacts to cluster events.
///
/// Handlers are invoked from the listener task, one event at a time.
pub trait EventHandler: Send + Sync {
    fn handle_event(&self, event: &ClusterEvent);
}

/// Applies member events to a [`Registry`].
///
/// | event kind | registry call |
/// |------------|---------------|
/// | `Joined`   | `add`         |
/// | `Left`     | `remove`      |
/// | `Updated`  | `update`      |
///
/// Every other event is ignored.
#[derive(Debug, Clone)]
pub struct EventAdapter {
    registry: Arc<Registry>,
}

impl EventAdapter {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl EventHandler for EventAdapter {
    fn handle_event(&self, event: &ClusterEvent) {
        let ClusterEvent::Member { kind, members } = event else {
            debug!("ignoring non-member event");
            return;
        };

        for member in members {
            let key = MemberKey::new(member);
            match kind {
                MemberEventKind::Joined => {
                    self.registry.add(&key);
                }
                MemberEventKind::Left => {
                    self.registry.remove(&key);
                }
                MemberEventKind::Updated => {
                    if !self.registry.update(&key) {
                        warn!(
                            name = %member.name,
                            address = %member.address,
                            "update for unregistered member ignored"
                        );
                    }
                }
                MemberEventKind::Failed | MemberEventKind::Reaped => {
                    debug!(?kind, name = %member.name, "ignoring member event");
                }
            }
        }
    }
}
