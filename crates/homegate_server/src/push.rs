//! Push fan-out.
//!
//! Every open push socket holds a broadcast receiver. Delivery is
//! at-most-once: a receiver that falls behind skips the events it missed.

use crate::gateway::DeviceGateway;
use homegate_protocol::{Device, PushEvent};
use std::collections::HashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Broadcasts push events to every connected client.
#[derive(Clone)]
pub struct PushHub {
    sender: broadcast::Sender<PushEvent>,
}

impl PushHub {
    /// Creates a hub buffering up to `capacity` events per receiver.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event, returning how many sockets will receive it.
    pub fn publish(&self, event: PushEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Opens a receiver for a new socket.
    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of open receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Forwards the gateway's change stream into the hub.
    ///
    /// Returns `None` if the gateway cannot be observed. Must be called
    /// from within a Tokio runtime.
    pub fn forward_from(&self, gateway: &dyn DeviceGateway) -> Option<JoinHandle<()>> {
        let mut changes = gateway.subscribe()?;
        let hub = self.clone();

        Some(tokio::spawn(async move {
            let mut forwarder = Forwarder::default();
            loop {
                match changes.recv().await {
                    Ok(device) => {
                        for event in forwarder.events_for(&device) {
                            hub.publish(event);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "push forwarder lagged behind gateway");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("gateway change stream closed");
                        break;
                    }
                }
            }
        }))
    }
}

/// Turns device snapshots into push events, emitting a reachability event
/// only when reachability actually changed.
#[derive(Default)]
struct Forwarder {
    reachable: HashMap<String, bool>,
}

impl Forwarder {
    fn events_for(&mut self, device: &Device) -> Vec<PushEvent> {
        let mut events = vec![PushEvent::device_updated(device)];
        let previous = self.reachable.insert(device.id.clone(), device.reachable);
        if previous.is_some_and(|was| was != device.reachable)
            || (previous.is_none() && !device.reachable)
        {
            debug!(device_id = %device.id, reachable = device.reachable, "reachability changed");
            events.push(PushEvent::Reachability {
                device_id: device.id.clone(),
                reachable: device.reachable,
            });
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;
    use homegate_protocol::{DeviceKind, DeviceState};

    #[test]
    fn publish_without_receivers() {
        let hub = PushHub::new(4);
        assert_eq!(hub.publish(PushEvent::Reachability {
            device_id: "x".into(),
            reachable: true,
        }), 0);
    }

    #[test]
    fn forwarder_emits_reachability_on_change_only() {
        let mut forwarder = Forwarder::default();
        let mut device = Device::new("plug", "Plug", DeviceKind::Plug);

        assert_eq!(forwarder.events_for(&device).len(), 1);
        device.reachable = false;
        assert_eq!(forwarder.events_for(&device).len(), 2);
        assert_eq!(forwarder.events_for(&device).len(), 1);
    }

    #[tokio::test]
    async fn forwards_gateway_changes() {
        let gateway = MemoryGateway::new([Device::new("lamp", "Lamp", DeviceKind::Light)]);
        let hub = PushHub::new(8);
        let mut rx = hub.subscribe();
        let task = hub.forward_from(&gateway).unwrap();

        gateway
            .simulate_external_change("lamp", &DeviceState::new().with_on(true))
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            PushEvent::DeviceUpdated {
                device_id: "lamp".into(),
                revision: 1,
                state: DeviceState::new().with_on(true),
            }
        );
        task.abort();
    }

    #[tokio::test]
    async fn lagging_receiver_skips_events() {
        let hub = PushHub::new(1);
        let mut rx = hub.subscribe();
        for id in ["a", "b", "c"] {
            hub.publish(PushEvent::Reachability {
                device_id: id.into(),
                reachable: true,
            });
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert_eq!(rx.recv().await.unwrap().device_id(), "c");
    }
}
