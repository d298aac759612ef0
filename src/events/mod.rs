use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::order::OrderStatus;
use crate::entities::profile::Role;

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    // Order events
    OrderPlaced(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    OrderDeleted(Uuid),

    // Cart events
    CartUpdated(Uuid),
    CartCleared(Uuid),

    // Catalog events
    MenuItemCreated(i32),
    MenuItemUpdated(i32),
    MenuItemDeleted(i32),

    // Review events
    ReviewCreated(Uuid),
    ReviewLiked {
        review_id: Uuid,
        likes: i32,
    },

    // User events
    UserRegistered(Uuid),
    UserRoleChanged {
        user_id: Uuid,
        role: Role,
    },
    UserDeleted(Uuid),
}

impl Event {
    /// Events that should wake consumers watching the order feed.
    pub fn concerns_orders(&self) -> bool {
        matches!(
            self,
            Event::OrderPlaced(_) | Event::OrderStatusChanged { .. } | Event::OrderDeleted(_)
        )
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is gone.
    /// Mutations must not be rolled back because nobody is listening.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

/// Broadcast fan-out for in-process consumers. A background task owns the
/// mpsc receiving end and republishes here; consumers subscribe and
/// unsubscribe by dropping their receiver.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    fn publish(&self, event: Event) {
        // Err just means no subscriber is currently listening
        let _ = self.tx.send(event);
    }
}

/// Processes incoming events and republishes them on the broadcast bus.
/// Consumers re-fetch whatever collection the event names; there is no
/// incremental delta protocol.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, bus: EventBus) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderPlaced(order_id) => {
                info!("Order placed: {}", order_id);
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(
                    "Order {} status changed from '{}' to '{}'",
                    order_id,
                    old_status.as_str(),
                    new_status.as_str()
                );
            }
            Event::UserDeleted(user_id) => {
                info!("User deleted: {}", user_id);
            }
            other => {
                info!("Event: {:?}", other);
            }
        }

        bus.publish(event);
    }

    warn!("Event processing loop has ended");
}
