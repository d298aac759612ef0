use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set, TransactionTrait};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::order::{self, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::orders::OrderResponse,
};

/// Applies order status transitions against the typed transition table.
///
/// The legality check runs server-side inside a transaction, so a second
/// admin session (or any direct caller) racing the first cannot push an
/// order through an illegal jump.
#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderStatusService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Updates the status of an order, validating the transition.
    ///
    /// Re-applying the current status is a no-op returning the unchanged
    /// order, so repeated admin actions stay harmless.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = new_status.as_str()))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderResponse, ServiceError> {
        let txn = self.db.begin().await?;

        let order_model = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order_model.status;

        if old_status == new_status {
            txn.commit().await?;
            return Ok(order_model.into());
        }

        if !old_status.can_transition_to(new_status) {
            warn!(
                "Rejected status transition for order {}: '{}' -> '{}'",
                order_id,
                old_status.as_str(),
                new_status.as_str()
            );
            return Err(ServiceError::InvalidOperation(format!(
                "Cannot transition order from '{}' to '{}'",
                old_status.as_str(),
                new_status.as_str()
            )));
        }

        let mut active: order::ActiveModel = order_model.into();
        active.status = Set(new_status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            })
            .await;

        info!(
            "Order {} status updated from '{}' to '{}'",
            order_id,
            old_status.as_str(),
            new_status.as_str()
        );

        Ok(updated.into())
    }
}
