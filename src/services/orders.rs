use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{AuthUser, GUEST_USER_ID},
    entities::{
        cart,
        order::{self, OrderLine, OrderStatus, PaymentMethod, PaymentStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::carts::CartLines,
};

/// Generates human-readable order numbers from the current timestamp.
///
/// The source of the number is wall-clock milliseconds ("ORD{ms}"); two
/// orders landing in the same millisecond get a "-{n}" suffix so numbers
/// stay distinct and monotonically non-decreasing.
#[derive(Debug, Default)]
pub struct OrderNumberGenerator {
    state: Mutex<(i64, u32)>,
}

impl OrderNumberGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> String {
        self.next_for_millis(Utc::now().timestamp_millis())
    }

    fn next_for_millis(&self, now_ms: i64) -> String {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let (last_ms, seq) = *state;

        // A clock that stands still or runs backwards must not reuse or
        // regress an already issued number.
        if now_ms > last_ms {
            *state = (now_ms, 0);
            format!("ORD{}", now_ms)
        } else {
            let next_seq = seq + 1;
            *state = (last_ms, next_seq);
            format!("ORD{}-{}", last_ms, next_seq)
        }
    }
}

/// Delivery details accompanying an order
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PlaceOrderInput {
    pub cart_id: Uuid,
    #[validate(length(min = 1, message = "Room number is required"))]
    pub room_number: String,
    #[validate(length(equal = 10, message = "Contact number must be 10 digits"))]
    pub contact_number: String,
    /// Free-text; normalized to cash/card/upi
    pub payment_method: String,
    pub special_instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<OrderLine>,
    pub total_amount: Decimal,
    pub room_number: String,
    pub contact_number: String,
    #[schema(value_type = String)]
    pub payment_method: PaymentMethod,
    #[schema(value_type = String)]
    pub status: OrderStatus,
    #[schema(value_type = String)]
    pub payment_status: PaymentStatus,
    pub special_instructions: Option<String>,
    pub is_guest: bool,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<order::Model> for OrderResponse {
    fn from(model: order::Model) -> Self {
        // A snapshot that fails to parse renders as an empty line list
        // rather than failing the whole read.
        let items = serde_json::from_value(model.items.clone()).unwrap_or_default();
        Self {
            id: model.id,
            order_number: model.order_number,
            user_id: model.user_id,
            items,
            total_amount: model.total_amount,
            room_number: model.room_number,
            contact_number: model.contact_number,
            payment_method: model.payment_method,
            status: model.status,
            payment_status: model.payment_status,
            special_instructions: model.special_instructions,
            is_guest: model.is_guest,
            placed_at: model.placed_at,
            updated_at: model.updated_at,
        }
    }
}

/// Admin dashboard counters
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderStats {
    pub total: u64,
    pub pending: u64,
    pub accepted: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub rejected: u64,
    pub total_revenue: Decimal,
    pub today_orders: u64,
}

/// Order submission and reads.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    order_numbers: Arc<OrderNumberGenerator>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db,
            event_sender,
            order_numbers: Arc::new(OrderNumberGenerator::new()),
        }
    }

    /// Places an order from a cart snapshot.
    ///
    /// The snapshot is taken at submission time: later catalog price edits
    /// do not touch placed orders. Insert and cart clear share one
    /// transaction, so a failed insert leaves the cart intact for retry
    /// and a successful one empties it.
    #[instrument(skip(self, input, auth), fields(cart_id = %input.cart_id))]
    pub async fn place_order(
        &self,
        input: PlaceOrderInput,
        auth: &AuthUser,
    ) -> Result<OrderResponse, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;

        let cart_model = cart::Entity::find_by_id(input.cart_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", input.cart_id)))?;

        let lines = CartLines::from_stored(&cart_model.items);
        if lines.is_empty() {
            return Err(ServiceError::ValidationError("Cart is empty".to_string()));
        }

        let snapshot: Vec<OrderLine> = lines
            .lines()
            .iter()
            .map(|l| OrderLine {
                menu_item_id: l.menu_item_id,
                name: l.name.clone(),
                price: l.price,
                quantity: l.quantity,
            })
            .collect();
        let total_amount: Decimal = snapshot.iter().map(OrderLine::line_total).sum();

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order_number = self.order_numbers.next();
        let user_id = if auth.is_guest { GUEST_USER_ID } else { auth.user_id };

        let items_value = serde_json::to_value(&snapshot)
            .map_err(|e| ServiceError::InternalError(format!("Snapshot serialization: {}", e)))?;

        let order_active = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            user_id: Set(user_id),
            items: Set(items_value),
            total_amount: Set(total_amount),
            room_number: Set(input.room_number),
            contact_number: Set(input.contact_number),
            payment_method: Set(PaymentMethod::normalize(&input.payment_method)),
            status: Set(OrderStatus::Pending),
            payment_status: Set(PaymentStatus::Pending),
            special_instructions: Set(input.special_instructions),
            is_guest: Set(auth.is_guest),
            placed_at: Set(now),
            updated_at: Set(now),
        };
        let order_model = order_active.insert(&txn).await?;

        // Successful submission empties the cart
        let mut cart_active: cart::ActiveModel = cart_model.into();
        cart_active.items = Set(serde_json::Value::Array(vec![]));
        cart_active.updated_at = Set(now);
        cart_active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender.send_or_log(Event::OrderPlaced(order_id)).await;
        info!(
            "Order {} placed ({}), total {}",
            order_id, order_number, total_amount
        );

        Ok(order_model.into())
    }

    /// A user's order history, newest first
    #[instrument(skip(self))]
    pub async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<OrderResponse>, ServiceError> {
        let orders = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::PlacedAt)
            .all(&*self.db)
            .await?;
        Ok(orders.into_iter().map(Into::into).collect())
    }

    pub async fn get(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let model = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        Ok(model.into())
    }

    /// All orders, newest first, paginated (admin)
    #[instrument(skip(self))]
    pub async fn all_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<OrderResponse>, u64), ServiceError> {
        let paginator = order::Entity::find()
            .order_by_desc(order::Column::PlacedAt)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders.into_iter().map(Into::into).collect(), total))
    }

    /// Removes an order from history. Owners may delete their own orders;
    /// admins may delete any.
    #[instrument(skip(self, auth))]
    pub async fn delete_order(&self, order_id: Uuid, auth: &AuthUser) -> Result<(), ServiceError> {
        let model = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !auth.is_admin() && (auth.is_guest || model.user_id != auth.user_id) {
            return Err(ServiceError::Forbidden(
                "Only the order's owner may delete it".to_string(),
            ));
        }

        order::Entity::delete_by_id(order_id).exec(&*self.db).await?;
        self.event_sender.send_or_log(Event::OrderDeleted(order_id)).await;
        Ok(())
    }

    /// Dashboard counters. Revenue counts completed orders only.
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<OrderStats, ServiceError> {
        let orders = order::Entity::find().all(&*self.db).await?;

        let today = Utc::now().date_naive();
        let mut stats = OrderStats {
            total: orders.len() as u64,
            pending: 0,
            accepted: 0,
            completed: 0,
            cancelled: 0,
            rejected: 0,
            total_revenue: Decimal::ZERO,
            today_orders: 0,
        };

        for o in &orders {
            match o.status {
                OrderStatus::Pending => stats.pending += 1,
                OrderStatus::Accepted => stats.accepted += 1,
                OrderStatus::Completed => {
                    stats.completed += 1;
                    stats.total_revenue += o.total_amount;
                }
                OrderStatus::Cancelled => stats.cancelled += 1,
                OrderStatus::Rejected => stats.rejected += 1,
            }
            if o.placed_at.date_naive() == today {
                stats.today_orders += 1;
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_numbers_distinct_within_one_millisecond() {
        let generator = OrderNumberGenerator::new();
        let first = generator.next_for_millis(1_700_000_000_000);
        let second = generator.next_for_millis(1_700_000_000_000);
        let third = generator.next_for_millis(1_700_000_000_000);

        assert_eq!(first, "ORD1700000000000");
        assert_eq!(second, "ORD1700000000000-1");
        assert_eq!(third, "ORD1700000000000-2");
        assert_ne!(first, second);
        assert_ne!(second, third);
    }

    #[test]
    fn order_numbers_advance_with_the_clock() {
        let generator = OrderNumberGenerator::new();
        let first = generator.next_for_millis(1_700_000_000_000);
        let second = generator.next_for_millis(1_700_000_000_001);
        assert_eq!(first, "ORD1700000000000");
        assert_eq!(second, "ORD1700000000001");
    }

    #[test]
    fn backwards_clock_does_not_regress_numbers() {
        let generator = OrderNumberGenerator::new();
        let first = generator.next_for_millis(1_700_000_000_005);
        let second = generator.next_for_millis(1_700_000_000_001);
        assert_eq!(first, "ORD1700000000005");
        // Issued against the last seen millisecond, not the earlier one
        assert_eq!(second, "ORD1700000000005-1");
    }

    #[test]
    fn generator_is_shareable_across_tasks() {
        use std::sync::Arc;
        let generator = Arc::new(OrderNumberGenerator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let g = generator.clone();
            handles.push(std::thread::spawn(move || g.next_for_millis(42)));
        }
        let mut numbers: Vec<String> = handles
            .into_iter()
            .map(|h| h.join().expect("thread join"))
            .collect();
        numbers.sort();
        numbers.dedup();
        assert_eq!(numbers.len(), 8);
    }
}
