use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::{cart, menu_item},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// One line of a session cart. Price and name are resolved from the
/// catalog when the item is first added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub menu_item_id: i32,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
}

/// The cart's line collection as a pure, synchronous reducer.
///
/// At most one line per menu item id; a quantity reaching zero removes
/// the line. The collection round-trips through the stored JSON value,
/// and a malformed stored value is treated as an empty cart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartLines {
    lines: Vec<CartLine>,
}

impl CartLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deserializes a stored collection, falling back to empty on any
    /// malformed value. There is no schema versioning on stored carts.
    pub fn from_stored(value: &serde_json::Value) -> Self {
        match serde_json::from_value::<Vec<CartLine>>(value.clone()) {
            Ok(lines) => Self { lines },
            Err(e) => {
                warn!("Discarding malformed stored cart: {}", e);
                Self::default()
            }
        }
    }

    pub fn to_stored(&self) -> serde_json::Value {
        serde_json::to_value(&self.lines).unwrap_or_else(|_| serde_json::Value::Array(vec![]))
    }

    /// Adds one unit of the item; inserts a new line at quantity 1 when
    /// the item is not yet in the cart. Never fails.
    pub fn add(&mut self, menu_item_id: i32, name: &str, price: Decimal) {
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|l| l.menu_item_id == menu_item_id)
        {
            line.quantity += 1;
        } else {
            self.lines.push(CartLine {
                menu_item_id,
                name: name.to_string(),
                price,
                quantity: 1,
            });
        }
    }

    /// Removes one unit; deletes the line when quantity would reach zero.
    /// A no-op for items not present.
    pub fn remove_one(&mut self, menu_item_id: i32) {
        if let Some(pos) = self.lines.iter().position(|l| l.menu_item_id == menu_item_id) {
            if self.lines[pos].quantity > 1 {
                self.lines[pos].quantity -= 1;
            } else {
                self.lines.remove(pos);
            }
        }
    }

    /// Sets the quantity directly; zero or negative deletes the line.
    pub fn set_quantity(&mut self, menu_item_id: i32, quantity: i32) {
        if quantity <= 0 {
            self.lines.retain(|l| l.menu_item_id != menu_item_id);
        } else if let Some(line) = self
            .lines
            .iter_mut()
            .find(|l| l.menu_item_id == menu_item_id)
        {
            line.quantity = quantity;
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn total_items(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity as i64).sum()
    }

    pub fn total_price(&self) -> Decimal {
        self.lines
            .iter()
            .map(|l| l.price * Decimal::from(l.quantity))
            .sum()
    }

    pub fn quantity_of(&self, menu_item_id: i32) -> i32 {
        self.lines
            .iter()
            .find(|l| l.menu_item_id == menu_item_id)
            .map(|l| l.quantity)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }
}

/// Cart state as returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct CartSummary {
    pub id: Uuid,
    pub session_key: String,
    pub items: Vec<CartLine>,
    pub total_items: i64,
    pub total_price: Decimal,
}

impl CartSummary {
    fn from_model(model: &cart::Model, lines: &CartLines) -> Self {
        Self {
            id: model.id,
            session_key: model.session_key.clone(),
            items: lines.lines().to_vec(),
            total_items: lines.total_items(),
            total_price: lines.total_price(),
        }
    }
}

/// Session cart service.
///
/// Every mutation rewrites the full serialized line collection, so the
/// stored cart always reflects the last operation the session performed.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Loads the cart stored under `session_key`, creating an empty one on
    /// first use. This is the page-refresh path: the same key always
    /// yields the same lines.
    #[instrument(skip(self))]
    pub async fn get_or_create(&self, session_key: &str) -> Result<CartSummary, ServiceError> {
        if session_key.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Session key must not be empty".to_string(),
            ));
        }

        if let Some(model) = cart::Entity::find()
            .filter(cart::Column::SessionKey.eq(session_key))
            .one(&*self.db)
            .await?
        {
            let lines = CartLines::from_stored(&model.items);
            return Ok(CartSummary::from_model(&model, &lines));
        }

        let now = Utc::now();
        let model = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            session_key: Set(session_key.to_string()),
            items: Set(serde_json::Value::Array(vec![])),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = model.insert(&*self.db).await?;
        info!("Created cart {} for session", model.id);

        Ok(CartSummary::from_model(&model, &CartLines::new()))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, cart_id: Uuid) -> Result<CartSummary, ServiceError> {
        let model = self.load(cart_id).await?;
        let lines = CartLines::from_stored(&model.items);
        Ok(CartSummary::from_model(&model, &lines))
    }

    /// Adds one unit of a menu item, resolving its current price and name
    /// from the catalog.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        cart_id: Uuid,
        menu_item_id: i32,
    ) -> Result<CartSummary, ServiceError> {
        let item = menu_item::Entity::find_by_id(menu_item_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Menu item {} not found", menu_item_id))
            })?;

        self.mutate(cart_id, |lines| {
            lines.add(item.id, &item.name, item.price);
        })
        .await
    }

    /// Removes one unit of a menu item; a no-op when it is not in the cart.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        cart_id: Uuid,
        menu_item_id: i32,
    ) -> Result<CartSummary, ServiceError> {
        self.mutate(cart_id, |lines| lines.remove_one(menu_item_id))
            .await
    }

    /// Sets a line's quantity directly; zero or less removes the line.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        cart_id: Uuid,
        menu_item_id: i32,
        quantity: i32,
    ) -> Result<CartSummary, ServiceError> {
        self.mutate(cart_id, |lines| lines.set_quantity(menu_item_id, quantity))
            .await
    }

    /// Empties the cart. Order placement calls this inside its own
    /// transaction; this entry point serves the explicit "clear cart"
    /// action.
    #[instrument(skip(self))]
    pub async fn clear(&self, cart_id: Uuid) -> Result<CartSummary, ServiceError> {
        let summary = self.mutate(cart_id, |lines| lines.clear()).await?;
        self.event_sender.send_or_log(Event::CartCleared(cart_id)).await;
        Ok(summary)
    }

    async fn load(&self, cart_id: Uuid) -> Result<cart::Model, ServiceError> {
        cart::Entity::find_by_id(cart_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))
    }

    async fn mutate(
        &self,
        cart_id: Uuid,
        apply: impl FnOnce(&mut CartLines),
    ) -> Result<CartSummary, ServiceError> {
        let model = self.load(cart_id).await?;
        let mut lines = CartLines::from_stored(&model.items);
        apply(&mut lines);

        let mut active: cart::ActiveModel = model.into();
        active.items = Set(lines.to_stored());
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.event_sender.send_or_log(Event::CartUpdated(cart_id)).await;

        Ok(CartSummary::from_model(&updated, &lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn dosa() -> (i32, &'static str, Decimal) {
        (1, "Masala Dosa", dec!(45))
    }

    fn chai() -> (i32, &'static str, Decimal) {
        (4, "Masala Chai", dec!(15))
    }

    #[test]
    fn add_increments_existing_line() {
        let mut lines = CartLines::new();
        let (id, name, price) = dosa();
        lines.add(id, name, price);
        lines.add(id, name, price);

        assert_eq!(lines.lines().len(), 1);
        assert_eq!(lines.quantity_of(id), 2);
        assert_eq!(lines.total_items(), 2);
    }

    #[test]
    fn remove_one_deletes_at_zero() {
        let mut lines = CartLines::new();
        let (id, name, price) = dosa();
        lines.add(id, name, price);
        lines.remove_one(id);

        assert_eq!(lines.quantity_of(id), 0);
        assert!(lines.is_empty());

        // Removing an absent item is a no-op
        lines.remove_one(id);
        assert!(lines.is_empty());
    }

    #[test]
    fn set_quantity_zero_removes_line() {
        let mut lines = CartLines::new();
        let (id, name, price) = dosa();
        lines.add(id, name, price);
        lines.set_quantity(id, 0);
        assert_eq!(lines.quantity_of(id), 0);
        assert!(lines.is_empty());
    }

    #[test]
    fn set_quantity_ignores_unknown_items() {
        let mut lines = CartLines::new();
        lines.set_quantity(99, 5);
        assert!(lines.is_empty());
    }

    #[test]
    fn example_cart_totals() {
        // 2x Masala Dosa @45 + 1x Masala Chai @15
        let mut lines = CartLines::new();
        let (dosa_id, dosa_name, dosa_price) = dosa();
        let (chai_id, chai_name, chai_price) = chai();
        lines.add(dosa_id, dosa_name, dosa_price);
        lines.add(dosa_id, dosa_name, dosa_price);
        lines.add(chai_id, chai_name, chai_price);

        assert_eq!(lines.total_price(), dec!(105));
        assert_eq!(lines.total_items(), 3);
    }

    #[test]
    fn malformed_stored_value_becomes_empty_cart() {
        let lines = CartLines::from_stored(&serde_json::json!({"not": "a cart"}));
        assert!(lines.is_empty());

        let lines = CartLines::from_stored(&serde_json::json!([{"menu_item_id": "bogus"}]));
        assert!(lines.is_empty());
    }

    #[test]
    fn stored_round_trip_preserves_lines() {
        let mut lines = CartLines::new();
        let (id, name, price) = dosa();
        lines.add(id, name, price);
        lines.add(id, name, price);

        let restored = CartLines::from_stored(&lines.to_stored());
        assert_eq!(restored, lines);
    }

    proptest! {
        /// For any sequence of add/remove calls the total item count
        /// equals the sum of per-line quantities and never goes negative.
        #[test]
        fn totals_never_negative(ops in proptest::collection::vec((0..5i32, proptest::bool::ANY), 0..64)) {
            let mut lines = CartLines::new();
            for (item, is_add) in ops {
                if is_add {
                    lines.add(item, "item", dec!(10));
                } else {
                    lines.remove_one(item);
                }
                let summed: i64 = lines.lines().iter().map(|l| l.quantity as i64).sum();
                prop_assert_eq!(lines.total_items(), summed);
                prop_assert!(lines.total_items() >= 0);
                prop_assert!(lines.lines().iter().all(|l| l.quantity >= 1));
            }
        }
    }
}
