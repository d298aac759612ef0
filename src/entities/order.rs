use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placed order. `items` is a point-in-time snapshot of the cart lines,
/// deliberately decoupled from later catalog edits.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: String,
    /// Purchaser, or the all-zero guest sentinel
    pub user_id: Uuid,
    #[sea_orm(column_type = "Json")]
    pub items: Json,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_amount: Decimal,
    pub room_number: String,
    pub contact_number: String,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    #[sea_orm(nullable)]
    pub special_instructions: Option<String>,
    pub is_guest: bool,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// A single snapshotted line of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub menu_item_id: i32,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
}

impl OrderLine {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Order lifecycle states with an explicit transition table.
///
/// Forward path is pending -> accepted -> completed; cancellation and
/// rejection are reachable from any non-terminal state. Same-state
/// transitions are tolerated so a repeated admin action stays harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Rejected)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: Self) -> bool {
        if self == next {
            return true;
        }
        match (self, next) {
            (Self::Pending, Self::Accepted) => true,
            (Self::Accepted, Self::Completed) => true,
            (from, Self::Cancelled | Self::Rejected) if !from.is_terminal() => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Rejected => "rejected",
        }
    }
}

/// Payment methods accepted at the counter. Anything unrecognized
/// normalizes to UPI, matching how orders were taken before this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "cash")]
    Cash,
    #[sea_orm(string_value = "card")]
    Card,
    #[sea_orm(string_value = "upi")]
    Upi,
}

impl PaymentMethod {
    pub fn normalize(input: &str) -> Self {
        match input.trim().to_ascii_lowercase().as_str() {
            "cash" => Self::Cash,
            "card" => Self::Card,
            _ => Self::Upi,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "paid")]
    Paid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_path_is_legal() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Accepted));
        assert!(OrderStatus::Accepted.can_transition_to(OrderStatus::Completed));
    }

    #[test]
    fn skipping_ahead_is_illegal() {
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Completed));
        assert!(!OrderStatus::Accepted.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn cancellation_from_any_non_terminal_state() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Accepted.can_transition_to(OrderStatus::Rejected));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Rejected));
    }

    #[test]
    fn same_state_is_a_no_op() {
        assert!(OrderStatus::Accepted.can_transition_to(OrderStatus::Accepted));
        assert!(OrderStatus::Completed.can_transition_to(OrderStatus::Completed));
    }

    #[test]
    fn terminal_states() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Accepted.is_terminal());
    }

    #[test]
    fn payment_method_normalization() {
        assert_eq!(PaymentMethod::normalize("cash"), PaymentMethod::Cash);
        assert_eq!(PaymentMethod::normalize("CARD"), PaymentMethod::Card);
        assert_eq!(PaymentMethod::normalize("upi"), PaymentMethod::Upi);
        assert_eq!(PaymentMethod::normalize("netbanking"), PaymentMethod::Upi);
        assert_eq!(PaymentMethod::normalize(""), PaymentMethod::Upi);
    }

    #[test]
    fn order_line_total() {
        use rust_decimal_macros::dec;
        let line = OrderLine {
            menu_item_id: 1,
            name: "Masala Dosa".into(),
            price: dec!(45),
            quantity: 2,
        };
        assert_eq!(line.line_total(), dec!(90));
    }
}
