use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::errors::DomainError;

pub type OrderId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    /// The value stored in `orders.status`.
    pub fn as_storage(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn from_display(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.display_name() == s)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        self == next || !self.is_terminal()
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_storage() == s)
            .ok_or_else(|| DomainError::InvalidInput(format!("unknown order status '{s}'")))
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Header row written at the start of the placement transaction.
#[derive(Debug, Clone)]
pub struct NewOrderHeader {
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub total_amount: BigDecimal,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct OrderLineInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct OrderLineView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

impl OrderLineView {
    pub fn subtotal(&self) -> BigDecimal {
        &self.unit_price * BigDecimal::from(self.quantity)
    }
}

#[derive(Debug, Clone)]
pub struct OrderView {
    pub id: OrderId,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub total_amount: BigDecimal,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLineView>,
}

#[derive(Debug, Clone)]
pub struct ListResult {
    pub items: Vec<OrderView>,
    pub total: i64,
}
