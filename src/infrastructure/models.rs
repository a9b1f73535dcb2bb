use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::catalog::{CustomerProfile, ProductSnapshot};
use crate::schema::{customers, order_lines, orders, products};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = customers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CustomerRow {
    pub id: Uuid,
    pub full_name: String,
    pub address: String,
}

impl From<CustomerRow> for CustomerProfile {
    fn from(row: CustomerRow) -> Self {
        CustomerProfile {
            id: row.id,
            full_name: row.full_name,
            address: row.address,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = customers)]
pub struct NewCustomerRow<'a> {
    pub full_name: &'a str,
    pub address: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub unit_price: BigDecimal,
    pub quantity: i32,
    pub is_active: bool,
}

impl From<ProductRow> for ProductSnapshot {
    fn from(row: ProductRow) -> Self {
        ProductSnapshot {
            id: row.id,
            name: row.name,
            unit_price: row.unit_price,
            stock: row.quantity,
            is_active: row.is_active,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = products)]
pub struct NewProductRow<'a> {
    pub name: &'a str,
    pub unit_price: BigDecimal,
    pub quantity: i32,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: String,
    pub total_amount: BigDecimal,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrderRow<'a> {
    pub customer_id: Uuid,
    pub status: &'a str,
    pub total_amount: &'a BigDecimal,
    pub shipping_address: &'a str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = order_lines)]
#[diesel(belongs_to(OrderRow, foreign_key = order_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderLineRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = order_lines)]
pub struct NewOrderLineRow<'a> {
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: &'a BigDecimal,
}
