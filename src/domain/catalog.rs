use bigdecimal::BigDecimal;
use uuid::Uuid;

/// A product as the catalog reported it at lookup time.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSnapshot {
    pub id: Uuid,
    pub name: String,
    pub unit_price: BigDecimal,
    pub stock: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerProfile {
    pub id: Uuid,
    pub full_name: String,
    pub address: String,
}
