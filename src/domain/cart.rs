//! In-memory staging area for order lines.
//!
//! Prices are captured from the product snapshot the first time a product is
//! added and stay fixed for the life of the line. Stock bounds are enforced
//! against the last snapshot seen and are only advisory; the placement
//! transaction re-reads stock before it writes anything.

use bigdecimal::{BigDecimal, RoundingMode, Zero};
use uuid::Uuid;

use super::catalog::ProductSnapshot;
use super::errors::CartError;

/// Money amounts are rounded to cents.
const MONEY_SCALE: i64 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct TaxPolicy {
    rate: BigDecimal,
}

impl TaxPolicy {
    /// `rate` is a fraction, e.g. `0.21` for 21%.
    pub fn new(rate: BigDecimal) -> Self {
        Self { rate }
    }

    pub fn none() -> Self {
        Self {
            rate: BigDecimal::zero(),
        }
    }

    pub fn rate(&self) -> &BigDecimal {
        &self.rate
    }

    fn tax_on(&self, subtotal: &BigDecimal) -> BigDecimal {
        (subtotal * &self.rate).with_scale_round(MONEY_SCALE, RoundingMode::HalfUp)
    }
}

impl Default for TaxPolicy {
    fn default() -> Self {
        Self::none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    product_id: Uuid,
    name: String,
    unit_price: BigDecimal,
    quantity: i32,
    known_stock: i32,
}

impl CartLine {
    pub fn product_id(&self) -> Uuid {
        self.product_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit_price(&self) -> &BigDecimal {
        &self.unit_price
    }

    pub fn quantity(&self) -> i32 {
        self.quantity
    }

    pub fn known_stock(&self) -> i32 {
        self.known_stock
    }

    pub fn subtotal(&self) -> BigDecimal {
        &self.unit_price * BigDecimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CartTotals {
    pub item_count: i64,
    pub subtotal: BigDecimal,
    pub tax: BigDecimal,
    /// Tax-inclusive; equal to `subtotal` when no tax applies.
    pub total: BigDecimal,
}

#[derive(Debug, Clone, Default)]
pub struct Cart {
    lines: Vec<CartLine>,
    tax: TaxPolicy,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tax(tax: TaxPolicy) -> Self {
        Self {
            lines: Vec::new(),
            tax,
        }
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Adds `quantity` units of `product`, merging with an existing line.
    ///
    /// On error the cart is left untouched.
    pub fn add_or_increment(
        &mut self,
        product: &ProductSnapshot,
        quantity: i32,
    ) -> Result<(), CartError> {
        if quantity <= 0 {
            return Err(CartError::InvalidQuantity(quantity));
        }

        let existing = self.lines.iter().position(|l| l.product_id == product.id);
        let already = existing.map_or(0, |i| self.lines[i].quantity);
        let requested = already
            .checked_add(quantity)
            .ok_or(CartError::InvalidQuantity(quantity))?;

        if requested > product.stock {
            return Err(CartError::StockExceeded {
                product_id: product.id,
                requested,
                available: product.stock,
            });
        }

        match existing {
            Some(i) => {
                let line = &mut self.lines[i];
                line.quantity = requested;
                line.known_stock = product.stock;
            }
            None => self.lines.push(CartLine {
                product_id: product.id,
                name: product.name.clone(),
                unit_price: product.unit_price.clone(),
                quantity,
                known_stock: product.stock,
            }),
        }
        Ok(())
    }

    pub fn remove(&mut self, product_id: Uuid) {
        self.lines.retain(|l| l.product_id != product_id);
    }

    pub fn totals(&self) -> CartTotals {
        let item_count = self.lines.iter().map(|l| i64::from(l.quantity)).sum();
        let subtotal = self
            .lines
            .iter()
            .fold(BigDecimal::zero(), |acc, l| acc + l.subtotal())
            .with_scale_round(MONEY_SCALE, RoundingMode::HalfUp);
        let tax = self.tax.tax_on(&subtotal);
        let total = &subtotal + &tax;
        CartTotals {
            item_count,
            subtotal,
            tax,
            total,
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}
