use bigdecimal::BigDecimal;
use uuid::Uuid;

use crate::domain::cart::{Cart, TaxPolicy};
use crate::domain::errors::OrderError;
use crate::domain::order::OrderId;
use crate::domain::ports::{CatalogLookup, OrderStore};

use super::order_placement::OrderPlacement;

#[derive(Debug, Clone, Copy)]
pub struct CheckoutItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Receipt for a committed order.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub item_count: i64,
    pub subtotal: BigDecimal,
    pub tax: BigDecimal,
    pub total: BigDecimal,
}

/// Builds a cart from current catalog prices and places it.
pub struct Checkout<C, S> {
    catalog: C,
    placement: OrderPlacement<S>,
    tax: TaxPolicy,
}

impl<C: CatalogLookup, S: OrderStore> Checkout<C, S> {
    pub fn new(catalog: C, store: S, tax: TaxPolicy) -> Self {
        Self {
            catalog,
            placement: OrderPlacement::new(store),
            tax,
        }
    }

    pub fn submit(
        &self,
        customer_id: Uuid,
        shipping_address: &str,
        items: &[CheckoutItem],
    ) -> Result<PlacedOrder, OrderError> {
        let mut cart = Cart::with_tax(self.tax.clone());
        for item in items {
            let product = self
                .catalog
                .get_product(item.product_id)?
                .ok_or(OrderError::UnknownProduct(item.product_id))?;
            cart.add_or_increment(&product, item.quantity)?;
        }

        let totals = cart.totals();
        let order_id =
            self.placement
                .place_order(cart.lines(), customer_id, shipping_address, &totals.total)?;
        cart.clear();

        Ok(PlacedOrder {
            order_id,
            item_count: totals.item_count,
            subtotal: totals.subtotal,
            tax: totals.tax,
            total: totals.total,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;

    use super::*;
    use crate::domain::errors::CartError;
    use crate::domain::ports::OrderRepository;
    use crate::infrastructure::memory::InMemoryStore;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).expect("valid decimal")
    }

    fn checkout(
        store: &Arc<InMemoryStore>,
        tax: TaxPolicy,
    ) -> Checkout<Arc<InMemoryStore>, Arc<InMemoryStore>> {
        Checkout::new(store.clone(), store.clone(), tax)
    }

    #[test]
    fn submit_stores_tax_inclusive_total() {
        let store = Arc::new(InMemoryStore::new());
        let customer = store.add_customer("Ada", "1 Analytical Way");
        let widget = store.add_product("Widget", dec("10.00"), 5);

        let placed = checkout(&store, TaxPolicy::new(dec("0.21")))
            .submit(
                customer,
                "1 Analytical Way",
                &[CheckoutItem {
                    product_id: widget,
                    quantity: 2,
                }],
            )
            .expect("placed");

        assert_eq!(placed.item_count, 2);
        assert_eq!(placed.subtotal, dec("20.00"));
        assert_eq!(placed.tax, dec("4.20"));
        assert_eq!(placed.total, dec("24.20"));
        let order = store
            .find_by_id(placed.order_id)
            .expect("find")
            .expect("exists");
        assert_eq!(order.total_amount, dec("24.20"));
        assert_eq!(store.stock_of(widget), Some(3));
    }

    #[test]
    fn repeated_items_are_merged_before_the_stock_check() {
        let store = Arc::new(InMemoryStore::new());
        let customer = store.add_customer("Ada", "here");
        let widget = store.add_product("Widget", dec("1.00"), 4);
        let item = CheckoutItem {
            product_id: widget,
            quantity: 3,
        };

        let err = checkout(&store, TaxPolicy::none())
            .submit(customer, "here", &[item, item])
            .unwrap_err();

        assert!(matches!(
            err,
            OrderError::Cart(CartError::StockExceeded {
                requested: 6,
                available: 4,
                ..
            })
        ));
        assert_eq!(store.store_calls(), 0);
    }

    #[test]
    fn unknown_product_is_rejected_before_placement() {
        let store = Arc::new(InMemoryStore::new());
        let customer = store.add_customer("Ada", "here");
        let missing = Uuid::new_v4();

        let err = checkout(&store, TaxPolicy::none())
            .submit(
                customer,
                "here",
                &[CheckoutItem {
                    product_id: missing,
                    quantity: 1,
                }],
            )
            .unwrap_err();

        assert!(matches!(err, OrderError::UnknownProduct(id) if id == missing));
        assert_eq!(store.store_calls(), 0);
    }

    #[test]
    fn no_items_is_an_empty_cart() {
        let store = Arc::new(InMemoryStore::new());
        let customer = store.add_customer("Ada", "here");

        let err = checkout(&store, TaxPolicy::none())
            .submit(customer, "here", &[])
            .unwrap_err();

        assert!(matches!(err, OrderError::EmptyCart));
    }
}
