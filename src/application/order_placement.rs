//! The single write path that turns a cart into an order.
//!
//! Header, lines and stock decrements are written inside one store
//! transaction. The stock decrement is a conditional write
//! (`quantity >= requested`) so two orders racing for the last units cannot
//! both win; the loser sees zero rows changed and the whole transaction is
//! rolled back.

use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::cart::CartLine;
use crate::domain::errors::OrderError;
use crate::domain::order::{NewOrderHeader, OrderId, OrderLineInput, OrderStatus};
use crate::domain::ports::{OrderStore, OrderTransaction};

pub struct OrderPlacement<S> {
    store: S,
}

impl<S: OrderStore> OrderPlacement<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Places an order for `lines`.
    ///
    /// `total_amount` is stored as given: it was computed from the prices the
    /// cart captured and is never recomputed here. Lines are written at their
    /// captured unit price, not the live catalog price.
    pub fn place_order(
        &self,
        lines: &[CartLine],
        customer_id: Uuid,
        shipping_address: &str,
        total_amount: &BigDecimal,
    ) -> Result<OrderId, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::EmptyCart);
        }
        let shipping_address = shipping_address.trim();
        if shipping_address.is_empty() {
            return Err(OrderError::MissingAddress);
        }
        if !self.store.customer_exists(customer_id)? {
            return Err(OrderError::UnknownCustomer(customer_id));
        }

        let header = NewOrderHeader {
            customer_id,
            status: OrderStatus::Pending,
            total_amount: total_amount.clone(),
            shipping_address: shipping_address.to_string(),
            created_at: Utc::now(),
        };

        let result = self
            .store
            .run_in_transaction(&mut |tx: &mut dyn OrderTransaction| {
                write_order(tx, &header, lines)
            });

        match &result {
            Ok(order_id) => log::info!(
                "Placed order {} for customer {} ({} lines, total {})",
                order_id,
                customer_id,
                lines.len(),
                total_amount
            ),
            Err(e) if e.is_stock_conflict() => {
                log::warn!("Order for customer {} rolled back: {}", customer_id, e)
            }
            Err(e) => log::error!("Order for customer {} rolled back: {}", customer_id, e),
        }
        result
    }
}

fn write_order(
    tx: &mut dyn OrderTransaction,
    header: &NewOrderHeader,
    lines: &[CartLine],
) -> Result<OrderId, OrderError> {
    let order_id = tx
        .insert_order_header(header)?
        .ok_or(OrderError::OrderCreationFailed)?;

    for line in lines {
        let product_id = line.product_id();
        let requested = line.quantity();

        let available = tx
            .current_stock(product_id)?
            .ok_or(OrderError::UnknownProduct(product_id))?;
        if requested > available {
            return Err(OrderError::StockInsufficientAtCommit {
                product_id,
                requested,
                available,
            });
        }

        tx.insert_order_line(
            order_id,
            &OrderLineInput {
                product_id,
                quantity: requested,
                unit_price: line.unit_price().clone(),
            },
        )?;

        if tx.decrement_stock_if_available(product_id, requested)? == 0 {
            return Err(OrderError::ConcurrentStockExhaustion { product_id });
        }
    }

    Ok(order_id)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use bigdecimal::BigDecimal;
    use uuid::Uuid;

    use super::OrderPlacement;
    use crate::domain::cart::{Cart, CartLine};
    use crate::domain::catalog::ProductSnapshot;
    use crate::domain::errors::OrderError;
    use crate::domain::order::OrderStatus;
    use crate::domain::ports::{CatalogLookup, OrderRepository};
    use crate::infrastructure::memory::InMemoryStore;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).expect("valid decimal")
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        customer_id: Uuid,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(InMemoryStore::new());
            let customer_id = store.add_customer("Ada Lovelace", "1 Analytical Way");
            Self { store, customer_id }
        }

        fn product(&self, name: &str, price: &str, stock: i32) -> ProductSnapshot {
            let id = self.store.add_product(name, dec(price), stock);
            self.store
                .get_product(id)
                .expect("lookup")
                .expect("product exists")
        }

        fn placement(&self) -> OrderPlacement<Arc<InMemoryStore>> {
            OrderPlacement::new(self.store.clone())
        }
    }

    fn cart_of(items: &[(&ProductSnapshot, i32)]) -> Cart {
        let mut cart = Cart::new();
        for (p, q) in items {
            cart.add_or_increment(p, *q).expect("add to cart");
        }
        cart
    }

    #[test]
    fn places_order_and_decrements_stock() {
        let fx = Fixture::new();
        let widget = fx.product("Widget", "10.00", 5);
        let cart = cart_of(&[(&widget, 2)]);
        let total = cart.totals().total;

        let order_id = fx
            .placement()
            .place_order(cart.lines(), fx.customer_id, "123 Main St", &total)
            .expect("order placed");

        assert_eq!(fx.store.stock_of(widget.id), Some(3));
        let order = fx
            .store
            .find_by_id(order_id)
            .expect("find")
            .expect("order exists");
        assert_eq!(order.total_amount, dec("20.00"));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.shipping_address, "123 Main St");
        assert_eq!(order.lines.len(), 1);
        assert_eq!(order.lines[0].quantity, 2);
    }

    #[test]
    fn insufficient_stock_at_commit_rolls_back_everything() {
        let fx = Fixture::new();
        let widget = fx.product("Widget", "10.00", 20);
        // Cart was built while stock was plentiful.
        let cart = cart_of(&[(&widget, 10)]);
        fx.store.set_stock(widget.id, 5);

        let err = fx
            .placement()
            .place_order(cart.lines(), fx.customer_id, "123 Main St", &cart.totals().total)
            .unwrap_err();

        match err {
            OrderError::StockInsufficientAtCommit {
                product_id,
                requested,
                available,
            } => {
                assert_eq!(product_id, widget.id);
                assert_eq!(requested, 10);
                assert_eq!(available, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fx.store.stock_of(widget.id), Some(5));
        assert_eq!(fx.store.order_count(), 0);
        assert_eq!(fx.store.line_count(), 0);
    }

    #[test]
    fn failure_on_a_later_line_undoes_earlier_lines() {
        let fx = Fixture::new();
        let bolts = fx.product("Bolts", "0.50", 100);
        let nuts = fx.product("Nuts", "0.25", 100);
        let cart = cart_of(&[(&bolts, 10), (&nuts, 40)]);
        fx.store.set_stock(nuts.id, 3);

        let err = fx
            .placement()
            .place_order(cart.lines(), fx.customer_id, "Dock 4", &cart.totals().total)
            .unwrap_err();

        assert!(err.is_stock_conflict());
        assert_eq!(fx.store.stock_of(bolts.id), Some(100));
        assert_eq!(fx.store.stock_of(nuts.id), Some(3));
        assert_eq!(fx.store.order_count(), 0);
        assert_eq!(fx.store.line_count(), 0);
    }

    #[test]
    fn guard_failure_is_reported_as_concurrent_exhaustion() {
        let fx = Fixture::new();
        let widget = fx.product("Widget", "10.00", 1);
        let cart = cart_of(&[(&widget, 1)]);
        fx.store.fail_next_decrement();

        let err = fx
            .placement()
            .place_order(cart.lines(), fx.customer_id, "123 Main St", &cart.totals().total)
            .unwrap_err();

        assert!(matches!(
            err,
            OrderError::ConcurrentStockExhaustion { product_id } if product_id == widget.id
        ));
        assert_eq!(fx.store.stock_of(widget.id), Some(1));
        assert_eq!(fx.store.order_count(), 0);
    }

    #[test]
    fn racing_for_the_last_unit_has_exactly_one_winner() {
        let fx = Fixture::new();
        let widget = fx.product("Widget", "10.00", 1);
        let cart = cart_of(&[(&widget, 1)]);
        let total = cart.totals().total;

        // Both transactions read stock = 1 before either decrements.
        let barrier = Arc::new(Barrier::new(2));
        fx.store.pause_after_stock_read(barrier);

        let results: Vec<Result<Uuid, OrderError>> = thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let placement = fx.placement();
                    let lines = cart.lines();
                    let total = &total;
                    let customer_id = fx.customer_id;
                    s.spawn(move || placement.place_order(lines, customer_id, "123 Main St", total))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("thread panicked"))
                .collect()
        });

        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        let loser = results
            .into_iter()
            .find_map(|r| r.err())
            .expect("one placement failed");
        assert!(matches!(loser, OrderError::ConcurrentStockExhaustion { .. }));
        assert_eq!(fx.store.stock_of(widget.id), Some(0));
        assert_eq!(fx.store.order_count(), 1);
        assert_eq!(fx.store.line_count(), 1);
    }

    #[test]
    fn units_sold_never_exceed_stock() {
        let fx = Fixture::new();
        let widget = fx.product("Widget", "1.00", 7);
        let cart = cart_of(&[(&widget, 2)]);
        let total = cart.totals().total;

        let sold: i32 = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let placement = fx.placement();
                    let lines = cart.lines();
                    let total = &total;
                    let customer_id = fx.customer_id;
                    s.spawn(move || placement.place_order(lines, customer_id, "Depot", total))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("thread panicked"))
                .filter(Result::is_ok)
                .count() as i32
                * 2
        });

        assert_eq!(sold, 6);
        assert_eq!(fx.store.stock_of(widget.id), Some(1));
    }

    #[test]
    fn duplicate_lines_for_one_product_see_earlier_decrement() {
        let fx = Fixture::new();
        let widget = fx.product("Widget", "10.00", 5);
        let first = cart_of(&[(&widget, 3)]);
        let lines: Vec<CartLine> = first.lines().iter().chain(first.lines()).cloned().collect();

        let err = fx
            .placement()
            .place_order(&lines, fx.customer_id, "123 Main St", &dec("60.00"))
            .unwrap_err();

        assert!(matches!(
            err,
            OrderError::StockInsufficientAtCommit {
                requested: 3,
                available: 2,
                ..
            }
        ));
        assert_eq!(fx.store.stock_of(widget.id), Some(5));
    }

    #[test]
    fn empty_cart_fails_before_touching_the_store() {
        let fx = Fixture::new();

        let err = fx
            .placement()
            .place_order(&[], fx.customer_id, "123 Main St", &dec("0"))
            .unwrap_err();

        assert!(matches!(err, OrderError::EmptyCart));
        assert_eq!(fx.store.store_calls(), 0);
    }

    #[test]
    fn blank_address_fails_before_touching_the_store() {
        let fx = Fixture::new();
        let widget = fx.product("Widget", "10.00", 5);
        let cart = cart_of(&[(&widget, 1)]);

        let err = fx
            .placement()
            .place_order(cart.lines(), fx.customer_id, "   ", &cart.totals().total)
            .unwrap_err();

        assert!(matches!(err, OrderError::MissingAddress));
        assert_eq!(fx.store.store_calls(), 0);
    }

    #[test]
    fn unknown_customer_is_rejected_without_writes() {
        let fx = Fixture::new();
        let widget = fx.product("Widget", "10.00", 5);
        let cart = cart_of(&[(&widget, 1)]);
        let stranger = Uuid::new_v4();

        let err = fx
            .placement()
            .place_order(cart.lines(), stranger, "123 Main St", &cart.totals().total)
            .unwrap_err();

        assert!(matches!(err, OrderError::UnknownCustomer(id) if id == stranger));
        assert_eq!(fx.store.order_count(), 0);
        assert_eq!(fx.store.stock_of(widget.id), Some(5));
    }

    #[test]
    fn product_removed_from_catalog_is_unknown_at_commit() {
        let fx = Fixture::new();
        let widget = fx.product("Widget", "10.00", 5);
        let cart = cart_of(&[(&widget, 1)]);
        fx.store.remove_product(widget.id);

        let err = fx
            .placement()
            .place_order(cart.lines(), fx.customer_id, "123 Main St", &cart.totals().total)
            .unwrap_err();

        assert!(matches!(err, OrderError::UnknownProduct(id) if id == widget.id));
        assert_eq!(fx.store.order_count(), 0);
    }

    #[test]
    fn missing_generated_id_is_order_creation_failure() {
        let fx = Fixture::new();
        let widget = fx.product("Widget", "10.00", 5);
        let cart = cart_of(&[(&widget, 1)]);
        fx.store.withhold_next_order_id();

        let err = fx
            .placement()
            .place_order(cart.lines(), fx.customer_id, "123 Main St", &cart.totals().total)
            .unwrap_err();

        assert!(matches!(err, OrderError::OrderCreationFailed));
        assert_eq!(fx.store.order_count(), 0);
        assert_eq!(fx.store.stock_of(widget.id), Some(5));
    }

    #[test]
    fn captured_price_survives_catalog_price_change() {
        let fx = Fixture::new();
        let widget = fx.product("Widget", "10.00", 5);
        let cart = cart_of(&[(&widget, 2)]);
        let order_id = fx
            .placement()
            .place_order(cart.lines(), fx.customer_id, "123 Main St", &cart.totals().total)
            .expect("order placed");

        fx.store.set_price(widget.id, dec("12.50"));

        let order = fx
            .store
            .find_by_id(order_id)
            .expect("find")
            .expect("order exists");
        assert_eq!(order.lines[0].unit_price, dec("10.00"));
        assert_eq!(order.total_amount, dec("20.00"));
    }

    #[test]
    fn price_change_between_cart_and_commit_keeps_cart_price() {
        let fx = Fixture::new();
        let widget = fx.product("Widget", "10.00", 5);
        let cart = cart_of(&[(&widget, 1)]);
        fx.store.set_price(widget.id, dec("11.00"));

        let order_id = fx
            .placement()
            .place_order(cart.lines(), fx.customer_id, "123 Main St", &cart.totals().total)
            .expect("order placed");

        let order = fx
            .store
            .find_by_id(order_id)
            .expect("find")
            .expect("order exists");
        assert_eq!(order.lines[0].unit_price, dec("10.00"));
        assert_eq!(order.total_amount, dec("10.00"));
    }
}
