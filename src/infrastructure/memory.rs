//! Process-local implementation of every port, used by the test suites and
//! by `APP_STORE=memory` runs.
//!
//! Each statement takes the store lock on its own, so concurrent transactions
//! interleave the way separate database sessions would. A stock decrement
//! holds a row lock on the product until commit or rollback: other
//! transactions keep reading the committed stock, and their own decrements on
//! that product wait for the lock. Orders are only visible to readers once
//! committed. Rollback replays an undo log.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::catalog::{CustomerProfile, ProductSnapshot};
use crate::domain::errors::{DomainError, OrderError};
use crate::domain::order::{
    ListResult, NewOrderHeader, OrderId, OrderLineInput, OrderLineView, OrderStatus, OrderView,
};
use crate::domain::ports::{
    CatalogLookup, OrderRepository, OrderStore, OrderTransaction, TransactionWork,
};

#[derive(Debug, Clone)]
struct StoredOrder {
    id: OrderId,
    customer_id: Uuid,
    status: OrderStatus,
    total_amount: BigDecimal,
    shipping_address: String,
    created_at: DateTime<Utc>,
    committed: bool,
}

#[derive(Debug, Clone)]
struct StoredLine {
    id: Uuid,
    order_id: OrderId,
    product_id: Uuid,
    quantity: i32,
    unit_price: BigDecimal,
}

/// How long a decrement waits for another transaction's row lock.
const ROW_LOCK_WAIT: Duration = Duration::from_secs(5);

/// Uncommitted decrements on one product, all made by `owner`.
#[derive(Debug)]
struct RowLock {
    owner: u64,
    pending: i32,
}

#[derive(Debug, Default)]
struct State {
    customers: HashMap<Uuid, CustomerProfile>,
    /// `stock` is the committed figure.
    products: HashMap<Uuid, ProductSnapshot>,
    orders: Vec<StoredOrder>,
    lines: Vec<StoredLine>,
    row_locks: HashMap<Uuid, RowLock>,
}

impl State {
    fn pending_for(&self, product_id: Uuid, tx: u64) -> i32 {
        self.row_locks
            .get(&product_id)
            .filter(|l| l.owner == tx)
            .map_or(0, |l| l.pending)
    }

    fn locked_by_other(&self, product_id: Uuid, tx: u64) -> bool {
        self.row_locks
            .get(&product_id)
            .is_some_and(|l| l.owner != tx)
    }

    fn view(&self, order: &StoredOrder, with_lines: bool) -> OrderView {
        let lines = if with_lines {
            self.lines
                .iter()
                .filter(|l| l.order_id == order.id)
                .map(|l| OrderLineView {
                    id: l.id,
                    product_id: l.product_id,
                    product_name: self
                        .products
                        .get(&l.product_id)
                        .map(|p| p.name.clone())
                        .unwrap_or_default(),
                    quantity: l.quantity,
                    unit_price: l.unit_price.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };
        OrderView {
            id: order.id,
            customer_id: order.customer_id,
            status: order.status,
            total_amount: order.total_amount.clone(),
            shipping_address: order.shipping_address.clone(),
            created_at: order.created_at,
            lines,
        }
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    row_released: Condvar,
    next_tx: AtomicU64,
    store_calls: AtomicUsize,
    withhold_order_id: AtomicBool,
    fail_decrement: AtomicBool,
    stock_read_barrier: Mutex<Option<Arc<Barrier>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with a couple of customers and products, for local runs.
    pub fn with_demo_catalog() -> Self {
        let store = Self::new();
        store.add_customer("Ada Lovelace", "12 St James's Square, London");
        store.add_customer("Grace Hopper", "1 Navy Yard, Arlington");
        store.add_product("Widget", BigDecimal::from(10), 25);
        store.add_product("Gadget", BigDecimal::new(1999.into(), 2), 8);
        store.add_product("Gizmo", BigDecimal::new(450.into(), 2), 0);
        store
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_customer(&self, full_name: &str, address: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().customers.insert(
            id,
            CustomerProfile {
                id,
                full_name: full_name.to_string(),
                address: address.to_string(),
            },
        );
        id
    }

    /// Product names are unique; adding an existing name updates that
    /// product and returns its id.
    pub fn add_product(&self, name: &str, unit_price: BigDecimal, stock: i32) -> Uuid {
        let mut state = self.lock();
        if let Some(existing) = state.products.values_mut().find(|p| p.name == name) {
            existing.unit_price = unit_price;
            existing.stock = stock;
            existing.is_active = true;
            return existing.id;
        }
        let id = Uuid::new_v4();
        state.products.insert(
            id,
            ProductSnapshot {
                id,
                name: name.to_string(),
                unit_price,
                stock,
                is_active: true,
            },
        );
        id
    }

    pub fn set_stock(&self, product_id: Uuid, stock: i32) {
        if let Some(p) = self.lock().products.get_mut(&product_id) {
            p.stock = stock;
        }
    }

    pub fn set_price(&self, product_id: Uuid, unit_price: BigDecimal) {
        if let Some(p) = self.lock().products.get_mut(&product_id) {
            p.unit_price = unit_price;
        }
    }

    pub fn set_active(&self, product_id: Uuid, is_active: bool) {
        if let Some(p) = self.lock().products.get_mut(&product_id) {
            p.is_active = is_active;
        }
    }

    pub fn remove_product(&self, product_id: Uuid) {
        self.lock().products.remove(&product_id);
    }

    pub fn stock_of(&self, product_id: Uuid) -> Option<i32> {
        self.lock().products.get(&product_id).map(|p| p.stock)
    }

    pub fn order_count(&self) -> usize {
        self.lock().orders.iter().filter(|o| o.committed).count()
    }

    pub fn line_count(&self) -> usize {
        let state = self.lock();
        state
            .lines
            .iter()
            .filter(|l| state.orders.iter().any(|o| o.id == l.order_id && o.committed))
            .count()
    }

    /// Number of `OrderStore` calls made so far.
    pub fn store_calls(&self) -> usize {
        self.store_calls.load(Ordering::SeqCst)
    }

    /// The next header insert reports no generated id.
    pub fn withhold_next_order_id(&self) {
        self.withhold_order_id.store(true, Ordering::SeqCst);
    }

    /// The next stock decrement reports zero rows changed, as if another
    /// transaction had taken the stock first.
    pub fn fail_next_decrement(&self) {
        self.fail_decrement.store(true, Ordering::SeqCst);
    }

    /// Every authoritative stock read waits on `barrier` afterwards.
    pub fn pause_after_stock_read(&self, barrier: Arc<Barrier>) {
        *self
            .stock_read_barrier
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(barrier);
    }
}

enum Undo {
    Order(OrderId),
    Line(Uuid),
}

struct MemoryTransaction<'a> {
    store: &'a InMemoryStore,
    id: u64,
    undo: Vec<Undo>,
    created: Vec<OrderId>,
}

impl<'a> MemoryTransaction<'a> {
    fn begin(store: &'a InMemoryStore) -> Self {
        Self {
            store,
            id: store.next_tx.fetch_add(1, Ordering::SeqCst),
            undo: Vec::new(),
            created: Vec::new(),
        }
    }

    fn commit(self) {
        let mut guard = self.store.lock();
        let state = &mut *guard;
        let tx = self.id;
        state.row_locks.retain(|product_id, lock| {
            if lock.owner != tx {
                return true;
            }
            if let Some(p) = state.products.get_mut(product_id) {
                p.stock -= lock.pending;
            }
            false
        });
        for order in state.orders.iter_mut() {
            if self.created.contains(&order.id) {
                order.committed = true;
            }
        }
        drop(guard);
        self.store.row_released.notify_all();
    }

    fn rollback(self) {
        let mut state = self.store.lock();
        let tx = self.id;
        state.row_locks.retain(|_, lock| lock.owner != tx);
        for step in self.undo.into_iter().rev() {
            match step {
                Undo::Order(id) => state.orders.retain(|o| o.id != id),
                Undo::Line(id) => state.lines.retain(|l| l.id != id),
            }
        }
        drop(state);
        self.store.row_released.notify_all();
    }
}

impl OrderTransaction for MemoryTransaction<'_> {
    fn insert_order_header(
        &mut self,
        header: &NewOrderHeader,
    ) -> Result<Option<OrderId>, OrderError> {
        if self.store.withhold_order_id.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        let id = Uuid::new_v4();
        self.store.lock().orders.push(StoredOrder {
            id,
            customer_id: header.customer_id,
            status: header.status,
            total_amount: header.total_amount.clone(),
            shipping_address: header.shipping_address.clone(),
            created_at: header.created_at,
            committed: false,
        });
        self.undo.push(Undo::Order(id));
        self.created.push(id);
        Ok(Some(id))
    }

    fn current_stock(&mut self, product_id: Uuid) -> Result<Option<i32>, OrderError> {
        let stock = {
            let state = self.store.lock();
            state
                .products
                .get(&product_id)
                .map(|p| p.stock - state.pending_for(product_id, self.id))
        };
        let barrier = self
            .store
            .stock_read_barrier
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(barrier) = barrier {
            barrier.wait();
        }
        Ok(stock)
    }

    fn insert_order_line(
        &mut self,
        order_id: OrderId,
        line: &OrderLineInput,
    ) -> Result<(), OrderError> {
        let id = Uuid::new_v4();
        self.store.lock().lines.push(StoredLine {
            id,
            order_id,
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price.clone(),
        });
        self.undo.push(Undo::Line(id));
        Ok(())
    }

    fn decrement_stock_if_available(
        &mut self,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<usize, OrderError> {
        if self.store.fail_decrement.swap(false, Ordering::SeqCst) {
            return Ok(0);
        }
        let mut state = self.store.lock();
        let deadline = Instant::now() + ROW_LOCK_WAIT;
        while state.locked_by_other(product_id, self.id) {
            let now = Instant::now();
            if now >= deadline {
                return Err(OrderError::Persistence(format!(
                    "timed out waiting for the row lock on product {product_id}"
                )));
            }
            state = self
                .store
                .row_released
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        let Some(committed) = state.products.get(&product_id).map(|p| p.stock) else {
            return Ok(0);
        };
        if committed - state.pending_for(product_id, self.id) < quantity {
            return Ok(0);
        }
        state
            .row_locks
            .entry(product_id)
            .or_insert(RowLock {
                owner: self.id,
                pending: 0,
            })
            .pending += quantity;
        Ok(1)
    }
}

impl OrderStore for InMemoryStore {
    fn customer_exists(&self, customer_id: Uuid) -> Result<bool, OrderError> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.lock().customers.contains_key(&customer_id))
    }

    fn run_in_transaction(&self, work: &mut TransactionWork<'_>) -> Result<OrderId, OrderError> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        let mut tx = MemoryTransaction::begin(self);
        let result = work(&mut tx);
        match result {
            Ok(_) => tx.commit(),
            Err(_) => tx.rollback(),
        }
        result
    }
}

impl CatalogLookup for InMemoryStore {
    fn get_product(&self, product_id: Uuid) -> Result<Option<ProductSnapshot>, DomainError> {
        Ok(self.lock().products.get(&product_id).cloned())
    }

    fn find_product_by_name(&self, name: &str) -> Result<Option<ProductSnapshot>, DomainError> {
        Ok(self
            .lock()
            .products
            .values()
            .find(|p| p.name == name)
            .cloned())
    }

    fn list_active_products(&self) -> Result<Vec<ProductSnapshot>, DomainError> {
        let mut products: Vec<ProductSnapshot> = self
            .lock()
            .products
            .values()
            .filter(|p| p.is_active)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    fn get_customer(&self, customer_id: Uuid) -> Result<Option<CustomerProfile>, DomainError> {
        Ok(self.lock().customers.get(&customer_id).cloned())
    }
}

impl OrderRepository for InMemoryStore {
    fn find_by_id(&self, id: OrderId) -> Result<Option<OrderView>, DomainError> {
        let state = self.lock();
        Ok(state
            .orders
            .iter()
            .find(|o| o.id == id && o.committed)
            .map(|o| state.view(o, true)))
    }

    fn list(&self, page: i64, limit: i64) -> Result<ListResult, DomainError> {
        let state = self.lock();
        let mut committed: Vec<&StoredOrder> =
            state.orders.iter().filter(|o| o.committed).collect();
        // Newest first; the stable sort keeps later inserts ahead on ties.
        committed.reverse();
        committed.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = usize::try_from(page.max(1).saturating_sub(1).saturating_mul(limit))
            .unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(ListResult {
            total: committed.len() as i64,
            items: committed
                .into_iter()
                .skip(offset)
                .take(limit)
                .map(|o| state.view(o, false))
                .collect(),
        })
    }

    fn update_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<usize, DomainError> {
        let mut state = self.lock();
        match state
            .orders
            .iter_mut()
            .find(|o| o.id == id && o.committed && o.status == expected)
        {
            Some(order) => {
                order.status = next;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
