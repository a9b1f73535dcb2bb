use std::sync::Arc;

use uuid::Uuid;

use super::catalog::{CustomerProfile, ProductSnapshot};
use super::errors::{DomainError, OrderError};
use super::order::{ListResult, NewOrderHeader, OrderId, OrderLineInput, OrderStatus, OrderView};

/// Unit of work handed to [`OrderStore::run_in_transaction`].
pub type TransactionWork<'a> =
    dyn FnMut(&mut dyn OrderTransaction) -> Result<OrderId, OrderError> + 'a;

/// Statements issued inside one placement transaction. Every call runs on the
/// same connection, so later calls observe earlier writes.
pub trait OrderTransaction {
    /// Inserts the header and returns the id the store generated for it.
    fn insert_order_header(&mut self, header: &NewOrderHeader)
        -> Result<Option<OrderId>, OrderError>;

    /// Authoritative stock for `product_id`, or `None` if it does not exist.
    fn current_stock(&mut self, product_id: Uuid) -> Result<Option<i32>, OrderError>;

    fn insert_order_line(&mut self, order_id: OrderId, line: &OrderLineInput)
        -> Result<(), OrderError>;

    /// Subtracts `quantity` only when at least that much is in stock, as a
    /// single conditional write. Returns the number of rows changed; zero
    /// means the stock was not there.
    fn decrement_stock_if_available(&mut self, product_id: Uuid, quantity: i32)
        -> Result<usize, OrderError>;
}

pub trait OrderStore: Send + Sync {
    fn customer_exists(&self, customer_id: Uuid) -> Result<bool, OrderError>;

    /// Begins a transaction, runs `work`, then commits if it returned `Ok`
    /// and rolls back otherwise.
    fn run_in_transaction(&self, work: &mut TransactionWork<'_>) -> Result<OrderId, OrderError>;
}

pub trait CatalogLookup: Send + Sync {
    fn get_product(&self, product_id: Uuid) -> Result<Option<ProductSnapshot>, DomainError>;
    fn find_product_by_name(&self, name: &str) -> Result<Option<ProductSnapshot>, DomainError>;
    fn list_active_products(&self) -> Result<Vec<ProductSnapshot>, DomainError>;
    fn get_customer(&self, customer_id: Uuid) -> Result<Option<CustomerProfile>, DomainError>;
}

pub trait OrderRepository: Send + Sync {
    fn find_by_id(&self, id: OrderId) -> Result<Option<OrderView>, DomainError>;
    fn list(&self, page: i64, limit: i64) -> Result<ListResult, DomainError>;
    /// Sets `next` only if the order is still in `expected`. Returns rows changed.
    fn update_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<usize, DomainError>;
}

impl<T: OrderStore + ?Sized> OrderStore for Arc<T> {
    fn customer_exists(&self, customer_id: Uuid) -> Result<bool, OrderError> {
        (**self).customer_exists(customer_id)
    }

    fn run_in_transaction(&self, work: &mut TransactionWork<'_>) -> Result<OrderId, OrderError> {
        (**self).run_in_transaction(work)
    }
}

impl<T: CatalogLookup + ?Sized> CatalogLookup for Arc<T> {
    fn get_product(&self, product_id: Uuid) -> Result<Option<ProductSnapshot>, DomainError> {
        (**self).get_product(product_id)
    }

    fn find_product_by_name(&self, name: &str) -> Result<Option<ProductSnapshot>, DomainError> {
        (**self).find_product_by_name(name)
    }

    fn list_active_products(&self) -> Result<Vec<ProductSnapshot>, DomainError> {
        (**self).list_active_products()
    }

    fn get_customer(&self, customer_id: Uuid) -> Result<Option<CustomerProfile>, DomainError> {
        (**self).get_customer(customer_id)
    }
}

impl<T: OrderRepository + ?Sized> OrderRepository for Arc<T> {
    fn find_by_id(&self, id: OrderId) -> Result<Option<OrderView>, DomainError> {
        (**self).find_by_id(id)
    }

    fn list(&self, page: i64, limit: i64) -> Result<ListResult, DomainError> {
        (**self).list(page, limit)
    }

    fn update_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<usize, DomainError> {
        (**self).update_status(id, expected, next)
    }
}
