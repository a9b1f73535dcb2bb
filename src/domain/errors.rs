use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found")]
    NotFound,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Rejections raised while staging lines in a [`Cart`](super::cart::Cart).
///
/// These are advisory: the stock figure is whatever the catalog reported when
/// the line was added, and is re-checked when the order is placed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("quantity must be greater than zero, got {0}")]
    InvalidQuantity(i32),
    #[error("{requested} units of product {product_id} requested but only {available} in stock")]
    StockExceeded {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },
}

/// Every way an order placement can fail. The store has always been rolled
/// back by the time one of these reaches the caller.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("cannot place an order from an empty cart")]
    EmptyCart,
    #[error("customer {0} does not exist")]
    UnknownCustomer(Uuid),
    #[error("a shipping address is required")]
    MissingAddress,
    #[error("product {0} does not exist")]
    UnknownProduct(Uuid),
    #[error("the order header could not be created")]
    OrderCreationFailed,
    #[error("product {product_id}: {requested} units requested but only {available} in stock")]
    StockInsufficientAtCommit {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },
    #[error("product {product_id} was sold out by a concurrent order")]
    ConcurrentStockExhaustion { product_id: Uuid },
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl OrderError {
    /// True for the recoverable outcomes of competing for stock, where the
    /// caller can retry with a smaller quantity.
    pub fn is_stock_conflict(&self) -> bool {
        matches!(
            self,
            OrderError::StockInsufficientAtCommit { .. }
                | OrderError::ConcurrentStockExhaustion { .. }
                | OrderError::Cart(CartError::StockExceeded { .. })
        )
    }

    /// True when the request itself was rejected before anything was written.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            OrderError::EmptyCart
                | OrderError::UnknownCustomer(_)
                | OrderError::MissingAddress
                | OrderError::UnknownProduct(_)
                | OrderError::Cart(CartError::InvalidQuantity(_))
        )
    }
}

impl From<DomainError> for OrderError {
    fn from(e: DomainError) -> Self {
        OrderError::Persistence(e.to_string())
    }
}
