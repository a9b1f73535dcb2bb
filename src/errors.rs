use actix_web::HttpResponse;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::errors::{CartError, DomainError, OrderError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    StockConflict {
        message: String,
        product_id: Uuid,
        requested: Option<i32>,
        available: Option<i32>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound => AppError::NotFound,
            DomainError::InvalidInput(msg) => AppError::Validation(msg),
            DomainError::Conflict(msg) => AppError::Conflict(msg),
            DomainError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        let message = e.to_string();
        match e {
            OrderError::StockInsufficientAtCommit {
                product_id,
                requested,
                available,
            }
            | OrderError::Cart(CartError::StockExceeded {
                product_id,
                requested,
                available,
            }) => AppError::StockConflict {
                message,
                product_id,
                requested: Some(requested),
                available: Some(available),
            },
            OrderError::ConcurrentStockExhaustion { product_id } => AppError::StockConflict {
                message,
                product_id,
                requested: None,
                available: None,
            },
            OrderError::EmptyCart
            | OrderError::MissingAddress
            | OrderError::UnknownCustomer(_)
            | OrderError::UnknownProduct(_)
            | OrderError::Cart(CartError::InvalidQuantity(_)) => AppError::Validation(message),
            OrderError::OrderCreationFailed | OrderError::Persistence(_) => {
                AppError::Internal(message)
            }
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::NotFound => HttpResponse::NotFound().json(serde_json::json!({
                "error": self.to_string()
            })),
            AppError::Validation(_) => {
                HttpResponse::UnprocessableEntity().json(serde_json::json!({
                    "error": self.to_string()
                }))
            }
            AppError::Conflict(_) => HttpResponse::Conflict().json(serde_json::json!({
                "error": self.to_string()
            })),
            AppError::StockConflict {
                product_id,
                requested,
                available,
                ..
            } => HttpResponse::Conflict().json(serde_json::json!({
                "error": self.to_string(),
                "product_id": product_id,
                "requested": requested,
                "available": available,
            })),
            AppError::Internal(msg) => {
                log::error!("Request failed: {}", msg);
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Internal server error"
                }))
            }
        }
    }
}
