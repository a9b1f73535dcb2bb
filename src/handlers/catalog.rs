use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::catalog::{CustomerProfile, ProductSnapshot};
use crate::errors::AppError;
use crate::AppState;

use super::money;

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub unit_price: String,
    pub stock: i32,
    pub is_active: bool,
}

impl From<ProductSnapshot> for ProductResponse {
    fn from(p: ProductSnapshot) -> Self {
        ProductResponse {
            id: p.id,
            unit_price: money(&p.unit_price),
            name: p.name,
            stock: p.stock,
            is_active: p.is_active,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CustomerResponse {
    pub id: Uuid,
    pub full_name: String,
    pub address: String,
}

impl From<CustomerProfile> for CustomerResponse {
    fn from(c: CustomerProfile) -> Self {
        CustomerResponse {
            id: c.id,
            full_name: c.full_name,
            address: c.address,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductQuery {
    /// Exact product name.
    pub name: Option<String>,
}

/// GET /products
///
/// Lists active products by name, or looks one up by exact `name`.
#[utoipa::path(
    get,
    path = "/products",
    params(
        ("name" = Option<String>, Query, description = "Exact product name"),
    ),
    responses(
        (status = 200, description = "Products", body = Vec<ProductResponse>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "catalog"
)]
pub async fn list_products(
    state: web::Data<AppState>,
    query: web::Query<ProductQuery>,
) -> Result<HttpResponse, AppError> {
    let name = query.into_inner().name;

    let products = web::block(move || match name {
        Some(name) => state
            .catalog
            .find_product_by_name(&name)
            .map(|p| p.into_iter().collect::<Vec<_>>()),
        None => state.catalog.list_active_products(),
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    let body: Vec<ProductResponse> = products.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// GET /products/{id}
#[utoipa::path(
    get,
    path = "/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product UUID"),
    ),
    responses(
        (status = 200, description = "Product found", body = ProductResponse),
        (status = 404, description = "Product not found"),
    ),
    tag = "catalog"
)]
pub async fn get_product(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let product_id = path.into_inner();

    let product = web::block(move || state.catalog.get_product(product_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??
        .ok_or(AppError::NotFound)?;

    Ok(HttpResponse::Ok().json(ProductResponse::from(product)))
}

/// GET /customers/{id}
///
/// Returns the customer's shipping profile.
#[utoipa::path(
    get,
    path = "/customers/{id}",
    params(
        ("id" = Uuid, Path, description = "Customer UUID"),
    ),
    responses(
        (status = 200, description = "Customer found", body = CustomerResponse),
        (status = 404, description = "Customer not found"),
    ),
    tag = "catalog"
)]
pub async fn get_customer(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let customer_id = path.into_inner();

    let customer = web::block(move || state.catalog.get_customer(customer_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??
        .ok_or(AppError::NotFound)?;

    Ok(HttpResponse::Ok().json(CustomerResponse::from(customer)))
}
