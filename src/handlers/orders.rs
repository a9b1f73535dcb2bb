use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::checkout::CheckoutItem;
use crate::domain::order::{OrderStatus, OrderView};
use crate::errors::AppError;
use crate::AppState;

use super::money;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    pub shipping_address: String,
    pub lines: Vec<CreateOrderLineRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOrderResponse {
    pub id: Uuid,
    pub item_count: i64,
    /// Decimal amounts are strings to avoid floating-point issues, e.g. "9.99"
    pub subtotal: String,
    pub tax: String,
    pub total: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderLineResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    /// Price captured when the order was placed.
    pub unit_price: String,
    pub subtotal: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub status_label: String,
    pub total_amount: String,
    pub shipping_address: String,
    pub created_at: String,
    pub lines: Vec<OrderLineResponse>,
}

impl From<OrderView> for OrderResponse {
    fn from(o: OrderView) -> Self {
        OrderResponse {
            id: o.id,
            customer_id: o.customer_id,
            status: o.status,
            status_label: o.status.display_name().to_string(),
            total_amount: money(&o.total_amount),
            shipping_address: o.shipping_address,
            created_at: o.created_at.to_rfc3339(),
            lines: o
                .lines
                .into_iter()
                .map(|l| OrderLineResponse {
                    id: l.id,
                    product_id: l.product_id,
                    subtotal: money(&l.subtotal()),
                    product_name: l.product_name,
                    quantity: l.quantity,
                    unit_price: money(&l.unit_price),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

// ── Pagination ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListOrdersParams {
    /// Page number (1-based). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page. Defaults to 20, maximum 100.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /orders
///
/// Prices the requested lines from the catalog, then writes the order, its
/// lines and the stock decrements in one transaction. Stock that ran out
/// before or during the transaction is reported as 409 and nothing is
/// written.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created successfully", body = CreateOrderResponse),
        (status = 409, description = "Not enough stock; nothing was written"),
        (status = 422, description = "Empty cart, missing address, unknown customer or product, or bad quantity"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    state: web::Data<AppState>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let items: Vec<CheckoutItem> = body
        .lines
        .iter()
        .map(|l| CheckoutItem {
            product_id: l.product_id,
            quantity: l.quantity,
        })
        .collect();

    let placed = web::block(move || {
        state
            .checkout
            .submit(body.customer_id, &body.shipping_address, &items)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(CreateOrderResponse {
        id: placed.order_id,
        item_count: placed.item_count,
        subtotal: money(&placed.subtotal),
        tax: money(&placed.tax),
        total: money(&placed.total),
    }))
}

/// GET /orders/{id}
///
/// Returns the order together with its order lines.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let order = web::block(move || state.orders.get_order(order_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    match order {
        Some(order) => Ok(HttpResponse::Ok().json(OrderResponse::from(order))),
        None => Err(AppError::NotFound),
    }
}

/// GET /orders
///
/// Returns a paginated list of orders (without their lines).
/// Use `page` (1-based) and `limit` to control pagination.
#[utoipa::path(
    get,
    path = "/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("limit" = Option<i64>, Query, description = "Items per page (default 20, max 100)"),
    ),
    responses(
        (status = 200, description = "Paginated list of orders", body = ListOrdersResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    state: web::Data<AppState>,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let page = params.page.max(1);
    let limit = params.limit.clamp(1, 100);

    let result = web::block(move || state.orders.list_orders(page, limit))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(ListOrdersResponse {
        items: result.items.into_iter().map(OrderResponse::from).collect(),
        total: result.total,
        page,
        limit,
    }))
}

/// PATCH /orders/{id}/status
///
/// Moves an order to a new status. Completed and cancelled orders are final.
#[utoipa::path(
    patch,
    path = "/orders/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Status changed concurrently"),
        (status = 422, description = "Order is in a final status"),
    ),
    tag = "orders"
)]
pub async fn update_order_status(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let next = body.into_inner().status;

    let order = web::block(move || state.orders.update_status(order_id, next))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}
