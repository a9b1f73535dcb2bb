pub mod catalog;
pub mod orders;

use bigdecimal::{BigDecimal, RoundingMode};
use utoipa::OpenApi;

/// Amounts leave the service as decimal strings with two places.
pub(crate) fn money(amount: &BigDecimal) -> String {
    amount.with_scale_round(2, RoundingMode::HalfUp).to_string()
}

#[derive(OpenApi)]
#[openapi(
    paths(
        orders::create_order,
        orders::get_order,
        orders::list_orders,
        orders::update_order_status,
        catalog::list_products,
        catalog::get_product,
        catalog::get_customer,
    ),
    tags(
        (name = "orders", description = "Order placement and order history"),
        (name = "catalog", description = "Product and customer lookups"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn money_always_has_two_places() {
        assert_eq!(money(&BigDecimal::from(10)), "10.00");
        assert_eq!(money(&BigDecimal::from_str("2.0979").expect("decimal")), "2.10");
        assert_eq!(money(&BigDecimal::from_str("0.5").expect("decimal")), "0.50");
    }

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/orders",
            "/orders/{id}",
            "/orders/{id}/status",
            "/products",
            "/products/{id}",
            "/customers/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
