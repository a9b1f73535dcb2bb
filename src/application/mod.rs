pub mod checkout;
pub mod order_placement;
pub mod order_service;
