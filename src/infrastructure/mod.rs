pub mod catalog_repo;
pub mod memory;
pub mod models;
pub mod order_repo;

pub use catalog_repo::DieselCatalog;
pub use memory::InMemoryStore;
pub use order_repo::{DieselOrderRepository, DieselOrderStore};
