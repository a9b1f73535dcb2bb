use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::catalog::{CustomerProfile, ProductSnapshot};
use crate::domain::errors::DomainError;
use crate::domain::ports::CatalogLookup;
use crate::schema::{customers, products};

use super::models::{CustomerRow, ProductRow};

pub struct DieselCatalog {
    pool: DbPool,
}

impl DieselCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl CatalogLookup for DieselCatalog {
    fn get_product(&self, product_id: Uuid) -> Result<Option<ProductSnapshot>, DomainError> {
        let mut conn = self.pool.get()?;
        let row = products::table
            .find(product_id)
            .select(ProductRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(Into::into))
    }

    fn find_product_by_name(&self, name: &str) -> Result<Option<ProductSnapshot>, DomainError> {
        let mut conn = self.pool.get()?;
        let row = products::table
            .filter(products::name.eq(name))
            .select(ProductRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(Into::into))
    }

    fn list_active_products(&self) -> Result<Vec<ProductSnapshot>, DomainError> {
        let mut conn = self.pool.get()?;
        let rows = products::table
            .filter(products::is_active.eq(true))
            .order(products::name.asc())
            .select(ProductRow::as_select())
            .load(&mut conn)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    fn get_customer(&self, customer_id: Uuid) -> Result<Option<CustomerProfile>, DomainError> {
        let mut conn = self.pool.get()?;
        let row = customers::table
            .find(customer_id)
            .select(CustomerRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(Into::into))
    }
}
