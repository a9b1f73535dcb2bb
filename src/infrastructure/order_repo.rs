use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::{DomainError, OrderError};
use crate::domain::order::{
    ListResult, NewOrderHeader, OrderId, OrderLineInput, OrderLineView, OrderStatus, OrderView,
};
use crate::domain::ports::{OrderRepository, OrderStore, OrderTransaction, TransactionWork};
use crate::schema::{customers, order_lines, orders, products};

use super::models::{NewOrderLineRow, NewOrderRow, OrderLineRow, OrderRow};

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

impl From<diesel::result::Error> for OrderError {
    fn from(e: diesel::result::Error) -> Self {
        OrderError::Persistence(e.to_string())
    }
}

impl From<r2d2::Error> for OrderError {
    fn from(e: r2d2::Error) -> Self {
        OrderError::Persistence(e.to_string())
    }
}

// ── Placement store ──────────────────────────────────────────────────────────

/// Postgres-backed [`OrderStore`]. Each placement checks out one pooled
/// connection and runs inside a diesel transaction on it.
pub struct DieselOrderStore {
    pool: DbPool,
}

impl DieselOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

struct PgOrderTransaction<'c> {
    conn: &'c mut PgConnection,
}

impl OrderTransaction for PgOrderTransaction<'_> {
    fn insert_order_header(
        &mut self,
        header: &NewOrderHeader,
    ) -> Result<Option<OrderId>, OrderError> {
        let id = diesel::insert_into(orders::table)
            .values(&NewOrderRow {
                customer_id: header.customer_id,
                status: header.status.as_storage(),
                total_amount: &header.total_amount,
                shipping_address: &header.shipping_address,
                created_at: header.created_at,
                updated_at: header.created_at,
            })
            .returning(orders::id)
            .get_result::<Uuid>(self.conn)
            .optional()?;
        Ok(id)
    }

    fn current_stock(&mut self, product_id: Uuid) -> Result<Option<i32>, OrderError> {
        let stock = products::table
            .find(product_id)
            .select(products::quantity)
            .first::<i32>(self.conn)
            .optional()?;
        Ok(stock)
    }

    fn insert_order_line(
        &mut self,
        order_id: OrderId,
        line: &OrderLineInput,
    ) -> Result<(), OrderError> {
        diesel::insert_into(order_lines::table)
            .values(&NewOrderLineRow {
                order_id,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: &line.unit_price,
            })
            .execute(self.conn)?;
        Ok(())
    }

    fn decrement_stock_if_available(
        &mut self,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<usize, OrderError> {
        // UPDATE products SET quantity = quantity - $q
        //  WHERE id = $id AND quantity >= $q
        let rows = diesel::update(
            products::table
                .filter(products::id.eq(product_id))
                .filter(products::quantity.ge(quantity)),
        )
        .set((
            products::quantity.eq(products::quantity - quantity),
            products::updated_at.eq(Utc::now()),
        ))
        .execute(self.conn)?;
        Ok(rows)
    }
}

impl OrderStore for DieselOrderStore {
    fn customer_exists(&self, customer_id: Uuid) -> Result<bool, OrderError> {
        let mut conn = self.pool.get()?;
        let exists = diesel::select(diesel::dsl::exists(customers::table.find(customer_id)))
            .get_result::<bool>(&mut conn)?;
        Ok(exists)
    }

    fn run_in_transaction(&self, work: &mut TransactionWork<'_>) -> Result<OrderId, OrderError> {
        let mut pooled = self.pool.get()?;
        let conn: &mut PgConnection = &mut pooled;

        conn.transaction::<_, OrderError, _>(|conn| {
            let mut tx = PgOrderTransaction { conn };
            work(&mut tx)
        })
    }
}

// ── Read side ────────────────────────────────────────────────────────────────

pub struct DieselOrderRepository {
    pool: DbPool,
}

impl DieselOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn to_view(row: OrderRow, lines: Vec<OrderLineView>) -> Result<OrderView, DomainError> {
    Ok(OrderView {
        id: row.id,
        customer_id: row.customer_id,
        status: row.status.parse()?,
        total_amount: row.total_amount,
        shipping_address: row.shipping_address,
        created_at: row.created_at,
        lines,
    })
}

impl OrderRepository for DieselOrderRepository {
    fn find_by_id(&self, id: OrderId) -> Result<Option<OrderView>, DomainError> {
        let mut conn = self.pool.get()?;

        let order = orders::table
            .filter(orders::id.eq(id))
            .select(OrderRow::as_select())
            .first(&mut conn)
            .optional()?;

        let Some(order) = order else {
            return Ok(None);
        };

        // Product name is joined for display; the price comes from the line.
        let lines: Vec<(OrderLineRow, String)> = order_lines::table
            .inner_join(products::table)
            .filter(order_lines::order_id.eq(order.id))
            .order(order_lines::created_at.asc())
            .select((OrderLineRow::as_select(), products::name))
            .load(&mut conn)?;

        let lines = lines
            .into_iter()
            .map(|(l, product_name)| OrderLineView {
                id: l.id,
                product_id: l.product_id,
                product_name,
                quantity: l.quantity,
                unit_price: l.unit_price,
            })
            .collect();

        to_view(order, lines).map(Some)
    }

    fn list(&self, page: i64, limit: i64) -> Result<ListResult, DomainError> {
        let mut conn = self.pool.get()?;

        let offset = page.max(1).saturating_sub(1).saturating_mul(limit);
        conn.transaction::<_, DomainError, _>(|conn| {
            let total: i64 = orders::table.count().get_result(conn)?;

            let rows = orders::table
                .select(OrderRow::as_select())
                .order(orders::created_at.desc())
                .limit(limit)
                .offset(offset)
                .load(conn)?;

            Ok(ListResult {
                items: rows
                    .into_iter()
                    .map(|o| to_view(o, vec![]))
                    .collect::<Result<_, _>>()?,
                total,
            })
        })
    }

    fn update_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<usize, DomainError> {
        let mut conn = self.pool.get()?;

        let rows = diesel::update(
            orders::table
                .filter(orders::id.eq(id))
                .filter(orders::status.eq(expected.as_storage())),
        )
        .set((
            orders::status.eq(next.as_storage()),
            orders::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;
        Ok(rows)
    }
}
