use std::time::Duration;

use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::RunQueryDsl;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_size: u32,
    /// Applied to every pooled connection; `None` keeps the server default.
    pub statement_timeout: Option<Duration>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 10,
            statement_timeout: Some(Duration::from_secs(5)),
        }
    }
}

/// Sets `statement_timeout` when a connection is opened, so a stalled
/// statement errors out and its transaction rolls back.
#[derive(Debug)]
struct StatementTimeout(Duration);

impl CustomizeConnection<PgConnection, diesel::r2d2::Error> for StatementTimeout {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), diesel::r2d2::Error> {
        diesel::sql_query(format!("SET statement_timeout = {}", self.0.as_millis()))
            .execute(conn)
            .map(|_| ())
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub fn create_pool(database_url: &str, settings: &PoolSettings) -> Result<DbPool, r2d2::Error> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let mut builder = Pool::builder().max_size(settings.max_size);
    if let Some(timeout) = settings.statement_timeout {
        builder = builder.connection_customizer(Box::new(StatementTimeout(timeout)));
    }
    builder.build(manager)
}
