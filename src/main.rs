use std::sync::Arc;

use dotenvy::dotenv;
use shop_orders::config::{AppConfig, StoreBackend};
use shop_orders::domain::ports::CatalogLookup;
use shop_orders::infrastructure::InMemoryStore;
use shop_orders::{build_server, create_pool, run_migrations, AppState};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = AppConfig::from_env()?;

    let state = match config.backend {
        StoreBackend::Postgres => {
            let database_url = config.database_url.as_deref().unwrap_or_default();
            let pool = create_pool(database_url, &config.pool)?;
            run_migrations(&pool)?;
            AppState::postgres(pool, config.tax.clone())
        }
        StoreBackend::Memory => {
            let store = Arc::new(InMemoryStore::with_demo_catalog());
            for p in store.list_active_products()? {
                log::info!("Demo product {} '{}' (stock {})", p.id, p.name, p.stock);
            }
            log::warn!("Running with the in-memory store; data is lost on exit");
            AppState::in_memory(store, config.tax.clone())
        }
    };

    log::info!(
        "Starting server at http://{}:{} (tax rate {})",
        config.host,
        config.port,
        config.tax.rate()
    );

    build_server(state, &config.host, config.port)?.await?;
    Ok(())
}
