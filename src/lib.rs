pub mod application;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::checkout::Checkout;
use application::order_service::OrderService;
use domain::cart::TaxPolicy;
use domain::ports::{CatalogLookup, OrderRepository, OrderStore};
use infrastructure::{DieselCatalog, DieselOrderRepository, DieselOrderStore, InMemoryStore};

pub use db::{create_pool, DbPool, PoolSettings};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut conn = pool.get()?;
    let applied = conn.run_pending_migrations(MIGRATIONS)?;
    if !applied.is_empty() {
        log::info!("Applied {} database migration(s)", applied.len());
    }
    Ok(())
}

/// Services shared by every request handler.
pub struct AppState {
    pub checkout: Checkout<Arc<dyn CatalogLookup>, Arc<dyn OrderStore>>,
    pub orders: OrderService<Arc<dyn OrderRepository>>,
    pub catalog: Arc<dyn CatalogLookup>,
}

impl AppState {
    pub fn new(
        catalog: Arc<dyn CatalogLookup>,
        store: Arc<dyn OrderStore>,
        orders: Arc<dyn OrderRepository>,
        tax: TaxPolicy,
    ) -> Self {
        Self {
            checkout: Checkout::new(catalog.clone(), store, tax),
            orders: OrderService::new(orders),
            catalog,
        }
    }

    pub fn postgres(pool: DbPool, tax: TaxPolicy) -> Self {
        Self::new(
            Arc::new(DieselCatalog::new(pool.clone())),
            Arc::new(DieselOrderStore::new(pool.clone())),
            Arc::new(DieselOrderRepository::new(pool)),
            tax,
        )
    }

    pub fn in_memory(store: Arc<InMemoryStore>, tax: TaxPolicy) -> Self {
        Self::new(store.clone(), store.clone(), store, tax)
    }
}

/// Registers every route. Shared by the server and the HTTP tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/orders")
            .route("", web::post().to(handlers::orders::create_order))
            .route("", web::get().to(handlers::orders::list_orders))
            .route("/{id}", web::get().to(handlers::orders::get_order))
            .route(
                "/{id}/status",
                web::patch().to(handlers::orders::update_order_status),
            ),
    )
    .service(
        web::scope("/products")
            .route("", web::get().to(handlers::catalog::list_products))
            .route("/{id}", web::get().to(handlers::catalog::get_product)),
    )
    .route(
        "/customers/{id}",
        web::get().to(handlers::catalog::get_customer),
    )
    .service(
        SwaggerUi::new("/swagger-ui/{_:.*}")
            .url("/api-docs/openapi.json", handlers::ApiDoc::openapi()),
    );
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    state: AppState,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let state = web::Data::new(state);
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .configure(configure)
    })
    .bind((host.to_string(), port))?
    .run())
}
