use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use bloodbank::{
    config::Config,
    database::Database,
    handlers, metrics,
    middleware::SessionLoader,
    services::BloodBankService,
    session::SessionKeys,
};
use dotenv::dotenv;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid configuration")?;

    init_tracing(&config);
    metrics::init();

    info!("Starting Blood Bank service on port {}", config.server.port);

    let db = Arc::new(
        Database::new(&config.database.url, config.database.max_connections)
            .await
            .context("Failed to connect to database")?,
    );
    db.migrate().await.context("Failed to apply migrations")?;

    info!("Database ready at {}", config.database.url);

    let service = Arc::new(BloodBankService::new(
        db,
        config.auth.allow_staff_registration,
    ));
    let keys = Arc::new(SessionKeys::from_config(&config.session));

    let server_config = config.server.clone();

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(service.clone()))
            .app_data(web::Data::new(keys.clone()))
            .wrap(SessionLoader::new(keys.clone()))
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(handlers::configure_routes)
    })
    .workers(server_config.workers)
    .bind((server_config.host, server_config.port))?
    .run()
    .await?;

    Ok(())
}
