use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};

use settlement_core::db::SettlementStore;
use settlement_keymanager::BankIdentity;
use settlement_server::config::Config;
use settlement_server::routes;
use settlement_server::state::AppState;

fn parse_cors_origins() -> Vec<String> {
    match std::env::var("ALLOWED_ORIGINS") {
        Ok(origins) => origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => vec![],
    }
}

fn build_cors(origins: &[String]) -> Cors {
    if origins.is_empty() {
        // Default: allow localhost on any port
        Cors::default()
            .allowed_origin_fn(|origin, _| {
                origin
                    .to_str()
                    .map(|o| o == "http://localhost" || o.starts_with("http://localhost:"))
                    .unwrap_or(false)
            })
            .allow_any_method()
            .allow_any_header()
            .max_age(3600)
    } else {
        let mut cors = Cors::default();
        for origin in origins {
            cors = cors.allowed_origin(origin);
        }
        cors.allow_any_method().allow_any_header().max_age(3600)
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env();

    let store = SettlementStore::open(&config.database_path)
        .unwrap_or_else(|e| panic!("failed to open settlement database at {}: {e}", config.database_path));
    let bank = BankIdentity::load_or_generate(&config.bank_key_path)
        .unwrap_or_else(|e| panic!("failed to load bank key at {}: {e}", config.bank_key_path));

    let port = config.port;
    let request_timeout = config.request_timeout;
    let cors_origins = parse_cors_origins();

    let state = web::Data::new(AppState {
        store: Arc::new(store),
        bank: Arc::new(bank),
        config,
    });

    tracing::info!("Bank settlement server listening on port {port}");
    tracing::info!("  POST http://localhost:{port}/settle");
    tracing::info!("  POST http://localhost:{port}/verify");
    tracing::info!("  GET  http://localhost:{port}/bank-key");
    tracing::info!("  GET  http://localhost:{port}/audit-log");

    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&cors_origins))
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().limit(1_048_576))
            .service(routes::health)
            .service(routes::settle)
            .service(routes::verify)
            .service(routes::bank_key)
            .service(routes::audit_log)
    })
    .client_request_timeout(request_timeout)
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
