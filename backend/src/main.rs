use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use backend::inference::{EnsemblePipeline, PipelineConfig};
use backend::reports::ReportStore;
use backend::routes::configure_routes;
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    dotenv::dotenv().ok();

    let config = match PipelineConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Failed to load pipeline config ({e}), using defaults");
            PipelineConfig::default()
        }
    };

    // All three models must load before the server accepts a single request.
    let pipeline = match EnsemblePipeline::load(&config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            log::error!("Failed to preload models at startup: {e}");
            return Err(std::io::Error::other(format!("Model loading failed: {e}")));
        }
    };
    let pipeline = web::Data::new(pipeline);

    let reports_csv = env::var("REPORTS_CSV").unwrap_or_else(|_| "reports_log.csv".to_string());
    let store = ReportStore::new(reports_csv);
    if let Err(e) = store.init() {
        log::error!("Failed to initialize report store: {e}");
        return Err(std::io::Error::other(format!(
            "Report store initialization failed: {e}"
        )));
    }

    let static_dir = env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string());

    let port = env::var("PORT").unwrap_or_else(|_| "8081".to_string());
    let bind_address = format!("0.0.0.0:{}", port);

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(pipeline.clone())
            .app_data(web::Data::new(store.clone()))
            .configure(|cfg| configure_routes(cfg, static_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
