mod access;
mod config;
mod pipeline;
mod queue;
mod services;
mod store;
#[cfg(test)]
mod test_support;

use crate::access::AdminToken;
use crate::config::PortalConfig;
use crate::pipeline::Pipeline;
use crate::queue::ModerationQueue;
use crate::store::ManifestStore;
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::{info, warn};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let config = PortalConfig::from_env();

    let store = ManifestStore::open(&config.db_path, config.store_options())
        .map_err(std::io::Error::other)?;
    let pipeline = Pipeline::new(&config, store.clone()).map_err(std::io::Error::other)?;
    let queue = ModerationQueue::new(store, config.page_size);

    if config.admin_token.is_none() {
        warn!("PORTAL_ADMIN_TOKEN is not set, moderation routes will answer 403");
    }

    let pipeline = web::Data::new(pipeline);
    let queue = web::Data::new(queue);
    let admin_token = web::Data::new(AdminToken::new(config.admin_token.clone()));

    info!(
        "Server running at http://{}:{} (database {})",
        config.host, config.port, config.db_path
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::JsonConfig::default().limit(16 * 1024))
            .app_data(pipeline.clone())
            .app_data(queue.clone())
            .app_data(admin_token.clone())
            .service(services::manifests::configure_routes())
            .service(services::admin::configure_routes())
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
