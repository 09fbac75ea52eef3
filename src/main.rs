mod config;
mod database;
mod error;
mod handlers;
mod memory;
mod model;
mod service;
mod storage;
mod validation;

use actix_web::{middleware::Logger, web, App, HttpServer};
use config::{Config, StorageKind, DEFAULT_LOG_FILTER};
use env_logger::Env;
use log::info;
use service::{FilmService, LookupService, UserService};
use std::io;
use std::sync::Arc;
use storage::Storage;

fn open_storage(config: &Config) -> error::Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.storage {
        StorageKind::Memory => Arc::new(memory::MemoryStorage::new()),
        StorageKind::Sled => Arc::new(database::open_database(config.db_path.as_deref())?),
    };
    Ok(storage)
}

#[actix_rt::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or(DEFAULT_LOG_FILTER)).init();

    let config =
        Config::from_env().map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    info!("Starting with {:?}", config);
    let storage = open_storage(&config)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;

    let users = UserService::new(storage.clone(), config.friendship);
    let films = web::Data::new(FilmService::new(storage.clone(), users.clone()));
    let users = web::Data::new(users);
    let lookups = web::Data::new(LookupService::new(storage));

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(films.clone())
            .app_data(users.clone())
            .app_data(lookups.clone())
            .configure(handlers::configure)
    })
    .bind(&config.bind)?
    .run()
    .await
}
