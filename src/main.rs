mod api;
mod auth;
mod clients;
mod database;
mod env;
mod error;
mod models;
mod services;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use std::sync::Arc;
use std::time::Duration;

use clients::{LocalMediaStore, MailService, MediaService, mailer_from_config};
use env::{AppConfig, load_environment};
use error::AppError;
use rocket::data::{Limits, ToByteUnit};
use rocket::fs::FileServer;
use rocket::{Build, Rocket};
use services::otp_sweeper::OtpSweeper;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::str::FromStr;
use telemetry::{TelemetryFairing, init_tracing};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("{0}")]
    Figment(rocket::figment::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
    #[error("Launch error: {0}")]
    Rocket(Box<rocket::Error>),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Anyhow(value)
    }
}

impl From<rocket::figment::Error> for Error {
    fn from(value: rocket::figment::Error) -> Self {
        Error::Figment(value)
    }
}

impl From<rocket::Error> for Error {
    fn from(value: rocket::Error) -> Self {
        Error::Rocket(Box::new(value))
    }
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    load_environment().map_err(|e| anyhow::anyhow!("Failed to load environment: {}", e))?;
    init_tracing();

    let config = AppConfig::from_env()?;

    let options = SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(AppError::from)?;
    info!("Migrations completed successfully");

    tokio::fs::create_dir_all(&config.media_root)
        .await
        .map_err(AppError::from)?;

    let mailer = mailer_from_config(&config)?;
    let media: MediaService = Arc::new(LocalMediaStore::new(
        config.media_root.clone(),
        config.media_base_url.clone(),
    ));

    let _rocket = init_rocket(pool, config, mailer, media)?.launch().await?;
    Ok(())
}

pub fn init_rocket(
    pool: SqlitePool,
    config: AppConfig,
    mailer: MailService,
    media: MediaService,
) -> Result<Rocket<Build>, Error> {
    info!("Starting course hub");

    // Lecture videos arrive as multipart uploads.
    let limits = Limits::default()
        .limit("file", 512.mebibytes())
        .limit("data-form", 512.mebibytes());
    let figment = rocket::Config::figment().merge(("limits", limits));
    let _: rocket::Config = figment.extract()?;

    let sweeper = OtpSweeper::new(Duration::from_secs(config.otp_sweep_interval_secs));
    let media_root = config.media_root.clone();
    let media_mount = config.media_base_url.clone();

    let mut rocket = rocket::custom(figment)
        .manage(pool)
        .manage(mailer)
        .manage(media)
        .manage(config)
        .mount("/api/v1", api::routes())
        .register("/", api::catchers::catchers())
        .attach(TelemetryFairing)
        .attach(sweeper);

    if media_mount.starts_with('/') && media_root.is_dir() {
        rocket = rocket.mount(media_mount.as_str(), FileServer::from(media_root));
    } else {
        warn!(root = %media_root.display(), "Media directory not served locally");
    }

    Ok(rocket)
}
