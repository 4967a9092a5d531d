use std::time::Duration;

use chrono::Utc;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Orbit, Rocket};
use sqlx::{Pool, Sqlite};
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use crate::database::otps;
use crate::error::AppError;

/// Deletes expired OTP rows. Returns how many were removed.
#[instrument(skip(pool))]
pub async fn sweep_expired_otps(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    otps::delete_expired_otps(pool, Utc::now().naive_utc()).await
}

/// Background task that sweeps expired OTPs on a fixed interval. Started on
/// liftoff and stopped when Rocket shuts down.
pub struct OtpSweeper {
    interval: Duration,
    shutdown: watch::Sender<bool>,
}

impl OtpSweeper {
    pub fn new(interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            interval: interval.max(Duration::from_secs(1)),
            shutdown,
        }
    }

    async fn run(pool: Pool<Sqlite>, interval: Duration, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match sweep_expired_otps(&pool).await {
                        Ok(count) if count > 0 => info!("Swept {} expired OTPs", count),
                        Ok(_) => {}
                        Err(e) => error!("Failed to sweep expired OTPs: {}", e),
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        info!("OTP sweeper stopped");
    }
}

#[rocket::async_trait]
impl Fairing for OtpSweeper {
    fn info(&self) -> Info {
        Info {
            name: "OTP sweeper",
            kind: Kind::Liftoff | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let Some(pool) = rocket.state::<Pool<Sqlite>>() else {
            warn!("No database pool managed, OTP sweeper not started");
            return;
        };

        info!(interval_secs = self.interval.as_secs(), "Starting OTP sweeper");
        tokio::spawn(Self::run(
            pool.clone(),
            self.interval,
            self.shutdown.subscribe(),
        ));
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        let _ = self.shutdown.send(true);
    }
}
