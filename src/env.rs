use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{info, warn};

use crate::error::AppError;

const DEV_JWT_SECRET: &str = "course-hub-development-secret";

pub fn is_production() -> bool {
    dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production"
}

pub fn load_environment() -> Result<(), Box<dyn std::error::Error>> {
    let env_files = if is_production() {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        warn!("Warning: Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!("Loaded environment from: {}", path);
    Ok(())
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

/// Process-wide settings, read once at launch and managed by Rocket.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub otp_ttl_minutes: i64,
    pub otp_sweep_interval_secs: u64,
    /// Echo freshly issued OTP codes back to the caller. Development only.
    pub expose_otp: bool,
    pub bcrypt_cost: u32,
    pub media_root: PathBuf,
    pub media_base_url: String,
    pub media_folder: String,
    pub smtp: Option<SmtpSettings>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let jwt_secret = match dotenvy::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if is_production() => {
                return Err(AppError::Internal(
                    "JWT_SECRET must be set in production".to_string(),
                ));
            }
            _ => {
                warn!("JWT_SECRET not set, falling back to the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let smtp = match dotenvy::var("SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => Some(SmtpSettings {
                host,
                port: parse_var("SMTP_PORT", 587)?,
                username: dotenvy::var("SMTP_USERNAME").ok(),
                password: dotenvy::var("SMTP_PASSWORD").ok(),
                from: dotenvy::var("SMTP_FROM")
                    .unwrap_or_else(|_| "Course Hub <noreply@localhost>".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            database_url: dotenvy::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://course-hub.db?mode=rwc".to_string()),
            jwt_secret,
            token_ttl_hours: parse_var("TOKEN_TTL_HOURS", 72)?,
            otp_ttl_minutes: parse_var("OTP_TTL_MINUTES", 5)?,
            otp_sweep_interval_secs: parse_var("OTP_SWEEP_INTERVAL_SECS", 300)?,
            expose_otp: parse_var("EXPOSE_OTP", false)?,
            bcrypt_cost: parse_var("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            media_root: PathBuf::from(
                dotenvy::var("MEDIA_ROOT").unwrap_or_else(|_| "media".to_string()),
            ),
            media_base_url: dotenvy::var("MEDIA_BASE_URL").unwrap_or_else(|_| "/media".to_string()),
            media_folder: dotenvy::var("MEDIA_FOLDER").unwrap_or_else(|_| "course-hub".to_string()),
            smtp,
        })
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match dotenvy::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Internal(format!("Invalid value for {}: {}", name, raw))),
        _ => Ok(default),
    }
}
