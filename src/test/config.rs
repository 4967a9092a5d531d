#[cfg(test)]
mod tests {
    use serial_test::serial;

    use crate::env::AppConfig;
    use crate::error::AppError;

    const CONFIG_VARS: [&str; 9] = [
        "ROCKET_PROFILE",
        "JWT_SECRET",
        "TOKEN_TTL_HOURS",
        "OTP_TTL_MINUTES",
        "OTP_SWEEP_INTERVAL_SECS",
        "EXPOSE_OTP",
        "SMTP_HOST",
        "SMTP_PORT",
        "MEDIA_BASE_URL",
    ];

    fn cleared() -> Vec<(&'static str, Option<&'static str>)> {
        CONFIG_VARS.iter().map(|name| (*name, None)).collect()
    }

    fn with(overrides: &[(&'static str, &'static str)]) -> Vec<(&'static str, Option<&'static str>)> {
        let mut vars = cleared();
        for (name, value) in overrides {
            vars.retain(|(n, _)| n != name);
            vars.push((*name, Some(*value)));
        }
        vars
    }

    #[test]
    #[serial]
    fn test_defaults() {
        temp_env::with_vars(cleared(), || {
            let config = AppConfig::from_env().unwrap();
            assert_eq!(config.token_ttl_hours, 72);
            assert_eq!(config.otp_ttl_minutes, 5);
            assert_eq!(config.otp_sweep_interval_secs, 300);
            assert!(!config.expose_otp);
            assert_eq!(config.media_base_url, "/media");
            assert!(config.smtp.is_none());
            assert!(!config.jwt_secret.is_empty());
        });
    }

    #[test]
    #[serial]
    fn test_overrides_and_smtp() {
        let vars = with(&[
            ("JWT_SECRET", "from-env"),
            ("TOKEN_TTL_HOURS", "12"),
            ("EXPOSE_OTP", "true"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "2525"),
        ]);

        temp_env::with_vars(vars, || {
            let config = AppConfig::from_env().unwrap();
            assert_eq!(config.jwt_secret, "from-env");
            assert_eq!(config.token_ttl_hours, 12);
            assert!(config.expose_otp);

            let smtp = config.smtp.expect("smtp configured");
            assert_eq!(smtp.host, "smtp.example.com");
            assert_eq!(smtp.port, 2525);
        });
    }

    #[test]
    #[serial]
    fn test_invalid_number_is_rejected() {
        temp_env::with_vars(with(&[("OTP_TTL_MINUTES", "five")]), || {
            assert!(matches!(AppConfig::from_env(), Err(AppError::Internal(_))));
        });
    }

    #[test]
    #[serial]
    fn test_production_requires_jwt_secret() {
        temp_env::with_vars(with(&[("ROCKET_PROFILE", "production")]), || {
            assert!(matches!(AppConfig::from_env(), Err(AppError::Internal(_))));
        });

        let vars = with(&[("ROCKET_PROFILE", "production"), ("JWT_SECRET", "prod-secret")]);
        temp_env::with_vars(vars, || {
            assert_eq!(AppConfig::from_env().unwrap().jwt_secret, "prod-secret");
        });
    }
}
