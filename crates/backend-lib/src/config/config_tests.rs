use super::*;
use figment::Jail;

fn valid() -> Settings {
    let mut settings = Settings::default();
    settings.auth.secret_key = "k".repeat(32);
    settings
}

#[test]
fn test_settings_validation() {
    let settings = valid();
    assert!(settings.validate().is_ok());

    // missing secret refuses to start
    assert!(Settings::default().validate().is_err());

    let mut invalid = settings.clone();
    invalid.log_level = "loud".to_string();
    assert!(invalid.validate().is_err());

    let mut invalid = settings.clone();
    invalid.auth.token_ttl_secs = 0;
    assert!(invalid.validate().is_err());

    let mut invalid = settings.clone();
    invalid.auth.algorithm = "RS256".to_string();
    assert!(invalid.validate().is_err());

    let mut invalid = settings.clone();
    invalid.password_requirements.min_length = 4;
    assert!(invalid.validate().is_err());

    let mut invalid = settings.clone();
    invalid.rate_limit.max_attempts = 0;
    assert!(invalid.validate().is_err());

    let mut invalid = settings;
    invalid.log_format = "xml".to_string();
    assert!(invalid.validate().is_err());
}

#[test]
fn test_debug_redacts_secret() {
    let rendered = format!("{:?}", valid());
    assert!(!rendered.contains(&"k".repeat(32)));
    assert!(rendered.contains("<redacted>"));
}

#[test]
fn test_load_settings_from_file_and_env() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            bind_addr = "127.0.0.1:3000"
            data_dir = "test_data"
            log_level = "debug"

            [auth]
            secret_key = "from-file"
            token_ttl_secs = 600
            "#,
        )?;
        jail.set_env("AUTHORITY_LOG_LEVEL", "warn");
        jail.set_env("AUTHORITY_AUTH__RESET_TOKEN_TTL_SECS", "120");

        let settings = Settings::load().expect("settings load");
        assert_eq!(settings.bind_addr.to_string(), "127.0.0.1:3000");
        assert_eq!(settings.data_dir, PathBuf::from("test_data"));
        // environment takes precedence over the file
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.auth.secret_key, "from-file");
        assert_eq!(settings.auth.token_ttl_secs, 600);
        assert_eq!(settings.auth.reset_token_ttl_secs, 120);
        // untouched values keep their defaults
        assert_eq!(settings.auth.algorithm, "HS256");
        assert_eq!(settings.rate_limit, RateLimitSettings::default());
        assert!(!settings.rate_limit.trust_forwarded_ip);
        Ok(())
    });
}

#[test]
fn test_trust_forwarded_ip_opt_in() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            [auth]
            secret_key = "from-file"

            [rate_limit]
            trust_forwarded_ip = true
            "#,
        )?;

        let settings = Settings::load().expect("settings load");
        assert!(settings.rate_limit.trust_forwarded_ip);
        assert_eq!(settings.rate_limit.max_attempts, RateLimitSettings::default().max_attempts);
        Ok(())
    });
}

#[test]
fn test_bare_secret_key_variable() {
    Jail::expect_with(|jail| {
        jail.set_env("SECRET_KEY", "from-env");
        jail.set_env("ALGORITHM", "HS512");

        let settings = Settings::load_from("missing.toml").expect("settings load");
        assert_eq!(settings.auth.secret_key, "from-env");
        assert_eq!(settings.auth.algorithm, "HS512");
        Ok(())
    });
}

#[test]
fn test_missing_secret_fails_to_load() {
    Jail::expect_with(|_jail| {
        let err = Settings::load_from("missing.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        Ok(())
    });
}
