use admin_portal::{AppConfig, config::Env};
use serial_test::serial;
use std::{env, panic};

const CONFIG_VARS: [&str; 10] = [
    "APP_ENV",
    "DATABASE_URL",
    "JWT_SECRET",
    "JWT_ACCESS_EXPIRY_MINS",
    "JWT_REFRESH_EXPIRY_DAYS",
    "BIND_ADDR",
    "ADMIN_USERNAME",
    "ADMIN_EMAIL",
    "ADMIN_PASSWORD",
    "RUST_LOG",
];

// --- Setup/Teardown Utilities ---

/// Runs `test` with a clean configuration environment and restores the previous
/// values afterwards, even if the closure panics.
fn run_with_env<T, R>(test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> = CONFIG_VARS
        .iter()
        .map(|&var| (var, env::var(var).ok()))
        .collect();

    unsafe {
        for var in CONFIG_VARS {
            env::remove_var(var);
        }
    }

    let result = panic::catch_unwind(test);

    for (key, original_value) in originals {
        unsafe {
            match original_value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

// --- Tests ---

#[test]
#[serial]
fn test_app_config_production_fail_fast() {
    let result = run_with_env(|| {
        panic::catch_unwind(|| {
            unsafe {
                env::set_var("APP_ENV", "production");
                env::set_var("DATABASE_URL", "sqlite://prod.db");
            }
            // JWT_SECRET and ADMIN_PASSWORD are missing
            AppConfig::load()
        })
    });

    assert!(
        result.is_err(),
        "Production config loading should panic on missing secrets"
    );
}

#[test]
#[serial]
fn test_app_config_production_with_secrets() {
    let config = run_with_env(|| {
        unsafe {
            env::set_var("APP_ENV", "production");
            env::set_var("DATABASE_URL", "sqlite://prod.db");
            env::set_var("JWT_SECRET", "prod-secret");
            env::set_var("ADMIN_PASSWORD", "prod-admin-password");
            env::set_var("JWT_ACCESS_EXPIRY_MINS", "5");
        }
        AppConfig::load()
    });

    assert_eq!(config.env, Env::Production);
    assert_eq!(config.db_url, "sqlite://prod.db");
    assert_eq!(config.jwt_secret, "prod-secret");
    assert_eq!(config.access_token_expiry_mins, 5);
    assert_eq!(config.admin.password, "prod-admin-password");
}

#[test]
#[serial]
fn test_app_config_local_env_defaults() {
    let config = run_with_env(|| {
        unsafe {
            env::set_var("APP_ENV", "local");
        }
        AppConfig::load()
    });

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.db_url, "sqlite://admin_portal.db");
    assert_eq!(config.bind_addr, "0.0.0.0:3000");
    assert_eq!(config.access_token_expiry_mins, 15);
    assert_eq!(config.refresh_token_expiry_days, 7);
    assert_eq!(config.admin.username, "admin");
    assert!(!config.jwt_secret.is_empty());
}

#[test]
#[serial]
fn test_app_config_rejects_non_numeric_expiry() {
    let result = run_with_env(|| {
        panic::catch_unwind(|| {
            unsafe {
                env::set_var("JWT_REFRESH_EXPIRY_DAYS", "a week");
            }
            AppConfig::load()
        })
    });
    assert!(result.is_err());
}
