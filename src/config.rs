use std::env;

/// AppConfig
///
/// Holds the application's entire configuration state. It is loaded once at startup,
/// never mutated afterwards, and pulled into handlers and extractors via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // SQLite connection string, e.g. `sqlite://admin_portal.db`.
    pub db_url: String,
    // Runtime environment marker. Controls the log format and the local auth bypass.
    pub env: Env,
    // HMAC secret used to sign and verify access tokens.
    pub jwt_secret: String,
    // Access token lifetime in minutes.
    pub access_token_expiry_mins: i64,
    // Refresh token lifetime in days.
    pub refresh_token_expiry_days: i64,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Bootstrap administrator, created on startup when no active admin exists.
    pub admin: BootstrapAdmin,
}

/// BootstrapAdmin
///
/// Credentials for the first administrator account.
#[derive(Clone, Debug)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Env
///
/// Defines the runtime context: local development (pretty logs, `x-user-id` bypass)
/// or production (JSON logs, mandatory secrets).
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

const LOCAL_JWT_SECRET: &str = "local-development-jwt-secret-change-me";
const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;
const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 7;

impl Default for BootstrapAdmin {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            password: "admin12345".to_string(),
        }
    }
}

impl Default for AppConfig {
    /// default
    ///
    /// A non-panicking configuration for tests: an in-memory database and a fixed secret.
    fn default() -> Self {
        Self {
            db_url: "sqlite::memory:".to_string(),
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            access_token_expiry_mins: DEFAULT_ACCESS_EXPIRY_MINS,
            refresh_token_expiry_days: DEFAULT_REFRESH_EXPIRY_DAYS,
            bind_addr: "127.0.0.1:0".to_string(),
            admin: BootstrapAdmin::default(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables.
    ///
    /// # Panics
    /// Panics if a variable required for the current environment is missing, or if a
    /// numeric variable cannot be parsed. The server must not start half-configured.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let access_token_expiry_mins = parse_i64("JWT_ACCESS_EXPIRY_MINS", DEFAULT_ACCESS_EXPIRY_MINS);
        let refresh_token_expiry_days =
            parse_i64("JWT_REFRESH_EXPIRY_DAYS", DEFAULT_REFRESH_EXPIRY_DAYS);
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let defaults = BootstrapAdmin::default();
        let admin_username = env::var("ADMIN_USERNAME").unwrap_or(defaults.username);
        let admin_email = env::var("ADMIN_EMAIL").unwrap_or(defaults.email);

        match env {
            Env::Local => Self {
                env: Env::Local,
                db_url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://admin_portal.db".to_string()),
                jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                access_token_expiry_mins,
                refresh_token_expiry_days,
                bind_addr,
                admin: BootstrapAdmin {
                    username: admin_username,
                    email: admin_email,
                    password: env::var("ADMIN_PASSWORD").unwrap_or(defaults.password),
                },
            },
            Env::Production => {
                let jwt_secret =
                    env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production.");
                assert!(!jwt_secret.is_empty(), "FATAL: JWT_SECRET must not be empty.");

                Self {
                    env: Env::Production,
                    db_url: env::var("DATABASE_URL")
                        .expect("FATAL: DATABASE_URL required in production"),
                    jwt_secret,
                    access_token_expiry_mins,
                    refresh_token_expiry_days,
                    bind_addr,
                    admin: BootstrapAdmin {
                        username: admin_username,
                        email: admin_email,
                        password: env::var("ADMIN_PASSWORD")
                            .expect("FATAL: ADMIN_PASSWORD required in production"),
                    },
                }
            }
        }
    }
}

fn parse_i64(key: &str, default: i64) -> i64 {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("FATAL: {key} must be a whole number, got {raw:?}")),
        Err(_) => default,
    }
}
