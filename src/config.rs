use std::env;

/// Resolved runtime configuration. Built once in `main` and passed by
/// reference into every component; nothing reads the environment after
/// this.
#[derive(Debug, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub smtp: SmtpConfig,
    pub app: AppConfig,
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    /// `mysql` or `sqlite`.
    pub driver: String,
    pub host: String,
    pub name: String,
    pub user: String,
    pub pass: String,
    /// Database file location, only meaningful for the sqlite driver.
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from_email: String,
    pub from_name: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub name: String,
    pub admin_email: String,
}

impl Config {
    /// Read `CSA_*` variables, falling back to the built-in defaults.
    /// Missing keys are recoverable: one warning lists them all.
    pub fn from_env() -> Config {
        let mut missing = Vec::new();
        let mut var = |key: &'static str, default: &str| -> String {
            match env::var(key) {
                Ok(value) if !value.is_empty() => value,
                _ => {
                    missing.push(key);
                    default.to_string()
                }
            }
        };

        let db = DbConfig {
            driver: var("CSA_DB_DRIVER", "mysql"),
            host: var("CSA_DB_HOST", "localhost"),
            name: var("CSA_DB_NAME", "csa"),
            user: var("CSA_DB_USER", "csa_user"),
            pass: var("CSA_DB_PASS", ""),
            path: var("CSA_DB_PATH", "data/csa.sqlite"),
        };

        let port_raw = var("CSA_SMTP_PORT", "587");
        let smtp = SmtpConfig {
            host: var("CSA_SMTP_HOST", "smtp.gmail.com"),
            port: port_raw.parse().unwrap_or_else(|_| {
                eprintln!("warning: CSA_SMTP_PORT `{port_raw}` is not a valid port, using 587");
                587
            }),
            user: var("CSA_SMTP_USER", "no-reply@example.com"),
            pass: var("CSA_SMTP_PASS", ""),
            from_email: var("CSA_SMTP_FROM_EMAIL", "no-reply@example.com"),
            from_name: var("CSA_SMTP_FROM_NAME", "CSA at HCC"),
        };

        let app = AppConfig {
            name: var("CSA_APP_NAME", "Computer Science Association"),
            admin_email: var("CSA_ADMIN_EMAIL", "president@hccs.edu"),
        };

        if !missing.is_empty() {
            eprintln!(
                "warning: using built-in defaults for {}",
                missing.join(", ")
            );
        }

        Config { db, smtp, app }
    }
}
