use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgConnectOptions;

use crate::auth::StaticCredentials;

/// Exit node listings scraped when `TORGATE_SOURCES` is not set.
pub const DEFAULT_SOURCES: &[&str] = &[
    "https://www.dan.me.uk/tornodes",
    "https://www.bigdatacloud.com/insights/tor-exit-nodes",
    "https://check.torproject.org/torbulkexitlist",
];

/// HS256 keys shorter than the hash output weaken the signature.
const MIN_SECRET_LEN: usize = 32;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub production: bool,
    pub jwt_secret: String,
    pub credentials: StaticCredentials,
    pub sources: Vec<String>,
    /// Per-source fetch timeout. Set via TORGATE_FETCH_TIMEOUT_SECS. Default: 10.
    pub fetch_timeout: Duration,
    pub database: DatabaseConfig,
}

/// PostgreSQL connection settings. `DATABASE_URL`, when present, wins over the
/// individual `POSTGRES_*` parts.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("production", &self.production)
            .field("jwt_secret", &"<redacted>")
            .field("credentials", &self.credentials)
            .field("sources", &self.sources)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("database", &self.database)
            .finish()
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("max_connections", &self.max_connections)
            .finish_non_exhaustive()
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> anyhow::Result<PgConnectOptions> {
        if let Some(url) = &self.url {
            return PgConnectOptions::from_str(url).context("DATABASE_URL is not a valid Postgres URL");
        }
        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.name)
            .username(&self.user)
            .password(&self.password))
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Builds the configuration from an arbitrary variable source.
pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
    let production = var("TORGATE_ENV")
        .or_else(|| var("RUST_ENV"))
        .map(|v| v == "production")
        .unwrap_or(false);

    let jwt_secret = var("TORGATE_JWT_SECRET")
        .filter(|s| !s.trim().is_empty())
        .context("TORGATE_JWT_SECRET is not set. Provide a random signing secret of at least 32 bytes.")?;
    if jwt_secret.len() < MIN_SECRET_LEN {
        anyhow::bail!(
            "TORGATE_JWT_SECRET is too short ({} bytes). Use at least {} bytes.",
            jwt_secret.len(),
            MIN_SECRET_LEN
        );
    }

    let credentials = match var("TORGATE_USERS") {
        Some(spec) => StaticCredentials::parse(&spec).context("invalid TORGATE_USERS")?,
        None if production => {
            anyhow::bail!("TORGATE_USERS must be set when running in production");
        }
        None => {
            tracing::warn!("TORGATE_USERS is not set; using built-in demo users. Do not use in production.");
            StaticCredentials::demo()
        }
    };

    let sources = match var("TORGATE_SOURCES") {
        Some(list) => parse_sources(&list)?,
        None => DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
    };

    let fetch_timeout_secs: u64 = parse_var(&var, "TORGATE_FETCH_TIMEOUT_SECS", 10)?;
    if fetch_timeout_secs == 0 {
        anyhow::bail!("TORGATE_FETCH_TIMEOUT_SECS must be greater than zero");
    }

    Ok(Config {
        port: parse_var(&var, "TORGATE_PORT", 5000)?,
        production,
        jwt_secret,
        credentials,
        sources,
        fetch_timeout: Duration::from_secs(fetch_timeout_secs),
        database: DatabaseConfig {
            url: var("DATABASE_URL").filter(|s| !s.is_empty()),
            host: var("POSTGRES_HOST").unwrap_or_else(|| "localhost".into()),
            port: parse_var(&var, "POSTGRES_PORT", 5432)?,
            name: var("POSTGRES_DB").unwrap_or_else(|| "excluded_ips_db".into()),
            user: var("POSTGRES_USER").unwrap_or_else(|| "postgres".into()),
            password: var("POSTGRES_PASSWORD").unwrap_or_default(),
            max_connections: parse_var(&var, "TORGATE_DB_MAX_CONNECTIONS", 10)?,
        },
    })
}

/// Parses a numeric variable, falling back to `default` only when it is unset.
fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}

fn parse_sources(list: &str) -> anyhow::Result<Vec<String>> {
    let sources: Vec<String> = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    for source in &sources {
        let url = url::Url::parse(source).with_context(|| format!("invalid source URL '{}'", source))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("source URL '{}' must be http or https", source);
        }
    }
    if sources.is_empty() {
        anyhow::bail!("TORGATE_SOURCES is set but lists no URLs");
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_secret_is_required() {
        let err = from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("TORGATE_JWT_SECRET"));

        let err = from_lookup(lookup(&[("TORGATE_JWT_SECRET", "short")])).unwrap_err();
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn test_defaults() {
        let cfg = from_lookup(lookup(&[("TORGATE_JWT_SECRET", SECRET)])).unwrap();
        assert_eq!(cfg.port, 5000);
        assert!(!cfg.production);
        assert_eq!(cfg.sources.len(), 3);
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(10));
        assert_eq!(cfg.credentials.len(), 2);
        assert_eq!(cfg.database.name, "excluded_ips_db");
        assert!(cfg.database.url.is_none());
    }

    #[test]
    fn test_production_requires_users() {
        let err = from_lookup(lookup(&[
            ("TORGATE_JWT_SECRET", SECRET),
            ("TORGATE_ENV", "production"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("TORGATE_USERS"));

        let cfg = from_lookup(lookup(&[
            ("TORGATE_JWT_SECRET", SECRET),
            ("TORGATE_ENV", "production"),
            ("TORGATE_USERS", "ops:hunter2hunter2:admin"),
        ]))
        .unwrap();
        assert!(cfg.production);
        assert_eq!(cfg.credentials.len(), 1);
    }

    #[test]
    fn test_sources_override() {
        let cfg = from_lookup(lookup(&[
            ("TORGATE_JWT_SECRET", SECRET),
            ("TORGATE_SOURCES", "https://a.example/list, http://b.example/nodes"),
        ]))
        .unwrap();
        assert_eq!(cfg.sources, vec!["https://a.example/list", "http://b.example/nodes"]);

        assert!(from_lookup(lookup(&[
            ("TORGATE_JWT_SECRET", SECRET),
            ("TORGATE_SOURCES", "ftp://a.example/list"),
        ]))
        .is_err());
    }

    #[test]
    fn test_bad_numbers_name_the_variable() {
        for (key, value) in [
            ("TORGATE_PORT", "http"),
            ("TORGATE_PORT", "70000"),
            ("POSTGRES_PORT", "-1"),
            ("TORGATE_FETCH_TIMEOUT_SECS", "ten"),
            ("TORGATE_DB_MAX_CONNECTIONS", "lots"),
        ] {
            let err = from_lookup(lookup(&[("TORGATE_JWT_SECRET", SECRET), (key, value)])).unwrap_err();
            assert!(err.to_string().contains(key), "{}: {}", key, err);
        }

        let err = from_lookup(lookup(&[
            ("TORGATE_JWT_SECRET", SECRET),
            ("TORGATE_FETCH_TIMEOUT_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("TORGATE_FETCH_TIMEOUT_SECS"));

        let cfg = from_lookup(lookup(&[
            ("TORGATE_JWT_SECRET", SECRET),
            ("TORGATE_PORT", "8080"),
            ("TORGATE_FETCH_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(3));
    }
}
