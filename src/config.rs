use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, time::Duration};
use url::Url;

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://127.0.0.1:5173";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    /// Public prefix of object URLs, e.g. `http://localhost:3000/storage`.
    pub public_base_url: Url,
    /// Container holding review photos.
    pub container: String,
    /// Base64 signing key. `None` means an ephemeral key is generated.
    pub signing_key: Option<String>,
    pub storage_timeout: Duration,
    pub cors_origins: Vec<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("storage_dir", &self.storage_dir)
            .field("database_url", &self.database_url)
            .field("public_base_url", &self.public_base_url.as_str())
            .field("container", &self.container)
            .field("signing_key", &self.signing_key.as_ref().map(|_| "<redacted>"))
            .field("storage_timeout", &self.storage_timeout)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Review service with scoped photo storage credentials")]
pub struct Args {
    /// Host to bind to (overrides REVIEW_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides REVIEW_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where photo payloads are stored (overrides REVIEW_STORE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides REVIEW_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Public base URL of the storage endpoint (overrides REVIEW_STORE_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Container for review photos (overrides REVIEW_STORE_CONTAINER)
    #[arg(long)]
    pub container: Option<String>,

    /// Timeout in seconds for storage control-plane calls (overrides REVIEW_STORE_STORAGE_TIMEOUT_SECS)
    #[arg(long)]
    pub storage_timeout_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    ///
    /// The signing key is read from `REVIEW_STORE_SIGNING_KEY` only, so it
    /// never shows up in a process listing.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("REVIEW_STORE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("REVIEW_STORE_PORT", 3000u16)?;
        let env_storage =
            env::var("REVIEW_STORE_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_db = env::var("REVIEW_STORE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/review_store.db".into());
        let env_container =
            env::var("REVIEW_STORE_CONTAINER").unwrap_or_else(|_| "review-photos".into());
        let env_timeout = parse_env("REVIEW_STORE_STORAGE_TIMEOUT_SECS", 5u64)?;
        let cors = env::var("REVIEW_STORE_CORS_ORIGINS")
            .unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.into());
        let signing_key = env::var("REVIEW_STORE_SIGNING_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        // --- Merge ---
        let host = args.host.unwrap_or(env_host);
        let port = args.port.unwrap_or(env_port);
        let public_base_url = args
            .public_base_url
            .or_else(|| env::var("REVIEW_STORE_PUBLIC_BASE_URL").ok())
            .unwrap_or_else(|| format!("http://localhost:{}/storage", port));
        let storage_timeout_secs = args.storage_timeout_secs.unwrap_or(env_timeout);
        if storage_timeout_secs == 0 {
            bail!("storage timeout must be at least one second");
        }

        let cfg = Self {
            host,
            port,
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            public_base_url: parse_public_base_url(&public_base_url)?,
            container: args.container.unwrap_or(env_container),
            signing_key,
            storage_timeout: Duration::from_secs(storage_timeout_secs),
            cors_origins: split_origins(&cors),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

fn parse_public_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("parsing public base URL `{}`", raw))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        bail!("public base URL `{}` must be an http(s) URL", raw);
    }
    if url.query().is_some() || url.fragment().is_some() {
        bail!("public base URL `{}` must not carry a query or fragment", raw);
    }
    Ok(url)
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
