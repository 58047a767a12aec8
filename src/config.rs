use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, path::PathBuf, str::FromStr, time::Duration};

/// Largest video payload accepted by the upload endpoint (1 GiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 1 << 30;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub scratch_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub public_base_url: String,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub jwt_secret: String,
    pub signed_url_ttl: Duration,
    pub ffprobe_path: String,
    pub ffmpeg_path: String,
    pub probe_timeout: Duration,
    pub remux_timeout: Duration,
    pub publish_timeout: Duration,
    pub max_upload_bytes: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Video ingestion API")]
pub struct Args {
    /// Host to bind to (overrides TUBELY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides TUBELY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides TUBELY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory for per-request scratch files (overrides TUBELY_SCRATCH_DIR)
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Directory where thumbnails are written (overrides TUBELY_ASSETS_DIR)
    #[arg(long)]
    pub assets_dir: Option<PathBuf>,

    /// S3 bucket receiving processed videos (overrides TUBELY_S3_BUCKET)
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::from_sources(args, |name| env::var(name).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge CLI arguments over values produced by `lookup` (normally the
    /// process environment) over built-in defaults.
    pub fn from_sources(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let env_port: u16 = parse_var(&lookup, "TUBELY_PORT", 8091)?;
        let jwt_secret = match lookup("TUBELY_JWT_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ => bail!("TUBELY_JWT_SECRET must be set"),
        };

        let cfg = Self {
            host: args.host.unwrap_or_else(|| var("TUBELY_HOST", "0.0.0.0")),
            port: args.port.unwrap_or(env_port),
            database_url: args
                .database_url
                .unwrap_or_else(|| var("TUBELY_DATABASE_URL", "sqlite://./data/tubely.db")),
            scratch_dir: args
                .scratch_dir
                .unwrap_or_else(|| PathBuf::from(var("TUBELY_SCRATCH_DIR", "./data/scratch"))),
            assets_dir: args
                .assets_dir
                .unwrap_or_else(|| PathBuf::from(var("TUBELY_ASSETS_DIR", "./data/assets"))),
            public_base_url: var("TUBELY_PUBLIC_BASE_URL", "http://localhost:8091")
                .trim_end_matches('/')
                .to_string(),
            s3_bucket: args
                .s3_bucket
                .unwrap_or_else(|| var("TUBELY_S3_BUCKET", "tubely-videos")),
            s3_region: var("TUBELY_S3_REGION", "us-east-1"),
            s3_endpoint: lookup("TUBELY_S3_ENDPOINT").filter(|v| !v.is_empty()),
            jwt_secret,
            signed_url_ttl: Duration::from_secs(parse_var(
                &lookup,
                "TUBELY_SIGNED_URL_TTL_SECS",
                3600,
            )?),
            ffprobe_path: var("TUBELY_FFPROBE_PATH", "ffprobe"),
            ffmpeg_path: var("TUBELY_FFMPEG_PATH", "ffmpeg"),
            probe_timeout: Duration::from_secs(parse_var(&lookup, "TUBELY_PROBE_TIMEOUT_SECS", 60)?),
            remux_timeout: Duration::from_secs(parse_var(
                &lookup,
                "TUBELY_REMUX_TIMEOUT_SECS",
                600,
            )?),
            publish_timeout: Duration::from_secs(parse_var(
                &lookup,
                "TUBELY_PUBLISH_TIMEOUT_SECS",
                900,
            )?),
            max_upload_bytes: parse_var(
                &lookup,
                "TUBELY_MAX_UPLOAD_BYTES",
                DEFAULT_MAX_UPLOAD_BYTES,
            )?,
        };

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The subset of configuration the upload pipeline needs.
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            bucket: self.s3_bucket.clone(),
            scratch_dir: self.scratch_dir.clone(),
            max_upload_bytes: self.max_upload_bytes,
            publish_timeout: self.publish_timeout,
            signed_url_ttl: self.signed_url_ttl,
        }
    }
}

/// Settings handed to the upload pipeline at construction time.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub bucket: String,
    pub scratch_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub publish_timeout: Duration,
    pub signed_url_ttl: Duration,
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let cfg =
            AppConfig::from_sources(Args::default(), lookup_from(&[("TUBELY_JWT_SECRET", "s")]))
                .unwrap();
        assert_eq!(cfg.port, 8091);
        assert_eq!(cfg.max_upload_bytes, 1 << 30);
        assert_eq!(cfg.signed_url_ttl, Duration::from_secs(3600));
        assert!(cfg.s3_endpoint.is_none());
    }

    #[test]
    fn cli_overrides_environment() {
        let args = Args {
            port: Some(9000),
            s3_bucket: Some("from-cli".into()),
            ..Args::default()
        };
        let cfg = AppConfig::from_sources(
            args,
            lookup_from(&[
                ("TUBELY_JWT_SECRET", "s"),
                ("TUBELY_PORT", "7000"),
                ("TUBELY_S3_BUCKET", "from-env"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.s3_bucket, "from-cli");
        assert_eq!(cfg.pipeline().bucket, "from-cli");
    }

    #[test]
    fn bad_numeric_value_is_an_error() {
        let err = AppConfig::from_sources(
            Args::default(),
            lookup_from(&[("TUBELY_JWT_SECRET", "s"), ("TUBELY_PORT", "http")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("TUBELY_PORT"));
    }

    #[test]
    fn missing_secret_is_an_error() {
        assert!(AppConfig::from_sources(Args::default(), lookup_from(&[])).is_err());
    }
}
