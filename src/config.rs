use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    /// Replica namespace names mirrored under the storage root.
    pub replicas: Vec<String>,
    /// Raw AES-256 key bytes, decoded from hex.
    pub encryption_key: Vec<u8>,
    /// External SBOM scanner command; sidecar generation is skipped when
    /// unset.
    pub sbom_command: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Encrypted object-store API with replica mirroring")]
pub struct Args {
    /// Host to bind to (overrides SEALSTORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides SEALSTORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where objects are stored (overrides SEALSTORE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Comma-separated replica names (overrides SEALSTORE_REPLICAS)
    #[arg(long)]
    pub replicas: Option<String>,

    /// Hex-encoded 32-byte encryption key (overrides SEALSTORE_ENCRYPTION_KEY)
    #[arg(long)]
    pub encryption_key: Option<String>,

    /// SBOM scanner command (overrides SEALSTORE_SBOM_COMMAND)
    #[arg(long)]
    pub sbom_command: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("SEALSTORE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("SEALSTORE_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing SEALSTORE_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 8080,
            Err(err) => return Err(err).context("reading SEALSTORE_PORT"),
        };
        let env_storage = env::var("SEALSTORE_STORAGE_DIR").unwrap_or_else(|_| "./storage".into());
        let env_replicas =
            env::var("SEALSTORE_REPLICAS").unwrap_or_else(|_| "replica1,replica2".into());
        let env_key = env::var("SEALSTORE_ENCRYPTION_KEY").ok();
        let env_sbom = env::var("SEALSTORE_SBOM_COMMAND").ok();

        // --- Merge ---
        let replicas = args
            .replicas
            .unwrap_or(env_replicas)
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from)
            .collect();

        let key_hex = args
            .encryption_key
            .or(env_key)
            .context("SEALSTORE_ENCRYPTION_KEY (64 hex characters) is required")?;
        let encryption_key =
            hex::decode(key_hex.trim()).context("decoding SEALSTORE_ENCRYPTION_KEY as hex")?;

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            replicas,
            encryption_key,
            sbom_command: args.sbom_command.or(env_sbom),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Manual Debug so the key never lands in logs.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("storage_dir", &self.storage_dir)
            .field("replicas", &self.replicas)
            .field("encryption_key", &format_args!("<{} bytes>", self.encryption_key.len()))
            .field("sbom_command", &self.sbom_command)
            .finish()
    }
}
