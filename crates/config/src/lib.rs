use anyhow::{Context, Result};
use config_rs::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use spandsl::mappings::KNOWN_YEARS;
use spandsl::SqlOptions;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Span compiler configuration
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// Configuration for the Span compiler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Directory holding `<year>/<dataset>.parquet` (e.g., "data")
    #[serde(default = "default_data_path")]
    pub data_path: String,

    /// Year used for queries without a FOR clause
    #[serde(default = "default_year")]
    pub default_year: Option<i32>,
}

/// Configuration for the HTTP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind (e.g., "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on (default: 3000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory with static assets served at `/`
    /// Optional - no static files are served when unset
    #[serde(default)]
    pub static_dir: Option<String>,
}

// Default value functions
fn default_data_path() -> String {
    spandsl::codegen::DEFAULT_DATA_PATH.to_string()
}

fn default_year() -> Option<i32> {
    KNOWN_YEARS.last().copied()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            default_year: default_year(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

impl Config {
    /// Load Config with layered configuration priority:
    /// 1. Default values
    /// 2. TOML file (if provided)
    /// 3. Environment variables (`SPAN_<SECTION>__<KEY>`, e.g. `SPAN_SERVER__PORT`)
    pub fn load(config_file: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder()
            // Compiler defaults
            .set_default("compiler.data_path", default_data_path())?
            // Server defaults
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?;

        if let Some(year) = default_year() {
            builder = builder.set_default("compiler.default_year", year)?;
        }

        // Add TOML file if provided
        if let Some(file_path) = config_file {
            let path = Path::new(file_path);
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("SPAN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Load Config from a TOML file
    ///
    /// Environment variables can still override values from the file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file_path = path
            .to_str()
            .with_context(|| format!("Configuration path is not valid UTF-8: {}", path.display()))?;
        Self::load(Some(file_path))
    }

    /// Create a new Config from environment variables with defaults
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.compiler.validate()?;
        self.server.validate()?;
        Ok(())
    }
}

impl CompilerConfig {
    /// Options passed to the compiler for every request
    pub fn sql_options(&self) -> SqlOptions {
        SqlOptions {
            year: self.default_year,
            data_path: Some(self.data_path.clone()),
        }
    }

    /// Validate the compiler configuration
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.data_path.is_empty(), "Data path cannot be empty");

        if let Some(year) = self.default_year {
            anyhow::ensure!(
                KNOWN_YEARS.contains(&year),
                "Default year {} has no data (known years: {}-{})",
                year,
                KNOWN_YEARS[0],
                KNOWN_YEARS[KNOWN_YEARS.len() - 1]
            );
        }

        Ok(())
    }
}

impl ServerConfig {
    /// Socket address string, e.g. "0.0.0.0:3000"
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate the server configuration
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.host.is_empty(), "Server host cannot be empty");
        anyhow::ensure!(self.port != 0, "Server port cannot be 0");

        if let Some(dir) = &self.static_dir {
            anyhow::ensure!(!dir.is_empty(), "Static directory cannot be empty when set");
        }

        Ok(())
    }
}
