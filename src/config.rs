//! Command line flags and the optional TOML configuration file.
//!
//! Every field has a default, so an empty (or missing) file is valid.
//! Flags given on the command line override the file.

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

#[derive(Debug, Parser)]
#[command(name = "bedrock-bridge", about = "Bridges Bedrock clients to a Java server")]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Address to accept Bedrock connections on.
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Address of the Java server.
    #[arg(long)]
    pub remote: Option<String>,
    /// Directory holding catalog tables and persisted state.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub auth: AuthConfig,
    pub world: WorldConfig,
    pub resources: ResourceConfig,
    pub persistence: PersistenceConfig,
    pub logging: LoggingConfig,
    /// Directory for catalog JSON files and the tracked-position store.
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub bind: SocketAddr,
    pub remote: String,
    /// Bedrock batches at or above this size are compressed.
    pub compression_threshold: u16,
    /// Cosmetic packets are coalesced or dropped past this many queued packets.
    pub outbound_queue_capacity: usize,
    pub mailbox_capacity: usize,
    /// Seconds to wait for the client to finish logging in.
    pub login_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 19132)),
            remote: "127.0.0.1:25565".to_owned(),
            compression_threshold: 256,
            outbound_queue_capacity: 1024,
            mailbox_capacity: 256,
            login_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Base64 DER public keys whose signature makes a chain trusted.
    pub trusted_root_keys: Vec<String>,
    /// Accept self-signed chains (offline clients). Off by default.
    pub allow_untrusted_chains: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            trusted_root_keys: vec![crate::auth::MOJANG_ROOT_KEY.to_owned()],
            allow_untrusted_chains: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Block changes buffered for sections that have not arrived yet.
    pub pending_block_change_capacity: u64,
    /// Chunk radius granted to clients that ask for more.
    pub max_chunk_radius: i32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            pending_block_change_capacity: 4096,
            max_chunk_radius: 12,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Directory of unpacked resource packs, each with a `manifest.json`.
    pub pack_dir: Option<PathBuf>,
    pub force_packs: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Defaults to `tracked_positions.bin` in the data directory.
    pub store_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs_err::read_to_string(path)?;
        toml::from_str(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Loads the file named on the command line (if any) and applies the flags.
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(bind) = cli.bind {
            config.network.bind = bind;
        }
        if let Some(remote) = &cli.remote {
            config.network.remote = remote.clone();
        }
        if let Some(data_dir) = &cli.data_dir {
            config.data_dir = Some(data_dir.clone());
        }
        Ok(config)
    }

    pub fn store_path(&self) -> Option<PathBuf> {
        self.persistence.store_path.clone().or_else(|| {
            self.data_dir
                .as_ref()
                .map(|dir| dir.join("tracked_positions.bin"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.network.compression_threshold, 256);
        assert_eq!(config.auth.trusted_root_keys.len(), 1);
        assert!(!config.auth.allow_untrusted_chains);
    }

    #[test]
    fn flags_override_file_values() {
        let cli = Cli::parse_from([
            "bedrock-bridge",
            "--remote",
            "mc.example.org:25565",
            "--data-dir",
            "/tmp/bridge",
        ]);
        let config = Config::from_cli(&cli).unwrap();
        assert_eq!(config.network.remote, "mc.example.org:25565");
        assert_eq!(
            config.store_path(),
            Some(PathBuf::from("/tmp/bridge/tracked_positions.bin"))
        );
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [auth]
            allow_untrusted_chains = true

            [world]
            max_chunk_radius = 4
            "#,
        )
        .unwrap();
        assert!(config.auth.allow_untrusted_chains);
        assert_eq!(config.world.max_chunk_radius, 4);
        assert_eq!(config.world.pending_block_change_capacity, 4096);
    }
}
