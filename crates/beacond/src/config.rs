//! TOML configuration for the Beacon daemon.

use std::num::NonZeroUsize;
use std::path::Path;

use anyhow::{Context, bail};
use beacon_types::{PEER_TYPE_TAG, Peer, PeerInfo, PeerType, Tags};
use serde::Deserialize;

/// Default virtual nodes per address.
const DEFAULT_REPLICATION_FACTOR: usize = 64;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Listen addresses.
    pub node: NodeSection,
    /// Registry tuning.
    pub registry: RegistrySection,
    /// Logging configuration.
    pub log: LogSection,
    /// Statically known members, announced as joined on startup.
    pub members: Vec<MemberSection>,
}

/// `[node]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Address for the discovery HTTP API.
    pub listen_addr: String,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:7946".to_string(),
        }
    }
}

/// `[registry]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RegistrySection {
    /// Virtual nodes placed on a ring for every address. Must be at least 1.
    pub replication_factor: usize,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            replication_factor: DEFAULT_REPLICATION_FACTOR,
        }
    }
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// One `[[members]]` entry.
#[derive(Debug, Deserialize)]
pub struct MemberSection {
    /// Member name, unique within its address.
    pub name: String,
    /// Category the member is filed under.
    pub peer_type: String,
    /// `host:port` the member is reachable on.
    pub address: String,
    /// Host of the member's own API, advertised through its tags.
    #[serde(default)]
    pub api_addr: Option<String>,
    /// Port of the member's own API.
    #[serde(default)]
    pub api_port: Option<u16>,
    /// Extra metadata.
    #[serde(default)]
    pub tags: Tags,
}

impl MemberSection {
    /// Build the member this entry describes.
    ///
    /// The peer type and, when both are given, the API location are encoded
    /// into the member's tags the same way a gossiping node advertises them.
    pub fn to_peer(&self) -> anyhow::Result<Peer> {
        let peer_type = PeerType::parse(&self.peer_type)
            .with_context(|| format!("member {:?}", self.name))?;

        let mut tags = self.tags.clone();
        match (&self.api_addr, self.api_port) {
            (Some(api_addr), Some(api_port)) => {
                let info = PeerInfo {
                    name: self.name.clone(),
                    peer_type,
                    api_addr: api_addr.clone(),
                    api_port,
                };
                tags.extend(info.encode_tags());
            }
            (None, None) => {
                tags.insert(PEER_TYPE_TAG.to_string(), peer_type.to_string());
            }
            _ => bail!(
                "member {:?}: api_addr and api_port must be set together",
                self.name
            ),
        }

        Ok(Peer::from_node_tags(
            self.name.clone(),
            self.address.clone(),
            tags,
        )?)
    }
}

impl CliConfig {
    /// Load config from a TOML file, or use defaults if no path given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("failed to read {}", p.display()))?;
                let config: CliConfig = toml::from_str(&content)?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Effective replication factor.
    pub fn replication_factor(&self) -> anyhow::Result<NonZeroUsize> {
        NonZeroUsize::new(self.registry.replication_factor)
            .context("registry.replication_factor must be at least 1")
    }

    /// The configured static members.
    pub fn peers(&self) -> anyhow::Result<Vec<Peer>> {
        self.members.iter().map(MemberSection::to_peer).collect()
    }
}
