use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Locations of the external analysis tools
///
/// Bare names are resolved on `PATH` when the process is spawned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ToolPaths {
    #[serde(default = "default_tshark")]
    pub tshark: PathBuf,

    #[serde(default = "default_capinfos")]
    pub capinfos: PathBuf,

    #[serde(default = "default_dumpcap")]
    pub dumpcap: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            tshark: default_tshark(),
            capinfos: default_capinfos(),
            dumpcap: default_dumpcap(),
        }
    }
}

impl ToolPaths {
    /// Validate the configuration and return errors if invalid
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, path) in [
            ("tshark", &self.tshark),
            ("capinfos", &self.capinfos),
            ("dumpcap", &self.dumpcap),
        ] {
            if path.as_os_str().is_empty() {
                return Err(anyhow::anyhow!("{name} path cannot be empty"));
            }
        }
        Ok(())
    }
}

/// Supervisor configuration
#[derive(Default, Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
#[serde(rename_all = "camelCase")]
pub struct SupervisorConfig {
    /// Don't report process exit failures, e.g. at shutdown
    #[builder(default)]
    #[serde(default)]
    pub suppress_errors: bool,

    #[builder(default)]
    #[serde(default)]
    pub tools: ToolPaths,
}

impl SupervisorConfig {
    pub fn builder() -> SupervisorConfigBuilder {
        SupervisorConfigBuilder::default()
    }

    /// Parse a JSON configuration document and validate it
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: SupervisorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.tools.validate()
    }
}

// Default value functions for serde
fn default_tshark() -> PathBuf {
    PathBuf::from("tshark")
}
fn default_capinfos() -> PathBuf {
    PathBuf::from("capinfos")
}
fn default_dumpcap() -> PathBuf {
    PathBuf::from("dumpcap")
}
