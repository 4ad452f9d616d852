use crate::generator::profile::DemoConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub database: PathBuf,
    pub demo: Option<DemoConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            database: PathBuf::from("detections.db"),
            demo: None,
        }
    }
}

impl ServerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading server config {}", path_ref.display()))?;
        let config: ServerConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing server config {}", path_ref.display()))?;
        Ok(config)
    }

    /// Command-line and environment values win over the file.
    pub fn apply_overrides(
        &mut self,
        bind: Option<SocketAddr>,
        database: Option<PathBuf>,
        demo: bool,
    ) {
        if let Some(bind) = bind {
            self.bind = bind;
        }
        if let Some(database) = database {
            self.database = database;
        }
        if demo && self.demo.is_none() {
            self.demo = Some(DemoConfig::default());
        }
    }
}
