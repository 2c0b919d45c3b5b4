//! TOML file configuration options.

use anyhow::{Context, Result};
use serde_derive::Deserialize;
use std::io::Read;
use std::{fs, io, path};

/// TOML configuration, top-level.
#[derive(Debug, Deserialize)]
pub struct FileOptions {
    /// Verbosity level.
    pub verbosity: Option<u8>,

    /// RPC service options.
    pub rpc: Option<ServiceOptions>,

    /// Status service options.
    pub status: Option<ServiceOptions>,
}

impl FileOptions {
    /// Read and parse a TOML configuration file.
    pub fn read_filepath<P: AsRef<path::Path>>(cfg_path: P) -> Result<Self> {
        let cfg_file = fs::File::open(&cfg_path).context(format!("failed to open config path {:?}", cfg_path.as_ref()))?;
        let mut bufrd = io::BufReader::new(cfg_file);

        let mut content = vec![];
        bufrd.read_to_end(&mut content)?;
        let cfg = toml::from_slice(&content).context(format!("failed to read config file {}", cfg_path.as_ref().display()))?;

        Ok(cfg)
    }
}

/// TOML configuration, a listening service.
#[derive(Debug, Deserialize)]
pub struct ServiceOptions {
    /// Address on which the service will listen.
    pub address: Option<String>,

    /// Port to which the service will bind.
    pub port: Option<u16>,
}
