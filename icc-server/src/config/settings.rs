//! Application settings for the intelligent controller.

use super::{cli, file};
use anyhow::{anyhow, Result};
use icc_commons::MergeOptions;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;

/// Runtime application settings (validated config).
#[derive(Debug)]
pub struct AppSettings {
    /// Listening address for the RPC service.
    pub address: IpAddr,
    /// Listening port for the RPC service.
    pub port: u16,
    /// Listening address for the status service.
    pub status_address: IpAddr,
    /// Listening port for the status service.
    pub status_port: u16,
    /// Global log level.
    pub verbosity: log::LevelFilter,
    /// Directory where the address bootstrap file is written.
    pub admire_dir: Option<PathBuf>,
    /// Default timeout applied to outbound reconfigure calls.
    pub reconfigure_timeout: Duration,
    /// Delay observed between grow and shrink in a demonstration resalloc pass.
    pub settle_delay: Duration,
    /// Path to the persisted I/O-set event log.
    pub ioset_log_path: PathBuf,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            status_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            status_port: 9080,
            verbosity: log::LevelFilter::Warn,
            admire_dir: std::env::var_os("ADMIRE_DIR").map(PathBuf::from),
            reconfigure_timeout: Duration::from_secs(2),
            settle_delay: Duration::from_secs(30),
            ioset_log_path: PathBuf::from("iosets_out.csv"),
        }
    }
}

impl AppSettings {
    /// Lookup all optional configs, merge them with defaults, and
    /// transform into valid runtime settings.
    pub fn assemble() -> Result<Self> {
        let cli_opts = cli::CliOptions::from_args();
        let file_opts = match &cli_opts.config_path {
            Some(path) => Some(file::FileOptions::read_filepath(path)?),
            None => None,
        };

        let mut cfg = Self::default();
        cfg.try_merge(cli_opts)?;
        cfg.try_merge(file_opts)?;

        cfg.try_validate()
    }

    fn try_validate(self) -> Result<Self> {
        if self.settle_delay.is_zero() {
            return Err(anyhow!("settle delay must be non-zero"));
        }
        Ok(self)
    }

    /// Address-file bootstrap path, per the fallback chain `$ADMIRE_DIR`,
    /// `$HOME`, then the current directory.
    pub fn addr_file_path(&self) -> PathBuf {
        if let Some(dir) = &self.admire_dir {
            return dir.join("icc.addr");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("icc.addr");
        }
        PathBuf::from("icc.addr")
    }
}

impl MergeOptions<cli::CliOptions> for AppSettings {
    fn try_merge(&mut self, opts: cli::CliOptions) -> Result<()> {
        if opts.verbosity > 0 {
            self.verbosity = match opts.verbosity {
                1 => log::LevelFilter::Info,
                2 => log::LevelFilter::Debug,
                _ => log::LevelFilter::Trace,
            };
        }
        self.try_merge(opts.rpc)?;
        self.try_merge(opts.status)?;
        Ok(())
    }
}

impl MergeOptions<cli::RpcOptions> for AppSettings {
    fn try_merge(&mut self, opts: cli::RpcOptions) -> Result<()> {
        if let Some(addr) = opts.address {
            self.address = addr.parse()?;
        }
        icc_commons::assign_if_some!(self.port, opts.port);
        Ok(())
    }
}

impl MergeOptions<cli::StatusOptions> for AppSettings {
    fn try_merge(&mut self, opts: cli::StatusOptions) -> Result<()> {
        if let Some(addr) = opts.address {
            self.status_address = addr.parse()?;
        }
        icc_commons::assign_if_some!(self.status_port, opts.port);
        Ok(())
    }
}

impl MergeOptions<Option<file::FileOptions>> for AppSettings {
    fn try_merge(&mut self, opts: Option<file::FileOptions>) -> Result<()> {
        let opts = match opts {
            Some(o) => o,
            None => return Ok(()),
        };

        if let Some(v) = opts.verbosity {
            self.verbosity = match v {
                0 => log::LevelFilter::Warn,
                1 => log::LevelFilter::Info,
                2 => log::LevelFilter::Debug,
                _ => log::LevelFilter::Trace,
            };
        }
        if let Some(rpc) = opts.rpc {
            if let Some(addr) = rpc.address {
                self.address = addr.parse()?;
            }
            icc_commons::assign_if_some!(self.port, rpc.port);
        }
        if let Some(status) = opts.status {
            if let Some(addr) = status.address {
                self.status_address = addr.parse()?;
            }
            icc_commons::assign_if_some!(self.status_port, status.port);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(AppSettings::default().try_validate().is_ok());
    }

    #[test]
    fn addr_file_path_prefers_admire_dir() {
        let settings = AppSettings { admire_dir: Some(PathBuf::from("/tmp/admire")), ..AppSettings::default() };
        assert_eq!(settings.addr_file_path(), PathBuf::from("/tmp/admire/icc.addr"));
    }
}
