//! Command-line options.

use structopt::StructOpt;

/// CLI configuration flags, top-level.
#[derive(Debug, StructOpt)]
pub struct CliOptions {
    /// Verbosity level
    #[structopt(long = "verbosity", short = "v", parse(from_occurrences))]
    pub verbosity: u8,

    /// Path to configuration file
    #[structopt(short = "c")]
    pub config_path: Option<String>,

    #[structopt(flatten)]
    pub rpc: RpcOptions,

    #[structopt(flatten)]
    pub status: StatusOptions,
}

/// CLI configuration flags, RPC service.
#[derive(Debug, StructOpt)]
pub struct RpcOptions {
    /// Address on which the RPC service will listen
    #[structopt(long = "rpc.address", alias = "address")]
    pub address: Option<String>,

    /// Port to which the RPC service will bind
    #[structopt(long = "rpc.port", alias = "port")]
    pub port: Option<u16>,
}

/// CLI configuration flags, status service.
#[derive(Debug, StructOpt)]
pub struct StatusOptions {
    /// Address on which the status service will listen
    #[structopt(long = "status.address")]
    pub address: Option<String>,

    /// Port to which the status service will bind
    #[structopt(long = "status.port")]
    pub port: Option<u16>,
}
