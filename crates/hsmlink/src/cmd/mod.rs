use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod doctor;
pub mod request;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a datagram server answering requests.
    Serve(ServeArgs),
    /// Send one request and wait for the response.
    Request(RequestArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Request(args) => request::run(args, format),
        Command::Version(args) => version::run(args),
        Command::Doctor(args) => doctor::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Identification string returned for identify requests.
    #[arg(long, default_value = concat!("hsmlink/", env!("CARGO_PKG_VERSION")))]
    pub server_id: String,
    /// Exit after answering a single request.
    #[arg(long)]
    pub once: bool,
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Server socket path to connect to.
    pub path: PathBuf,
    /// Request kind.
    #[arg(long, short = 'k', default_value = "1")]
    pub kind: u16,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["file", "hex"])]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
    /// Hex-encoded payload.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Client identifier stamped into the request header.
    #[arg(long, default_value = "0")]
    pub client_id: u16,
    /// Maximum time to wait for the exchange (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {}
