use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cns",
    about = "Cloud-native store: encrypted key-value objects over HTTP",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP object service
    Serve(ServeArgs),
    /// Print a fresh random 256-bit encryption key as hex
    Genkey,
}

/// Flags win over environment variables, which win over the config file.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// TOML file with default settings
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// 256-bit encryption key, 64 hex characters
    #[arg(long, env = "ENCRYPTION_KEY", hide_env_values = true)]
    pub encryption_key: Option<String>,

    /// Listen port [default: 8080]
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Listen address [default: 0.0.0.0]
    #[arg(long, env = "BIND_HOST")]
    pub bind_host: Option<IpAddr>,

    /// Transaction log path; without it nothing survives a restart
    #[arg(long, env = "LOG_FILE", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Number of in-memory store shards [default: 16]
    #[arg(long, env = "SHARDS")]
    pub shards: Option<NonZeroUsize>,

    /// fsync the transaction log after every write
    #[arg(long, env = "LOG_FSYNC")]
    pub fsync: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_flags() {
        let cli = Cli::try_parse_from([
            "cns",
            "serve",
            "--encryption-key",
            "00",
            "--port",
            "9000",
            "--bind-host",
            "127.0.0.1",
            "--shards",
            "4",
            "--fsync",
        ])
        .unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.bind_host, Some("127.0.0.1".parse().unwrap()));
        assert_eq!(args.shards.map(NonZeroUsize::get), Some(4));
        assert!(args.fsync);
    }

    #[test]
    fn zero_shards_rejected() {
        assert!(Cli::try_parse_from(["cns", "serve", "--shards", "0"]).is_err());
    }

    #[test]
    fn genkey_with_json_format() {
        let cli = Cli::try_parse_from(["cns", "genkey", "--format", "json"]).unwrap();
        assert!(matches!(cli.command, Command::Genkey));
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
