use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use cns_crypto::EncryptionKey;
use cns_resilience::ResilienceConfig;
use cns_wal::{SyncMode, WalConfig};
use serde::Deserialize;

use crate::cli::ServeArgs;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SHARDS: usize = 16;

/// Contents of the optional `--config` TOML file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub encryption_key: Option<String>,
    pub port: Option<u16>,
    pub bind_host: Option<IpAddr>,
    pub log_file: Option<PathBuf>,
    pub shards: Option<NonZeroUsize>,
    pub wal: Option<WalConfig>,
    pub resilience: ResilienceConfig,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }
}

/// Fully resolved settings for `cns serve`.
pub struct Settings {
    pub key: EncryptionKey,
    pub bind_addr: SocketAddr,
    pub log_file: Option<PathBuf>,
    pub shards: NonZeroUsize,
    pub wal: WalConfig,
    pub resilience: ResilienceConfig,
}

impl Settings {
    pub fn resolve(args: ServeArgs) -> anyhow::Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(args, file)
    }

    fn merge(args: ServeArgs, file: FileConfig) -> anyhow::Result<Self> {
        let Some(hex) = args.encryption_key.or(file.encryption_key) else {
            bail!("an encryption key is required (--encryption-key or ENCRYPTION_KEY); generate one with `cns genkey`");
        };
        let key = EncryptionKey::from_hex(&hex).context("invalid encryption key")?;

        let host = args
            .bind_host
            .or(file.bind_host)
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let port = args.port.or(file.port).unwrap_or(DEFAULT_PORT);

        let mut wal = file.wal.unwrap_or_default();
        if args.fsync {
            wal.sync_mode = SyncMode::EveryWrite;
        }

        let resilience = file.resilience;
        if let Err(reason) = resilience.validate() {
            bail!("invalid resilience settings: {reason}");
        }

        Ok(Self {
            key,
            bind_addr: SocketAddr::new(host, port),
            log_file: args.log_file.or(file.log_file),
            shards: args
                .shards
                .or(file.shards)
                .unwrap_or(NonZeroUsize::new(DEFAULT_SHARDS).unwrap_or(NonZeroUsize::MIN)),
            wal,
            resilience,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn args_with_key() -> ServeArgs {
        ServeArgs {
            encryption_key: Some(KEY.into()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_apply() {
        let settings = Settings::merge(args_with_key(), FileConfig::default()).unwrap();
        assert_eq!(settings.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(settings.shards.get(), 16);
        assert!(settings.log_file.is_none());
        assert_eq!(settings.wal.sync_mode, SyncMode::OsDefault);
        assert_eq!(settings.resilience, ResilienceConfig::default());
    }

    #[test]
    fn missing_key_is_an_error() {
        let err = Settings::merge(ServeArgs::default(), FileConfig::default()).err().unwrap();
        assert!(err.to_string().contains("encryption key is required"));
    }

    #[test]
    fn bad_key_is_an_error() {
        let args = ServeArgs {
            encryption_key: Some("abcd".into()),
            ..Default::default()
        };
        assert!(Settings::merge(args, FileConfig::default()).is_err());
    }

    #[test]
    fn flags_override_file() {
        let file: FileConfig = toml::from_str(&format!(
            r#"
            encryption_key = "{KEY}"
            port = 7000
            bind_host = "127.0.0.1"
            shards = 2
            log_file = "/var/lib/cns/tx.log"

            [wal]
            sync_mode = "every_write"

            [resilience]
            max_attempts = 5
            "#
        ))
        .unwrap();
        let args = ServeArgs {
            port: Some(9000),
            ..Default::default()
        };

        let settings = Settings::merge(args, file).unwrap();
        assert_eq!(settings.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(settings.shards.get(), 2);
        assert_eq!(settings.log_file, Some(PathBuf::from("/var/lib/cns/tx.log")));
        assert_eq!(settings.wal.sync_mode, SyncMode::EveryWrite);
        assert_eq!(settings.resilience.max_attempts, 5);
        assert_eq!(settings.resilience.breaker_threshold, 3);
    }

    #[test]
    fn loads_config_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "encryption_key = \"{KEY}\"\nport = 8181").unwrap();

        let args = ServeArgs {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let settings = Settings::resolve(args).unwrap();
        assert_eq!(settings.bind_addr.port(), 8181);
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("prot = 1").is_err());
    }
}
