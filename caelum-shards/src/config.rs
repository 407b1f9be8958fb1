//! Runtime configuration for caelum-shards
//!
//! Every setting resolves command line → environment → TOML → default.
//! clap covers the first two tiers (`#[arg(env = ...)]`); the TOML file
//! loaded through `caelum_common::config` covers the third.

use caelum_common::config::{RootFolderResolver, TomlConfig};
use caelum_common::{Error, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::warn;

use crate::mint::intent::{
    Address, Eip712Domain, DEFAULT_CHAIN_ID, DEFAULT_DOMAIN_NAME, DEFAULT_DOMAIN_VERSION,
    DEFAULT_GATEWAY_BASE,
};
use crate::mint::{RelayConfig, RelayMode};
use crate::notify::NotifierConfig;

pub const MODULE_NAME: &str = "caelum-shards";
pub const DEFAULT_PORT: u16 = 5730;

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "caelum-shards", version, about = "Reflection queue and mint relay service")]
pub struct Args {
    /// TOML config file (default: ~/.config/caelum/caelum-shards.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Folder holding caelum.db (also CAELUM_ROOT_FOLDER / CAELUM_ROOT)
    #[arg(short, long)]
    pub root_folder: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "CAELUM_PORT")]
    pub port: Option<u16>,

    /// Mint relay endpoint; minting is disabled when unset
    #[arg(long, env = "MINT_ENDPOINT_URL")]
    pub mint_endpoint: Option<String>,

    /// Bearer token sent to the relay
    #[arg(long, env = "MINT_ENDPOINT_TOKEN", hide_env_values = true)]
    pub mint_token: Option<String>,

    /// Relay body shape: simple or sig
    #[arg(long, env = "MINT_MODE")]
    pub mint_mode: Option<String>,

    /// Secret expected in x-caelum-secret on the record-shard webhook
    #[arg(long, env = "STATS_WEBHOOK_SECRET", hide_env_values = true)]
    pub stats_secret: Option<String>,

    #[arg(long, env = "DISCORD_REFLECTION_WEBHOOK_URL")]
    pub reflection_webhook: Option<String>,

    #[arg(long, env = "DISCORD_MINT_WEBHOOK_URL")]
    pub mint_webhook: Option<String>,

    /// ShardMinter contract address (typed-data verifying contract)
    #[arg(long, env = "SHARD_MINTER_ADDR")]
    pub minter_address: Option<String>,

    #[arg(long, env = "SHARD_CHAIN_ID")]
    pub chain_id: Option<u64>,
}

/// Fully resolved service settings
#[derive(Debug, Clone)]
pub struct ShardsConfig {
    pub root_folder: PathBuf,
    pub port: u16,
    pub log_level: String,
    pub relay: Option<RelayConfig>,
    pub stats_secret: Option<String>,
    pub notifier: NotifierConfig,
    pub domain: Eip712Domain,
    pub gateway_base: String,
}

/// First non-blank value
fn pick(cli: &Option<String>, toml: &Option<String>) -> Option<String> {
    cli.iter()
        .chain(toml.iter())
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

impl ShardsConfig {
    pub fn resolve(args: &Args, toml: &TomlConfig) -> Result<Self> {
        let root_folder = RootFolderResolver::new(MODULE_NAME)
            .with_cli_arg(args.root_folder.clone())
            .with_toml(toml)
            .resolve();

        let mode = match pick(&args.mint_mode, &toml.relay.mode) {
            Some(mode) => mode.parse::<RelayMode>().map_err(Error::Config)?,
            None => RelayMode::default(),
        };
        let relay = pick(&args.mint_endpoint, &toml.relay.endpoint).map(|endpoint| RelayConfig {
            endpoint,
            token: pick(&args.mint_token, &toml.relay.token),
            mode,
        });

        let verifying_contract = match pick(&args.minter_address, &toml.mint.verifying_contract) {
            Some(addr) => addr
                .parse::<Address>()
                .map_err(|e| Error::Config(format!("SHARD_MINTER_ADDR: {}", e)))?,
            None => {
                warn!("No ShardMinter address configured; typed data will use the zero address");
                Address([0u8; 20])
            }
        };

        let domain = Eip712Domain {
            name: toml
                .mint
                .domain_name
                .clone()
                .unwrap_or_else(|| DEFAULT_DOMAIN_NAME.to_string()),
            version: toml
                .mint
                .domain_version
                .clone()
                .unwrap_or_else(|| DEFAULT_DOMAIN_VERSION.to_string()),
            chain_id: args.chain_id.or(toml.mint.chain_id).unwrap_or(DEFAULT_CHAIN_ID),
            verifying_contract,
        };

        Ok(Self {
            root_folder,
            port: args.port.or(toml.port).unwrap_or(DEFAULT_PORT),
            log_level: toml.logging.level.clone(),
            relay,
            stats_secret: pick(&args.stats_secret, &toml.stats.webhook_secret),
            notifier: NotifierConfig {
                reflection_webhook: pick(
                    &args.reflection_webhook,
                    &toml.notifications.reflection_webhook,
                ),
                mint_webhook: pick(&args.mint_webhook, &toml.notifications.mint_webhook),
            },
            domain,
            gateway_base: toml
                .mint
                .gateway_base
                .clone()
                .unwrap_or_else(|| DEFAULT_GATEWAY_BASE.to_string()),
        })
    }
}
