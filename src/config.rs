use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;
use clap::Parser;
use serde::Deserialize;

pub const DEFAULT_EXPLORER_URL: &str = "https://explorer-api.morphl2.io";
pub const DEFAULT_DATA_FILE: &str = "transaction_data.json";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

// Token contracts on Morph
const MORPH_WETH: &str = "0x5300000000000000000000000000000000000011";
const MORPH_MPH: &str = "0x579C032A137D796f29b14AdEcb58C2E56B14e367";

// DEX routers on Morph
const UNIVERSAL_ROUTER: &str = "0xb789922D715475F419b7CB47B6155bF7a2ACECD6";
const UNISWAP_V2_ROUTER: &str = "0x81606E6f8aAD6C75c2f383Ea595c2b9f8ce8aE3a";

// ============================================================
// Command line
// ============================================================

#[derive(Parser, Debug, Default)]
#[command(
    name = "morphwatch",
    version,
    about = "Monitor a Morph L2 address for transactions outside its expected token pair"
)]
pub struct Cli {
    /// Address to monitor
    #[arg(long)]
    pub address: Option<String>,

    /// Path to a TOML config file; command-line flags take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Base token symbol of the pair (default: ETH)
    #[arg(long)]
    pub base_token: Option<String>,

    /// Chain address of the base token (required for symbols without a built-in address)
    #[arg(long)]
    pub base_token_address: Option<String>,

    /// Quote token symbol of the pair (default: MPH)
    #[arg(long)]
    pub quote_token: Option<String>,

    /// Chain address of the quote token (required for symbols without a built-in address)
    #[arg(long)]
    pub quote_token_address: Option<String>,

    /// Known DEX router, NAME=ADDRESS (repeatable; replaces the built-in set)
    #[arg(long = "dex-router", value_name = "NAME=ADDRESS")]
    pub dex_routers: Vec<String>,

    /// Poll interval in seconds (default: 300)
    #[arg(long)]
    pub interval: Option<u64>,

    /// Keep polling until interrupted and serve the query API
    #[arg(long)]
    pub monitor: bool,

    /// Explorer API base URL
    #[arg(long)]
    pub explorer_url: Option<String>,

    /// Path of the persisted statistics snapshot
    #[arg(long)]
    pub data_file: Option<PathBuf>,

    /// Query API bind host
    #[arg(long)]
    pub api_host: Option<String>,

    /// Query API port
    #[arg(long)]
    pub api_port: Option<u16>,
}

// ============================================================
// TOML file config
// ============================================================

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub address: Option<String>,
    pub base_token: Option<FileToken>,
    pub quote_token: Option<FileToken>,
    #[serde(default)]
    pub dex_routers: Vec<FileRouter>,
    pub interval_secs: Option<u64>,
    pub monitor: Option<bool>,
    pub explorer_url: Option<String>,
    pub data_file: Option<PathBuf>,
    #[serde(default)]
    pub api: FileApi,
}

#[derive(Debug, Deserialize)]
pub struct FileToken {
    pub symbol: String,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FileRouter {
    pub name: String,
    pub address: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct FileApi {
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl FileConfig {
    pub fn load(path: &PathBuf) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            eyre::eyre!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        toml::from_str(&content).map_err(|e| {
            eyre::eyre!("Failed to parse config file '{}': {}", path.display(), e)
        })
    }
}

// ============================================================
// Resolved configuration
// ============================================================

/// Immutable for the process lifetime once monitoring starts.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub monitored_address: Address,
    pub base_token: TokenConfig,
    pub quote_token: TokenConfig,
    pub dex_routers: Vec<DexRouter>,
    pub poll_interval: Duration,
    pub continuous: bool,
    pub explorer_url: String,
    pub data_file: PathBuf,
    pub api: ApiSettings,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub symbol: String,
    pub address: Address,
}

#[derive(Debug, Clone)]
pub struct DexRouter {
    pub name: String,
    pub address: Address,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub host: String,
    pub port: u16,
}

impl MonitorConfig {
    /// Resolve CLI flags over the optional TOML file over built-in defaults.
    /// Any invalid address or empty router set is fatal here, before any
    /// task starts.
    pub fn resolve(cli: Cli) -> eyre::Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let address_str = cli
            .address
            .or(file.address)
            .ok_or_else(|| eyre::eyre!("Monitored address is required (--address or config file)"))?;
        let monitored_address = parse_address(&address_str, "monitored address")?;

        let base_token = resolve_token(
            cli.base_token,
            cli.base_token_address,
            file.base_token,
            "ETH",
            "base",
        )?;
        let quote_token = resolve_token(
            cli.quote_token,
            cli.quote_token_address,
            file.quote_token,
            "MPH",
            "quote",
        )?;

        if base_token.address == quote_token.address {
            return Err(eyre::eyre!(
                "Base and quote tokens resolve to the same address {}",
                base_token.address
            ));
        }

        let dex_routers = resolve_routers(&cli.dex_routers, file.dex_routers)?;
        if dex_routers.is_empty() {
            return Err(eyre::eyre!("At least one DEX router must be configured"));
        }

        let interval_secs = cli
            .interval
            .or(file.interval_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        if interval_secs == 0 {
            return Err(eyre::eyre!("Poll interval must be at least 1 second"));
        }

        Ok(Self {
            monitored_address,
            base_token,
            quote_token,
            dex_routers,
            poll_interval: Duration::from_secs(interval_secs),
            continuous: cli.monitor || file.monitor.unwrap_or(false),
            explorer_url: cli
                .explorer_url
                .or(file.explorer_url)
                .unwrap_or_else(|| DEFAULT_EXPLORER_URL.to_string()),
            data_file: cli
                .data_file
                .or(file.data_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE)),
            api: ApiSettings {
                host: cli
                    .api_host
                    .or(file.api.host)
                    .unwrap_or_else(|| "0.0.0.0".to_string()),
                port: cli.api_port.or(file.api.port).unwrap_or(5000),
            },
        })
    }

    pub fn is_pair_token(&self, address: &Address) -> bool {
        *address == self.base_token.address || *address == self.quote_token.address
    }

    pub fn is_dex_router(&self, address: &Address) -> bool {
        self.dex_routers.iter().any(|r| r.address == *address)
    }

    pub fn pair_label(&self) -> String {
        format!("{}/{}", self.base_token.symbol, self.quote_token.symbol)
    }
}

fn resolve_token(
    cli_symbol: Option<String>,
    cli_address: Option<String>,
    file_token: Option<FileToken>,
    default_symbol: &str,
    side: &str,
) -> eyre::Result<TokenConfig> {
    let symbol = cli_symbol
        .or_else(|| file_token.as_ref().map(|t| t.symbol.clone()))
        .unwrap_or_else(|| default_symbol.to_string());

    let address_str = cli_address
        .or_else(|| file_token.and_then(|t| t.address))
        .or_else(|| builtin_token_address(&symbol).map(str::to_string))
        .ok_or_else(|| {
            eyre::eyre!(
                "No chain address known for {} token '{}'; pass --{}-token-address",
                side,
                symbol,
                side
            )
        })?;

    let address = parse_address(&address_str, &format!("{} token '{}'", side, symbol))?;
    Ok(TokenConfig { symbol, address })
}

fn resolve_routers(
    cli_routers: &[String],
    file_routers: Vec<FileRouter>,
) -> eyre::Result<Vec<DexRouter>> {
    if !cli_routers.is_empty() {
        return cli_routers.iter().map(|s| parse_router(s)).collect();
    }

    if !file_routers.is_empty() {
        return file_routers
            .into_iter()
            .map(|r| {
                Ok(DexRouter {
                    address: parse_address(&r.address, &format!("DEX router '{}'", r.name))?,
                    name: r.name,
                })
            })
            .collect();
    }

    Ok(default_routers())
}

/// Parse a `NAME=ADDRESS` router flag; a bare address uses the address as name.
fn parse_router(spec: &str) -> eyre::Result<DexRouter> {
    let (name, address_str) = match spec.split_once('=') {
        Some((name, address)) => (name.trim().to_string(), address.trim()),
        None => (spec.trim().to_string(), spec.trim()),
    };
    let address = parse_address(address_str, &format!("DEX router '{}'", name))?;
    Ok(DexRouter { name, address })
}

fn parse_address(s: &str, what: &str) -> eyre::Result<Address> {
    Address::from_str(s).map_err(|e| eyre::eyre!("Invalid address '{}' for {}: {}", s, what, e))
}

fn builtin_token_address(symbol: &str) -> Option<&'static str> {
    if symbol.eq_ignore_ascii_case("ETH") {
        Some(MORPH_WETH)
    } else if symbol.eq_ignore_ascii_case("MPH") {
        Some(MORPH_MPH)
    } else {
        None
    }
}

fn default_routers() -> Vec<DexRouter> {
    vec![
        DexRouter {
            name: "UniversalRouter".to_string(),
            address: Address::from_str(UNIVERSAL_ROUTER).expect("built-in router address"),
        },
        DexRouter {
            name: "UniswapV2Router02".to_string(),
            address: Address::from_str(UNISWAP_V2_ROUTER).expect("built-in router address"),
        },
    ]
}
