//! Facilitator server configuration.
//!
//! Loads configuration from a TOML file with support for environment variable
//! expansion in string values. Variables use `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 4021
//! deploy_erc4337_with_eip6492 = false
//!
//! [chains."eip155:84532"]
//! rpc_url = "https://sepolia.base.org"
//! signer_private_key = "$SIGNER_KEY_BASE_SEPOLIA"
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` — Path to configuration file (default: `config.toml`)
//! - `HOST` / `PORT` — Override the bind address
//! - Chain-specific signer keys referenced by `$VAR` in the config file

use std::collections::HashMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Top-level facilitator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilitatorConfig {
    /// Server bind address (default: `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Server port (default: `4021`).
    #[serde(default = "default_port")]
    pub port: u16,

    /// EVM chain configurations keyed by CAIP-2 network identifier.
    #[serde(default)]
    pub chains: HashMap<String, ChainConfig>,

    /// Whether to deploy ERC-4337 smart wallets via ERC-6492 factory calls.
    #[serde(default)]
    pub deploy_erc4337_with_eip6492: bool,
}

/// Per-chain configuration for an EVM network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// HTTP RPC endpoint URL.
    pub rpc_url: String,

    /// Private key for the facilitator signer (hex, with or without `0x`).
    /// Supports `$VAR` / `${VAR}` environment variable expansion.
    #[serde(default)]
    pub signer_private_key: Option<String>,

    /// Additional signer keys for round-robin settlement.
    #[serde(default)]
    pub signer_private_keys: Vec<String>,

    /// Whether the chain supports EIP-1559 gas pricing.
    #[serde(default = "default_true")]
    pub eip1559: bool,

    /// Seconds to wait for a settlement transaction receipt.
    #[serde(default = "default_receipt_timeout")]
    pub receipt_timeout_secs: u64,

    /// HTTP timeout for RPC requests, in seconds.
    #[serde(default = "default_rpc_timeout")]
    pub timeout_seconds: u64,

    /// Whether to check `eth_chainId` against the configured network at
    /// startup.
    #[serde(default = "default_true")]
    pub health_check: bool,
}

impl ChainConfig {
    /// Returns all configured signer keys (single legacy key plus the list).
    #[must_use]
    pub fn effective_signer_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let Some(key) = &self.signer_private_key {
            keys.push(key.clone());
        }
        keys.extend(self.signer_private_keys.iter().cloned());
        keys
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0))
}

const fn default_port() -> u16 {
    4021
}

const fn default_true() -> bool {
    true
}

const fn default_receipt_timeout() -> u64 {
    30
}

const fn default_rpc_timeout() -> u64 {
    10
}

impl FacilitatorConfig {
    /// Loads configuration from the path given by the `CONFIG` environment
    /// variable, falling back to `config.toml` in the current directory.
    ///
    /// `$VAR` / `${VAR}` references in the file are expanded from the
    /// process environment, and `HOST` / `PORT` env vars override the file
    /// values. A missing file is not an error: the facilitator starts empty
    /// on defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = std::env::var("CONFIG").unwrap_or_else(|_| "config.toml".to_owned());
        Self::load_from(&path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let raw = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let mut config: Self = toml::from_str(&expand_env_vars(&raw))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies `HOST` / `PORT` environment overrides on top of file values.
    fn apply_env_overrides(&mut self) {
        if let Some(host) = env_parse("HOST") {
            self.host = host;
        }
        if let Some(port) = env_parse("PORT") {
            self.port = port;
        }
    }
}

/// Reads and parses an environment variable, ignoring absent or unparseable
/// values.
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Returns `true` for names that are valid environment variable references:
/// non-empty and drawn from `[A-Za-z0-9_]`.
fn is_env_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Substitutes `$VAR` and `${VAR}` references with environment variable
/// values. References to unset variables (and stray `$` characters) are kept
/// verbatim.
///
/// Works by splitting on `$`: every segment after the first starts where a
/// reference may begin, so each is resolved independently — either a braced
/// name terminated by `}`, or the longest leading run of `[A-Za-z0-9_]`.
fn expand_env_vars(input: &str) -> String {
    let mut segments = input.split('$');
    let mut out = String::with_capacity(input.len());
    out.push_str(segments.next().unwrap_or_default());

    for segment in segments {
        if let Some(braced) = segment.strip_prefix('{') {
            match braced.split_once('}') {
                Some((name, tail)) if is_env_name(name) => {
                    match std::env::var(name) {
                        Ok(value) => out.push_str(&value),
                        Err(_) => {
                            out.push_str("${");
                            out.push_str(name);
                            out.push('}');
                        }
                    }
                    out.push_str(tail);
                }
                // Empty, invalid, or unterminated brace: keep as written.
                _ => {
                    out.push('$');
                    out.push_str(segment);
                }
            }
            continue;
        }

        let name_len = segment
            .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .unwrap_or(segment.len());
        let (name, tail) = segment.split_at(name_len);

        // A lone `$` (empty name) stays literal; env::var rejects empty keys.
        if name.is_empty() {
            out.push('$');
            out.push_str(tail);
            continue;
        }

        match std::env::var(name) {
            Ok(value) => out.push_str(&value),
            Err(_) => {
                out.push('$');
                out.push_str(name);
            }
        }
        out.push_str(tail);
    }

    out
}
