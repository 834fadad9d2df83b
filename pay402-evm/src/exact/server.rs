//! Server-side pricing for the exact scheme.
//!
//! [`ExactEvmServer`] converts a route's price into payment requirements:
//! money strings become atomic token amounts against the network's default
//! asset, and requirements are enriched with the EIP-712 domain parameters
//! clients need to construct valid signatures.

use std::sync::Arc;

use pay402::proto::PaymentRequirements;
use pay402::scheme::{AssetAmount, SchemeError, SchemeServer};
use serde_json::Value;

use super::SCHEME_EXACT;
use crate::chain::AssetInfo;
use crate::networks::EvmNetworks;

/// EVM server implementation for the exact payment scheme.
pub struct ExactEvmServer {
    networks: Arc<EvmNetworks>,
}

impl std::fmt::Debug for ExactEvmServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactEvmServer").finish_non_exhaustive()
    }
}

impl ExactEvmServer {
    /// Creates a server scheme over the given network table.
    pub const fn new(networks: Arc<EvmNetworks>) -> Self {
        Self { networks }
    }

    /// Default money-to-token conversion.
    ///
    /// Converts a decimal amount (e.g., `1.50`) to the atomic amount of the
    /// network's default asset (e.g., `"1500000"` for 6-decimal USDC).
    fn default_money_conversion(
        &self,
        amount: &str,
        network: &str,
    ) -> Result<AssetAmount, SchemeError> {
        let config = self
            .networks
            .config(network)
            .ok_or_else(|| -> SchemeError { format!("unknown network: {network}").into() })?;

        let asset = &config.default_asset;
        let atomic = parse_decimal_to_atomic(amount, asset.decimals)?;

        Ok(AssetAmount {
            amount: atomic,
            asset: asset.address.to_string(),
            extra: Some(serde_json::json!({
                "name": asset.name,
                "version": asset.version,
            })),
        })
    }

    fn find_asset(&self, network: &str, asset: &str) -> Option<AssetInfo> {
        self.networks.asset_info(network, asset)
    }
}

impl SchemeServer for ExactEvmServer {
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn parse_price(&self, price: &Value, network: &str) -> Result<AssetAmount, SchemeError> {
        // Already an AssetAmount (object with an "amount" key)
        if let Some(obj) = price.as_object() {
            if let Some(amount) = obj.get("amount") {
                let asset =
                    obj.get("asset")
                        .and_then(Value::as_str)
                        .ok_or_else(|| -> SchemeError {
                            format!("asset address required for AssetAmount on {network}").into()
                        })?;

                return Ok(AssetAmount {
                    amount: amount
                        .as_str()
                        .map_or_else(|| amount.to_string(), String::from),
                    asset: asset.to_owned(),
                    extra: obj.get("extra").cloned(),
                });
            }
        }

        // Money string (e.g., "1.50" or "$1.50") or a bare number
        let money = if let Some(s) = price.as_str() {
            s.trim().trim_start_matches('$').trim().to_owned()
        } else if price.is_number() {
            price.to_string()
        } else {
            return Err("invalid price format".into());
        };

        self.default_money_conversion(&money, network)
    }

    fn enhance_payment_requirements(
        &self,
        mut requirements: PaymentRequirements,
    ) -> PaymentRequirements {
        // Default asset if the route left it empty
        if requirements.asset.is_empty() {
            if let Some(config) = self.networks.config(&requirements.network) {
                requirements.asset = config.default_asset.address.to_string();
            }
        }

        let asset_info = self.find_asset(&requirements.network, &requirements.asset);

        // Convert decimal amounts to the token's smallest unit
        if requirements.amount.contains('.') {
            if let Some(info) = &asset_info {
                if let Ok(atomic) = parse_decimal_to_atomic(&requirements.amount, info.decimals) {
                    requirements.amount = atomic;
                }
            }
        }

        // Add EIP-712 domain params to extra so clients can sign offline
        if let Some(info) = asset_info {
            if !requirements.extra.is_object() {
                requirements.extra = Value::Object(serde_json::Map::new());
            }
            if let Some(extra) = requirements.extra.as_object_mut() {
                extra
                    .entry("name")
                    .or_insert_with(|| Value::String(info.name.clone()));
                extra
                    .entry("version")
                    .or_insert_with(|| Value::String(info.version.clone()));
            }
        }

        requirements
    }
}

/// Converts a decimal string to atomic units.
///
/// Example: `"1.50"` with 6 decimals → `"1500000"`. Excess fractional digits
/// are truncated.
fn parse_decimal_to_atomic(amount: &str, decimals: u8) -> Result<String, SchemeError> {
    let parts: Vec<&str> = amount.split('.').collect();
    let (whole, frac) = match parts.len() {
        1 => (parts[0], ""),
        2 => (parts[0], parts[1]),
        _ => return Err(format!("invalid decimal amount: {amount}").into()),
    };

    let whole_val: u128 = whole
        .parse()
        .map_err(|e| -> SchemeError { format!("invalid amount '{amount}': {e}").into() })?;

    let decimal_places = u32::from(decimals);
    let multiplier = 10u128.pow(decimal_places);

    let frac_val = if frac.is_empty() {
        0u128
    } else {
        let padded = format!("{frac:0<width$}", width = decimal_places as usize);
        let truncated = &padded[..decimal_places as usize];
        truncated
            .parse()
            .map_err(|e| -> SchemeError { format!("invalid fractional amount: {e}").into() })?
    };

    let total = whole_val * multiplier + frac_val;
    Ok(total.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> ExactEvmServer {
        ExactEvmServer::new(EvmNetworks::builtin().shared())
    }

    #[test]
    fn test_money_string_converts_to_atomic_usdc() {
        let parsed = server()
            .parse_price(&serde_json::json!("1.50"), "eip155:8453")
            .unwrap();
        assert_eq!(parsed.amount, "1500000");
        let extra = parsed.extra.unwrap();
        assert_eq!(extra["name"], "USD Coin");
        assert_eq!(extra["version"], "2");
    }

    #[test]
    fn test_dollar_prefix_is_stripped() {
        let parsed = server()
            .parse_price(&serde_json::json!("$0.01"), "eip155:84532")
            .unwrap();
        assert_eq!(parsed.amount, "10000");
    }

    #[test]
    fn test_asset_amount_object_passes_through() {
        let parsed = server()
            .parse_price(
                &serde_json::json!({"amount": "42", "asset": "0x00000000000000000000000000000000000000aa"}),
                "eip155:8453",
            )
            .unwrap();
        assert_eq!(parsed.amount, "42");
        assert_eq!(parsed.asset, "0x00000000000000000000000000000000000000aa");
    }

    #[test]
    fn test_enhance_fills_asset_and_domain_params() {
        let base = PaymentRequirements {
            scheme: "exact".into(),
            network: "eip155:84532".into(),
            amount: "1000000".into(),
            pay_to: "0xPayee".into(),
            max_timeout_seconds: 300,
            asset: String::new(),
            extra: Value::Null,
        };

        let enhanced = server().enhance_payment_requirements(base);
        assert!(!enhanced.asset.is_empty());
        assert_eq!(enhanced.extra["name"], "USDC");
        assert_eq!(enhanced.extra["version"], "2");
    }

    #[test]
    fn test_enhance_converts_decimal_amount() {
        let base = PaymentRequirements {
            scheme: "exact".into(),
            network: "eip155:8453".into(),
            amount: "2.5".into(),
            pay_to: "0xPayee".into(),
            max_timeout_seconds: 300,
            asset: String::new(),
            extra: Value::Null,
        };
        let enhanced = server().enhance_payment_requirements(base);
        assert_eq!(enhanced.amount, "2500000");
    }

    #[test]
    fn test_unknown_network_is_an_error() {
        assert!(
            server()
                .parse_price(&serde_json::json!("1.00"), "eip155:999999")
                .is_err()
        );
    }
}
