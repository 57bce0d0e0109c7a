use std::{fs, path::Path};

use alloy_primitives::Address;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use setcode_encoder::FeeTemplate;

/// One entry of the networks file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    /// Batch delegate deployed on this network, if any.
    #[serde(default)]
    pub delegate: Option<Address>,
    #[serde(default = "default_true")]
    pub supports_set_code: bool,
    #[serde(default = "default_max_fee")]
    pub max_fee_per_gas: u128,
    #[serde(default = "default_priority_fee")]
    pub max_priority_fee_per_gas: u128,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_fee() -> u128 {
    FeeTemplate::default().max_fee_per_gas
}

fn default_priority_fee() -> u128 {
    FeeTemplate::default().max_priority_fee_per_gas
}

fn default_gas_limit() -> u64 {
    FeeTemplate::default().gas_limit
}

impl NetworkConfig {
    fn preset(name: &str, chain_id: u64, supports_set_code: bool) -> Self {
        let fees = FeeTemplate::default();
        Self {
            name: name.to_string(),
            chain_id,
            delegate: None,
            supports_set_code,
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            gas_limit: fees.gas_limit,
        }
    }

    pub fn fees(&self) -> FeeTemplate {
        FeeTemplate {
            max_fee_per_gas: self.max_fee_per_gas,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            gas_limit: self.gas_limit,
        }
    }
}

/// Networks used when no file is given.
pub fn builtin_networks() -> Vec<NetworkConfig> {
    vec![
        NetworkConfig::preset("mainnet", 1, true),
        NetworkConfig::preset("sepolia", 11_155_111, true),
        NetworkConfig::preset("optimism", 10, true),
        NetworkConfig::preset("base", 8453, true),
        NetworkConfig::preset("arbitrum", 42_161, true),
        NetworkConfig::preset("bsc", 56, true),
        NetworkConfig::preset("polygon", 137, true),
        NetworkConfig::preset("anvil", 31_337, true),
    ]
}

/// Read a JSON array of networks, or fall back to [`builtin_networks`].
pub fn load_networks(path: Option<&Path>) -> Result<Vec<NetworkConfig>> {
    let Some(path) = path else {
        return Ok(builtin_networks());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading networks file {}", path.display()))?;
    let networks: Vec<NetworkConfig> = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing networks file {}", path.display()))?;
    if networks.is_empty() {
        return Err(anyhow!("networks file {} lists no networks", path.display()));
    }
    Ok(networks)
}

/// Find a network by name (case-insensitive) or decimal chain id.
pub fn select_network(networks: &[NetworkConfig], selector: &str) -> Result<NetworkConfig> {
    let by_id = selector.parse::<u64>().ok();
    networks
        .iter()
        .find(|n| n.name.eq_ignore_ascii_case(selector) || Some(n.chain_id) == by_id)
        .cloned()
        .ok_or_else(|| {
            let known: Vec<&str> = networks.iter().map(|n| n.name.as_str()).collect();
            anyhow!("unknown network `{selector}` (known: {})", known.join(", "))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn selects_by_name_or_chain_id() {
        let networks = builtin_networks();
        assert_eq!(select_network(&networks, "BSC").unwrap().chain_id, 56);
        assert_eq!(select_network(&networks, "11155111").unwrap().name, "sepolia");
        let err = select_network(&networks, "nowhere").unwrap_err();
        assert!(err.to_string().contains("sepolia"));
    }

    #[test]
    fn file_entries_fill_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name":"legacy","chain_id":99,"supports_set_code":false,
                "delegate":"0x63c0c19a282a1b52b07dd5a65b58948a07dae32b"}}]"#
        )
        .unwrap();

        let networks = load_networks(Some(file.path())).unwrap();
        let legacy = select_network(&networks, "legacy").unwrap();
        assert!(!legacy.supports_set_code);
        assert!(legacy.delegate.is_some());
        assert_eq!(legacy.fees(), FeeTemplate::default());
    }

    #[test]
    fn empty_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[]").unwrap();
        assert!(load_networks(Some(file.path())).is_err());
        assert_eq!(load_networks(None).unwrap(), builtin_networks());
    }
}
