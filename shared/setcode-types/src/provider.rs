use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

/// Errors surfaced by chain collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Used by off-chain mocks or partially implemented providers.
    NotImplemented,
    /// The endpoint answered with an error; the message is passed through untouched.
    Rpc(String),
}

impl core::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotImplemented => f.write_str("not implemented"),
            Self::Rpc(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Response of a transaction-simulation service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulation_url: Option<String>,
}

/// Chain collaborators used while building and submitting a delegation.
///
/// Calls are blocking; implementations backed by async transports block on their
/// own runtime. Nothing here is retried by the builder.
pub trait ChainProvider {
    /// Chain id the provider is connected to.
    fn chain_id(&self) -> Result<u64, ProviderError>;

    /// Current transaction count of `account` (the next usable nonce).
    fn transaction_count(&self, _account: Address) -> Result<u64, ProviderError> {
        Err(ProviderError::NotImplemented)
    }

    /// Whether the network accepts type-4 envelopes.
    fn supports_set_code(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }

    /// Simulate a signed raw transaction without broadcasting it.
    fn simulate(&self, _raw: &Bytes) -> Result<SimulationOutcome, ProviderError> {
        Err(ProviderError::NotImplemented)
    }

    /// `eth_sendRawTransaction`; returns the transaction hash reported by the node.
    fn send_raw_transaction(&self, _raw: &Bytes) -> Result<B256, ProviderError> {
        Err(ProviderError::NotImplemented)
    }
}
