//! Mock chain provider for testing.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use alloy_primitives::{Address, Bytes, B256};
pub use setcode_types::{ChainProvider, ProviderError, SimulationOutcome};

use crate::account::keccak256_bytes;

/// Mock chain provider for off-chain testing.
///
/// Nonces, simulation results and broadcast results are scripted up front; every
/// nonce lookup and broadcast is recorded so tests can check what the builder touched.
pub struct MockChainProvider {
    pub chain_id: u64,
    pub supports_set_code: bool,
    pub nonces: HashMap<Address, u64>,
    pub simulation: Option<SimulationOutcome>,
    /// `None` answers with the keccak of the raw bytes.
    pub broadcast_error: Option<String>,
    nonce_queries: Cell<usize>,
    sent: RefCell<Vec<Bytes>>,
}

impl MockChainProvider {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            supports_set_code: true,
            nonces: HashMap::new(),
            simulation: None,
            broadcast_error: None,
            nonce_queries: Cell::new(0),
            sent: RefCell::new(Vec::new()),
        }
    }

    pub fn with_nonce(mut self, account: Address, nonce: u64) -> Self {
        self.nonces.insert(account, nonce);
        self
    }

    pub fn nonce_queries(&self) -> usize {
        self.nonce_queries.get()
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.borrow().clone()
    }
}

impl ChainProvider for MockChainProvider {
    fn chain_id(&self) -> Result<u64, ProviderError> {
        Ok(self.chain_id)
    }

    fn transaction_count(&self, account: Address) -> Result<u64, ProviderError> {
        self.nonce_queries.set(self.nonce_queries.get() + 1);
        Ok(self.nonces.get(&account).copied().unwrap_or_default())
    }

    fn supports_set_code(&self) -> Result<bool, ProviderError> {
        Ok(self.supports_set_code)
    }

    fn simulate(&self, _raw: &Bytes) -> Result<SimulationOutcome, ProviderError> {
        self.simulation.clone().ok_or(ProviderError::NotImplemented)
    }

    fn send_raw_transaction(&self, raw: &Bytes) -> Result<B256, ProviderError> {
        if let Some(message) = &self.broadcast_error {
            return Err(ProviderError::Rpc(message.clone()));
        }
        self.sent.borrow_mut().push(raw.clone());
        Ok(keccak256_bytes(raw))
    }
}
