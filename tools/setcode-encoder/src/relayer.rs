//! End-to-end delegation: validate, sign, simulate and submit through a [`ChainProvider`].

use alloy_primitives::{Address, Bytes, B256};
use serde::Serialize;
use setcode_types::{ChainProvider, ChainScope, SignedAuthorization, SimulationOutcome};
use tracing::info;

use crate::{
    account::Account,
    authorization::{authorization_tuple, sign_authorization},
    error::{Eip7702Error, Eip7702Result},
    flow::{BuildFlow, BuildStatus},
    planner::{CompiledPlan, Plan},
    transaction::{assemble, NetworkCapabilities, TxCall, TxFields},
};

/// Fee and gas values applied to every transaction the relayer sends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeTemplate {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub gas_limit: u64,
}

impl Default for FeeTemplate {
    fn default() -> Self {
        Self {
            max_fee_per_gas: 20_000_000_000,
            max_priority_fee_per_gas: 1_000_000_000,
            gas_limit: 200_000,
        }
    }
}

/// Everything a build needs besides the authority itself.
#[derive(Debug)]
pub struct RelayerContext {
    pub chain_id: u64,
    pub delegate: Address,
    /// Pays for and signs the outer transaction.
    pub relayer: Account,
    pub fees: FeeTemplate,
    pub simulate: bool,
    /// Sign authorizations valid on every chain instead of `chain_id` only.
    pub any_chain: bool,
    /// `None` asks the provider.
    pub supports_set_code: Option<bool>,
}

impl RelayerContext {
    pub fn new(chain_id: u64, delegate: Address, relayer: Account) -> Self {
        Self {
            chain_id,
            delegate,
            relayer,
            fees: FeeTemplate::default(),
            simulate: false,
            any_chain: false,
            supports_set_code: None,
        }
    }

    fn scope(&self) -> ChainScope {
        if self.any_chain {
            ChainScope::AnyChain
        } else {
            ChainScope::Chain(self.chain_id)
        }
    }
}

/// Outcome of a successful [`Relayer::delegate`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub status: BuildStatus,
    pub authority: Address,
    pub authorization: SignedAuthorization,
    pub raw: Bytes,
    pub tx_hash: B256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulation: Option<SimulationOutcome>,
    /// Set when a type-2 transfer was sent instead of a set-code transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

pub struct Relayer<P> {
    provider: P,
    context: RelayerContext,
}

impl<P: ChainProvider> Relayer<P> {
    pub fn new(provider: P, context: RelayerContext) -> Self {
        Self { provider, context }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn context(&self) -> &RelayerContext {
        &self.context
    }

    /// Delegate `authority` to the configured contract and run `plan` in the same transaction.
    ///
    /// The plan is validated before any nonce lookup or signature. Any error moves `flow`
    /// to [`BuildStatus::Failed`] with the error text as the reason.
    pub fn delegate(
        &self,
        authority: &Account,
        plan: Option<&Plan>,
        flow: &mut BuildFlow,
    ) -> Eip7702Result<BuildReport> {
        let result = self.run(authority, plan, flow);
        if let Err(err) = &result {
            flow.fail(err.to_string());
        }
        result
    }

    fn run(
        &self,
        authority: &Account,
        plan: Option<&Plan>,
        flow: &mut BuildFlow,
    ) -> Eip7702Result<BuildReport> {
        let ctx = &self.context;
        flow.transition(BuildStatus::Validating)?;

        let compiled = match plan {
            Some(plan) => plan.compile(ctx.delegate)?,
            None => CompiledPlan::default(),
        };
        let mut tuple = authorization_tuple(ctx.scope(), ctx.delegate, 0)?;
        let actual = self.provider.chain_id().map_err(Eip7702Error::Provider)?;
        if actual != ctx.chain_id {
            return Err(Eip7702Error::WrongProviderChain { expected: ctx.chain_id, actual });
        }
        let supports_set_code = match ctx.supports_set_code {
            Some(known) => known,
            None => self.provider.supports_set_code().map_err(Eip7702Error::Provider)?,
        };
        let (tx_nonce, auth_nonce) = self.nonces(authority.address())?;
        tuple.nonce = auth_nonce;

        flow.transition(BuildStatus::Signing)?;
        let authorization = sign_authorization(authority, &tuple)?;
        let fields = TxFields {
            chain_id: ctx.chain_id,
            nonce: tx_nonce,
            max_priority_fee_per_gas: ctx.fees.max_priority_fee_per_gas,
            max_fee_per_gas: ctx.fees.max_fee_per_gas,
            gas_limit: ctx.fees.gas_limit,
            access_list: Vec::new(),
        };
        let call = TxCall::with_plan(authority.address(), ctx.delegate, compiled);
        let assembled = assemble(
            NetworkCapabilities { supports_set_code },
            &ctx.relayer,
            fields,
            &call,
            vec![authorization],
        )?;
        let raw = assembled.encode()?;

        let simulation = if ctx.simulate {
            flow.transition(BuildStatus::Simulating)?;
            let outcome = self.provider.simulate(&raw).map_err(Eip7702Error::Provider)?;
            if !outcome.success {
                return Err(Eip7702Error::SimulationFailed {
                    reason: outcome.error.unwrap_or_else(|| "reverted".to_string()),
                    simulation_url: outcome.simulation_url,
                });
            }
            Some(outcome)
        } else {
            None
        };

        flow.transition(BuildStatus::Submitting)?;
        let tx_hash = self.provider.send_raw_transaction(&raw).map_err(Eip7702Error::Broadcast)?;
        info!(authority = %authority.address(), %tx_hash, "delegation submitted");
        flow.transition(BuildStatus::Succeeded)?;

        Ok(BuildReport {
            status: flow.status(),
            authority: authority.address(),
            authorization,
            raw,
            tx_hash,
            simulation,
            fallback: assembled.fallback_reason().map(str::to_string),
        })
    }

    /// `(transaction nonce, authorization nonce)`.
    ///
    /// When the relayer is also the authority its own transaction bumps the nonce before
    /// the authorization is processed, so the authorization uses the next one.
    fn nonces(&self, authority: Address) -> Eip7702Result<(u64, u64)> {
        let relayer = self.context.relayer.address();
        let tx_nonce = self.provider.transaction_count(relayer).map_err(Eip7702Error::Provider)?;
        if relayer == authority {
            let auth_nonce =
                tx_nonce.checked_add(1).ok_or(Eip7702Error::NonceExhausted(tx_nonce))?;
            return Ok((tx_nonce, auth_nonce));
        }
        let auth_nonce = self.provider.transaction_count(authority).map_err(Eip7702Error::Provider)?;
        Ok((tx_nonce, auth_nonce))
    }
}
