//! Off-chain builder for EIP-7702 delegations.
//!
//! Signs authorization tuples, compiles the delegated call plan against the batch
//! delegate ABI and assembles the type-4 envelope that carries both. [`relayer`] drives
//! the whole sequence against a [`setcode_types::ChainProvider`].

pub mod account;
pub mod authorization;
pub mod convert;
pub mod error;
pub mod flow;
pub mod mock;
pub mod planner;
pub mod queue;
pub mod relayer;
pub mod rlp;
pub mod transaction;


pub use account::{keccak256_bytes, recover_address, Account, RecoverableSignature};
pub use authorization::{
    authorization_signing_hash, authorization_tuple, build_authorization, recover_authority,
    sign_authorization, verify_authorization,
};
pub use error::{Eip7702Error, Eip7702Result, FlowError, PlanError, QueueError, RlpError};
pub use flow::{BuildFlow, BuildStatus};
pub use planner::{compile, validate, CompiledPlan, Plan};
pub use queue::{BulkQueue, ItemStatus, QueueSummary};
pub use relayer::{BuildReport, FeeTemplate, Relayer, RelayerContext};
pub use transaction::{
    assemble, build_transaction, Assembled, FallbackTransfer, NetworkCapabilities,
    TransactionEnvelope, TxCall, TxFields,
};
