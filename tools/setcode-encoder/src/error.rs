use setcode_types::{ProviderError, StepKind};
use thiserror::Error;

use crate::flow::BuildStatus;

/// Errors raised while encoding or decoding RLP.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RlpError {
    #[error("negative integer {0} has no RLP encoding")]
    NegativeInteger(i128),
    #[error("payload of {0} bytes exceeds the RLP size ceiling")]
    TooLong(usize),
    #[error("list nesting exceeds {0} levels")]
    TooDeep(usize),
    #[error("input truncated")]
    Truncated,
    #[error("non-canonical encoding")]
    NonCanonical,
    #[error("{0} trailing bytes after item")]
    TrailingBytes(usize),
    #[error("expected a byte string, found a list")]
    ExpectedBytes,
    #[error("expected a list, found a byte string")]
    ExpectedList,
    #[error("integer has leading zero bytes")]
    LeadingZeros,
    #[error("integer does not fit in {0} bits")]
    Overflow(u32),
    #[error("expected {expected} bytes, found {found}")]
    UnexpectedLength { expected: usize, found: usize },
    #[error("expected {expected} list items, found {found}")]
    UnexpectedItemCount { expected: usize, found: usize },
}

/// Errors raised while validating and compiling a call plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("step {order} ({kind}): {reason}")]
    InvalidStepParameters { order: u32, kind: StepKind, reason: String },
    #[error("order {0} is shared by more than one enabled step")]
    DuplicateOrder(u32),
    #[error("no step with order {0}")]
    UnknownStep(u32),
    #[error("attached value overflows uint256")]
    ValueOverflow,
}

/// Illegal moves of the build state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("cannot move from {from:?} to {to:?}")]
    IllegalTransition { from: BuildStatus, to: BuildStatus },
}

/// Errors raised by the bulk key queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue is paused")]
    Paused,
    #[error("queue has no pending items")]
    Exhausted,
}

/// Errors raised while building, signing or submitting a delegation.
#[derive(Debug, Error)]
pub enum Eip7702Error {
    /// Malformed numeric or byte input to the codec.
    #[error(transparent)]
    Encoding(#[from] RlpError),
    /// A user-supplied account identifier is not 20 bytes of hex.
    #[error("invalid address `{input}`: {reason}")]
    InvalidAddress { input: String, reason: String },
    /// Call data or other byte input is not valid hex.
    #[error("invalid hex for {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },
    /// Chain id 0 was passed as a concrete chain.
    #[error("chain id 0 is only valid for an explicit any-chain authorization")]
    InvalidChainId,
    /// Key material rejected by the signing primitive.
    #[error("signing failed: {0}")]
    Signing(String),
    /// Signature could not be parsed or recovered.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    /// A set-code transaction without authorizations.
    #[error("set-code transaction requires at least one authorization")]
    MissingAuthorization,
    /// An authorization was signed for a different chain than the envelope.
    #[error("authorization {index} is for chain {authorization} but the transaction is for chain {transaction}")]
    NetworkMismatch { index: usize, authorization: u64, transaction: u64 },
    /// The sender's nonce has no successor left for a self-sponsored authorization.
    #[error("nonce {0} has no successor")]
    NonceExhausted(u64),
    /// The connected provider serves a different chain than the build context.
    #[error("provider is on chain {actual}, expected {expected}")]
    WrongProviderChain { expected: u64, actual: u64 },
    /// Raw envelope bytes do not describe a transaction of the expected type.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    /// The envelope has no sender signature yet.
    #[error("transaction is not signed")]
    Unsigned,
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Flow(#[from] FlowError),
    /// A nonce or capability lookup failed.
    #[error("provider error: {0}")]
    Provider(ProviderError),
    /// The simulation service reported a failing transaction.
    #[error("simulation failed: {reason}")]
    SimulationFailed { reason: String, simulation_url: Option<String> },
    /// Broadcast failure, passed through from the RPC endpoint.
    #[error("broadcast failed: {0}")]
    Broadcast(ProviderError),
}

impl Eip7702Error {
    pub(crate) fn invalid_address(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAddress { input: input.to_string(), reason: reason.into() }
    }
}

/// Convenience alias for builder results.
pub type Eip7702Result<T> = Result<T, Eip7702Error>;

