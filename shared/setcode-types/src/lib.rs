//! Shared types for EIP-7702 set-code authorizations, delegated call plans and the
//! chain collaborators (nonce lookup, simulation, broadcast) the builder talks to.

pub mod authorization;
pub mod provider;
pub mod steps;

pub use authorization::{
    AccessListItem, AuthorizationTuple, ChainScope, SignedAuthorization, AUTHORIZATION_MAGIC,
    EIP1559_TX_TYPE, SET_CODE_TX_TYPE,
};
pub use provider::{ChainProvider, ProviderError, SimulationOutcome};
pub use steps::{CallStep, StepKind, StepParams};
