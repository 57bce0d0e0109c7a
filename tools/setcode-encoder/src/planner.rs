//! Call-sequence planning: ordering, validation and ABI compilation of the calls a
//! delegated account runs after its authorization lands.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use setcode_types::{CallStep, StepKind, StepParams};
use std::collections::BTreeSet;
use tracing::debug;

use crate::{
    convert::{parse_address, parse_hex_bytes},
    error::PlanError,
};

sol! {
    /// Entry points of the batch delegate contract.
    interface IBatchDelegate {
        function sweepNative(address recipient) external;
        function sweepToken(address token, address recipient) external;
        function execute(address target, uint256 value, bytes data) external payable;
        function multicall(address[] targets, bytes[] datas) external payable;
    }
}

/// Call data and attached value for the enclosing transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompiledPlan {
    pub data: Bytes,
    pub value: U256,
    /// Number of enabled steps that went into `data`.
    pub steps: usize,
}

impl CompiledPlan {
    pub fn is_empty(&self) -> bool {
        self.steps == 0
    }
}

/// A step whose parameters passed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedStep {
    pub order: u32,
    pub action: StepAction,
    /// Native value the step attaches to the enclosing transaction.
    pub value: U256,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepAction {
    SendValue { to: Address, amount: U256 },
    SweepNative { to: Address },
    SweepToken { token: Address, to: Address },
    Call { target: Address, data: Bytes, value: U256 },
}

impl StepAction {
    /// `(target, data)` entry of a batched call.
    fn batch_entry(&self, delegate: Address) -> (Address, Bytes) {
        match self {
            Self::SendValue { to, .. } => (*to, Bytes::new()),
            Self::SweepNative { to } => {
                (delegate, IBatchDelegate::sweepNativeCall { recipient: *to }.abi_encode().into())
            }
            Self::SweepToken { token, to } => (
                delegate,
                IBatchDelegate::sweepTokenCall { token: *token, recipient: *to }.abi_encode().into(),
            ),
            Self::Call { target, data, .. } => (*target, data.clone()),
        }
    }

    /// Call data when this is the only step.
    fn single_call_data(&self) -> Bytes {
        match self {
            Self::SendValue { .. } => Bytes::new(),
            Self::SweepNative { to } => {
                IBatchDelegate::sweepNativeCall { recipient: *to }.abi_encode().into()
            }
            Self::SweepToken { token, to } => {
                IBatchDelegate::sweepTokenCall { token: *token, recipient: *to }
                    .abi_encode()
                    .into()
            }
            Self::Call { target, data, value } => IBatchDelegate::executeCall {
                target: *target,
                value: *value,
                data: data.clone(),
            }
            .abi_encode()
            .into(),
        }
    }
}

fn invalid(step: &CallStep, reason: impl Into<String>) -> PlanError {
    PlanError::InvalidStepParameters { order: step.order, kind: step.kind(), reason: reason.into() }
}

/// Check one step's parameters without compiling it.
pub fn resolve_step(step: &CallStep) -> Result<ResolvedStep, PlanError> {
    let target =
        parse_address(&step.target).map_err(|e| invalid(step, format!("target: {e}")))?;
    let action = match &step.params {
        StepParams::SendValue { amount } => {
            if amount.is_zero() {
                return Err(invalid(step, "amount must be greater than zero"));
            }
            StepAction::SendValue { to: target, amount: *amount }
        }
        StepParams::SweepNative => StepAction::SweepNative { to: target },
        StepParams::SweepToken { token } => {
            let token = parse_address(token).map_err(|e| invalid(step, format!("token: {e}")))?;
            StepAction::SweepToken { token, to: target }
        }
        StepParams::ArbitraryCall { data, value } => {
            let data =
                parse_hex_bytes("data", data).map_err(|e| invalid(step, format!("data: {e}")))?;
            StepAction::Call { target, data, value: *value }
        }
    };
    Ok(ResolvedStep { order: step.order, action, value: step.params.attached_value() })
}

/// Validate every enabled step, in ascending order.
///
/// All-or-nothing: the first invalid step aborts and nothing is returned.
pub fn validate(steps: &[CallStep]) -> Result<Vec<ResolvedStep>, PlanError> {
    let mut enabled: Vec<&CallStep> = steps.iter().filter(|s| s.enabled).collect();
    enabled.sort_by_key(|s| s.order);

    let mut seen = BTreeSet::new();
    for step in &enabled {
        if !seen.insert(step.order) {
            return Err(PlanError::DuplicateOrder(step.order));
        }
    }

    enabled.into_iter().map(resolve_step).collect()
}

/// Compile the enabled steps of a plan into call data for the delegate.
///
/// One step compiles to that step's own call; several become
/// `multicall(targets, datas)` with the attached values summed.
pub fn compile(steps: &[CallStep], delegate: Address) -> Result<CompiledPlan, PlanError> {
    let resolved = validate(steps)?;

    let compiled = match resolved.as_slice() {
        [] => CompiledPlan::default(),
        [only] => CompiledPlan {
            data: only.action.single_call_data(),
            value: only.value,
            steps: 1,
        },
        many => {
            let mut targets = Vec::with_capacity(many.len());
            let mut datas = Vec::with_capacity(many.len());
            let mut value = U256::ZERO;
            for step in many {
                let (target, data) = step.action.batch_entry(delegate);
                targets.push(target);
                datas.push(data);
                value = value.checked_add(step.value).ok_or(PlanError::ValueOverflow)?;
            }
            CompiledPlan {
                data: IBatchDelegate::multicallCall { targets, datas }.abi_encode().into(),
                value,
                steps: many.len(),
            }
        }
    };

    debug!(steps = compiled.steps, value = %compiled.value, "compiled call plan");
    Ok(compiled)
}

/// Ordered, editable list of call steps.
///
/// Every edit renormalizes `order` to `1..=N` in list order, disabled steps included,
/// so compiled output order is never ambiguous.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Plan {
    steps: Vec<CallStep>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt steps in ascending `order`; ties keep their input position.
    pub fn from_steps(mut steps: Vec<CallStep>) -> Self {
        steps.sort_by_key(|s| s.order);
        let mut plan = Self { steps };
        plan.renormalize();
        plan
    }

    pub fn steps(&self) -> &[CallStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, order: u32) -> Option<&CallStep> {
        self.position(order).map(|i| &self.steps[i])
    }

    pub fn push(&mut self, step: CallStep) -> u32 {
        self.steps.push(step);
        self.renormalize();
        self.steps.len() as u32
    }

    /// Insert so the step ends up with order `order` (clamped to the end).
    pub fn insert(&mut self, order: u32, step: CallStep) -> u32 {
        let index = (order.max(1) as usize - 1).min(self.steps.len());
        self.steps.insert(index, step);
        self.renormalize();
        index as u32 + 1
    }

    pub fn remove(&mut self, order: u32) -> Result<CallStep, PlanError> {
        let index = self.position(order).ok_or(PlanError::UnknownStep(order))?;
        let step = self.steps.remove(index);
        self.renormalize();
        Ok(step)
    }

    /// Move the step at `from` so it ends up at `to`.
    pub fn move_step(&mut self, from: u32, to: u32) -> Result<(), PlanError> {
        let index = self.position(from).ok_or(PlanError::UnknownStep(from))?;
        if self.position(to).is_none() {
            return Err(PlanError::UnknownStep(to));
        }
        let step = self.steps.remove(index);
        self.steps.insert(to as usize - 1, step);
        self.renormalize();
        Ok(())
    }

    pub fn set_enabled(&mut self, order: u32, enabled: bool) -> Result<(), PlanError> {
        let index = self.position(order).ok_or(PlanError::UnknownStep(order))?;
        self.steps[index].enabled = enabled;
        Ok(())
    }

    pub fn enabled_kinds(&self) -> Vec<StepKind> {
        self.steps.iter().filter(|s| s.enabled).map(CallStep::kind).collect()
    }

    pub fn validate(&self) -> Result<Vec<ResolvedStep>, PlanError> {
        validate(&self.steps)
    }

    pub fn compile(&self, delegate: Address) -> Result<CompiledPlan, PlanError> {
        compile(&self.steps, delegate)
    }

    fn position(&self, order: u32) -> Option<usize> {
        self.steps.iter().position(|s| s.order == order)
    }

    fn renormalize(&mut self) {
        for (i, step) in self.steps.iter_mut().enumerate() {
            step.order = i as u32 + 1;
        }
    }
}
