use core::fmt;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Kinds of post-authorization operations a plan can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKind {
    SendValue,
    SweepNative,
    SweepToken,
    ArbitraryCall,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SendValue => "SendValue",
            Self::SweepNative => "SweepNative",
            Self::SweepToken => "SweepToken",
            Self::ArbitraryCall => "ArbitraryCall",
        };
        f.write_str(name)
    }
}

/// Kind-specific parameters, kept as entered until the plan is validated.
///
/// Addresses and call data stay as hex strings so malformed input survives into
/// validation and is reported against the step it came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StepParams {
    /// Transfer `amount` wei to the step target.
    SendValue { amount: U256 },
    /// Move the whole native balance to the step target.
    SweepNative,
    /// Move the whole balance of `token` to the step target.
    SweepToken { token: String },
    /// Call the step target with `data`, attaching `value` wei.
    ArbitraryCall {
        #[serde(default)]
        data: String,
        #[serde(default)]
        value: U256,
    },
}

impl StepParams {
    pub fn kind(&self) -> StepKind {
        match self {
            Self::SendValue { .. } => StepKind::SendValue,
            Self::SweepNative => StepKind::SweepNative,
            Self::SweepToken { .. } => StepKind::SweepToken,
            Self::ArbitraryCall { .. } => StepKind::ArbitraryCall,
        }
    }

    /// Native value this step attaches to the batch.
    pub fn attached_value(&self) -> U256 {
        match self {
            Self::SendValue { amount } => *amount,
            Self::ArbitraryCall { value, .. } => *value,
            Self::SweepNative | Self::SweepToken { .. } => U256::ZERO,
        }
    }
}

/// One entry of a delegated call plan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStep {
    /// Recipient for transfers and sweeps, callee for arbitrary calls.
    pub target: String,
    #[serde(flatten)]
    pub params: StepParams,
    /// 1-based position within the plan.
    #[serde(default)]
    pub order: u32,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl CallStep {
    pub fn new(target: impl Into<String>, params: StepParams) -> Self {
        Self { target: target.into(), params, order: 0, enabled: true }
    }

    pub fn kind(&self) -> StepKind {
        self.params.kind()
    }

    pub fn send_value(to: impl Into<String>, amount: U256) -> Self {
        Self::new(to, StepParams::SendValue { amount })
    }

    pub fn sweep_native(to: impl Into<String>) -> Self {
        Self::new(to, StepParams::SweepNative)
    }

    pub fn sweep_token(token: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(to, StepParams::SweepToken { token: token.into() })
    }

    pub fn arbitrary_call(target: impl Into<String>, data: impl Into<String>, value: U256) -> Self {
        Self::new(target, StepParams::ArbitraryCall { data: data.into(), value })
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attached_value_only_for_value_bearing_steps() {
        let one = U256::from(1u64);
        assert_eq!(CallStep::send_value("0x", one).params.attached_value(), one);
        assert_eq!(CallStep::arbitrary_call("0x", "", one).params.attached_value(), one);
        assert_eq!(CallStep::sweep_native("0x").params.attached_value(), U256::ZERO);
        assert_eq!(CallStep::sweep_token("0x", "0x").params.attached_value(), U256::ZERO);
    }

    #[test]
    fn parses_plan_json() {
        let json = r#"[
            {"kind": "SweepToken", "token": "0x1111111111111111111111111111111111111111",
             "target": "0x2222222222222222222222222222222222222222", "order": 2},
            {"kind": "SweepNative", "target": "0x2222222222222222222222222222222222222222",
             "order": 1, "enabled": false}
        ]"#;
        let steps: Vec<CallStep> = serde_json::from_str(json).unwrap();
        assert_eq!(steps[0].kind(), StepKind::SweepToken);
        assert!(steps[0].enabled);
        assert_eq!(steps[1].kind(), StepKind::SweepNative);
        assert!(!steps[1].enabled);
    }
}
