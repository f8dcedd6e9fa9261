use crate::planner::PlanNodeId;

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("Unsupported predicate for {dialect}: {expr} ({reason})")]
    UnsupportedPredicateShape {
        dialect: &'static str,
        expr: String,
        reason: String,
    },

    #[error("Scan node {node} finalized more than once")]
    FinalizeCalledTwice { node: PlanNodeId },

    #[error("Scan node {node} serialized before being finalized")]
    SerializeBeforeFinalize { node: PlanNodeId },

    #[error("Scan ranges requested for scan node {node} before being finalized")]
    ScanRangeBeforeFinalize { node: PlanNodeId },

    #[error("Unknown setting: '{0}'")]
    UnknownSetting(String),

    #[error("Invalid value '{value}' for setting '{setting}'")]
    InvalidSettingValue {
        setting: &'static str,
        value: String,
    },

    #[error(transparent)]
    Fmt(#[from] std::fmt::Error),
}

impl PlanError {
    /// Returns true if this error indicates the planner drove a scan node
    /// through an invalid state transition.
    ///
    /// These are bugs in the caller and should not be retried.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::FinalizeCalledTwice { .. }
                | Self::SerializeBeforeFinalize { .. }
                | Self::ScanRangeBeforeFinalize { .. }
        )
    }
}

pub type Result<T, E = PlanError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_violations() {
        let node = PlanNodeId::new(3);
        assert!(PlanError::FinalizeCalledTwice { node }.is_contract_violation());
        assert!(PlanError::SerializeBeforeFinalize { node }.is_contract_violation());
        assert!(PlanError::ScanRangeBeforeFinalize { node }.is_contract_violation());

        let err = PlanError::UnsupportedPredicateShape {
            dialect: "mysql",
            expr: "sum(t.a) > 1".to_string(),
            reason: "aggregate".to_string(),
        };
        assert!(!err.is_contract_violation());
    }

    #[test]
    fn error_display() {
        let err = PlanError::SerializeBeforeFinalize {
            node: PlanNodeId::new(7),
        };
        assert_eq!(
            "Scan node 7 serialized before being finalized",
            err.to_string()
        );
    }
}
