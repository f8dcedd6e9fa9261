use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::errors::{PlanError, Result};

/// What to do when a conjunct can't be rendered in the target dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushdownErrorPolicy {
    /// Fail finalizing the scan.
    #[default]
    Fail,
    /// Leave the conjunct out of the pushed down filters.
    ///
    /// The conjunct is still evaluated after rows are fetched.
    SkipFilter,
}

impl fmt::Display for PushdownErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fail => write!(f, "fail"),
            Self::SkipFilter => write!(f, "skip_filter"),
        }
    }
}

impl FromStr for PushdownErrorPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail" => Ok(Self::Fail),
            "skip_filter" => Ok(Self::SkipFilter),
            _ => Err(()),
        }
    }
}

/// Configuration for planning scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanPlanConfig {
    /// If conjuncts should be pushed to external sources at all.
    pub enable_predicate_pushdown: bool,
    pub pushdown_error_policy: PushdownErrorPolicy,
}

impl Default for ScanPlanConfig {
    fn default() -> Self {
        ScanPlanConfig {
            enable_predicate_pushdown: true,
            pushdown_error_policy: PushdownErrorPolicy::Fail,
        }
    }
}

impl ScanPlanConfig {
    pub fn set_from_str(&mut self, name: &str, value: &str) -> Result<()> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| PlanError::UnknownSetting(name.to_string()))?;

        (func.set)(value, self)
    }

    pub fn get_as_string(&self, name: &str) -> Result<String> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| PlanError::UnknownSetting(name.to_string()))?;

        Ok((func.get)(self))
    }

    pub fn reset_all(&mut self) {
        *self = Self::default();
    }

    pub fn setting_description(name: &str) -> Option<&'static str> {
        GET_SET_FUNCTIONS.get(name).map(|func| func.description)
    }

    /// Names of all settings, sorted.
    pub fn setting_names() -> Vec<&'static str> {
        let mut names: Vec<_> = GET_SET_FUNCTIONS.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

struct SettingFunctions {
    set: fn(value: &str, conf: &mut ScanPlanConfig) -> Result<()>,
    get: fn(conf: &ScanPlanConfig) -> String,
    description: &'static str,
}

impl SettingFunctions {
    const fn new<S: ScanSetting>() -> Self {
        SettingFunctions {
            set: S::set_from_str as _,
            get: S::get_as_string as _,
            description: S::DESCRIPTION,
        }
    }
}

fn insert_setting<S: ScanSetting>(map: &mut HashMap<&'static str, SettingFunctions>) {
    if map.insert(S::NAME, SettingFunctions::new::<S>()).is_some() {
        panic!("Duplicate settings names: {}", S::NAME);
    }
}

static GET_SET_FUNCTIONS: LazyLock<HashMap<&'static str, SettingFunctions>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    insert_setting::<EnablePredicatePushdown>(&mut map);
    insert_setting::<PushdownErrorPolicySetting>(&mut map);

    map
});

pub trait ScanSetting: Sync + Send + 'static {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn set_from_str(value: &str, conf: &mut ScanPlanConfig) -> Result<()>;
    fn get_as_string(conf: &ScanPlanConfig) -> String;
}

pub struct EnablePredicatePushdown;

impl ScanSetting for EnablePredicatePushdown {
    const NAME: &'static str = "enable_predicate_pushdown";
    const DESCRIPTION: &'static str = "If filters should be pushed down to external sources.";

    fn set_from_str(value: &str, conf: &mut ScanPlanConfig) -> Result<()> {
        conf.enable_predicate_pushdown =
            value
                .parse::<bool>()
                .map_err(|_| PlanError::InvalidSettingValue {
                    setting: Self::NAME,
                    value: value.to_string(),
                })?;
        Ok(())
    }

    fn get_as_string(conf: &ScanPlanConfig) -> String {
        conf.enable_predicate_pushdown.to_string()
    }
}

pub struct PushdownErrorPolicySetting;

impl ScanSetting for PushdownErrorPolicySetting {
    const NAME: &'static str = "pushdown_error_policy";
    const DESCRIPTION: &'static str =
        "Behavior when a filter can't be rendered for the external source ('fail' or 'skip_filter').";

    fn set_from_str(value: &str, conf: &mut ScanPlanConfig) -> Result<()> {
        conf.pushdown_error_policy =
            value
                .parse()
                .map_err(|_| PlanError::InvalidSettingValue {
                    setting: Self::NAME,
                    value: value.to_string(),
                })?;
        Ok(())
    }

    fn get_as_string(conf: &ScanPlanConfig) -> String {
        conf.pushdown_error_policy.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let conf = ScanPlanConfig::default();
        assert!(conf.enable_predicate_pushdown);
        assert_eq!(PushdownErrorPolicy::Fail, conf.pushdown_error_policy);
    }

    #[test]
    fn set_and_get() {
        let mut conf = ScanPlanConfig::default();
        conf.set_from_str("pushdown_error_policy", "skip_filter")
            .unwrap();
        conf.set_from_str("enable_predicate_pushdown", "false")
            .unwrap();

        assert_eq!(
            "skip_filter",
            conf.get_as_string("pushdown_error_policy").unwrap()
        );
        assert_eq!(
            "false",
            conf.get_as_string("enable_predicate_pushdown").unwrap()
        );

        conf.reset_all();
        assert_eq!(ScanPlanConfig::default(), conf);
    }

    #[test]
    fn invalid_values() {
        let mut conf = ScanPlanConfig::default();
        let err = conf
            .set_from_str("enable_predicate_pushdown", "maybe")
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidSettingValue { .. }));

        let err = conf.set_from_str("does_not_exist", "1").unwrap_err();
        assert!(matches!(err, PlanError::UnknownSetting(_)));

        // Failed sets don't modify the config.
        assert_eq!(ScanPlanConfig::default(), conf);
    }

    #[test]
    fn setting_names_sorted() {
        assert_eq!(
            vec!["enable_predicate_pushdown", "pushdown_error_policy"],
            ScanPlanConfig::setting_names()
        );
        for name in ScanPlanConfig::setting_names() {
            assert!(ScanPlanConfig::setting_description(name).is_some());
        }
        assert_eq!(None, ScanPlanConfig::setting_description("nope"));
    }
}
