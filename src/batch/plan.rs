// ABOUTME: Batch plan files: an ordered list of targets and their operations.
// ABOUTME: Order is preserved exactly as written; every entry needs at least one operation.

use crate::error::{Error, Result};
use crate::pipeline::DeployOverrides;
use crate::types::{Environment, Operation, TargetId};
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchPlan {
    #[serde(deserialize_with = "deserialize_steps")]
    pub steps: NonEmpty<PlanEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanEntry {
    /// Full target id or a unique prefix.
    pub target: TargetId,

    #[serde(deserialize_with = "deserialize_operations")]
    pub operations: NonEmpty<Operation>,

    /// Deploy path overrides per environment.
    #[serde(default)]
    pub deploy: HashMap<Environment, DeployOverrides>,
}

impl PlanEntry {
    pub fn overrides_for(&self, operation: &Operation) -> DeployOverrides {
        operation
            .environment()
            .and_then(|env| self.deploy.get(env))
            .cloned()
            .unwrap_or_default()
    }
}

/// One dispatch in plan order.
#[derive(Debug, Clone, Copy)]
pub struct PlanStep<'a> {
    pub entry: &'a PlanEntry,
    pub operation: &'a Operation,
}

impl BatchPlan {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn new(steps: NonEmpty<PlanEntry>) -> Self {
        Self { steps }
    }

    /// Every (target, operation) pair, entries in order, operations in order.
    pub fn ordered(&self) -> impl Iterator<Item = PlanStep<'_>> {
        self.steps.iter().flat_map(|entry| {
            entry
                .operations
                .iter()
                .map(move |operation| PlanStep { entry, operation })
        })
    }

    pub fn len(&self) -> usize {
        self.steps.iter().map(|e| e.operations.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn deserialize_steps<'de, D>(deserializer: D) -> std::result::Result<NonEmpty<PlanEntry>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let steps: Vec<PlanEntry> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(steps).ok_or_else(|| serde::de::Error::custom("plan has no steps"))
}

fn deserialize_operations<'de, D>(
    deserializer: D,
) -> std::result::Result<NonEmpty<Operation>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let operations: Vec<Operation> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(operations)
        .ok_or_else(|| serde::de::Error::custom("at least one operation is required"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LifecycleAction;
    use std::path::PathBuf;

    const PLAN: &str = r#"
steps:
  - target: web
    operations: [stop, "build-and-deploy:prod", start]
    deploy:
      prod:
        local_path: dist
        remote_path: /srv/web
  - target: db
    operations: ["export:shop"]
"#;

    #[test]
    fn parses_plan_in_order() {
        let plan = BatchPlan::from_yaml(PLAN).unwrap();
        let order: Vec<String> = plan
            .ordered()
            .map(|s| format!("{}/{}", s.entry.target, s.operation))
            .collect();
        assert_eq!(
            order,
            vec![
                "web/stop",
                "web/build-and-deploy:prod",
                "web/start",
                "db/export:shop"
            ]
        );
        assert_eq!(plan.len(), 4);
    }

    #[test]
    fn overrides_apply_to_matching_environment() {
        let plan = BatchPlan::from_yaml(PLAN).unwrap();
        let web = plan.steps.first();
        let deploy = "deploy:prod".parse::<Operation>().unwrap();
        assert_eq!(
            web.overrides_for(&deploy).local_path,
            Some(PathBuf::from("dist"))
        );
        let stop = Operation::Lifecycle(LifecycleAction::Stop);
        assert_eq!(web.overrides_for(&stop), DeployOverrides::default());
    }

    #[test]
    fn rejects_empty_plans_and_bad_operations() {
        assert!(BatchPlan::from_yaml("steps: []").is_err());
        assert!(BatchPlan::from_yaml("steps:\n  - target: web\n    operations: []\n").is_err());
        assert!(
            BatchPlan::from_yaml("steps:\n  - target: web\n    operations: [reboot]\n").is_err()
        );
    }
}
