// ABOUTME: Immutable view of the targets seen by one refresh.
// ABOUTME: Eligibility is always derived from the snapshot's lifecycle states.

use super::{RegistryError, Result};
use crate::types::{Operation, Target, TargetId};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct Snapshot {
    targets: Vec<Target>,
    refreshed_at: Option<DateTime<Utc>>,
    skipped: usize,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            targets: Vec::new(),
            refreshed_at: None,
            skipped: 0,
        }
    }

    pub fn new(targets: Vec<Target>, refreshed_at: DateTime<Utc>, skipped: usize) -> Self {
        Self {
            targets,
            refreshed_at: Some(refreshed_at),
            skipped,
        }
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// `None` until the first successful refresh.
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    /// Listing entries dropped as unparseable.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn get(&self, id: &TargetId) -> Option<&Target> {
        self.targets.iter().find(|t| &t.id == id)
    }

    /// Look a target up by full id or unique id prefix.
    pub fn find(&self, query: &str) -> Result<&Target> {
        if let Some(target) = self.targets.iter().find(|t| t.id.as_str() == query) {
            return Ok(target);
        }
        let matches: Vec<&Target> = self
            .targets
            .iter()
            .filter(|t| t.id.as_str().starts_with(query))
            .collect();
        match matches.as_slice() {
            [] => Err(RegistryError::TargetNotFound(query.to_string())),
            [target] => Ok(target),
            _ => Err(RegistryError::AmbiguousTarget {
                query: query.to_string(),
                count: matches.len(),
            }),
        }
    }

    /// Targets `operation` may currently be dispatched to.
    pub fn eligible(&self, operation: &Operation) -> Vec<&Target> {
        self.targets
            .iter()
            .filter(|t| operation.is_enabled_for(&t.state))
            .collect()
    }

    /// The target, if it exists and allows `operation` right now.
    pub fn check(&self, id: &TargetId, operation: &Operation) -> Result<&Target> {
        let target = self
            .get(id)
            .ok_or_else(|| RegistryError::TargetNotFound(id.to_string()))?;
        if !operation.is_enabled_for(&target.state) {
            return Err(RegistryError::Ineligible {
                target: id.to_string(),
                operation: operation.to_string(),
                status: target.status.clone(),
            });
        }
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::parse_listing;
    use crate::types::{Environment, LifecycleAction};

    fn snapshot() -> Snapshot {
        let listing = parse_listing(
            "aaa111\tnginx\tcmd\t2024-01-15 10:30:00 +0000 UTC\tUp 3 hours\t80/tcp\n\
             aaa222\tmysql\tcmd\t2024-01-15 10:30:00 +0000 UTC\tExited (0) 1 hour ago\t\n\
             bbb333\tredis\tcmd\t2024-01-15 10:30:00 +0000 UTC\tCreated\t\n",
        );
        Snapshot::new(listing.targets, Utc::now(), listing.skipped)
    }

    #[test]
    fn find_by_id_or_unique_prefix() {
        let snap = snapshot();
        assert_eq!(snap.find("bbb").unwrap().image, "redis");
        assert_eq!(snap.find("aaa222").unwrap().image, "mysql");
        assert!(matches!(
            snap.find("aaa"),
            Err(RegistryError::AmbiguousTarget { count: 2, .. })
        ));
        assert!(matches!(snap.find("zzz"), Err(RegistryError::TargetNotFound(_))));
    }

    #[test]
    fn eligibility_follows_lifecycle() {
        let snap = snapshot();
        let start = Operation::Lifecycle(LifecycleAction::Start);
        let ids: Vec<_> = snap.eligible(&start).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["aaa222", "bbb333"]);

        let deploy = Operation::Deploy(Environment::new("dev").unwrap());
        assert_eq!(snap.eligible(&deploy).len(), 2);

        let stopped = TargetId::new("aaa222").unwrap();
        let stop = Operation::Lifecycle(LifecycleAction::Stop);
        let err = snap.check(&stopped, &stop).unwrap_err();
        assert!(matches!(err, RegistryError::Ineligible { .. }));
        assert!(snap.check(&stopped, &Operation::Inspect).is_ok());
    }
}
