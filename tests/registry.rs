// ABOUTME: Integration tests for the target registry.
// ABOUTME: Refresh parsing, failure handling, atomic snapshot replacement and the refresh loop.

mod support;

use chrono::Utc;
use dockside::registry::{RegistryError, Snapshot, TargetRegistry};
use dockside::runtime::{ContainerCli, RuntimeType};
use dockside::types::{LifecycleState, Operation};
use std::sync::Arc;
use std::time::Duration;
use support::{FakeShell, LISTING, Reply};
use tokio_util::sync::CancellationToken;

fn registry(shell: &Arc<FakeShell>) -> Arc<TargetRegistry> {
    support::init_tracing();
    Arc::new(TargetRegistry::new(
        shell.clone(),
        ContainerCli::new(RuntimeType::Docker),
    ))
}

#[tokio::test]
async fn refresh_keeps_good_entries_and_skips_bad_status() {
    let shell = FakeShell::new();
    let listing = format!(
        "{LISTING}deadbeef0001\tshop/cron:2\t\"cron -f\"\t2024-03-01 10:15:00 +0000 UTC\tHibernating\t\n"
    );
    shell.on("ps -a --format", Reply::ok(&listing));
    let registry = registry(&shell);

    let snapshot = registry.refresh().await.unwrap();

    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.skipped(), 1);
    assert!(snapshot.refreshed_at().is_some());
    let web = snapshot.find("a1b2").unwrap();
    assert_eq!(web.state, LifecycleState::Running);
    assert_eq!(web.ports.len(), 1);
    let db = snapshot.find("0f9e8d7c6b5a").unwrap();
    assert_eq!(db.state, LifecycleState::Exited(Some(0)));
}

#[tokio::test]
async fn failed_refresh_keeps_previous_snapshot() {
    let shell = FakeShell::new();
    shell.on("ps -a --format", Reply::ok(LISTING));
    let registry = registry(&shell);
    let before = registry.refresh().await.unwrap();

    shell.replace(
        "ps -a --format",
        Reply::fail(1, "Cannot connect to the Docker daemon"),
    );
    let err = registry.refresh().await.unwrap_err();

    assert!(matches!(err, RegistryError::Remote(_)));
    assert!(Arc::ptr_eq(&before, &registry.current_snapshot()));
}

#[tokio::test]
async fn readers_see_old_or_new_snapshot_never_a_mix() {
    let shell = FakeShell::new();
    let registry = registry(&shell);
    registry.publish(Snapshot::empty());

    let held = registry.current_snapshot();
    shell.on("ps -a --format", Reply::ok(LISTING));
    let fresh = registry.refresh().await.unwrap();

    // A reader holding the old snapshot keeps an intact view.
    assert!(held.is_empty());
    assert_eq!(fresh.len(), 2);
    assert!(Arc::ptr_eq(&fresh, &registry.current_snapshot()));

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for _ in 0..100 {
                    let len = registry.current_snapshot().len();
                    assert!(len == 0 || len == 2, "saw partial snapshot of {len}");
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    for _ in 0..20 {
        registry.publish(Snapshot::empty());
        registry.refresh().await.unwrap();
    }
    for reader in readers {
        reader.await.unwrap();
    }
}

#[tokio::test]
async fn eligibility_follows_lifecycle() {
    let shell = FakeShell::new();
    shell.on("ps -a --format", Reply::ok(LISTING));
    let snapshot = registry(&shell).refresh().await.unwrap();

    let start = Operation::Lifecycle(dockside::types::LifecycleAction::Start);
    let eligible: Vec<&str> = snapshot.eligible(&start).iter().map(|t| t.id.as_str()).collect();
    assert_eq!(eligible, vec!["0f9e8d7c6b5a"]);

    let running = snapshot.find("a1b2").unwrap().id.clone();
    let err = snapshot.check(&running, &start).unwrap_err();
    assert!(matches!(err, RegistryError::Ineligible { .. }));
}

#[tokio::test]
async fn ambiguous_prefix_is_rejected() {
    let snapshot = Snapshot::new(
        dockside::runtime::parse_listing(LISTING).targets,
        Utc::now(),
        0,
    );
    // An empty query is a prefix of every id.
    assert!(matches!(
        snapshot.find(""),
        Err(RegistryError::AmbiguousTarget { count: 2, .. })
    ));
    assert!(matches!(
        snapshot.find("zzz"),
        Err(RegistryError::TargetNotFound(_))
    ));
}

#[tokio::test]
async fn refresh_loop_survives_failures() {
    let shell = FakeShell::new();
    shell.on("ps -a --format", Reply::ConnectionLost);
    let registry = registry(&shell);
    let cancel = CancellationToken::new();

    let handle = registry.spawn_refresh_loop(Duration::from_millis(10), cancel.clone());
    tokio::time::sleep(Duration::from_millis(35)).await;
    shell.replace("ps -a --format", Reply::ok(LISTING));

    let mut waited = Duration::ZERO;
    while registry.current_snapshot().is_empty() && waited < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += Duration::from_millis(10);
    }
    cancel.cancel();
    handle.await.unwrap();

    assert_eq!(registry.current_snapshot().len(), 2);
    let attempts = shell
        .commands()
        .iter()
        .filter(|c| c.contains("ps -a"))
        .count();
    assert!(attempts >= 2);
}
