// ABOUTME: Integration tests for database exports and dispatched operations.
// ABOUTME: Drives the console handler through dispatch against a scripted shell and terminal.

mod support;

use dockside::config::{ConsoleConfig, ExportConfig, InteractiveConfig};
use dockside::error::ErrorKind;
use dockside::events::{ConsoleEvent, EventSink};
use dockside::ops::{
    ConsoleHandler, ExportError, OperationContext, OperationError, OperationHandler, dispatch,
};
use dockside::pipeline::PipelineRunner;
use dockside::runtime::{ContainerCli, RuntimeType};
use dockside::store::{ConfigStore, DatabaseCredentials, MemoryStore};
use dockside::types::{Operation, TargetId};
use std::sync::Arc;
use std::time::Duration;
use support::{FakeShell, Reply};

const DUMP: &[u8] = b"-- MySQL dump\nCREATE TABLE orders (id INT);\n";

struct Fixture {
    shell: Arc<FakeShell>,
    store: Arc<MemoryStore>,
    handler: Arc<dyn OperationHandler>,
    dumps: tempfile::TempDir,
}

fn target() -> TargetId {
    TargetId::new("a1b2c3d4e5f6").unwrap()
}

fn fixture() -> Fixture {
    support::init_tracing();
    let dumps = tempfile::tempdir().unwrap();
    let config = Arc::new(ConsoleConfig {
        poll_interval: Duration::from_millis(5),
        command_timeout: Duration::from_secs(2),
        interactive: InteractiveConfig {
            settle_delay: Duration::from_millis(10),
            ..InteractiveConfig::default()
        },
        export: ExportConfig {
            local_dir: dumps.path().to_path_buf(),
            ..ExportConfig::default()
        },
        ..ConsoleConfig::default()
    });

    let shell = FakeShell::new();
    let store = Arc::new(MemoryStore::new());
    let cli = ContainerCli::new(RuntimeType::Docker);
    let runner = PipelineRunner::new(shell.clone(), cli, store.clone(), config.clone()).unwrap();
    let handler: Arc<dyn OperationHandler> = Arc::new(ConsoleHandler::new(
        shell.clone(),
        cli,
        Arc::new(runner),
        store.clone(),
        config,
        "shop-prod",
    ));

    Fixture {
        shell,
        store,
        handler,
        dumps,
    }
}

fn with_credentials(fx: &Fixture) {
    fx.store
        .save_database_credentials(DatabaseCredentials {
            target: target(),
            username: "shop".to_string(),
            password: "s3cret".to_string(),
            last_used: None,
        })
        .unwrap();
}

#[tokio::test]
async fn export_pulls_the_dump_and_cleans_scratch_files() {
    let fx = fixture();
    with_credentials(&fx);
    fx.shell.on_terminal("DONE__", "__DOCKSIDE_DONE__ 0\r\n");
    fx.shell.on("stat -c %s", Reply::ok("44\n"));
    fx.shell.serve_download(DUMP);
    let (events, mut rx) = EventSink::channel();

    let ticket = dispatch(
        fx.handler.clone(),
        target(),
        Operation::DataExport("shop".to_string()),
        OperationContext::new(events),
    );
    let summary = ticket.wait().await.unwrap();

    let local = summary.local_path.clone().unwrap();
    assert!(local.starts_with(fx.dumps.path()));
    assert_eq!(std::fs::read(&local).unwrap(), DUMP);
    assert_eq!(summary.bytes_transferred, Some(DUMP.len() as u64));

    let writes = fx.shell.terminal_writes();
    assert!(writes.iter().any(|w| w.contains("export MYSQL_PWD='s3cret'")));
    assert!(writes.iter().any(|w| w.contains("mysqldump -u 'shop' 'shop' >")));
    assert!(writes.iter().any(|w| w.contains("unset MYSQL_PWD")));

    assert!(fx.shell.ran("docker cp a1b2c3d4e5f6:'/tmp/dockside-shop-"));
    assert!(fx.shell.ran("docker exec a1b2c3d4e5f6 rm -f '/tmp/dockside-shop-"));
    assert!(fx.shell.ran("rm -f '/tmp/dockside-a1b2c3d4e5f6-shop-"));

    let used = fx.store.database_credentials(&target()).unwrap().unwrap();
    assert!(used.last_used.is_some());

    let events = rx.drain();
    assert!(matches!(events.first(), Some(ConsoleEvent::OperationStarted { .. })));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, ConsoleEvent::Progress { .. }))
    );
}

#[tokio::test]
async fn rejected_credentials_fail_but_still_clean_up() {
    let fx = fixture();
    with_credentials(&fx);
    fx.shell.on_terminal(
        "mysqldump",
        "mysqldump: Got error: 1045: Access denied for user 'shop'@'localhost' (using password: YES)\r\n",
    );
    fx.shell.on_terminal("DONE__", "__DOCKSIDE_DONE__ 2\r\n");

    let err = dispatch(
        fx.handler.clone(),
        target(),
        Operation::DataExport("shop".to_string()),
        OperationContext::new(EventSink::discard()),
    )
    .wait()
    .await
    .unwrap_err();

    match &err {
        OperationError::Export { source, .. } => {
            assert!(matches!(source, ExportError::AccessDenied { .. }), "{source:?}");
        }
        other => panic!("expected export failure, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Remote);
    assert!(!fx.shell.ran("docker cp"));
    assert!(fx.shell.ran("rm -f '/tmp/dockside-a1b2c3d4e5f6-shop-"));
    assert_eq!(std::fs::read_dir(fx.dumps.path()).unwrap().count(), 0);

    let creds = fx.store.database_credentials(&target()).unwrap().unwrap();
    assert!(creds.last_used.is_none());
}

#[tokio::test]
async fn empty_dump_is_rejected_before_download() {
    let fx = fixture();
    with_credentials(&fx);
    fx.shell.on_terminal("DONE__", "__DOCKSIDE_DONE__ 0\r\n");
    fx.shell.on("stat -c %s", Reply::ok("0\n"));

    let err = dispatch(
        fx.handler.clone(),
        target(),
        Operation::DataExport("shop".to_string()),
        OperationContext::new(EventSink::discard()),
    )
    .wait()
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        OperationError::Export {
            source: ExportError::EmptyDump,
            ..
        }
    ));
    assert!(!fx.shell.ran("<download"));
}

#[tokio::test]
async fn export_without_credentials_is_a_configuration_error() {
    let fx = fixture();

    let err = dispatch(
        fx.handler.clone(),
        target(),
        Operation::DataExport("shop".to_string()),
        OperationContext::new(EventSink::discard()),
    )
    .wait()
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(err.to_string().contains("no database credentials"));
    assert!(!fx.shell.ran("<interactive>"));
}

#[tokio::test]
async fn inspect_returns_the_runtime_output() {
    let fx = fixture();
    fx.shell
        .on("docker inspect a1b2c3d4e5f6", Reply::ok("[{\"Id\": \"a1b2c3d4e5f6\"}]\n"));

    let summary = dispatch(
        fx.handler.clone(),
        target(),
        Operation::Inspect,
        OperationContext::new(EventSink::discard()),
    )
    .wait()
    .await
    .unwrap();

    assert!(summary.output.unwrap().contains("\"Id\""));
}

#[tokio::test]
async fn cancelling_a_ticket_stops_a_log_follow() {
    let fx = fixture();
    fx.shell
        .on("logs --tail", Reply::stream(&["GET / 200"], &[], None));

    let ticket = dispatch(
        fx.handler.clone(),
        target(),
        Operation::LogFollow,
        OperationContext::new(EventSink::discard()),
    );
    let cancel = ticket.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
    });

    let err = tokio::time::timeout(Duration::from_secs(5), ticket.wait())
        .await
        .expect("log follow did not stop after cancellation")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}
