// ABOUTME: Integration tests for identifiers, operations and lifecycle eligibility.
// ABOUTME: Covers the command-line operation syntax and which states enable which operations.

use dockside::types::*;

mod identifiers {
    use super::*;

    #[test]
    fn target_ids_accept_runtime_names_and_hashes() {
        assert!(TargetId::new("a1b2c3d4e5f6").is_ok());
        assert!(TargetId::new("shop_web.1").is_ok());
    }

    #[test]
    fn target_ids_reject_shell_metacharacters() {
        assert!(TargetId::new("").is_err());
        assert!(TargetId::new("web; rm -rf /").is_err());
        assert!(TargetId::new("-rm").is_err());
    }

    #[test]
    fn environments_are_compared_by_name() {
        let a = Environment::new("prod").unwrap();
        let b = Environment::new("prod").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "prod");
    }
}

mod operations {
    use super::*;

    #[test]
    fn every_kind_round_trips_through_display() {
        for text in [
            "start",
            "stop",
            "restart",
            "inspect",
            "logs",
            "build:dev",
            "deploy:prod",
            "build-and-deploy:staging",
            "export:shop_db",
        ] {
            let op: Operation = text.parse().unwrap();
            assert_eq!(op.to_string(), text);
        }
    }

    #[test]
    fn argument_rules_are_enforced() {
        assert_eq!(
            "deploy".parse::<Operation>(),
            Err(OperationParseError::MissingArgument("deploy".to_string()))
        );
        assert_eq!(
            "restart:now".parse::<Operation>(),
            Err(OperationParseError::UnexpectedArgument("restart".to_string()))
        );
        assert!(matches!(
            "export:shop;drop".parse::<Operation>(),
            Err(OperationParseError::InvalidDatabase(_))
        ));
        assert!(matches!(
            "reboot".parse::<Operation>(),
            Err(OperationParseError::Unknown(_))
        ));
    }

    #[test]
    fn pipeline_operations_expose_their_environment() {
        let op: Operation = "build-and-deploy:prod".parse().unwrap();
        assert!(op.is_pipeline());
        assert!(op.includes_build());
        assert!(op.includes_deploy());
        assert_eq!(op.environment().map(Environment::as_str), Some("prod"));
        assert!(Operation::Inspect.environment().is_none());
    }
}

mod eligibility {
    use super::*;

    fn enabled(op: &str, state: LifecycleState) -> bool {
        op.parse::<Operation>().unwrap().is_enabled_for(&state)
    }

    #[test]
    fn running_targets() {
        let running = LifecycleState::Running;
        assert!(!enabled("start", running));
        assert!(enabled("stop", running));
        assert!(enabled("restart", running));
        assert!(enabled("build:dev", running));
        assert!(enabled("deploy:dev", running));
        assert!(enabled("export:shop", running));
    }

    #[test]
    fn exited_targets() {
        let exited = LifecycleState::Exited(Some(137));
        assert!(enabled("start", exited));
        assert!(!enabled("stop", exited));
        assert!(!enabled("build:dev", exited));
        assert!(enabled("deploy:dev", exited));
        assert!(!enabled("export:shop", exited));
    }

    #[test]
    fn inspect_and_logs_are_always_available() {
        for state in [
            LifecycleState::Running,
            LifecycleState::Paused,
            LifecycleState::Exited(None),
            LifecycleState::Dead,
        ] {
            assert!(enabled("inspect", state));
            assert!(enabled("logs", state));
        }
    }

    #[test]
    fn transitional_states_block_changes() {
        let restarting = LifecycleState::Restarting;
        assert!(!enabled("start", restarting));
        assert!(!enabled("stop", restarting));
        assert!(!enabled("deploy:dev", restarting));
    }
}
