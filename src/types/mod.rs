// ABOUTME: Domain types shared across the console engine.
// ABOUTME: Identifiers, targets, and the fixed operation catalogue.

mod operation;
mod target;
mod target_id;

pub use operation::{LifecycleAction, Operation, OperationParseError};
pub use target::{LifecycleState, PortBinding, Target};
pub use target_id::{Environment, IdentifierError, TargetId};
