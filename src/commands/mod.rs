// ABOUTME: Command module aggregator for the dockside CLI.
// ABOUTME: Re-exports command handlers and the event pump they share.

mod batch;
mod console;
mod init;
mod profiles;
mod run;
mod targets;

pub use batch::batch;
pub use init::init;
pub use profiles::profiles;
pub use run::run;
pub use targets::targets;

use dockside::events::EventReceiver;
use dockside::output::Output;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Print events while `work` runs; Ctrl-C cancels `cancel` instead of killing the process.
async fn with_events<F: Future>(
    events: &mut EventReceiver,
    output: &Output,
    cancel: &CancellationToken,
    work: F,
) -> F::Output {
    tokio::pin!(work);
    let mut interrupted = false;
    let result = loop {
        tokio::select! {
            result = &mut work => break result,
            Some(event) = events.recv() => output.event(&event),
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                if signal.is_ok() {
                    output.progress("  → Cancelling...");
                    cancel.cancel();
                }
            }
        }
    };
    for event in events.drain() {
        output.event(&event);
    }
    result
}
