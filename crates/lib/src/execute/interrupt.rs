//! Terminal interrupt handling.
//!
//! Cancelling the scheduler's token stops new work from being dispatched, but
//! scripts already running in child processes only stop when they receive the
//! signal themselves. [`broadcast`] forwards it to the whole process group.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Send SIGINT to every process in the current process group.
#[cfg(unix)]
pub fn broadcast() {
  use rustix::process::{Signal, kill_current_process_group};

  match kill_current_process_group(Signal::INT) {
    Ok(()) => debug!("forwarded interrupt to process group"),
    Err(e) => warn!(error = %e, "failed to signal process group"),
  }
}

/// Process groups are a unix concept; child processes are left to the
/// console's own Ctrl-C delivery.
#[cfg(not(unix))]
pub fn broadcast() {
  debug!("process group signalling is not supported on this platform");
}

/// Wait for a terminal interrupt, forward it to child processes, then cancel
/// `token`.
///
/// Returns early without signalling anything if the token is cancelled by
/// someone else first.
pub async fn watch(token: CancellationToken) {
  tokio::select! {
    _ = token.cancelled() => {}
    res = tokio::signal::ctrl_c() => {
      if let Err(e) = res {
        warn!(error = %e, "cannot listen for interrupts");
        return;
      }
      warn!("interrupted, stopping running actions");
      broadcast();
      token.cancel();
    }
  }
}
