//! Session-scoped resources: the shared cancellation token, the
//! keep-awake child process, and the stdin cancel watcher. Everything
//! that used to be tempting to make a global lives here instead, with
//! explicit setup at session start and teardown on drop.

use std::io::BufRead;
use std::process::{Child, Command, Stdio};
use std::thread;

use log::{info, warn};
use tokio_util::sync::CancellationToken;

/// Holds a `caffeinate` child for the duration of a session so the
/// display does not sleep mid-harvest. Dropping the guard kills it.
pub struct KeepAwake {
    child: Option<Child>,
}

impl KeepAwake {
    pub fn start() -> Self {
        let child = Command::new("caffeinate")
            .args(["-d", "-i"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match child {
            Ok(child) => {
                info!("keep-awake active (caffeinate pid {})", child.id());
                Self { child: Some(child) }
            }
            Err(err) => {
                warn!("keep-awake unavailable: {err}");
                Self { child: None }
            }
        }
    }
}

impl Drop for KeepAwake {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Cancel the session on a single observed key press: the first line the
/// user enters on stdin (an Enter press suffices) flips the token.
pub fn spawn_cancel_watcher(token: CancellationToken) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_ok() {
            info!("key press observed; cancelling the session");
            token.cancel();
        }
    });
}
