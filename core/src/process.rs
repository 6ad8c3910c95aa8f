//! Helpers for the short-lived helper processes the monitor shells out to.

use std::io;
use std::process::Command;
use std::thread;

use log::{debug, warn};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// A [`Command`] that never flashes a console window on Windows.
///
/// The tray runs as a GUI-subsystem process, so every console child would
/// otherwise get a window of its own.
pub fn quiet_command(program: &str) -> Command {
    #[allow(unused_mut)]
    let mut cmd = Command::new(program);
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    cmd
}

/// Spawn `cmd` without waiting for it, and reap the child once it exits.
///
/// The exit status is only logged. Returns the spawn error, if any.
pub fn spawn_reaped(mut cmd: Command) -> io::Result<()> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    let mut child = cmd.spawn()?;
    thread::Builder::new()
        .name(format!("reap-{program}"))
        .spawn(move || match child.wait() {
            Ok(status) if status.success() => {}
            Ok(status) => debug!("{program} exited with {status}"),
            Err(e) => warn!("Failed to wait for {program}: {e}"),
        })?;
    Ok(())
}
