use std::process::Command;

use anyhow::Result;

/// Powers off the host machine.
///
/// The platform shutdown command is spawned fire-and-forget: by the time
/// the OS acts on it, this process may already be gone.
pub fn power_off() -> Result<()> {
    let mut command = power_off_command()?;
    command.spawn()?;
    Ok(())
}

#[cfg(unix)]
fn power_off_command() -> Result<Command> {
    let mut command = Command::new("shutdown");
    command.args(["-h", "now"]);
    Ok(command)
}

#[cfg(windows)]
fn power_off_command() -> Result<Command> {
    let mut command = Command::new("shutdown");
    command.args(["/s", "/t", "0"]);
    Ok(command)
}

#[cfg(not(any(unix, windows)))]
fn power_off_command() -> Result<Command> {
    Err(anyhow!("powering off the host is not supported on this platform"))
}
