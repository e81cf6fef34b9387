use std::fs::{self, File, OpenOptions};
use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

use camino::{Utf8Path, Utf8PathBuf};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use serde::Serialize;
use tracing::{info, warn};

use hearth_config::ApplicationPaths;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::files::atomic_write;

/// Owns the lock, PID, and health files under the run directory.
///
/// The lock is created exclusively, so two hosts can never share a
/// program-data root. Every artefact is removed when the guard drops.
#[derive(Debug)]
pub(crate) struct ProcessGuard {
    lock_path: Utf8PathBuf,
    pid_path: Utf8PathBuf,
    health_path: Utf8PathBuf,
    _lock: File,
    pid: Option<u32>,
}

impl ProcessGuard {
    pub(crate) fn acquire(paths: &ApplicationPaths) -> Result<Self, LaunchError> {
        let lock_path = paths.lock_path();
        let pid_path = paths.pid_path();
        let health_path = paths.health_path();
        let lock = acquire_lock(&lock_path, &pid_path, &health_path)?;
        Ok(Self {
            lock_path,
            pid_path,
            health_path,
            _lock: lock,
            pid: None,
        })
    }

    pub(crate) fn write_pid(&mut self, pid: u32) -> Result<(), LaunchError> {
        atomic_write(&self.pid_path, format!("{pid}\n").as_bytes()).map_err(|source| {
            LaunchError::PidWrite {
                path: self.pid_path.clone(),
                source,
            }
        })?;
        self.pid = Some(pid);
        info!(
            target: PROCESS_TARGET,
            pid,
            file = %self.pid_path,
            "pid file written"
        );
        Ok(())
    }

    pub(crate) fn write_health(&self, status: HealthState) -> Result<(), LaunchError> {
        let pid = self.pid.ok_or(LaunchError::MissingPid)?;
        let snapshot = HealthSnapshot::new(status, pid)?;
        let mut payload = serde_json::to_vec(&snapshot)?;
        payload.push(b'\n');
        atomic_write(&self.health_path, &payload).map_err(|source| LaunchError::HealthWrite {
            path: self.health_path.clone(),
            source,
        })?;
        info!(
            target: PROCESS_TARGET,
            status = snapshot.status,
            file = %self.health_path,
            "health snapshot updated"
        );
        Ok(())
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        for (path, kind) in [
            (&self.health_path, "health"),
            (&self.pid_path, "pid"),
            (&self.lock_path, "lock"),
        ] {
            if let Err(error) = fs::remove_file(path)
                && error.kind() != io::ErrorKind::NotFound
            {
                warn!(
                    target: PROCESS_TARGET,
                    file = %path,
                    kind,
                    error = %error,
                    "failed to remove runtime artefact"
                );
            }
        }
    }
}

/// Lifecycle phase recorded in the health snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HealthState {
    Starting,
    Ready,
    Stopping,
}

impl HealthState {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Stopping => "stopping",
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthSnapshot {
    status: &'static str,
    pid: u32,
    timestamp: u64,
}

impl HealthSnapshot {
    fn new(state: HealthState, pid: u32) -> Result<Self, LaunchError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|source| LaunchError::Clock { source })?
            .as_secs();
        Ok(Self {
            status: state.as_str(),
            pid,
            timestamp,
        })
    }
}

fn acquire_lock(
    lock_path: &Utf8Path,
    pid_path: &Utf8Path,
    health_path: &Utf8Path,
) -> Result<File, LaunchError> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    match options.open(lock_path) {
        Ok(file) => {
            info!(
                target: PROCESS_TARGET,
                file = %lock_path,
                "acquired host lock"
            );
            Ok(file)
        }
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
            clear_stale_lock(lock_path, pid_path, health_path)?;
            acquire_lock(lock_path, pid_path, health_path)
        }
        Err(source) => Err(LaunchError::LockCreate {
            path: lock_path.to_owned(),
            source,
        }),
    }
}

/// Removes the artefacts of a host that exited without dropping its guard.
///
/// A crashed host never reaches `Stopping`, so its last health snapshot is
/// discarded along with the lock and pid.
fn clear_stale_lock(
    lock_path: &Utf8Path,
    pid_path: &Utf8Path,
    health_path: &Utf8Path,
) -> Result<(), LaunchError> {
    if let Some(pid) = read_pid(pid_path)
        && process_alive(pid)?
    {
        info!(
            target: PROCESS_TARGET,
            pid,
            "refusing to start: existing host alive"
        );
        return Err(LaunchError::AlreadyRunning { pid });
    }
    warn!(
        target: PROCESS_TARGET,
        lock = %lock_path,
        "existing host not detected; cleaning stale files"
    );
    remove_file(health_path)?;
    remove_file(lock_path)?;
    remove_file(pid_path)
}

fn read_pid(path: &Utf8Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse::<u32>().ok()
}

fn remove_file(path: &Utf8Path) -> Result<(), LaunchError> {
    match fs::remove_file(path) {
        Err(error) if error.kind() != io::ErrorKind::NotFound => Err(LaunchError::Cleanup {
            path: path.to_owned(),
            source: error,
        }),
        _ => Ok(()),
    }
}

fn process_alive(pid: u32) -> Result<bool, LaunchError> {
    let Ok(raw) = i32::try_from(pid) else {
        return Ok(false);
    };
    if raw == 0 {
        return Ok(false);
    }
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(source) => Err(LaunchError::CheckProcess { pid, source }),
    }
}
