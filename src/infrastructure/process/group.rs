//! Signals addressed to a whole process group.
//!
//! Every attempt is spawned as the leader of its own group, so a signal sent
//! to the group reaches the worker and everything it started.

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitid, Id, WaitPidFlag};
use nix::unistd::Pid;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};

/// Send `signal` to every member of group `pgid`. A group that no longer
/// exists is not an error.
pub fn signal_group(pgid: u32, signal: Signal) -> DomainResult<()> {
    match killpg(to_pid(pgid)?, signal) {
        Ok(()) => {
            debug!(pgid, %signal, "signalled process group");
            Ok(())
        }
        Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(DomainError::Io(format!(
            "failed to send {signal} to process group {pgid}: {errno}"
        ))),
    }
}

pub fn kill_group(pgid: u32) -> DomainResult<()> {
    signal_group(pgid, Signal::SIGKILL)
}

/// Resolve once child `pid` has exited, without reaping it. Until the leader
/// is reaped its id cannot be reused, so the group can still be signalled
/// safely. A child that was already reaped counts as exited.
pub async fn wait_exited(pid: u32) -> DomainResult<()> {
    let pid = to_pid(pid)?;
    tokio::task::spawn_blocking(move || loop {
        match waitid(Id::Pid(pid), WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT) {
            Ok(_) | Err(Errno::ECHILD) => return Ok(()),
            Err(Errno::EINTR) => {}
            Err(errno) => {
                return Err(DomainError::Io(format!("failed to wait for process {pid}: {errno}")))
            }
        }
    })
    .await
    .map_err(|e| DomainError::Io(format!("exit watcher stopped: {e}")))?
}

fn to_pid(id: u32) -> DomainResult<Pid> {
    i32::try_from(id)
        .map(Pid::from_raw)
        .map_err(|_| DomainError::Validation(format!("process id {id} out of range")))
}

/// Pids of group members that are still running (zombies excluded), read
/// from `/proc`. Empty where `/proc` is unavailable.
pub fn live_members(pgid: u32) -> Vec<u32> {
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
        .filter(|pid| {
            std::fs::read_to_string(format!("/proc/{pid}/stat"))
                .ok()
                .and_then(|stat| parse_stat(&stat))
                .is_some_and(|(state, pgrp)| pgrp == pgid && state != 'Z' && state != 'X')
        })
        .collect()
}

/// State and process group from a `/proc/<pid>/stat` line. The command name
/// is parenthesised and may itself contain spaces or parentheses.
fn parse_stat(stat: &str) -> Option<(char, u32)> {
    let rest = &stat[stat.rfind(')')? + 1..];
    let mut fields = rest.split_whitespace();
    let state = fields.next()?.chars().next()?;
    let _ppid = fields.next()?;
    let pgrp = fields.next()?.parse().ok()?;
    Some((state, pgrp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stat() {
        let stat = "4242 (sh (worker)) S 1 4242 4242 0 -1 4194560 0 0";
        assert_eq!(parse_stat(stat), Some(('S', 4242)));
        assert_eq!(parse_stat("garbage"), None);
    }

    #[tokio::test]
    async fn test_wait_exited_leaves_child_unreaped() {
        let mut child = tokio::process::Command::new("sh")
            .args(["-c", "exit 4"])
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();

        wait_exited(pid).await.unwrap();
        // still a zombie: its status has not been collected yet
        let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).unwrap();
        assert_eq!(parse_stat(&stat).map(|(state, _)| state), Some('Z'));

        assert_eq!(child.wait().await.unwrap().code(), Some(4));
    }

    #[test]
    fn test_missing_group_is_ok() {
        // Pid numbers this high are never allocated.
        assert!(signal_group(4_000_000, Signal::SIGTERM).is_ok());
        assert!(live_members(4_000_000).is_empty());
    }
}
