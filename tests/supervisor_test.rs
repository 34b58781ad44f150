//! Process-level tests of the attempt supervisor.

mod common;

use std::time::{Duration, Instant};

use common::sh_attempt;
use nix::sys::signal::Signal;
use proofloop::domain::models::{AttemptStatus, COMPLETION_MARKER};
use proofloop::infrastructure::process::{live_members, ShutdownToken};
use proofloop::services::AttemptSupervisor;

fn supervisor() -> AttemptSupervisor {
    AttemptSupervisor::new().with_drain_timeout(Duration::from_millis(500))
}

#[tokio::test]
async fn test_timeout_kills_whole_group() {
    let dir = common::temp_dir();
    let pid_file = dir.path().join("pid");
    let script = format!("echo $$ > {}; sleep 30 & sleep 30", pid_file.display());
    let spec = sh_attempt(1, &script, dir.path()).with_timeout(Some(Duration::from_secs(1)));

    let started = Instant::now();
    let result = supervisor().run(&spec, &ShutdownToken::new()).await;

    assert_eq!(result.status, AttemptStatus::TimedOut);
    assert!(!result.success);
    assert!(started.elapsed() < Duration::from_secs(10));

    let pgid: u32 = std::fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
    // reaping of the background sleep by init can lag a little
    let deadline = Instant::now() + Duration::from_secs(2);
    while !live_members(pgid).is_empty() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(live_members(pgid).is_empty());
}

#[tokio::test]
async fn test_clean_exit_kills_detached_group_members() {
    let dir = common::temp_dir();
    let pid_file = dir.path().join("pid");
    // the background sleep holds no pipe, so draining alone would not stop it
    let script = format!(
        "echo $$ > {}; sleep 30 </dev/null >/dev/null 2>&1 & exit 2",
        pid_file.display()
    );
    let result = supervisor()
        .run(&sh_attempt(5, &script, dir.path()), &ShutdownToken::new())
        .await;

    assert_eq!(result.status, AttemptStatus::Exhausted);
    assert_eq!(result.exit_code, Some(2));

    let pgid: u32 = std::fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
    let deadline = Instant::now() + Duration::from_secs(2);
    while !live_members(pgid).is_empty() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(live_members(pgid).is_empty());
}

#[tokio::test]
async fn test_marker_wins_over_exit_code() {
    let dir = common::temp_dir();
    let script = format!("echo '{COMPLETION_MARKER} 2.'; exit 7");
    let result = supervisor()
        .run(&sh_attempt(2, &script, dir.path()), &ShutdownToken::new())
        .await;

    assert_eq!(result.status, AttemptStatus::Succeeded);
    assert!(result.success);
    assert_eq!(result.exit_code, Some(7));
    assert!(result.stdout.contains(COMPLETION_MARKER));
}

#[tokio::test]
async fn test_shutdown_is_forwarded_within_grace() {
    let dir = common::temp_dir();
    let spec = sh_attempt(3, "trap 'echo stopping; exit 0' TERM; sleep 30 & wait", dir.path())
        .with_grace_period(Duration::from_secs(3));
    let token = ShutdownToken::new();

    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.trigger(Signal::SIGTERM);
    });

    let started = Instant::now();
    let result = supervisor().run(&spec, &token).await;

    assert_eq!(result.status, AttemptStatus::Cancelled);
    assert!(result.stdout.contains("stopping"));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_ignored_shutdown_escalates_to_kill() {
    let dir = common::temp_dir();
    let spec = sh_attempt(4, "trap '' INT TERM; sleep 30", dir.path())
        .with_grace_period(Duration::from_millis(300));
    let token = ShutdownToken::new();

    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.trigger(Signal::SIGINT);
    });

    let started = Instant::now();
    let result = supervisor().run(&spec, &token).await;

    assert_eq!(result.status, AttemptStatus::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(5));
}
