//! Integration tests against the real host.
//!
//! Nothing here needs root. Anything that would change the credentials of
//! the test process itself only runs when that is a no-op; real drops
//! happen in a child running the `redis-init` binary.

use redis_init::kernel::credentials::{transition_to_unprivileged, DropPolicy};
use redis_init::kernel::host::{Host, LinuxHost};
use redis_init::kernel::sysctl::apply_tunable;
use redis_init::{launch, ArgvZero, LaunchConfig, LaunchError, TargetIdentity, TunableSetting};
use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

const BIN: &str = env!("CARGO_BIN_EXE_redis-init");

/// Identity the child can always drop to: ourselves, or `nobody` when the
/// tests run as root.
fn reachable_identity() -> TargetIdentity {
    let ids = LinuxHost.current_ids();
    if ids.euid == 0 {
        TargetIdentity {
            uid: 65534,
            gid: 65534,
        }
    } else {
        TargetIdentity {
            uid: ids.uid,
            gid: ids.gid,
        }
    }
}

fn launcher_command(server: &str, overcommit: &Path) -> Command {
    let identity = reachable_identity();
    let mut cmd = Command::new(BIN);
    cmd.env_clear()
        .env("REDIS_INIT_UID", identity.uid.to_string())
        .env("REDIS_INIT_GID", identity.gid.to_string())
        .env("REDIS_INIT_SERVER", server)
        .env("REDIS_INIT_OVERCOMMIT_PATH", overcommit)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

#[test]
fn test_credential_transition_validates_before_syscall() {
    let result = transition_to_unprivileged(
        &mut LinuxHost,
        TargetIdentity { uid: 0, gid: 1000 },
        DropPolicy::default(),
    );
    assert!(result.is_err(), "Should reject root UID");

    let result = transition_to_unprivileged(
        &mut LinuxHost,
        TargetIdentity { uid: 1000, gid: 0 },
        DropPolicy::default(),
    );
    assert!(result.is_err(), "Should reject root GID");
}

#[test]
fn test_non_root_drop_to_foreign_account_fails_cleanly() {
    let before = LinuxHost.current_ids();
    if before.euid == 0 || before.uid == 999 {
        // Would really drop (or no-op); covered by the child-process tests.
        return;
    }

    let result = transition_to_unprivileged(
        &mut LinuxHost,
        TargetIdentity { uid: 999, gid: 999 },
        DropPolicy::default(),
    );

    assert!(matches!(result, Err(LaunchError::Privilege(_))));
    assert_eq!(LinuxHost.current_ids(), before);
}

#[test]
fn test_tunable_written_to_real_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("overcommit_memory");
    fs::write(&path, "0").unwrap();

    let setting = TunableSetting {
        path: path.clone(),
        value: "1".to_string(),
    };
    assert!(apply_tunable(&mut LinuxHost, Some(&setting)).is_applied());
    assert_eq!(fs::read_to_string(&path).unwrap(), "1");
}

#[test]
fn test_in_process_launch_with_missing_server_returns_error() {
    let ids = LinuxHost.current_ids();
    if ids.euid == 0 {
        // The drop would apply to the test process itself.
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let overcommit = dir.path().join("overcommit_memory");
    fs::write(&overcommit, "0").unwrap();

    let config = LaunchConfig {
        tunable: Some(TunableSetting {
            path: overcommit.clone(),
            value: "1".to_string(),
        }),
        identity: TargetIdentity {
            uid: ids.uid,
            gid: ids.gid,
        },
        server: dir.path().join("redis-server"),
        argv0: ArgvZero::Rename("redis-server".to_string()),
        ..LaunchConfig::default()
    };

    let err = launch(config, LinuxHost, &[OsString::from("redis-init")]);

    assert!(matches!(&err, LaunchError::Process(msg) if msg.contains("ENOENT")));
    assert_eq!(fs::read_to_string(&overcommit).unwrap(), "1");
}

#[test]
fn test_binary_replaces_itself_with_server() {
    if !Path::new("/bin/sh").exists() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let overcommit = dir.path().join("overcommit_memory");
    fs::write(&overcommit, "0").unwrap();

    let child = launcher_command("/bin/sh", &overcommit)
        .env("REDIS_INIT_PROCESS_NAME", "sh")
        .args(["-c", "echo $$"])
        .spawn()
        .unwrap();
    let pid = child.id();
    let output = child.wait_with_output().unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    // Same pid: the server replaced the launcher instead of running as a child.
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), pid.to_string());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("=> [redis-init]"));
    let identity = reachable_identity();
    assert!(
        stderr.contains(&format!("Running as uid={} euid={}", identity.uid, identity.uid)),
        "stderr: {}",
        stderr
    );
    assert_eq!(fs::read_to_string(&overcommit).unwrap(), "1");
}

#[test]
fn test_server_runs_without_root_groups() {
    if LinuxHost.current_ids().euid != 0 || !Path::new("/bin/sh").exists() {
        // Only root has a real drop to check.
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let overcommit = dir.path().join("overcommit_memory");
    fs::write(&overcommit, "0").unwrap();

    let output = launcher_command("/bin/sh", &overcommit)
        .args(["-c", "id -u; id -G"])
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().map(str::trim).collect();
    assert_eq!(lines, ["65534", "65534"]);
}

#[test]
fn test_unwritable_control_file_does_not_block_exec() {
    if !Path::new("/bin/sh").exists() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("no-such-dir").join("overcommit_memory");

    let output = launcher_command("/bin/sh", &missing)
        .args(["-c", "echo started"])
        .output()
        .unwrap();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stderr: {}", stderr);
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "started");
    assert!(stderr.contains("WARNING: Cannot open"));
}

#[test]
fn test_missing_server_exits_with_status_1() {
    let dir = tempfile::tempdir().unwrap();
    let overcommit = dir.path().join("overcommit_memory");
    let server = dir.path().join("redis-server");

    let output = launcher_command(&server.to_string_lossy(), &overcommit)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("FATAL: "), "stderr: {}", stderr);
    assert!(stderr.contains("Failed to exec"), "stderr: {}", stderr);
}

#[test]
fn test_root_target_exits_with_status_1() {
    let dir = tempfile::tempdir().unwrap();
    let overcommit = dir.path().join("overcommit_memory");

    let output = launcher_command("/bin/sh", &overcommit)
        .env("REDIS_INIT_UID", "0")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("target uid cannot be 0"));
}

#[test]
fn test_invalid_environment_exits_with_status_1() {
    let dir = tempfile::tempdir().unwrap();
    let overcommit = dir.path().join("overcommit_memory");

    let output = launcher_command("/bin/sh", &overcommit)
        .env("REDIS_INIT_UID", "not-a-number")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid REDIS_INIT_* environment"), "stderr: {}", stderr);
    assert!(stderr.contains("REDIS_INIT_UID"), "stderr: {}", stderr);
    assert!(!stderr.contains("--uid"), "stderr: {}", stderr);
    assert!(!stderr.contains("--help"), "stderr: {}", stderr);
}
