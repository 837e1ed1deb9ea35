//! CLI-level smoke tests for the `marcus` binary: `assert_cmd`-based binary
//! tests that drive the process from the outside instead of calling into
//! its internals.

use assert_cmd::Command;
use std::io::Write;

/// An invalid config file (bad log level) should fail fast with exit code
/// 64 (EX_USAGE) before ever touching stdin.
#[test]
fn invalid_config_exits_with_usage_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{"provider":"in_memory","provider_config":{{}},"ai":{{"enabled":false,"timeout_ms":5000,"api_key_env":"X"}},"assignment":{{"stale_ttl_seconds":300,"stale_check_seconds":60,"assignment_retry_limit":3}},"tool_dispatcher":{{"deadline_ms":30000}},"logging":{{"directory":null,"level":"not-a-level","format":"pretty"}},"require_provider_on_start":false}}"#
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("marcus").unwrap();
    cmd.arg("--config").arg(file.path());
    cmd.assert().failure().code(64);
}

/// `--help` exits cleanly without needing any configuration at all.
#[test]
fn help_flag_exits_successfully() {
    let mut cmd = Command::cargo_bin("marcus").unwrap();
    cmd.arg("--help");
    cmd.assert().success();
}
