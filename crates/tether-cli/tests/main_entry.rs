//! End-to-end tests for the `tether` binary.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

fn tether() -> Command {
    cargo_bin_cmd!("tether")
}

#[test]
fn missing_subcommand_fails_with_usage() {
    tether()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_succeeds() {
    tether()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tether"));
}

#[cfg(unix)]
mod hosted {
    use std::fs;

    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    use super::*;

    fn write_script(dir: &TempDir, name: &str, body: &str) -> Utf8PathBuf {
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .unwrap_or_else(|path| panic!("non UTF-8 temp dir {}", path.display()));
        let path = root.join(name);
        fs::write(&path, body).expect("write script");
        path
    }

    const ROUND_TRIP: &str = r#"read flags
echo '{"name":"checkVersion","value":[9,1]}'
read reply
echo '{"name":"createTemporaryDirectory"}'
read reply
dir=$(printf '%s' "$reply" | sed 's/.*"value":"\([^"]*\)".*/\1/')
echo "{\"name\":\"writeFile\",\"value\":{\"path\":[\"$dir\",\"note.txt\"],\"contents\":\"hi\"}}"
read reply
echo "{\"name\":\"writeStdout\",\"value\":\"$dir\"}"
read reply
echo '{"name":"exit","value":7}'
read reply
"#;

    #[test]
    fn hosted_program_round_trip_cleans_up() {
        let work = TempDir::new().expect("temp dir");
        let script = write_script(&work, "program", ROUND_TRIP);

        let output = tether()
            .current_dir(work.path())
            .args(["--interpreter", "/bin/sh", "run"])
            .arg(script.as_str())
            .output()
            .expect("run tether");

        assert_eq!(output.status.code(), Some(7));
        let stdout = String::from_utf8_lossy(&output.stdout);
        let temp_dir = stdout.trim();
        assert!(!temp_dir.is_empty(), "no directory echoed");
        assert!(
            !std::path::Path::new(temp_dir).exists(),
            "{temp_dir} survived the session"
        );
    }

    #[test]
    fn program_needing_newer_broker_is_refused() {
        let work = TempDir::new().expect("temp dir");
        let script = write_script(
            &work,
            "program",
            "read flags\necho '{\"name\":\"checkVersion\",\"value\":[9,99]}'\nread reply\n",
        );

        tether()
            .current_dir(work.path())
            .args(["--interpreter", "/bin/sh", "run"])
            .arg(script.as_str())
            .assert()
            .code(1)
            .stderr(predicate::str::contains("newer version of tether"));
    }

    #[test]
    fn program_exit_status_is_forwarded_at_end_of_input() {
        let work = TempDir::new().expect("temp dir");
        let script = write_script(&work, "program", "read flags\nexit 4\n");

        tether()
            .current_dir(work.path())
            .args(["--interpreter", "/bin/sh", "run"])
            .arg(script.as_str())
            .assert()
            .code(4)
            .stdout(predicate::str::is_empty());
    }
}
