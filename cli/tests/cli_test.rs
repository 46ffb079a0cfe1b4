use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::{TempDir, tempdir};

fn script(dir: &TempDir, name: &str, src: &str) -> Result<PathBuf, Box<dyn Error>> {
    let path = dir.path().join(name);
    fs::write(&path, src)?;
    Ok(path)
}

fn kit() -> Result<Command, Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("kit")?;
    cmd.env_remove("KIT_LOG").env_remove("RUST_LOG");
    Ok(cmd)
}

#[test]
fn run_prints_result() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = script(&dir, "calc.kit", "let a = 10; let b = 20; if (a + b > 25) { (a * b) / (b - a) } else { -1 }")?;

    kit()?
        .args(["run", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout("20\n");
    Ok(())
}

#[test]
fn bare_file_runs_and_reports_energy() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = script(&dir, "sum.kit", "1 + 2")?;

    kit()?
        .args(["--energy", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout("3\n")
        .stderr(predicate::str::contains("energy: 4"));
    Ok(())
}

#[test]
fn script_log_goes_to_stderr() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = script(&dir, "log.kit", "log('hello from', 'script'); math.max(2, 5)")?;

    kit()?
        .arg(path.to_str().unwrap())
        .assert()
        .success()
        .stdout("5\n")
        .stderr(predicate::str::contains("hello from script"));
    Ok(())
}

#[test]
fn parse_errors_fail_with_location() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = script(&dir, "broken.kit", "let = ;")?;

    kit()?
        .args(["check", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("broken.kit: "));
    Ok(())
}

#[test]
fn check_reports_summary() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = script(&dir, "ok.kit", "let f = x => x * 2; f(4)")?;

    kit()?
        .args(["check", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("ok: ").and(predicate::str::contains("1 functions")));
    Ok(())
}

#[test]
fn disasm_lists_instructions() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = script(&dir, "d.kit", "1 + 2")?;

    kit()?
        .args(["disasm", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout("0000 PUSH     0 ; 1\n0003 PUSH     1 ; 2\n0006 ADD\n0007 HALT\n");
    Ok(())
}

#[test]
fn runtime_faults_exit_with_error() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = script(&dir, "deep.kit", "let f = n => f(n + 1); f(0)")?;

    kit()?
        .args(["run", path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("call depth exceeded (64 frames)"));
    Ok(())
}

#[test]
fn config_file_sets_frame_limit() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = script(&dir, "down.kit", "let down = n => { if (n == 0) { return 'done' } return down(n - 1) }; down(10)")?;
    let config = script(&dir, "kit.toml", "max_frames = 4\n")?;

    kit()?
        .args(["run", path.to_str().unwrap(), "--config", config.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("call depth exceeded (4 frames)"));

    kit()?
        .args(["run", path.to_str().unwrap(), "--timeout-ms", "5000"])
        .assert()
        .success()
        .stdout("done\n");
    Ok(())
}

#[test]
fn bad_config_is_reported() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = script(&dir, "one.kit", "1")?;
    let config = script(&dir, "kit.toml", "frames = 4\n")?;

    kit()?
        .args(["run", path.to_str().unwrap(), "--config", config.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid engine config"));
    Ok(())
}

#[test]
fn missing_file_is_an_error() -> Result<(), Box<dyn Error>> {
    kit()?
        .args(["run", "does-not-exist.kit"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read file"));
    Ok(())
}
