//! End-to-end tests for the spherre binary.
//!
//! Each test runs the compiled binary in a throwaway directory with a cleared
//! environment, so only the flags given here shape the run.
//! Run with: cargo test -p spherre --test cli_test

use std::{
    path::{Path, PathBuf},
    process::{Command, Output},
};

use tempdir::TempDir;

const ACCOUNT: &str = "0x64b48806902a367c8598f4f95c305e8c1a1acba5f082d294a43793113115691";

/// Test setup context containing common test infrastructure.
struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new("spherre-cli").expect("Failed to create temp dir");
        std::fs::create_dir_all(temp_dir.path().join("artifacts"))
            .expect("Failed to create artifacts dir");
        Self { temp_dir }
    }

    fn artifacts_dir(&self) -> PathBuf {
        self.temp_dir.path().join("artifacts")
    }

    fn deployments_dir(&self) -> PathBuf {
        self.temp_dir.path().join("deployments")
    }

    fn registry_path(&self) -> PathBuf {
        self.deployments_dir().join("devnet_latest.json")
    }

    /// Write a Scarb-style compiled class for `name`.
    fn write_class(&self, name: &str) {
        let path = self
            .artifacts_dir()
            .join(format!("spherre_{name}.contract_class.json"));
        let class = format!(r#"{{"sierra_program": ["{name}"], "abi": []}}"#);
        std::fs::write(&path, class).expect("Failed to write compiled class");
    }

    fn run(&self, extra: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_spherre"))
            .env_clear()
            .current_dir(self.temp_dir.path())
            .args(["--network", "devnet", "--account-address", ACCOUNT])
            .arg("--deployments-dir")
            .arg(self.deployments_dir())
            .arg("--artifacts-dir")
            .arg(self.artifacts_dir())
            .args(extra)
            .output()
            .expect("Failed to spawn spherre")
    }
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn registry_json(path: &Path) -> serde_json::Value {
    let content = std::fs::read_to_string(path).expect("Failed to read registry");
    serde_json::from_str(&content).expect("Registry should be valid JSON")
}

#[test]
fn test_missing_artifacts_exit_non_zero() {
    let t = TestContext::new();

    let output = t.run(&[]);

    assert!(!output.status.success(), "Aborted run must exit non-zero");
    assert!(
        stderr(&output).contains("unknown contract 'Spherre'"),
        "Error chain should name the missing contract, got: {}",
        stderr(&output)
    );
    assert!(!t.registry_path().exists(), "No registry may be exported");
}

#[test]
fn test_successful_run_exits_zero() {
    let t = TestContext::new();
    t.write_class("Spherre");
    t.write_class("SpherreAccount");

    let output = t.run(&[]);

    assert!(
        output.status.success(),
        "Run should succeed, stderr: {}",
        stderr(&output)
    );

    let registry = registry_json(&t.registry_path());
    for contract in ["Spherre", "SpherreAccount"] {
        assert_eq!(registry[contract]["contract"], contract);
        assert!(registry[contract]["address"].is_string());
        assert!(registry[contract]["classHash"].is_string());
    }

    let summary = stdout(&output);
    assert!(summary.contains("SpherreAccount"), "Summary table should list contracts");
}

#[test]
fn test_chain_state_is_saved_after_run() {
    let t = TestContext::new();
    t.write_class("Spherre");
    t.write_class("SpherreAccount");
    let chain_state = t.temp_dir.path().join("chain.json");

    let output = t.run(&["--chain-state", chain_state.to_str().expect("utf-8 path")]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(chain_state.exists(), "Chain state should be persisted");

    // A second run resumes from the saved chain and redeploys.
    let rerun = t.run(&["--chain-state", chain_state.to_str().expect("utf-8 path")]);
    assert!(rerun.status.success(), "stderr: {}", stderr(&rerun));
}

#[test]
fn test_print_config_touches_nothing() {
    let t = TestContext::new();

    let output = t.run(&["--print-config", "--mode", "immediate"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let printed = stdout(&output);
    assert!(printed.contains(r#"network = "devnet""#));
    assert!(printed.contains(r#"mode = "immediate""#));
    assert!(!t.deployments_dir().exists());
}

#[test]
fn test_abort_error_survives_failed_chain_state_save() {
    let t = TestContext::new();
    let blocker = t.temp_dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").expect("Failed to write blocker file");
    let chain_state = blocker.join("chain.json");

    let output = t.run(&["--chain-state", chain_state.to_str().expect("utf-8 path")]);

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(
        err.contains("unknown contract 'Spherre'"),
        "The run's own error should be reported, got: {err}"
    );
    assert!(!err.contains("Failed to create"), "Save failure must not mask it");
}
