//! Common test utilities and fixtures
//!
//! Every CLI run gets its own scratch directory holding the configuration,
//! the plan store and the plan documents, so tests never touch the user's
//! real `~/.sciplan`.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// Isolated working area for one test
pub struct Sandbox {
    pub dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        let sandbox = Self {
            dir: TempDir::new().unwrap(),
        };
        sandbox.write_config("");
        sandbox
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("sciplan.toml")
    }

    pub fn plans_dir(&self) -> PathBuf {
        self.path().join("plans")
    }

    /// Write the config file: store settings pointing into the sandbox plus `extra`
    pub fn write_config(&self, extra: &str) {
        let content = format!(
            "[plan]\nstore = \"file\"\nstore_dir = \"{}\"\npoll_interval_minutes = 0.001\n\n[storage]\nmount_root = \"{}\"\n\n{}",
            self.plans_dir().display(),
            self.path().join("mounts").display(),
            extra
        );
        fs::write(self.config_path(), content).unwrap();
    }

    /// Write a plan document of mock tasks and return its path
    pub fn write_mock_plan(&self, file: &str, names: &[&str]) -> PathBuf {
        let path = self.path().join(file);
        fs::write(&path, mock_plan_json(names)).unwrap();
        path
    }

    /// `sciplan` configured for this sandbox
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("sciplan").unwrap();
        cmd.current_dir(self.path())
            .env("HOME", self.path())
            .env_remove("SCIPLAN_ACCESS_TOKEN")
            .env_remove("SCIPLAN_PLAN_DIR")
            .env_remove("SCIPLAN_PLAN_STORE")
            .env_remove("SCIPLAN_LOG_FILE")
            .arg("--config")
            .arg(self.config_path());
        cmd
    }
}

/// Plan document with one mock task per name
pub fn mock_plan_json(names: &[&str]) -> String {
    let tasks: Vec<serde_json::Value> = names
        .iter()
        .map(|name| {
            serde_json::json!({
                "name": name,
                "app_id": "Echo",
                "inputs": {"message": format!("hello from {}", name)},
                "runtime": {"id": "mock", "args": {}},
                "ref": null,
                "agent_ref": null,
                "workdir": null,
                "sr_host": null
            })
        })
        .collect();
    serde_json::to_string_pretty(&serde_json::json!({"id": null, "tasks": tasks})).unwrap()
}

/// Parse a plan document written by the binary
pub fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}
