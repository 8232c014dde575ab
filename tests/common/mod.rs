//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Output};

/// Runs `rtmpkit-plugins` with `home` as the home directory and `plugin_dir`
/// as the system plugin directory, isolated from the caller's environment.
pub fn run_tool(home: &Path, plugin_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rtmpkit-plugins"))
        .arg("--plugin-dir")
        .arg(plugin_dir)
        .args(args)
        .env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("RTMPKIT_PLUGINDIR")
        .env_remove("RTMPKIT_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run rtmpkit-plugins")
}

/// Stdout of a successful run.
pub fn stdout_of(output: &Output) -> String {
    assert!(
        output.status.success(),
        "rtmpkit-plugins failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Writes a configuration file into `dir` and returns its path.
pub fn write_config(dir: &Path, yaml: &str) -> std::path::PathBuf {
    let path = dir.join("rtmpkit.yaml");
    std::fs::write(&path, yaml).expect("Failed to write config file");
    path
}
