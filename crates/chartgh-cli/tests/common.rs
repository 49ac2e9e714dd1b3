#![allow(dead_code)]

use std::panic;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use httptest::Server;
use sha2::{Digest, Sha256};

pub const CATALOG_URL: &str = "github://github.com/acme/app/index.yaml";
pub const ARTIFACT_LOCATOR: &str =
    "github.com/acme/app/releases/download/app-1.0.0/app-1.0.0.tgz";
pub const CHART: &[u8] = b"\x1f\x8b\x08\x00chart-archive";

pub fn server() -> Option<Server> {
    match panic::catch_unwind(Server::run) {
        Ok(server) => Some(server),
        Err(_) => {
            eprintln!("skipping helm-github test (httptest server unavailable)");
            None
        }
    }
}

/// The plugin as Helm runs it: three empty TLS arguments, then the URL.
pub fn helm_github(cache: &Path, api_url: &str, url: &str) -> Command {
    let mut cmd = cargo_bin_cmd!("helm-github");
    cmd.env_clear()
        .env("GITHUB_TOKEN", "test-token")
        .env("HELM_REPOSITORY_CACHE", cache)
        .env("HELMGITHUB_API_URL", api_url)
        .args(["", "", "", url]);
    cmd
}

pub fn artifact_url() -> String {
    format!("github://{ARTIFACT_LOCATOR}")
}

pub fn slot_path(cache: &Path) -> PathBuf {
    cache.join("github").join("chart").join("app-1.0.0.tgz")
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn origin_index() -> String {
    format!(
        "apiVersion: v1\nentries:\n  app:\n    - name: app\n      version: 0.9.0\n      urls: [https://github.com/acme/app/releases/download/app-0.9.0/app-0.9.0.tgz]\n    - name: app\n      version: 1.0.0\n      urls: [https://{ARTIFACT_LOCATOR}]\n      digest: {}\n",
        sha256_hex(CHART)
    )
}

/// Snapshot Helm keeps after `helm repo add` / `helm repo update`.
pub fn snapshot(digest: &str) -> String {
    format!(
        "apiVersion: v1\nentries:\n  app:\n    - name: app\n      version: 1.0.0\n      urls: [github://{ARTIFACT_LOCATOR}]\n      digest: {digest}\n"
    )
}
