/* Copyright 2023- The Binedge, Lda team. All rights reserved.
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *     http://www.apache.org/licenses/LICENSE-2.0
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Process configuration: loaded once at startup from a YAML file plus
//! environment overrides, then shared read-only for the life of the process.
//! There is no file-watching: the config and registry are frozen after
//! startup, so there is nothing to react to a live file change with.

use std::env;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The user identifier that upstream rejects outright; present as a guardrail
/// against accidentally shipping a known-bad shared credential.
const REJECTED_USER: &str = "cels";

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    44497
}

fn default_user() -> String {
    "anonymous".to_string()
}

fn default_argo_url() -> String {
    "https://apps.inside.anl.gov/argoapi/api/v1/resource/chat/".to_string()
}

fn default_argo_stream_url() -> String {
    "https://apps.inside.anl.gov/argoapi/api/v1/resource/streamchat/".to_string()
}

fn default_argo_embedding_url() -> String {
    "https://apps.inside.anl.gov/argoapi/api/v1/resource/embed/".to_string()
}

fn default_num_workers() -> usize {
    4
}

fn default_timeout() -> u64 {
    600
}

/// Configuration as persisted to `config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigFile {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_argo_url")]
    pub argo_url: String,
    #[serde(default = "default_argo_stream_url")]
    pub argo_stream_url: String,
    #[serde(default = "default_argo_embedding_url")]
    pub argo_embedding_url: String,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub translate_tools: bool,
}

impl Default for ConfigFile {
    fn default() -> Self {
        ConfigFile {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            argo_url: default_argo_url(),
            argo_stream_url: default_argo_stream_url(),
            argo_embedding_url: default_argo_embedding_url(),
            verbose: false,
            num_workers: default_num_workers(),
            timeout: default_timeout(),
            translate_tools: false,
        }
    }
}

/// The fully-resolved, immutable configuration handed into request state.
/// Built once at startup and passed down through `AppState` rather than
/// re-read from a process global on every request.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub argo_url: String,
    pub argo_stream_url: String,
    pub argo_embedding_url: String,
    pub verbose: bool,
    pub num_workers: usize,
    pub timeout_secs: u64,
    pub translate_tools: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Candidate config file locations, checked in order until one exists.
pub fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dirs) = ProjectDirs::from("", "", "argoproxy") {
        paths.push(dirs.config_dir().join("config.yaml"));
    }
    if let Some(home) = directories::UserDirs::new().map(|d| d.home_dir().to_path_buf()) {
        paths.push(home.join(".argoproxy").join("config.yaml"));
    }
    paths.push(PathBuf::from("./config.yaml"));
    paths
}

/// Loads configuration from the first candidate path that exists, applying
/// environment overrides, then validates the result.
///
/// If no candidate file exists, falls back to `ConfigFile::default()` before
/// overrides are applied — the process can still start from environment
/// variables alone.
pub fn load() -> Result<Config, ConfigError> {
    let explicit = env::var("CONFIG_PATH").ok().map(PathBuf::from);
    let path = match &explicit {
        Some(p) => Some(p.clone()),
        None => candidate_paths().into_iter().find(|p| p.exists()),
    };

    let file = match path {
        Some(path) => read_file(&path)?,
        None => ConfigFile::default(),
    };

    let config = apply_env_overrides(file);
    validate(&config)?;
    Ok(config)
}

fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_env_overrides(file: ConfigFile) -> Config {
    let host = env::var("HOST").unwrap_or(file.host);
    let port = env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(file.port);
    let num_workers = env::var("NUM_WORKERS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(file.num_workers);
    let verbose = env::var("VERBOSE")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(file.verbose);

    Config {
        host,
        port,
        user: file.user,
        argo_url: file.argo_url,
        argo_stream_url: file.argo_stream_url,
        argo_embedding_url: file.argo_embedding_url,
        verbose,
        num_workers,
        timeout_secs: file.timeout,
        translate_tools: file.translate_tools,
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.user == REJECTED_USER {
        return Err(ConfigError::Invalid(format!(
            "user {REJECTED_USER:?} is not permitted"
        )));
    }
    if config.port == 0 {
        return Err(ConfigError::Invalid("port must be non-zero".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = apply_env_overrides(ConfigFile::default());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn rejects_cels_user() {
        let mut file = ConfigFile::default();
        file.user = "cels".to_string();
        let config = apply_env_overrides(file);
        assert!(matches!(validate(&config), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn parses_full_yaml() {
        let yaml = r#"
host: 0.0.0.0
port: 8080
user: alice
argo_url: "http://up/chat"
argo_stream_url: "http://up/stream"
argo_embedding_url: "http://up/embed"
verbose: true
num_workers: 8
timeout: 120
translate_tools: true
"#;
        let file: ConfigFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.host, "0.0.0.0");
        assert_eq!(file.port, 8080);
        assert_eq!(file.user, "alice");
        assert!(file.translate_tools);
    }

    #[test]
    fn tempfile_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let file = ConfigFile::default();
        std::fs::write(&path, serde_yaml::to_string(&file).unwrap()).unwrap();
        let loaded = read_file(&path).unwrap();
        assert_eq!(loaded, file);
    }
}
