// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Controller configuration, loadable from TOML

use crate::domain::initializer::ControllerOptions;
use crate::infrastructure::constants::{
    DEFAULT_ADDRESS, DEFAULT_BASE_DELAY_MS, DEFAULT_BURST, DEFAULT_MAX_DELAY_MS,
    DEFAULT_MAX_RETRIES, DEFAULT_PORT, DEFAULT_QPS, DEFAULT_WORKERS,
};
use crate::infrastructure::queue::{controller_rate_limiter, MaxOfRateLimiter};
use crate::shared::error::{KubeError, Result};
use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub server: ServerConf,
    pub kubernetes: KubernetesConf,
    pub controller: ControllerConf,
    pub queue: QueueConf,
}

/// Health endpoint bind address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConf {
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesConf {
    pub kubeconfig: Option<String>,
    pub context: Option<String>,
    /// Watch a single namespace instead of the whole cluster
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConf {
    pub workers: usize,
    pub max_retries: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConf {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub qps: f64,
    pub burst: u32,
}

impl Default for ServerConf {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Default for ControllerConf {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl Default for QueueConf {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            qps: DEFAULT_QPS,
            burst: DEFAULT_BURST,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from TOML file
    pub fn from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = read_to_string(path.as_ref())?;
        let conf: Self = toml::from_str(&content)?;
        Ok(conf)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.address.parse::<IpAddr>().is_err() {
            return Err(KubeError::ConfigError(format!(
                "Invalid server.address: {}",
                self.server.address
            )));
        }

        if self.controller.workers == 0 {
            return Err(KubeError::ConfigError(
                "controller.workers must be > 0".to_string(),
            ));
        }

        if self.queue.base_delay_ms > self.queue.max_delay_ms {
            return Err(KubeError::ConfigError(format!(
                "queue.base-delay-ms ({}) must not exceed queue.max-delay-ms ({})",
                self.queue.base_delay_ms, self.queue.max_delay_ms
            )));
        }

        if !(self.queue.qps.is_finite() && self.queue.qps > 0.0) {
            return Err(KubeError::ConfigError(format!(
                "queue.qps must be > 0: {}",
                self.queue.qps
            )));
        }

        if self.queue.burst == 0 {
            return Err(KubeError::ConfigError("queue.burst must be > 0".to_string()));
        }

        if let Some(ns) = &self.kubernetes.namespace {
            if ns.is_empty() {
                return Err(KubeError::ConfigError(
                    "kubernetes.namespace must not be empty when set".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.server.address.parse().map_err(|e| {
            KubeError::ConfigError(format!("Invalid server.address {}: {}", self.server.address, e))
        })?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            workers: self.controller.workers,
            max_retries: self.controller.max_retries,
        }
    }

    pub fn rate_limiter(&self) -> MaxOfRateLimiter<String> {
        controller_rate_limiter(
            Duration::from_millis(self.queue.base_delay_ms),
            Duration::from_millis(self.queue.max_delay_ms),
            self.queue.qps,
            self.queue.burst,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let conf = ControllerConfig::default();
        assert!(conf.validate().is_ok());
        assert_eq!(conf.controller.workers, 2);
        assert_eq!(conf.controller.max_retries, 5);
        assert_eq!(conf.socket_addr().unwrap().port(), 10000);
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8443

[kubernetes]
namespace = "team-a"

[controller]
workers = 4
"#
        )
        .unwrap();

        let conf = ControllerConfig::from(file.path()).unwrap();
        assert_eq!(conf.server.port, 8443);
        assert_eq!(conf.server.address, "0.0.0.0");
        assert_eq!(conf.kubernetes.namespace.as_deref(), Some("team-a"));
        assert_eq!(conf.controller.workers, 4);
        assert_eq!(conf.controller.max_retries, 5);
        assert_eq!(conf.queue.burst, 100);
    }

    #[test]
    fn test_bad_toml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[controller\nworkers = ").unwrap();
        let err = ControllerConfig::from(file.path()).unwrap_err();
        assert!(matches!(err, KubeError::TomlParse(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut conf = ControllerConfig::default();
        conf.controller.workers = 0;
        assert!(conf.validate().is_err());

        let mut conf = ControllerConfig::default();
        conf.queue.base_delay_ms = 20_000;
        assert!(conf.validate().is_err());

        let mut conf = ControllerConfig::default();
        conf.server.address = "not-an-ip".to_string();
        assert!(conf.validate().is_err());

        let mut conf = ControllerConfig::default();
        conf.queue.qps = 0.0;
        assert!(conf.validate().is_err());
    }
}
