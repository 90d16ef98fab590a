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

use crate::domain::config::controller::ControllerConfig;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::warn;

fn parse_into<T: FromStr>(configs: &HashMap<String, String>, key: &str, target: &mut T) {
    if let Some(raw) = configs.get(key) {
        match raw.trim().parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => warn!("Ignoring -D {}={}: not a valid value", key, raw),
        }
    }
}

/// Applies `-D key=value` overrides on top of the loaded configuration.
/// Unknown keys are left for the caller to report.
pub fn apply_to_controller_config(
    configs: &HashMap<String, String>,
    config: &mut ControllerConfig,
) {
    if let Some(address) = configs.get("server.address") {
        config.server.address = address.trim().to_string();
    }
    parse_into(configs, "server.port", &mut config.server.port);

    parse_into(configs, "controller.workers", &mut config.controller.workers);
    parse_into(
        configs,
        "controller.max-retries",
        &mut config.controller.max_retries,
    );

    if let Some(namespace) = configs.get("controller.namespace") {
        let namespace = namespace.trim();
        config.kubernetes.namespace = if namespace.is_empty() {
            None
        } else {
            Some(namespace.to_string())
        };
    }

    if let Some(kubeconfig) = configs.get("kubernetes.kubeconfig") {
        config.kubernetes.kubeconfig = Some(kubeconfig.clone());
    }

    if let Some(context) = configs.get("kubernetes.context") {
        config.kubernetes.context = Some(context.clone());
    }

    parse_into(configs, "queue.base-delay-ms", &mut config.queue.base_delay_ms);
    parse_into(configs, "queue.max-delay-ms", &mut config.queue.max_delay_ms);
    parse_into(configs, "queue.qps", &mut config.queue.qps);
    parse_into(configs, "queue.burst", &mut config.queue.burst);
}

/// Keys understood by [`apply_to_controller_config`].
pub const DYNAMIC_CONFIG_KEYS: &[&str] = &[
    "server.address",
    "server.port",
    "controller.workers",
    "controller.max-retries",
    "controller.namespace",
    "kubernetes.kubeconfig",
    "kubernetes.context",
    "queue.base-delay-ms",
    "queue.max-delay-ms",
    "queue.qps",
    "queue.burst",
];

pub fn unknown_keys(configs: &HashMap<String, String>) -> Vec<&str> {
    let mut unknown: Vec<&str> = configs
        .keys()
        .map(String::as_str)
        .filter(|k| !DYNAMIC_CONFIG_KEYS.contains(k))
        .collect();
    unknown.sort_unstable();
    unknown
}
