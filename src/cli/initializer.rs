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

use crate::cli::display::{PresetRow, PresetStatus, TableRenderer};
use crate::domain::config::{apply_to_controller_config, unknown_keys, ControllerConfig};
use crate::domain::initializer::{
    ControllerDeps, PodPresetController, PodPresetLister, WorkloadLister,
};
use crate::domain::podpreset::{
    apply_pod_presets, pod_presets_from_yaml, safe_to_apply, validate_pod_preset,
    ConflictReport, PodPreset,
};
use crate::domain::workload::Workload;
use crate::infrastructure::kubernetes::{
    create_client, serve, KubeEventRecorder, KubePodPresetLister, KubeWorkloadLister,
    KubeWorkloadWriter, Readiness,
};
use crate::infrastructure::queue::WorkQueue;
use clap::Parser;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

#[derive(Parser, Debug, Clone, Default)]
pub struct RunCommand {
    /// Address to serve /healthz and /readyz on
    #[arg(long)]
    pub address: Option<String>,

    /// Port to serve /healthz and /readyz on
    #[arg(long)]
    pub port: Option<u16>,

    /// Path to kubeconfig file
    /// If not specified, uses in-cluster config, then KUBECONFIG or ~/.kube/config
    #[arg(long)]
    pub kubeconfig: Option<String>,

    /// Kubernetes context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Only watch pods and podpresets in this namespace
    #[arg(long, short = 'n')]
    pub namespace: Option<String>,

    /// Number of concurrent workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Path to controller configuration file (TOML)
    #[arg(long, value_name = "PATH")]
    pub config_file: Option<String>,

    /// Dynamic configuration properties (-D key=value)
    ///
    /// Server: server.address, server.port
    /// Controller: controller.workers, controller.max-retries, controller.namespace
    /// Kubernetes: kubernetes.kubeconfig, kubernetes.context
    /// Queue: queue.base-delay-ms, queue.max-delay-ms, queue.qps, queue.burst
    ///
    /// Example: -Dcontroller.workers=4 -Dqueue.max-delay-ms=30000
    #[arg(short = 'D', value_name = "KEY=VALUE")]
    pub properties: Vec<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ValidateCommand {
    /// PodPreset manifests (multi-document YAML allowed)
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct PreviewCommand {
    /// Pod manifest (YAML)
    #[arg(long, value_name = "FILE")]
    pub pod: String,

    /// PodPreset manifests (repeatable, multi-document YAML allowed)
    #[arg(long = "preset", required = true, value_name = "FILE")]
    pub presets: Vec<String>,

    /// Namespace assumed for manifests that do not set one
    #[arg(long, short = 'n', default_value = "default")]
    pub namespace: String,
}

impl RunCommand {
    /// Priority: command line > -D > config file > defaults
    pub fn resolve_config(&self) -> anyhow::Result<ControllerConfig> {
        let mut config = if let Some(ref path) = self.config_file {
            ControllerConfig::from(path)?
        } else {
            ControllerConfig::default()
        };

        if !self.properties.is_empty() {
            let dynamic_configs = parse_dynamic_configs(&self.properties)
                .map_err(|e| anyhow::anyhow!("Failed to parse dynamic configs: {}", e))?;
            for key in unknown_keys(&dynamic_configs) {
                warn!("Ignoring unknown dynamic config key: {}", key);
            }
            apply_to_controller_config(&dynamic_configs, &mut config);
        }

        if let Some(ref address) = self.address {
            config.server.address = address.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref kubeconfig) = self.kubeconfig {
            config.kubernetes.kubeconfig = Some(kubeconfig.clone());
        }
        if let Some(ref context) = self.context {
            config.kubernetes.context = Some(context.clone());
        }
        if let Some(ref namespace) = self.namespace {
            config.kubernetes.namespace = Some(namespace.clone());
        }
        if let Some(workers) = self.workers {
            config.controller.workers = workers;
        }

        config.validate()?;
        Ok(config)
    }

    pub async fn execute(&self) -> anyhow::Result<()> {
        let config = self.resolve_config()?;
        let addr = config.socket_addr()?;
        let namespace = config.kubernetes.namespace.as_deref();

        let client = create_client(
            config.kubernetes.kubeconfig.clone(),
            config.kubernetes.context.clone(),
        )
        .await?;

        let presets = Arc::new(KubePodPresetLister::spawn(client.clone(), namespace));
        let (workloads, events) = KubeWorkloadLister::watch(client.clone(), namespace);
        let workloads = Arc::new(workloads);
        let recorder = Arc::new(KubeEventRecorder::new(client.clone()));
        let writer = Arc::new(KubeWorkloadWriter::new(client));

        let queue = WorkQueue::new(Box::new(config.rate_limiter()));
        let controller = Arc::new(PodPresetController::new(
            ControllerDeps {
                workloads: workloads.clone(),
                presets: presets.clone(),
                writer,
                recorder,
            },
            queue,
            config.controller_options(),
        )?);

        let ready = Readiness::default();
        let sync_watch = {
            let ready = ready.clone();
            tokio::spawn(async move {
                workloads.wait_until_synced().await;
                presets.wait_until_synced().await;
                ready.mark_ready();
            })
        };

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let health = tokio::spawn(async move {
            let stopped = async {
                let _ = stop_rx.await;
            };
            if let Err(e) = serve(addr, ready, stopped).await {
                error!(error = %e, addr = %addr, "Health server failed");
            }
        });

        info!(
            addr = %addr,
            namespace = namespace.unwrap_or("<all>"),
            workers = config.controller.workers,
            "Starting podpreset initializer"
        );
        controller.run(events, shutdown_signal()).await?;

        sync_watch.abort();
        let _ = stop_tx.send(());
        if let Err(e) = health.await {
            warn!("Health server exited abnormally: {}", e);
        }

        println!("PodPreset initializer stopped");
        Ok(())
    }
}

impl ValidateCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let rows = validate_files(&self.files)?;
        let renderer = TableRenderer::new();
        println!("{}", renderer.render_presets("PodPreset Validation", &rows));

        let invalid = rows
            .iter()
            .filter(|r| r.status == PresetStatus::Invalid)
            .count();
        if invalid > 0 {
            anyhow::bail!("{} of {} podpresets failed validation", invalid, rows.len());
        }

        println!("All {} podpresets are valid", rows.len());
        Ok(())
    }
}

/// Validates every podpreset found in `files`, one row per preset.
pub fn validate_files(files: &[String]) -> anyhow::Result<Vec<PresetRow>> {
    let mut rows = Vec::new();

    for file in files {
        for preset in load_presets(file)? {
            let (status, detail) = match validate_pod_preset(&preset) {
                Ok(()) => (PresetStatus::Valid, String::new()),
                Err(e) => (PresetStatus::Invalid, e.to_string()),
            };
            rows.push(PresetRow {
                name: preset.name().to_string(),
                namespace: preset.namespace().to_string(),
                selector: preset.selector().map(|s| s.to_string()).unwrap_or_default(),
                status,
                detail,
            });
        }
    }

    Ok(rows)
}

impl PreviewCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let content = std::fs::read_to_string(&self.pod)
            .map_err(|e| anyhow::anyhow!("Failed to read pod manifest {}: {}", self.pod, e))?;
        let pod: Workload = serde_yaml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse pod manifest {}: {}", self.pod, e))?;

        let mut presets = Vec::new();
        for file in &self.presets {
            presets.extend(load_presets(file)?);
        }

        let outcome = preview_pod(pod, presets, &self.namespace);
        let renderer = TableRenderer::new();

        println!("{}", renderer.render_presets("PodPreset Preview", &outcome.rows));
        if outcome.excluded {
            println!("Pod opted out of podpresets, nothing is injected");
        } else {
            println!("{}", renderer.render_conflicts(&outcome.conflicts));
        }
        println!("\nResulting pod:\n{}", serde_yaml::to_string(&outcome.pod)?);

        Ok(())
    }
}

/// Result of an offline selection and merge
#[derive(Debug, Clone)]
pub struct PreviewOutcome {
    pub rows: Vec<PresetRow>,
    pub conflicts: ConflictReport,
    pub excluded: bool,
    pub pod: Workload,
}

/// Runs selection and merge the way the controller would, without a
/// cluster. Manifests with no namespace are placed in `default_namespace`.
pub fn preview_pod(
    mut pod: Workload,
    presets: Vec<PodPreset>,
    default_namespace: &str,
) -> PreviewOutcome {
    if pod.namespace().is_empty() {
        pod.metadata.object.namespace = Some(default_namespace.to_string());
    }
    let excluded = pod.is_excluded();
    let labels = pod.labels().into_owned();

    let mut rows = Vec::new();
    let mut matching = Vec::new();

    for mut preset in presets {
        if preset.namespace().is_empty() {
            preset.metadata.namespace = Some(default_namespace.to_string());
        }

        let mut row = PresetRow {
            name: preset.name().to_string(),
            namespace: preset.namespace().to_string(),
            selector: String::new(),
            status: PresetStatus::Skipped,
            detail: String::new(),
        };

        match preset.selector() {
            Err(e) => {
                row.status = PresetStatus::Invalid;
                row.detail = e.to_string();
            }
            Ok(selector) => {
                row.selector = selector.to_string();
                if preset.namespace() != pod.namespace() {
                    row.detail = format!("pod is in namespace {}", pod.namespace());
                } else if !selector.matches(&labels) {
                    row.detail = "labels do not match".to_string();
                } else if excluded {
                    row.detail = "pod opted out".to_string();
                } else {
                    row.status = PresetStatus::Applied;
                    matching.push((rows.len(), Arc::new(preset)));
                }
            }
        }
        rows.push(row);
    }

    let mut conflicts = ConflictReport::default();
    if !excluded {
        let presets: Vec<Arc<PodPreset>> = matching.iter().map(|(_, p)| Arc::clone(p)).collect();
        match safe_to_apply(&pod, &presets) {
            Ok(()) => apply_pod_presets(&mut pod, &presets),
            Err(report) => {
                for (index, preset) in &matching {
                    let own = report
                        .conflicts()
                        .iter()
                        .filter(|c| c.preset == preset.name())
                        .count();
                    rows[*index].status = PresetStatus::Conflict;
                    rows[*index].detail = if own > 0 {
                        format!("{} conflict(s)", own)
                    } else {
                        "not applied, other podpresets conflict".to_string()
                    };
                }
                conflicts = report;
            }
        }

        if pod.needs_initialization() {
            pod.mark_initialization_done();
        }
    }

    PreviewOutcome {
        rows,
        conflicts,
        excluded,
        pod,
    }
}

fn load_presets(file: &str) -> anyhow::Result<Vec<PodPreset>> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("Failed to read podpreset manifest {}: {}", file, e))?;
    pod_presets_from_yaml(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse podpreset manifest {}: {}", file, e))
}

/// Parse dynamic configuration properties from -D key=value format
pub fn parse_dynamic_configs(configs: &[String]) -> Result<HashMap<String, String>, String> {
    let mut map = HashMap::new();

    for config in configs {
        let Some((key, value)) = config.split_once('=') else {
            return Err(format!(
                "Invalid config format: '{}'. Expected 'key=value'",
                config
            ));
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Empty key in config: '{}'", config));
        }

        map.insert(key.to_string(), value.trim().to_string());
    }

    Ok(map)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                futures::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = futures::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate => {}
    }
    info!("Received shutdown signal");
}
