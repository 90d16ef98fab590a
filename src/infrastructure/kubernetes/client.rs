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

use crate::domain::initializer::WorkloadWriter;
use crate::domain::workload::Workload;
use crate::infrastructure::constants::POD_KIND;
use crate::shared::error::{KubeError, Result};
use kube::api::PostParams;
use kube::{Api, Client};
use tracing::debug;

/// Builds a client from an explicit kubeconfig and/or context. With neither
/// set, falls back to the default resolution (in-cluster service account,
/// then `KUBECONFIG` or `~/.kube/config`).
pub async fn create_client(
    kubeconfig_path: Option<String>,
    context: Option<String>,
) -> Result<Client> {
    use kube::config::{KubeConfigOptions, Kubeconfig};

    if kubeconfig_path.is_none() && context.is_none() {
        return Client::try_default().await.map_err(|e| {
            KubeError::KubeError(format!("Failed to create Kubernetes client: {}", e))
        });
    }

    let kubeconfig = if let Some(path) = kubeconfig_path {
        Kubeconfig::read_from(path)
            .map_err(|e| KubeError::KubeError(format!("Failed to load kubeconfig: {}", e)))?
    } else {
        Kubeconfig::read()
            .map_err(|e| KubeError::KubeError(format!("Failed to load kubeconfig: {}", e)))?
    };

    let config_options = KubeConfigOptions {
        context,
        cluster: None,
        user: None,
    };

    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &config_options)
        .await
        .map_err(|e| KubeError::KubeError(format!("Failed to create Kubernetes config: {}", e)))?;

    Client::try_from(config)
        .map_err(|e| KubeError::KubeError(format!("Failed to create Kubernetes client: {}", e)))
}

/// Writes workloads back with a full replace, so the API server rejects
/// the update when the cached resource version is stale.
pub struct KubeWorkloadWriter {
    client: Client,
}

impl KubeWorkloadWriter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl WorkloadWriter for KubeWorkloadWriter {
    async fn update(&self, workload: &Workload) -> Result<Workload> {
        let api: Api<Workload> = Api::namespaced(self.client.clone(), workload.namespace());
        let pp = PostParams::default();

        let updated = api
            .replace(workload.name(), &pp, workload)
            .await
            .map_err(|e| KubeError::from_write(POD_KIND, workload.name(), e))?;

        debug!(
            pod = workload.name(),
            namespace = workload.namespace(),
            "Updated pod"
        );
        Ok(updated)
    }
}
