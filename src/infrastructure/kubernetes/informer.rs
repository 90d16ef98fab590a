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

//! Reflector-backed caches for workloads and podpresets

use crate::domain::initializer::{PodPresetLister, WorkloadEvent, WorkloadLister};
use crate::domain::podpreset::{validate_pod_preset, PodPreset};
use crate::domain::workload::Workload;
use crate::shared::error::Result;
use futures::stream::BoxStream;
use futures::{future, StreamExt};
use kube::runtime::reflector::{self, ObjectRef, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

fn scoped_api<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Workload cache. The store only fills while the paired event stream is
/// being polled.
#[derive(Clone)]
pub struct KubeWorkloadLister {
    store: Store<Workload>,
}

impl KubeWorkloadLister {
    /// Starts a workload watch, cluster wide or limited to `namespace`.
    pub fn watch(
        client: Client,
        namespace: Option<&str>,
    ) -> (Self, BoxStream<'static, WorkloadEvent>) {
        let api: Api<Workload> = scoped_api(client, namespace);
        let (reader, writer) = reflector::store();

        let events = watcher(api, watcher::Config::default())
            .default_backoff()
            .reflect(writer)
            .filter_map(|event| {
                future::ready(match event {
                    Ok(watcher::Event::InitApply(w)) => Some(WorkloadEvent::Added(Arc::new(w))),
                    Ok(watcher::Event::Apply(w)) => Some(WorkloadEvent::Updated(Arc::new(w))),
                    Ok(watcher::Event::Delete(w)) => Some(WorkloadEvent::Deleted(Arc::new(w))),
                    Ok(watcher::Event::Init) | Ok(watcher::Event::InitDone) => None,
                    Err(e) => {
                        warn!(error = %e, "Pod watch failed, retrying");
                        None
                    }
                })
            })
            .boxed();

        (Self { store: reader }, events)
    }

    pub fn store(&self) -> &Store<Workload> {
        &self.store
    }
}

#[async_trait::async_trait]
impl WorkloadLister for KubeWorkloadLister {
    fn get(&self, namespace: &str, name: &str) -> Option<Arc<Workload>> {
        self.store
            .get(&ObjectRef::<Workload>::new(name).within(namespace))
    }

    async fn wait_until_synced(&self) {
        if self.store.wait_until_ready().await.is_err() {
            warn!("Pod cache writer dropped before the initial list completed");
        }
    }
}

/// Podpreset cache. Owns the background task that drives its watch.
pub struct KubePodPresetLister {
    store: Store<PodPreset>,
    task: JoinHandle<()>,
}

impl KubePodPresetLister {
    pub fn spawn(client: Client, namespace: Option<&str>) -> Self {
        let api: Api<PodPreset> = scoped_api(client, namespace);
        let (reader, writer) = reflector::store();

        let task = tokio::spawn(async move {
            let mut events = watcher(api, watcher::Config::default())
                .default_backoff()
                .reflect(writer)
                .boxed();

            while let Some(event) = events.next().await {
                match event {
                    Ok(watcher::Event::Apply(p)) | Ok(watcher::Event::InitApply(p)) => {
                        if let Err(e) = validate_pod_preset(&p) {
                            warn!(
                                namespace = p.namespace(),
                                preset = p.name(),
                                "Invalid podpreset: {}",
                                e
                            );
                        }
                    }
                    Ok(watcher::Event::Delete(p)) => {
                        debug!(namespace = p.namespace(), preset = p.name(), "Podpreset deleted");
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Podpreset watch failed, retrying"),
                }
            }
        });

        Self {
            store: reader,
            task,
        }
    }
}

impl Drop for KubePodPresetLister {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait::async_trait]
impl PodPresetLister for KubePodPresetLister {
    /// Presets in `namespace`, ordered by name.
    fn list(&self, namespace: &str) -> Result<Vec<Arc<PodPreset>>> {
        let mut presets: Vec<Arc<PodPreset>> = self
            .store
            .state()
            .into_iter()
            .filter(|p| p.namespace() == namespace)
            .collect();
        presets.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(presets)
    }

    async fn wait_until_synced(&self) {
        if self.store.wait_until_ready().await.is_err() {
            warn!("Podpreset cache writer dropped before the initial list completed");
        }
    }
}
