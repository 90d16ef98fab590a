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

use crate::domain::initializer::traits::{
    EventRecorder, PodPresetLister, WorkloadLister, WorkloadWriter,
};
use crate::domain::podpreset::admission::{
    apply_pod_presets, conflict_message, filter_pod_presets, preset_names, record_conflict_event,
    safe_to_apply,
};
use crate::domain::workload::{split_meta_namespace_key, Workload};
use crate::infrastructure::constants::{DEFAULT_MAX_RETRIES, DEFAULT_WORKERS, POD_KIND};
use crate::infrastructure::queue::WorkQueue;
use crate::shared::error::{KubeError, Result};
use futures::{Stream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Change notifications from the workload watch.
#[derive(Debug, Clone)]
pub enum WorkloadEvent {
    Added(Arc<Workload>),
    Updated(Arc<Workload>),
    Deleted(Arc<Workload>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    pub workers: usize,
    pub max_retries: u32,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Collaborators the controller reads from and writes to.
#[derive(Clone)]
pub struct ControllerDeps {
    pub workloads: Arc<dyn WorkloadLister>,
    pub presets: Arc<dyn PodPresetLister>,
    pub writer: Arc<dyn WorkloadWriter>,
    pub recorder: Arc<dyn EventRecorder>,
}

pub struct PodPresetController {
    workloads: Arc<dyn WorkloadLister>,
    presets: Arc<dyn PodPresetLister>,
    writer: Arc<dyn WorkloadWriter>,
    recorder: Arc<dyn EventRecorder>,
    queue: WorkQueue<String>,
    options: ControllerOptions,
}

impl PodPresetController {
    pub fn new(
        deps: ControllerDeps,
        queue: WorkQueue<String>,
        options: ControllerOptions,
    ) -> Result<Self> {
        if options.workers == 0 {
            return Err(KubeError::config_error("controller needs at least one worker"));
        }

        Ok(Self {
            workloads: deps.workloads,
            presets: deps.presets,
            writer: deps.writer,
            recorder: deps.recorder,
            queue,
            options,
        })
    }

    pub fn queue(&self) -> &WorkQueue<String> {
        &self.queue
    }

    pub fn options(&self) -> ControllerOptions {
        self.options
    }

    /// Enqueues workloads whose head initializer is ours. Deletes need no
    /// cleanup.
    pub fn handle_event(&self, event: WorkloadEvent) {
        let (workload, kind) = match event {
            WorkloadEvent::Added(w) => (w, "new"),
            WorkloadEvent::Updated(w) => (w, "existing"),
            WorkloadEvent::Deleted(_) => return,
        };

        if !workload.needs_initialization() {
            debug!(
                pod = workload.name(),
                "Pod does not need initialization"
            );
            return;
        }

        info!(pod = workload.name(), "Found an uninitialized {} pod", kind);
        self.queue.add(workload.key());
    }

    /// Pumps `events` into the queue, waits for both caches, then runs the
    /// workers until `shutdown` resolves. Returns once every worker has
    /// finished its current item.
    pub async fn run<S, F>(self: Arc<Self>, events: S, shutdown: F) -> Result<()>
    where
        S: Stream<Item = WorkloadEvent> + Send + 'static,
        F: Future<Output = ()> + Send,
    {
        info!("Starting podpreset initializer");

        let pump = {
            let controller = Arc::clone(&self);
            tokio::spawn(async move {
                let mut events = Box::pin(events);
                while let Some(event) = events.next().await {
                    controller.handle_event(event);
                }
            })
        };

        tokio::pin!(shutdown);

        let synced = async {
            self.workloads.wait_until_synced().await;
            self.presets.wait_until_synced().await;
        };
        tokio::select! {
            _ = synced => {}
            _ = &mut shutdown => {
                info!("Stopped before caches synced");
                pump.abort();
                self.queue.shutdown();
                return Ok(());
            }
        }

        info!(workers = self.options.workers, "Caches synced, starting workers");
        let workers: Vec<_> = (0..self.options.workers)
            .map(|id| {
                let controller = Arc::clone(&self);
                tokio::spawn(async move {
                    debug!(worker = id, "Worker started");
                    while controller.process_next_work_item().await {}
                    debug!(worker = id, "Worker stopped");
                })
            })
            .collect();

        shutdown.await;
        info!("Shutting down podpreset initializer");

        pump.abort();
        self.queue.shutdown();
        for worker in workers {
            if let Err(e) = worker.await {
                warn!("Worker exited abnormally: {}", e);
            }
        }

        Ok(())
    }

    /// Handles one key. `false` once the queue has shut down.
    pub async fn process_next_work_item(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };

        let result = self.reconcile(&key).await;
        self.handle_err(result, key.clone());
        self.queue.done(&key);
        true
    }

    pub async fn reconcile(&self, key: &str) -> Result<()> {
        debug!(key, "Got key");

        let (namespace, name) = split_meta_namespace_key(key)?;
        let cached = self
            .workloads
            .get(&namespace, &name)
            .ok_or_else(|| KubeError::not_found(POD_KIND, &name, &namespace))?;

        if !cached.needs_initialization() {
            debug!(pod = %name, "Pod no longer needs initialization, skipping");
            return Ok(());
        }

        if cached.is_excluded() {
            debug!(pod = %name, "Pod opted out of podpresets, skipping");
            return Ok(());
        }
        if cached.namespace().is_empty() {
            debug!(pod = %name, "Pod has an empty namespace, skipping");
            return Ok(());
        }

        let mut pod = Workload::clone(&cached);
        let presets = self.presets.list(&namespace)?;
        debug!(
            namespace = %namespace,
            count = presets.len(),
            "Fetched podpresets"
        );

        let matching = filter_pod_presets(&presets, &pod)?;
        if !matching.is_empty() {
            match safe_to_apply(&pod, &matching) {
                Ok(()) => {
                    apply_pod_presets(&mut pod, &matching);
                    info!(
                        pod = %name,
                        presets = %preset_names(&matching),
                        "Applied podpresets successfully"
                    );
                }
                Err(report) => {
                    let message = conflict_message(&pod, &matching, &report);
                    record_conflict_event(self.recorder.as_ref(), &pod, &message);
                    warn!("{}", message);
                }
            }
        }

        pod.mark_initialization_done();
        self.writer.update(&pod).await?;
        Ok(())
    }

    fn handle_err(&self, result: Result<()>, key: String) {
        let err = match result {
            Ok(()) => {
                self.queue.forget(&key);
                return;
            }
            Err(e) => e,
        };

        if !err.is_retryable() {
            warn!(key = %key, "Dropping pod out of the queue: {}", err);
            self.queue.forget(&key);
            return;
        }

        if self.queue.num_requeues(&key) < self.options.max_retries {
            info!(key = %key, "Error processing pod: {}", err);
            self.queue.add_rate_limited(key);
            return;
        }

        self.queue.forget(&key);
        error!(key = %key, "Dropping pod {:?} out of the queue: {}", key, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::podpreset::PodPreset;
    use crate::domain::workload::{Initializer, Initializers, WorkloadMeta};
    use crate::infrastructure::constants::PODPRESET_INITIALIZER_NAME;
    use crate::infrastructure::queue::ItemExponentialFailureRateLimiter;
    use k8s_openapi::api::core::v1::ObjectReference;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::runtime::events::EventType;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct NoWorkloads;

    #[async_trait::async_trait]
    impl WorkloadLister for NoWorkloads {
        fn get(&self, _: &str, _: &str) -> Option<Arc<Workload>> {
            None
        }

        async fn wait_until_synced(&self) {}
    }

    struct NoPresets;

    #[async_trait::async_trait]
    impl PodPresetLister for NoPresets {
        fn list(&self, _: &str) -> Result<Vec<Arc<PodPreset>>> {
            Ok(Vec::new())
        }

        async fn wait_until_synced(&self) {}
    }

    #[derive(Default)]
    struct CountingWriter {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl WorkloadWriter for CountingWriter {
        async fn update(&self, workload: &Workload) -> Result<Workload> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(workload.clone())
        }
    }

    struct Silent;

    impl EventRecorder for Silent {
        fn event(&self, _: &ObjectReference, _: EventType, _: &str, _: &str) {}
    }

    fn zero_delay_queue() -> WorkQueue<String> {
        WorkQueue::new(Box::new(ItemExponentialFailureRateLimiter::new(
            Duration::ZERO,
            Duration::ZERO,
        )))
    }

    fn controller(writer: Arc<CountingWriter>) -> PodPresetController {
        PodPresetController::new(
            ControllerDeps {
                workloads: Arc::new(NoWorkloads),
                presets: Arc::new(NoPresets),
                writer,
                recorder: Arc::new(Silent),
            },
            zero_delay_queue(),
            ControllerOptions::default(),
        )
        .unwrap()
    }

    fn pending(head: &str) -> Arc<Workload> {
        Arc::new(Workload {
            metadata: WorkloadMeta {
                object: ObjectMeta {
                    name: Some("pod1".to_string()),
                    namespace: Some("ns".to_string()),
                    ..Default::default()
                },
                initializers: Some(Initializers {
                    pending: vec![Initializer {
                        name: head.to_string(),
                    }],
                }),
            },
            ..Default::default()
        })
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = PodPresetController::new(
            ControllerDeps {
                workloads: Arc::new(NoWorkloads),
                presets: Arc::new(NoPresets),
                writer: Arc::new(CountingWriter::default()),
                recorder: Arc::new(Silent),
            },
            zero_delay_queue(),
            ControllerOptions {
                workers: 0,
                max_retries: 5,
            },
        );
        assert!(matches!(result, Err(KubeError::ConfigError(_))));
    }

    #[test]
    fn test_handle_event_filters_on_head_initializer() {
        let c = controller(Arc::new(CountingWriter::default()));

        c.handle_event(WorkloadEvent::Added(pending("other.initializer")));
        assert_eq!(c.queue().len(), 0);

        c.handle_event(WorkloadEvent::Deleted(pending(PODPRESET_INITIALIZER_NAME)));
        assert_eq!(c.queue().len(), 0);

        c.handle_event(WorkloadEvent::Added(pending(PODPRESET_INITIALIZER_NAME)));
        c.handle_event(WorkloadEvent::Updated(pending(PODPRESET_INITIALIZER_NAME)));
        assert_eq!(c.queue().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_key_is_dropped_without_retry() {
        let writer = Arc::new(CountingWriter::default());
        let c = controller(Arc::clone(&writer));

        c.queue().add("ns/missing".to_string());
        assert!(c.process_next_work_item().await);

        assert_eq!(c.queue().len(), 0);
        assert_eq!(c.queue().num_requeues(&"ns/missing".to_string()), 0);
        assert_eq!(writer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_key_is_dropped() {
        let c = controller(Arc::new(CountingWriter::default()));
        let err = c.reconcile("a/b/c").await.unwrap_err();
        assert!(matches!(err, KubeError::MalformedKey { .. }));

        c.queue().add("a/b/c".to_string());
        assert!(c.process_next_work_item().await);
        assert_eq!(c.queue().len(), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let c = Arc::new(controller(Arc::new(CountingWriter::default())));
        let stopped = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&stopped);
        let handle = tokio::spawn(Arc::clone(&c).run(futures::stream::pending(), async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag.store(true, Ordering::SeqCst);
        }));

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(stopped.load(Ordering::SeqCst));
        assert!(c.queue().is_shutting_down());
    }
}
