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

use crate::domain::podpreset::PodPreset;
use crate::domain::workload::Workload;
use crate::shared::error::Result;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::EventType;
use std::fmt;
use std::sync::Arc;

/// Read-only view of the workload cache.
#[async_trait::async_trait]
pub trait WorkloadLister: Send + Sync {
    fn get(&self, namespace: &str, name: &str) -> Option<Arc<Workload>>;

    /// Resolves once the cache has seen its initial list.
    async fn wait_until_synced(&self);
}

/// Read-only view of the preset cache, indexed by namespace.
#[async_trait::async_trait]
pub trait PodPresetLister: Send + Sync {
    fn list(&self, namespace: &str) -> Result<Vec<Arc<PodPreset>>>;

    async fn wait_until_synced(&self);
}

/// Conditional write keyed on the workload's resource version.
#[async_trait::async_trait]
pub trait WorkloadWriter: Send + Sync {
    async fn update(&self, workload: &Workload) -> Result<Workload>;
}

/// Fire-and-forget event sink. Implementations must not block.
pub trait EventRecorder: Send + Sync {
    fn event(&self, target: &ObjectReference, event_type: EventType, reason: &str, message: &str);

    fn eventf(
        &self,
        target: &ObjectReference,
        event_type: EventType,
        reason: &str,
        args: fmt::Arguments<'_>,
    ) {
        self.event(target, event_type, reason, &args.to_string());
    }
}
