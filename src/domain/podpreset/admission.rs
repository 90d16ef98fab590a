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

use crate::domain::initializer::traits::EventRecorder;
use crate::domain::podpreset::merger::{
    merge_env, merge_env_from, merge_volume_mounts, merge_volumes, ConflictReport,
};
use crate::domain::podpreset::types::PodPreset;
use crate::domain::workload::Workload;
use crate::infrastructure::constants::{
    ANNOTATION_PREFIX, ANNOTATION_PRESET_PREFIX, EVENT_REASON_PODPRESET,
};
use crate::shared::error::{KubeError, Result};
use k8s_openapi::api::core::v1::Container;
use kube::runtime::events::EventType;
use std::sync::Arc;
use tracing::debug;

/// Presets in the pod's namespace whose selector matches the pod labels,
/// in the order they were listed.
pub fn filter_pod_presets(
    presets: &[Arc<PodPreset>],
    pod: &Workload,
) -> Result<Vec<Arc<PodPreset>>> {
    let labels = pod.labels();
    let mut matching = Vec::new();

    for preset in presets {
        if preset.namespace() != pod.namespace() {
            continue;
        }

        let selector = preset
            .selector()
            .map_err(|e| KubeError::selector_error(preset.name(), e))?;

        if !selector.matches(&labels) {
            continue;
        }
        debug!(preset = preset.name(), pod = pod.name(), "PodPreset matches pod labels");
        matching.push(Arc::clone(preset));
    }

    Ok(matching)
}

/// Dry run of every merger against the pod's current fields.
pub fn safe_to_apply(
    pod: &Workload,
    presets: &[Arc<PodPreset>],
) -> std::result::Result<(), ConflictReport> {
    let mut report = ConflictReport::default();

    if let Err(e) = merge_volumes(pod.spec.volumes.as_deref().unwrap_or_default(), presets) {
        report.extend(e);
    }
    for container in &pod.spec.containers {
        if let Err(e) = safe_to_apply_on_container(container, presets) {
            report.extend(e);
        }
    }

    report.into_result()
}

fn safe_to_apply_on_container(
    container: &Container,
    presets: &[Arc<PodPreset>],
) -> std::result::Result<(), ConflictReport> {
    let mut report = ConflictReport::default();

    if let Err(e) = merge_env(container.env.as_deref().unwrap_or_default(), presets) {
        report.extend(e);
    }
    if let Err(e) = merge_volume_mounts(
        container.volume_mounts.as_deref().unwrap_or_default(),
        presets,
    ) {
        report.extend(e);
    }

    report.into_result()
}

fn non_empty<T>(merged: Vec<T>, current: &mut Option<Vec<T>>) {
    if !merged.is_empty() {
        *current = Some(merged);
    }
}

/// Writes the merged fields into `pod` and records which preset versions
/// were applied. Only call after `safe_to_apply` has passed.
pub fn apply_pod_presets(pod: &mut Workload, presets: &[Arc<PodPreset>]) {
    if presets.is_empty() {
        return;
    }

    if let Ok(volumes) = merge_volumes(pod.spec.volumes.as_deref().unwrap_or_default(), presets) {
        non_empty(volumes, &mut pod.spec.volumes);
    }

    for container in pod.spec.containers.iter_mut() {
        apply_pod_presets_on_container(container, presets);
    }

    let annotations = pod.metadata.object.annotations.get_or_insert_with(Default::default);
    for preset in presets {
        annotations.insert(
            applied_annotation_key(preset.name()),
            preset.resource_version().to_string(),
        );
    }
}

fn apply_pod_presets_on_container(container: &mut Container, presets: &[Arc<PodPreset>]) {
    if let Ok(env) = merge_env(container.env.as_deref().unwrap_or_default(), presets) {
        non_empty(env, &mut container.env);
    }

    if let Ok(mounts) = merge_volume_mounts(
        container.volume_mounts.as_deref().unwrap_or_default(),
        presets,
    ) {
        non_empty(mounts, &mut container.volume_mounts);
    }

    let env_from = merge_env_from(container.env_from.as_deref().unwrap_or_default(), presets);
    non_empty(env_from, &mut container.env_from);
}

pub fn applied_annotation_key(preset_name: &str) -> String {
    format!(
        "{}/{}{}",
        ANNOTATION_PREFIX, ANNOTATION_PRESET_PREFIX, preset_name
    )
}

pub fn preset_names(presets: &[Arc<PodPreset>]) -> String {
    presets
        .iter()
        .map(|p| p.name())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn conflict_message(
    pod: &Workload,
    presets: &[Arc<PodPreset>],
    report: &ConflictReport,
) -> String {
    let pod_name = match pod.name() {
        "" => pod.metadata.object.generate_name.as_deref().unwrap_or_default(),
        name => name,
    };
    format!(
        "conflict occurred while applying podpresets: {} on pod: {} err: {}",
        preset_names(presets),
        pod_name,
        report
    )
}

/// Warns on the pod, and on its controlling owner when there is one.
pub fn record_conflict_event(recorder: &dyn EventRecorder, pod: &Workload, message: &str) {
    recorder.event(
        &pod.object_reference(),
        EventType::Warning,
        EVENT_REASON_PODPRESET,
        message,
    );

    if let Some(owner) = pod.owner_object_reference() {
        recorder.eventf(
            &owner,
            EventType::Warning,
            EVENT_REASON_PODPRESET,
            format_args!("{}", message),
        );
    }
}
