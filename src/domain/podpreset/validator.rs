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

use crate::domain::podpreset::types::PodPreset;
use crate::shared::error::{KubeError, Result};
use std::collections::HashSet;

/// Checks a preset the way the settings API would before admitting it.
/// All field errors are collected into one `ValidationError`.
pub fn validate_pod_preset(preset: &PodPreset) -> Result<()> {
    let mut errs: Vec<String> = Vec::new();

    if preset.name().is_empty() {
        errs.push("metadata.name: Required value: name or generateName is required".to_string());
    }
    if preset.namespace().is_empty() {
        errs.push("metadata.namespace: Required value".to_string());
    }

    if let Err(e) = preset.selector() {
        errs.push(format!("spec.selector: Invalid value: {}", e));
    }

    let spec = &preset.spec;
    if spec.env.is_empty()
        && spec.env_from.is_empty()
        && spec.volumes.is_empty()
        && spec.volume_mounts.is_empty()
    {
        errs.push(
            "spec: Required value: must specify at least one of env, envFrom, volumes or volumeMounts"
                .to_string(),
        );
    }

    let mut env_names = HashSet::new();
    for (i, env) in spec.env.iter().enumerate() {
        if env.name.is_empty() {
            errs.push(format!("spec.env[{}].name: Required value", i));
        } else if !env_names.insert(env.name.as_str()) {
            errs.push(format!("spec.env[{}].name: Duplicate value: \"{}\"", i, env.name));
        }
    }

    let mut volume_names = HashSet::new();
    for (i, volume) in spec.volumes.iter().enumerate() {
        if volume.name.is_empty() {
            errs.push(format!("spec.volumes[{}].name: Required value", i));
        } else if !volume_names.insert(volume.name.as_str()) {
            errs.push(format!(
                "spec.volumes[{}].name: Duplicate value: \"{}\"",
                i, volume.name
            ));
        }
    }

    for (i, mount) in spec.volume_mounts.iter().enumerate() {
        if mount.name.is_empty() {
            errs.push(format!("spec.volumeMounts[{}].name: Required value", i));
        } else if !volume_names.contains(mount.name.as_str()) {
            errs.push(format!(
                "spec.volumeMounts[{}].name: Not found: \"{}\"",
                i, mount.name
            ));
        }
        if mount.mount_path.is_empty() {
            errs.push(format!("spec.volumeMounts[{}].mountPath: Required value", i));
        }
    }

    if errs.is_empty() {
        Ok(())
    } else {
        Err(KubeError::ValidationError(errs.join(", ")))
    }
}
