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

//! Conflict-safe merging of preset payloads into pod fields
//!
//! Every merger borrows its inputs and returns a fresh list. Presets are
//! walked in the order given and their entries in declared order, so the
//! output is the original list followed by whatever was new.

use crate::domain::podpreset::types::{PodPreset, PodPresetSpec};
use k8s_openapi::api::core::v1::{EnvFromSource, EnvVar, Volume, VolumeMount};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeField {
    Env,
    Volume,
    VolumeMount,
    MountPath,
}

impl MergeField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeField::Env => "env",
            MergeField::Volume => "volumes",
            MergeField::VolumeMount => "volume mounts",
            MergeField::MountPath => "volume mounts",
        }
    }
}

/// One entry that a preset wanted to add but that disagrees with what is
/// already there.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeConflict {
    pub preset: String,
    pub field: MergeField,
    pub key: String,
    pub existing: String,
    pub incoming: String,
}

impl fmt::Display for MergeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let on = match self.field {
            MergeField::MountPath => format!("mount path {}", self.key),
            _ => self.key.clone(),
        };
        write!(
            f,
            "merging {} for {} has a conflict on {}: {} does not match {}",
            self.field.as_str(),
            self.preset,
            on,
            self.incoming,
            self.existing
        )
    }
}

/// Every conflict found by one or more mergers, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Error)]
#[error("{}", render_conflicts(.0))]
pub struct ConflictReport(pub Vec<MergeConflict>);

fn render_conflicts(conflicts: &[MergeConflict]) -> String {
    let parts: Vec<String> = conflicts.iter().map(|c| c.to_string()).collect();
    match parts.len() {
        1 => parts.join(""),
        _ => format!("[{}]", parts.join(", ")),
    }
}

impl ConflictReport {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn conflicts(&self) -> &[MergeConflict] {
        &self.0
    }

    pub fn extend(&mut self, other: ConflictReport) {
        self.0.extend(other.0);
    }

    /// `Ok` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ConflictReport> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

fn describe<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn conflict<T: Serialize>(
    preset: &PodPreset,
    field: MergeField,
    key: &str,
    existing: &T,
    incoming: &T,
) -> MergeConflict {
    MergeConflict {
        preset: preset.name().to_string(),
        field,
        key: key.to_string(),
        existing: describe(existing),
        incoming: describe(incoming),
    }
}

/// Name-keyed merge shared by env vars and volumes.
fn merge_by_name<T, P, K>(
    orig: &[T],
    presets: &[Arc<PodPreset>],
    field: MergeField,
    payload: P,
    key: K,
) -> Result<Vec<T>, ConflictReport>
where
    T: Clone + PartialEq + Serialize,
    P: Fn(&PodPresetSpec) -> &[T],
    K: Fn(&T) -> &str,
{
    let mut seen: HashMap<&str, &T> = orig.iter().map(|v| (key(v), v)).collect();
    let mut merged = orig.to_vec();
    let mut report = ConflictReport::default();

    for preset in presets {
        for v in payload(&preset.spec) {
            match seen.get(key(v)) {
                None => {
                    seen.insert(key(v), v);
                    merged.push(v.clone());
                }
                Some(found) if *found != v => {
                    report.0.push(conflict(preset, field, key(v), *found, v));
                }
                Some(_) => {}
            }
        }
    }

    report.into_result().map(|_| merged)
}

pub fn merge_env(
    env: &[EnvVar],
    presets: &[Arc<PodPreset>],
) -> Result<Vec<EnvVar>, ConflictReport> {
    merge_by_name(env, presets, MergeField::Env, |s| s.env.as_slice(), |v| v.name.as_str())
}

/// Env sources only ever accumulate; overlapping prefixes are allowed.
pub fn merge_env_from(
    env_from: &[EnvFromSource],
    presets: &[Arc<PodPreset>],
) -> Vec<EnvFromSource> {
    env_from
        .iter()
        .chain(presets.iter().flat_map(|p| p.spec.env_from.iter()))
        .cloned()
        .collect()
}

/// An empty result means the pod had no volumes and gained none.
pub fn merge_volumes(
    volumes: &[Volume],
    presets: &[Arc<PodPreset>],
) -> Result<Vec<Volume>, ConflictReport> {
    merge_by_name(
        volumes,
        presets,
        MergeField::Volume,
        |s| s.volumes.as_slice(),
        |v| v.name.as_str(),
    )
}

/// Mounts are unique by name and, independently, by mount path. A new
/// name landing on a taken path is still appended, but reported.
pub fn merge_volume_mounts(
    mounts: &[VolumeMount],
    presets: &[Arc<PodPreset>],
) -> Result<Vec<VolumeMount>, ConflictReport> {
    let mut by_name: HashMap<&str, &VolumeMount> =
        mounts.iter().map(|m| (m.name.as_str(), m)).collect();
    let mut by_path: HashMap<&str, &VolumeMount> =
        mounts.iter().map(|m| (m.mount_path.as_str(), m)).collect();
    let mut merged = mounts.to_vec();
    let mut report = ConflictReport::default();

    for preset in presets {
        for m in &preset.spec.volume_mounts {
            match by_name.get(m.name.as_str()) {
                None => {
                    by_name.insert(&m.name, m);
                    merged.push(m.clone());
                }
                Some(found) if *found != m => {
                    report
                        .0
                        .push(conflict(preset, MergeField::VolumeMount, &m.name, *found, m));
                }
                Some(_) => {}
            }

            match by_path.get(m.mount_path.as_str()) {
                None => {
                    by_path.insert(&m.mount_path, m);
                }
                Some(found) if *found != m => {
                    report.0.push(conflict(
                        preset,
                        MergeField::MountPath,
                        &m.mount_path,
                        *found,
                        m,
                    ));
                }
                Some(_) => {}
            }
        }
    }

    report.into_result().map(|_| merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        ConfigMapEnvSource, EmptyDirVolumeSource, HostPathVolumeSource, SecretEnvSource,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn preset(spec: PodPresetSpec) -> Vec<Arc<PodPreset>> {
        vec![Arc::new(PodPreset {
            metadata: ObjectMeta {
                name: Some("test".to_string()),
                namespace: Some("namespace".to_string()),
                ..Default::default()
            },
            spec,
            ..Default::default()
        })]
    }

    fn env(pairs: &[(&str, &str)]) -> Vec<EnvVar> {
        pairs
            .iter()
            .map(|(n, v)| EnvVar {
                name: n.to_string(),
                value: Some(v.to_string()),
                ..Default::default()
            })
            .collect()
    }

    fn mount(name: &str, path: &str) -> VolumeMount {
        VolumeMount {
            name: name.to_string(),
            mount_path: path.to_string(),
            ..Default::default()
        }
    }

    fn empty_dir(name: &str) -> Volume {
        Volume {
            name: name.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        }
    }

    fn host_path(name: &str, path: &str) -> Volume {
        Volume {
            name: name.to_string(),
            host_path: Some(HostPathVolumeSource {
                path: path.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    // ===== env =====

    #[test]
    fn test_merge_env_empty_original() {
        let mod_env = env(&[("abc", "value2"), ("ABC", "value3")]);
        let presets = preset(PodPresetSpec {
            env: mod_env.clone(),
            ..Default::default()
        });
        assert_eq!(merge_env(&[], &presets).unwrap(), mod_env);
    }

    #[test]
    fn test_merge_env_appends_after_original() {
        let orig = env(&[("abcd", "value2"), ("hello", "value3")]);
        let presets = preset(PodPresetSpec {
            env: env(&[("abc", "value2"), ("ABC", "value3")]),
            ..Default::default()
        });
        let merged = merge_env(&orig, &presets).unwrap();
        assert_eq!(
            merged,
            env(&[
                ("abcd", "value2"),
                ("hello", "value3"),
                ("abc", "value2"),
                ("ABC", "value3")
            ])
        );
    }

    #[test]
    fn test_merge_env_conflict() {
        let orig = env(&[("abc", "value3")]);
        let presets = preset(PodPresetSpec {
            env: env(&[("abc", "value2"), ("ABC", "value3")]),
            ..Default::default()
        });
        let report = merge_env(&orig, &presets).unwrap_err();
        assert_eq!(report.len(), 1);
        let c = &report.conflicts()[0];
        assert_eq!(c.field, MergeField::Env);
        assert_eq!(c.key, "abc");
        assert_eq!(c.preset, "test");
        assert!(report.to_string().contains("merging env for test has a conflict on abc"));
    }

    #[test]
    fn test_merge_env_identical_entry_is_not_duplicated() {
        let orig = env(&[("abc", "value2"), ("hello", "value3")]);
        let presets = preset(PodPresetSpec {
            env: env(&[("abc", "value2"), ("ABC", "value3")]),
            ..Default::default()
        });
        let merged = merge_env(&orig, &presets).unwrap();
        assert_eq!(
            merged,
            env(&[("abc", "value2"), ("hello", "value3"), ("ABC", "value3")])
        );
        assert_eq!(merged.len(), orig.len() + 1);
    }

    #[test]
    fn test_merge_env_reports_every_conflict() {
        let orig = env(&[("a", "1"), ("b", "1")]);
        let presets = preset(PodPresetSpec {
            env: env(&[("a", "2"), ("b", "2")]),
            ..Default::default()
        });
        let report = merge_env(&orig, &presets).unwrap_err();
        let keys: Vec<&str> = report.conflicts().iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_merge_env_does_not_touch_inputs() {
        let orig = env(&[("abcd", "value2")]);
        let before = orig.clone();
        let presets = preset(PodPresetSpec {
            env: env(&[("abc", "value2")]),
            ..Default::default()
        });
        let _ = merge_env(&orig, &presets).unwrap();
        assert_eq!(orig, before);
        assert_eq!(presets[0].spec.env.len(), 1);
    }

    #[test]
    fn test_merge_env_is_idempotent() {
        let orig = env(&[("abcd", "value2")]);
        let presets = preset(PodPresetSpec {
            env: env(&[("abc", "value2"), ("ABC", "value3")]),
            ..Default::default()
        });
        let once = merge_env(&orig, &presets).unwrap();
        let twice = merge_env(&once, &presets).unwrap();
        assert_eq!(once, twice);
    }

    // ===== envFrom =====

    fn config_map_source(name: &str) -> EnvFromSource {
        EnvFromSource {
            config_map_ref: Some(ConfigMapEnvSource {
                name: name.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn secret_source(name: &str) -> EnvFromSource {
        EnvFromSource {
            secret_ref: Some(SecretEnvSource {
                name: name.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_env_from_empty_original() {
        let sources = vec![config_map_source("abc"), secret_source("abc")];
        let presets = preset(PodPresetSpec {
            env_from: sources.clone(),
            ..Default::default()
        });
        assert_eq!(merge_env_from(&[], &presets), sources);
    }

    #[test]
    fn test_merge_env_from_keeps_duplicates() {
        let orig = vec![config_map_source("thing")];
        let presets = preset(PodPresetSpec {
            env_from: vec![config_map_source("abc"), config_map_source("thing")],
            ..Default::default()
        });
        assert_eq!(
            merge_env_from(&orig, &presets),
            vec![
                config_map_source("thing"),
                config_map_source("abc"),
                config_map_source("thing")
            ]
        );
    }

    // ===== volumeMounts =====

    #[test]
    fn test_merge_volume_mounts_empty_original() {
        let presets = preset(PodPresetSpec {
            volume_mounts: vec![mount("simply-mounted-volume", "/opt/")],
            ..Default::default()
        });
        assert_eq!(
            merge_volume_mounts(&[], &presets).unwrap(),
            vec![mount("simply-mounted-volume", "/opt/")]
        );
    }

    #[test]
    fn test_merge_volume_mounts_appends_after_original() {
        let orig = vec![mount("etc-volume", "/etc/")];
        let presets = preset(PodPresetSpec {
            volume_mounts: vec![mount("simply-mounted-volume", "/opt/")],
            ..Default::default()
        });
        assert_eq!(
            merge_volume_mounts(&orig, &presets).unwrap(),
            vec![
                mount("etc-volume", "/etc/"),
                mount("simply-mounted-volume", "/opt/")
            ]
        );
    }

    #[test]
    fn test_merge_volume_mounts_name_conflict() {
        let orig = vec![mount("etc-volume", "/etc/")];
        let presets = preset(PodPresetSpec {
            volume_mounts: vec![
                mount("simply-mounted-volume", "/opt/"),
                mount("etc-volume", "/things/"),
            ],
            ..Default::default()
        });
        let report = merge_volume_mounts(&orig, &presets).unwrap_err();
        assert_eq!(report.len(), 1);
        assert_eq!(report.conflicts()[0].field, MergeField::VolumeMount);
        assert_eq!(report.conflicts()[0].key, "etc-volume");
    }

    #[test]
    fn test_merge_volume_mounts_path_conflict() {
        let orig = vec![mount("etc-volume", "/etc/")];
        let presets = preset(PodPresetSpec {
            volume_mounts: vec![
                mount("simply-mounted-volume", "/opt/"),
                mount("things-volume", "/etc/"),
            ],
            ..Default::default()
        });
        let report = merge_volume_mounts(&orig, &presets).unwrap_err();
        assert_eq!(report.len(), 1);
        let c = &report.conflicts()[0];
        assert_eq!(c.field, MergeField::MountPath);
        assert_eq!(c.key, "/etc/");
        assert!(report.to_string().contains("conflict on mount path /etc/"));
    }

    #[test]
    fn test_merge_volume_mounts_name_and_path_conflict_reported_separately() {
        let orig = vec![mount("etc-volume", "/etc/"), mount("opt-volume", "/opt/")];
        let presets = preset(PodPresetSpec {
            volume_mounts: vec![mount("etc-volume", "/opt/")],
            ..Default::default()
        });
        let report = merge_volume_mounts(&orig, &presets).unwrap_err();
        let fields: Vec<MergeField> = report.conflicts().iter().map(|c| c.field).collect();
        assert_eq!(fields, vec![MergeField::VolumeMount, MergeField::MountPath]);
    }

    #[test]
    fn test_merge_volume_mounts_identical_entries() {
        let orig = vec![
            mount("etc-volume", "/etc/"),
            mount("simply-mounted-volume", "/opt/"),
        ];
        let presets = preset(PodPresetSpec {
            volume_mounts: vec![
                mount("etc-volume", "/etc/"),
                mount("simply-mounted-volume", "/opt/"),
            ],
            ..Default::default()
        });
        assert_eq!(merge_volume_mounts(&orig, &presets).unwrap(), orig);
    }

    // ===== volumes =====

    #[test]
    fn test_merge_volumes_empty_original() {
        let presets = preset(PodPresetSpec {
            volumes: vec![empty_dir("vol"), empty_dir("vol2")],
            ..Default::default()
        });
        assert_eq!(
            merge_volumes(&[], &presets).unwrap(),
            vec![empty_dir("vol"), empty_dir("vol2")]
        );
    }

    #[test]
    fn test_merge_volumes_appends_after_original() {
        let orig = vec![empty_dir("vol3"), empty_dir("vol4")];
        let presets = preset(PodPresetSpec {
            volumes: vec![empty_dir("vol"), empty_dir("vol2")],
            ..Default::default()
        });
        assert_eq!(
            merge_volumes(&orig, &presets).unwrap(),
            vec![
                empty_dir("vol3"),
                empty_dir("vol4"),
                empty_dir("vol"),
                empty_dir("vol2")
            ]
        );
    }

    #[test]
    fn test_merge_volumes_conflict_on_source() {
        let orig = vec![empty_dir("vol3"), empty_dir("vol4")];
        let presets = preset(PodPresetSpec {
            volumes: vec![host_path("vol3", "/etc/apparmor.d"), empty_dir("vol2")],
            ..Default::default()
        });
        let report = merge_volumes(&orig, &presets).unwrap_err();
        assert_eq!(report.len(), 1);
        assert_eq!(report.conflicts()[0].key, "vol3");
        assert!(report.conflicts()[0].incoming.contains("apparmor"));
    }

    #[test]
    fn test_merge_volumes_skips_identical() {
        let orig = vec![empty_dir("vol3"), empty_dir("vol4")];
        let presets = preset(PodPresetSpec {
            volumes: vec![empty_dir("vol3"), empty_dir("vol2")],
            ..Default::default()
        });
        assert_eq!(
            merge_volumes(&orig, &presets).unwrap(),
            vec![empty_dir("vol3"), empty_dir("vol4"), empty_dir("vol2")]
        );
    }

    #[test]
    fn test_merge_volumes_nothing_to_merge() {
        let presets = preset(PodPresetSpec::default());
        assert!(merge_volumes(&[], &presets).unwrap().is_empty());
    }

    #[test]
    fn test_conflicts_across_presets_name_each_preset() {
        let mut presets = preset(PodPresetSpec {
            env: env(&[("abc", "one")]),
            ..Default::default()
        });
        presets.push(Arc::new(PodPreset {
            metadata: ObjectMeta {
                name: Some("second".to_string()),
                ..Default::default()
            },
            spec: PodPresetSpec {
                env: env(&[("abc", "two")]),
                ..Default::default()
            },
            ..Default::default()
        }));
        let report = merge_env(&[], &presets).unwrap_err();
        assert_eq!(report.len(), 1);
        assert_eq!(report.conflicts()[0].preset, "second");
    }
}
