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

use crate::domain::selector::Selector;
use crate::infrastructure::constants::{
    PODPRESET_GROUP, PODPRESET_KIND, PODPRESET_PLURAL, PODPRESET_VERSION,
};
use crate::shared::error::Result;
use k8s_openapi::api::core::v1::{EnvFromSource, EnvVar, Volume, VolumeMount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::NamespaceResourceScope;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Injection template: everything a matching pod receives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodPresetSpec {
    #[serde(default)]
    pub selector: LabelSelector,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_from: Vec<EnvFromSource>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodPreset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: PodPresetSpec,
}

impl kube::Resource for PodPreset {
    type DynamicType = ();
    type Scope = NamespaceResourceScope;

    fn kind(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(PODPRESET_KIND)
    }

    fn group(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(PODPRESET_GROUP)
    }

    fn version(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(PODPRESET_VERSION)
    }

    fn plural(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(PODPRESET_PLURAL)
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl PodPreset {
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    pub fn resource_version(&self) -> &str {
        self.metadata.resource_version.as_deref().unwrap_or_default()
    }

    pub fn selector(&self) -> Result<Selector> {
        Selector::from_label_selector(&self.spec.selector)
    }
}

/// Parses every podpreset in a multi-document YAML stream. Empty
/// documents are skipped.
pub fn pod_presets_from_yaml(content: &str) -> Result<Vec<PodPreset>> {
    let mut presets = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        presets.push(serde_yaml::from_value(value)?);
    }
    Ok(presets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_camel_case_payload() {
        let yaml = r#"
apiVersion: settings.servicecatalog.k8s.io/v1alpha1
kind: PodPreset
metadata:
  name: allow-database
  namespace: myns
  resourceVersion: "7"
spec:
  selector:
    matchLabels:
      role: frontend
  env:
    - name: DB_PORT
      value: "6379"
  envFrom:
    - configMapRef:
        name: etcd-env-config
  volumeMounts:
    - mountPath: /cache
      name: cache-volume
  volumes:
    - name: cache-volume
      emptyDir: {}
"#;
        let preset: PodPreset = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(preset.name(), "allow-database");
        assert_eq!(preset.namespace(), "myns");
        assert_eq!(preset.resource_version(), "7");
        assert_eq!(preset.spec.env.len(), 1);
        assert_eq!(preset.spec.env_from.len(), 1);
        assert_eq!(preset.spec.volume_mounts[0].mount_path, "/cache");
        assert!(preset.spec.volumes[0].empty_dir.is_some());

        let selector = preset.selector().unwrap();
        assert_eq!(selector.to_string(), "role=frontend");
    }

    #[test]
    fn test_multi_document_stream() {
        let yaml = r#"
---
metadata:
  name: first
  namespace: ns
spec:
  env:
    - name: A
      value: "1"
---
---
metadata:
  name: second
  namespace: ns
spec:
  volumes:
    - name: cache
      emptyDir: {}
"#;
        let presets = pod_presets_from_yaml(yaml).unwrap();
        assert_eq!(presets.len(), 2);
        assert_eq!(presets[0].name(), "first");
        assert_eq!(presets[1].spec.volumes[0].name, "cache");
    }

    #[test]
    fn test_missing_lists_default_to_empty() {
        let preset: PodPreset = serde_yaml::from_str(
            "metadata:\n  name: empty\n  namespace: myns\nspec:\n  selector: {}\n",
        )
        .unwrap();
        assert!(preset.spec.env.is_empty());
        assert!(preset.spec.volumes.is_empty());
        assert!(preset.selector().unwrap().is_empty());
    }
}
