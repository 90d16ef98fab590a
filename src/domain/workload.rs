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

//! Pod-shaped workload awaiting initialization
//!
//! `ObjectMeta` from k8s-openapi no longer carries `metadata.initializers`,
//! so the workload keeps the pending list next to the regular metadata and
//! flattens both into the same JSON object on the wire.

use crate::infrastructure::constants::{
    MIRROR_POD_ANNOTATION_KEY, PODPRESET_INITIALIZER_NAME, PODPRESET_OPT_OUT_ANNOTATION_KEY,
    POD_KIND, POD_PLURAL, POD_VERSION,
};
use crate::shared::error::{KubeError, Result};
use k8s_openapi::api::core::v1::{ObjectReference, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::NamespaceResourceScope;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Initializer {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Initializers {
    #[serde(default)]
    pub pending: Vec<Initializer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadMeta {
    #[serde(flatten)]
    pub object: ObjectMeta,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializers: Option<Initializers>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    pub metadata: WorkloadMeta,

    #[serde(default)]
    pub spec: PodSpec,
}

impl kube::Resource for Workload {
    type DynamicType = ();
    type Scope = NamespaceResourceScope;

    fn kind(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(POD_KIND)
    }

    fn group(_: &()) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn version(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(POD_VERSION)
    }

    fn plural(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(POD_PLURAL)
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata.object
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata.object
    }
}

impl Workload {
    pub fn name(&self) -> &str {
        self.metadata.object.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.metadata.object.namespace.as_deref().unwrap_or_default()
    }

    pub fn labels(&self) -> Cow<'_, BTreeMap<String, String>> {
        match &self.metadata.object.labels {
            Some(labels) => Cow::Borrowed(labels),
            None => Cow::Owned(BTreeMap::new()),
        }
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata
            .object
            .annotations
            .as_ref()
            .and_then(|a| a.get(key))
            .map(String::as_str)
    }

    pub fn pending_initializers(&self) -> &[Initializer] {
        self.metadata
            .initializers
            .as_ref()
            .map(|i| i.pending.as_slice())
            .unwrap_or_default()
    }

    /// `<namespace>/<name>`, or just `<name>` when the namespace is empty.
    pub fn key(&self) -> String {
        meta_namespace_key(self.namespace(), self.name())
    }

    /// True when this controller's initializer is at the head of the
    /// pending list.
    pub fn needs_initialization(&self) -> bool {
        self.pending_initializers()
            .first()
            .is_some_and(|i| i.name == PODPRESET_INITIALIZER_NAME)
    }

    /// Pods annotated with the opt-out key or mirrored from a static
    /// manifest never receive presets.
    pub fn is_excluded(&self) -> bool {
        self.annotation(PODPRESET_OPT_OUT_ANNOTATION_KEY) == Some("true")
            || self.annotation(MIRROR_POD_ANNOTATION_KEY).is_some()
    }

    /// Removes the head initializer. When it was the only one, the whole
    /// initializers block is cleared so the pod counts as initialized.
    pub fn mark_initialization_done(&mut self) {
        if let Some(initializers) = self.metadata.initializers.as_mut() {
            if initializers.pending.len() <= 1 {
                self.metadata.initializers = None;
            } else {
                initializers.pending.remove(0);
            }
        }
    }

    pub fn controller_owner(&self) -> Option<&OwnerReference> {
        self.metadata
            .object
            .owner_references
            .as_ref()?
            .iter()
            .find(|r| r.controller == Some(true))
    }

    pub fn object_reference(&self) -> ObjectReference {
        ObjectReference {
            kind: Some(POD_KIND.to_string()),
            api_version: Some(POD_VERSION.to_string()),
            name: self.metadata.object.name.clone(),
            namespace: self.metadata.object.namespace.clone(),
            uid: self.metadata.object.uid.clone(),
            ..Default::default()
        }
    }

    /// Reference to the immediate controlling owner, in the pod's namespace.
    pub fn owner_object_reference(&self) -> Option<ObjectReference> {
        self.controller_owner().map(|owner| ObjectReference {
            kind: Some(owner.kind.clone()),
            api_version: Some(owner.api_version.clone()),
            name: Some(owner.name.clone()),
            namespace: self.metadata.object.namespace.clone(),
            uid: Some(owner.uid.clone()),
            ..Default::default()
        })
    }
}

pub fn meta_namespace_key(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", namespace, name)
    }
}

/// Splits a `<namespace>/<name>` key; a bare name has an empty namespace.
pub fn split_meta_namespace_key(key: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = key.split('/').collect();
    match parts.as_slice() {
        [name] if !name.is_empty() => Ok((String::new(), name.to_string())),
        [namespace, name] if !name.is_empty() => Ok((namespace.to_string(), name.to_string())),
        _ => Err(KubeError::malformed_key(key, "unexpected key format")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(names: &[&str]) -> Workload {
        Workload {
            metadata: WorkloadMeta {
                object: ObjectMeta {
                    name: Some("pod1".to_string()),
                    namespace: Some("test-ns".to_string()),
                    ..Default::default()
                },
                initializers: Some(Initializers {
                    pending: names
                        .iter()
                        .map(|n| Initializer {
                            name: n.to_string(),
                        })
                        .collect(),
                }),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_needs_initialization() {
        assert!(pending(&[PODPRESET_INITIALIZER_NAME]).needs_initialization());
        assert!(pending(&[PODPRESET_INITIALIZER_NAME, "other.k8s.io"]).needs_initialization());
        assert!(!pending(&["other.k8s.io", PODPRESET_INITIALIZER_NAME]).needs_initialization());
        assert!(!pending(&[]).needs_initialization());
        assert!(!Workload::default().needs_initialization());
    }

    #[test]
    fn test_mark_initialization_done() {
        let mut only = pending(&[PODPRESET_INITIALIZER_NAME]);
        only.mark_initialization_done();
        assert!(only.metadata.initializers.is_none());

        let mut several = pending(&[PODPRESET_INITIALIZER_NAME, "other.k8s.io"]);
        several.mark_initialization_done();
        assert_eq!(several.pending_initializers().len(), 1);
        assert_eq!(several.pending_initializers()[0].name, "other.k8s.io");
    }

    #[test]
    fn test_key_round_trip() {
        assert_eq!(pending(&[]).key(), "test-ns/pod1");
        assert_eq!(
            split_meta_namespace_key("test-ns/pod1").unwrap(),
            ("test-ns".to_string(), "pod1".to_string())
        );
        assert_eq!(
            split_meta_namespace_key("pod1").unwrap(),
            (String::new(), "pod1".to_string())
        );
        assert!(split_meta_namespace_key("a/b/c").is_err());
        assert!(split_meta_namespace_key("ns/").is_err());
        assert!(split_meta_namespace_key("").is_err());
    }

    #[test]
    fn test_exclusion_annotations() {
        let mut pod = pending(&[PODPRESET_INITIALIZER_NAME]);
        assert!(!pod.is_excluded());

        pod.metadata.object.annotations = Some(BTreeMap::from([(
            PODPRESET_OPT_OUT_ANNOTATION_KEY.to_string(),
            "true".to_string(),
        )]));
        assert!(pod.is_excluded());

        pod.metadata.object.annotations = Some(BTreeMap::from([(
            MIRROR_POD_ANNOTATION_KEY.to_string(),
            String::new(),
        )]));
        assert!(pod.is_excluded());
    }

    #[test]
    fn test_deserialize_pending_initializers() {
        let pod: Workload = serde_json::from_value(serde_json::json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": "pod1",
                "namespace": "test-ns",
                "resourceVersion": "42",
                "labels": {"security": "S2"},
                "initializers": {"pending": [{"name": PODPRESET_INITIALIZER_NAME}]}
            },
            "spec": {"containers": [{"name": "app", "image": "nginx"}]}
        }))
        .unwrap();

        assert!(pod.needs_initialization());
        assert_eq!(pod.metadata.object.resource_version.as_deref(), Some("42"));
        assert_eq!(pod.labels().get("security").map(String::as_str), Some("S2"));
        assert_eq!(pod.spec.containers.len(), 1);

        let value = serde_json::to_value(&pod).unwrap();
        assert_eq!(
            value["metadata"]["initializers"]["pending"][0]["name"],
            PODPRESET_INITIALIZER_NAME
        );
        assert_eq!(value["metadata"]["name"], "pod1");
    }
}
