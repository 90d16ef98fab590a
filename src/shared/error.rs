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

use thiserror::Error;
pub type Result<T> = std::result::Result<T, KubeError>;

#[derive(Error, Debug)]
pub enum KubeError {
    #[error("Kubernetes API error: {0}")]
    KubeError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Resource not found: {resource_type} '{name}' in namespace '{namespace}'")]
    NotFound {
        resource_type: String,
        name: String,
        namespace: String,
    },

    #[error("Malformed key '{key}': {reason}")]
    MalformedKey { key: String, reason: String },

    #[error("Invalid requirement: {0}")]
    InvalidRequirement(String),

    #[error("Label selector conversion failed for podpreset '{preset}': {source}")]
    SelectorError {
        preset: String,
        #[source]
        source: Box<KubeError>,
    },

    #[error("Failed to update {kind} '{name}': {message}")]
    WriteError {
        kind: String,
        name: String,
        message: String,
    },

    #[error("Conflict updating {kind} '{name}', object has been modified: {message}")]
    RetryableWriteError {
        kind: String,
        name: String,
        message: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl From<kube::Error> for KubeError {
    fn from(err: kube::Error) -> Self {
        KubeError::KubeError(err.to_string())
    }
}

impl KubeError {
    pub fn config_error(context: impl Into<String>) -> Self {
        Self::ConfigError(context.into())
    }

    pub fn not_found(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    pub fn malformed_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_requirement(context: impl Into<String>) -> Self {
        Self::InvalidRequirement(context.into())
    }

    pub fn selector_error(preset: impl Into<String>, source: KubeError) -> Self {
        Self::SelectorError {
            preset: preset.into(),
            source: Box::new(source),
        }
    }

    /// Maps an API failure from a replace call. A 409 means the cached copy
    /// was stale and the write may succeed on a later pass.
    pub fn from_write(kind: &str, name: &str, err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 409 => Self::RetryableWriteError {
                kind: kind.to_string(),
                name: name.to_string(),
                message: ae.message,
            },
            e => Self::WriteError {
                kind: kind.to_string(),
                name: name.to_string(),
                message: e.to_string(),
            },
        }
    }

    /// Whether the work queue should requeue the key that produced this error.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotFound { .. } | Self::MalformedKey { .. })
    }
}
