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

/// Initializer slot owned by this controller
pub const PODPRESET_INITIALIZER_NAME: &str = "podpreset.initializer.k8s.io";

/// Applied-record annotations
pub const ANNOTATION_PREFIX: &str = "podpreset.admission.kubernetes.io";
pub const ANNOTATION_PRESET_PREFIX: &str = "podpreset-";

/// Pod annotations that suppress injection
pub const PODPRESET_OPT_OUT_ANNOTATION_KEY: &str = "podpreset.admission.kubernetes.io/exclude";
pub const MIRROR_POD_ANNOTATION_KEY: &str = "kubernetes.io/config.mirror";

/// Events
pub const EVENT_REASON_PODPRESET: &str = "PodPreset";
pub const EVENT_ACTION_INITIALIZE: &str = "Initialize";
pub const EVENT_REPORTER: &str = "podpreset-initializer";

/// PodPreset resource coordinates
pub const PODPRESET_GROUP: &str = "settings.servicecatalog.k8s.io";
pub const PODPRESET_VERSION: &str = "v1alpha1";
pub const PODPRESET_KIND: &str = "PodPreset";
pub const PODPRESET_PLURAL: &str = "podpresets";

/// Workload resource coordinates
pub const POD_KIND: &str = "Pod";
pub const POD_VERSION: &str = "v1";
pub const POD_PLURAL: &str = "pods";

/// Controller defaults
pub const DEFAULT_WORKERS: usize = 2;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 10000;

/// Work queue defaults
pub const DEFAULT_BASE_DELAY_MS: u64 = 10;
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;
pub const DEFAULT_QPS: f64 = 10.0;
pub const DEFAULT_BURST: u32 = 100;

/// Label key limits
pub const LABEL_NAME_MAX_LENGTH: usize = 63;
pub const LABEL_PREFIX_MAX_LENGTH: usize = 253;
