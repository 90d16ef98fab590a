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

//! PodPreset templates and the merge engine that applies them

pub mod admission;
pub mod merger;
pub mod types;
pub mod validator;

pub use self::admission::{
    applied_annotation_key, apply_pod_presets, conflict_message, filter_pod_presets,
    preset_names, record_conflict_event, safe_to_apply,
};
pub use self::merger::{ConflictReport, MergeConflict, MergeField};
pub use self::types::{pod_presets_from_yaml, PodPreset, PodPresetSpec};
pub use self::validator::validate_pod_preset;
