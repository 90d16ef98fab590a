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

//! Label selector engine
//!
//! Compiles key/operator/values requirements into a matcher over a label
//! map. A selector is the conjunction of its requirements; an empty selector
//! matches every label set.

use crate::infrastructure::constants::{LABEL_NAME_MAX_LENGTH, LABEL_PREFIX_MAX_LENGTH};
use crate::shared::error::{KubeError, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
    Equals,
    DoubleEquals,
    NotEquals,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::In => "in",
            Operator::NotIn => "notin",
            Operator::Exists => "exists",
            Operator::DoesNotExist => "!",
            Operator::Equals => "=",
            Operator::DoubleEquals => "==",
            Operator::NotEquals => "!=",
        }
    }

    fn expected_values(&self) -> ValueCount {
        match self {
            Operator::In | Operator::NotIn => ValueCount::AtLeastOne,
            Operator::Equals | Operator::DoubleEquals | Operator::NotEquals => {
                ValueCount::ExactlyOne
            }
            Operator::Exists | Operator::DoesNotExist => ValueCount::None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = KubeError;

    /// Accepts both the `LabelSelectorRequirement` operator names and the
    /// canonical string tokens.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "In" | "in" => Ok(Operator::In),
            "NotIn" | "notin" => Ok(Operator::NotIn),
            "Exists" | "exists" => Ok(Operator::Exists),
            "DoesNotExist" | "!" => Ok(Operator::DoesNotExist),
            "=" => Ok(Operator::Equals),
            "==" => Ok(Operator::DoubleEquals),
            "!=" => Ok(Operator::NotEquals),
            _ => Err(KubeError::invalid_requirement(format!(
                "{:?} is not a valid label selector operator",
                s
            ))),
        }
    }
}

enum ValueCount {
    None,
    ExactlyOne,
    AtLeastOne,
}

/// A single `key op values` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    key: String,
    operator: Operator,
    values: BTreeSet<String>,
}

impl Requirement {
    pub fn new<I, S>(key: impl Into<String>, operator: Operator, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = key.into();
        validate_label_key(&key)?;

        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        match operator.expected_values() {
            ValueCount::AtLeastOne if values.is_empty() => {
                return Err(KubeError::invalid_requirement(format!(
                    "{}: for 'in', 'notin' operators, values set can't be empty",
                    key
                )));
            }
            ValueCount::ExactlyOne if values.len() != 1 => {
                return Err(KubeError::invalid_requirement(format!(
                    "{}: exact-match compatibility requires one single value",
                    key
                )));
            }
            ValueCount::None if !values.is_empty() => {
                return Err(KubeError::invalid_requirement(format!(
                    "{}: values set must be empty for exists and does not exist",
                    key
                )));
            }
            _ => {}
        }

        Ok(Self {
            key,
            operator,
            values,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::In | Operator::Equals | Operator::DoubleEquals => {
                value.is_some_and(|v| self.values.contains(v))
            }
            Operator::NotIn => value.map_or(true, |v| !self.values.contains(v)),
            // A missing key never satisfies `!=`, unlike `notin`.
            Operator::NotEquals => value.is_some_and(|v| !self.values.contains(v)),
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .values
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",");

        match self.operator {
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
            Operator::In | Operator::NotIn => {
                write!(f, "{} {} ({})", self.key, self.operator, joined)
            }
            Operator::Equals | Operator::DoubleEquals | Operator::NotEquals => {
                write!(f, "{}{}{}", self.key, self.operator, joined)
            }
        }
    }
}

/// Conjunction of requirements, kept sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn new(requirements: Vec<Requirement>) -> Self {
        Self::everything().add(requirements)
    }

    /// Returns a new selector holding this selector's requirements plus
    /// `requirements`.
    pub fn add(&self, requirements: impl IntoIterator<Item = Requirement>) -> Self {
        let mut merged = self.requirements.clone();
        merged.extend(requirements);
        merged.sort_by(|a, b| a.key.cmp(&b.key));
        Self {
            requirements: merged,
        }
    }

    /// Converts the Kubernetes wire form. `matchLabels` entries become
    /// equality requirements.
    pub fn from_label_selector(selector: &LabelSelector) -> Result<Self> {
        let mut requirements = Vec::new();

        if let Some(match_labels) = &selector.match_labels {
            for (key, value) in match_labels {
                requirements.push(Requirement::new(
                    key.clone(),
                    Operator::Equals,
                    [value.clone()],
                )?);
            }
        }

        if let Some(expressions) = &selector.match_expressions {
            for expr in expressions {
                let operator = match expr.operator.as_str() {
                    "In" => Operator::In,
                    "NotIn" => Operator::NotIn,
                    "Exists" => Operator::Exists,
                    "DoesNotExist" => Operator::DoesNotExist,
                    other => {
                        return Err(KubeError::invalid_requirement(format!(
                            "{:?} is not a valid pod selector operator",
                            other
                        )))
                    }
                };
                requirements.push(Requirement::new(
                    expr.key.clone(),
                    operator,
                    expr.values.clone().unwrap_or_default(),
                )?);
            }
        }

        Ok(Self::new(requirements))
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.requirements.iter().map(|r| r.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

fn label_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]$").unwrap())
}

fn dns_subdomain_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").unwrap()
    })
}

/// Checks the `[prefix/]name` label key grammar.
pub(crate) fn validate_label_key(key: &str) -> Result<()> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix {
        if prefix.is_empty()
            || prefix.len() > LABEL_PREFIX_MAX_LENGTH
            || !dns_subdomain_regex().is_match(prefix)
        {
            return Err(KubeError::invalid_requirement(format!(
                "invalid label key {:?}: prefix part must be a lowercase DNS subdomain",
                key
            )));
        }
    }

    if name.is_empty() || name.len() > LABEL_NAME_MAX_LENGTH || !label_name_regex().is_match(name)
    {
        return Err(KubeError::invalid_requirement(format!(
            "invalid label key {:?}: name part must consist of alphanumeric characters, '-', '_' or '.', \
            and must start and end with an alphanumeric character (max {} chars)",
            key, LABEL_NAME_MAX_LENGTH
        )));
    }

    Ok(())
}
