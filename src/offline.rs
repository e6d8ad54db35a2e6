// (C) Copyright IBM Corp. 2025.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;
use std::io::Cursor;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use log::debug;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::context::EvaluationContext;
use crate::errors::{DeserializationError, Error, Result};
use crate::evaluator::{FeatureEvaluator, FeatureIdStream};
use crate::models::Variant;

/// Feature configuration in data-exchange format (typically JSON encoded),
/// as consumed by the [`OfflineEvaluator`].
#[derive(Debug, Clone, Deserialize)]
pub struct FlagsConfiguration {
    pub features: Vec<FeatureConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureConfig {
    pub feature_id: String,
    pub enabled: bool,
    #[serde(default = "default_rollout_percentage")]
    pub rollout_percentage: u32,
    #[serde(default)]
    pub active_window: Option<ActiveWindow>,
    #[serde(default)]
    pub variants: Vec<VariantConfig>,
}

/// Time window outside of which a feature evaluates to disabled.
/// Open bounds are allowed on either side.
#[derive(Debug, Clone, Deserialize)]
pub struct ActiveWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl ActiveWindow {
    pub(crate) fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| now >= start) && self.end.is_none_or(|end| now < end)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariantConfig {
    pub name: String,
    pub value: serde_json::Value,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_rollout_percentage() -> u32 {
    100
}

fn default_weight() -> u32 {
    1
}

/// A [`FeatureEvaluator`] backed by a local configuration file.
///
/// Enablement combines the configured flag, an optional active window and a
/// percentage rollout hashed on `<entity_id>:<feature_id>`. Variants are
/// assigned by weight using the same hash. Both make evaluation
/// time-dependent and entity-dependent, which is exactly why callers should
/// query it through a [`FeatureSnapshot`](crate::FeatureSnapshot) within one
/// request.
#[derive(Debug)]
pub struct OfflineEvaluator {
    features: HashMap<String, FeatureConfig>,
}

impl OfflineEvaluator {
    /// Creates an evaluator from a configuration file.
    pub fn new(filepath: &std::path::Path) -> Result<Self> {
        let file = std::fs::File::open(filepath).map_err(|_| {
            Error::Other(format!(
                "File '{}' doesn't exist or cannot be read",
                filepath.display()
            ))
        })?;
        let reader = std::io::BufReader::new(file);

        let configuration: FlagsConfiguration =
            serde_json::from_reader(reader).map_err(|e| DeserializationError {
                string: format!(
                    "Error deserializing FlagsConfiguration from file '{}'",
                    filepath.display()
                ),
                reason: e.to_string(),
            })?;

        debug!(
            "Loaded {} features from '{}'",
            configuration.features.len(),
            filepath.display()
        );
        Ok(Self::from_configuration(configuration))
    }

    pub fn from_configuration(configuration: FlagsConfiguration) -> Self {
        let features = configuration
            .features
            .into_iter()
            .map(|feature| (feature.feature_id.clone(), feature))
            .collect();
        Self { features }
    }

    fn feature(&self, feature_id: &str) -> Result<&FeatureConfig> {
        self.features
            .get(feature_id)
            .ok_or_else(|| Error::FeatureDoesNotExist {
                feature_id: feature_id.to_string(),
            })
    }

    fn evaluate_enabled(&self, feature_id: &str, tag: &str, now: DateTime<Utc>) -> Result<bool> {
        let feature = self.feature(feature_id)?;
        if !feature.enabled {
            return Ok(false);
        }
        if let Some(window) = &feature.active_window {
            if !window.contains(now) {
                return Ok(false);
            }
        }
        Ok(feature.rollout_percentage == 100 || random_value(tag)? < feature.rollout_percentage)
    }

    fn assign_variant(&self, feature_id: &str, tag: &str, now: DateTime<Utc>) -> Result<Variant> {
        let feature = self.feature(feature_id)?;
        let first = feature.variants.first().ok_or_else(|| {
            Error::Other(format!(
                "Feature '{feature_id}' has no variants configured"
            ))
        })?;

        // A disabled (or out-of-window) feature assigns the first listed
        // variant, which is the default arm by convention.
        if !self.evaluate_enabled(feature_id, tag, now)? {
            return Ok(Variant::new(&first.name, first.value.clone()));
        }

        let total: u32 = feature.variants.iter().map(|v| v.weight).sum();
        if total == 0 {
            return Err(Error::Other(format!(
                "Variant weights for feature '{feature_id}' sum up to zero"
            )));
        }

        let mut point = hash_tag(tag)? % total;
        for variant in &feature.variants {
            if point < variant.weight {
                return Ok(Variant::new(&variant.name, variant.value.clone()));
            }
            point -= variant.weight;
        }

        // point < total and the weights sum up to total, so the loop above
        // always returns.
        Err(Error::Other(format!(
            "Variant weights for feature '{feature_id}' are inconsistent"
        )))
    }
}

#[async_trait]
impl FeatureEvaluator for OfflineEvaluator {
    async fn is_enabled(&self, feature_id: &str, cancellation: &CancellationToken) -> Result<bool> {
        ensure_not_cancelled(feature_id, cancellation)?;
        self.evaluate_enabled(feature_id, feature_id, Utc::now())
    }

    async fn is_enabled_for(
        &self,
        feature_id: &str,
        context: &EvaluationContext,
        cancellation: &CancellationToken,
    ) -> Result<bool> {
        ensure_not_cancelled(feature_id, cancellation)?;
        let tag = rollout_tag(&context.entity_id, feature_id);
        self.evaluate_enabled(feature_id, &tag, Utc::now())
    }

    async fn get_variant(
        &self,
        feature_id: &str,
        cancellation: &CancellationToken,
    ) -> Result<Variant> {
        ensure_not_cancelled(feature_id, cancellation)?;
        self.assign_variant(feature_id, feature_id, Utc::now())
    }

    async fn get_variant_for(
        &self,
        feature_id: &str,
        context: &EvaluationContext,
        cancellation: &CancellationToken,
    ) -> Result<Variant> {
        ensure_not_cancelled(feature_id, cancellation)?;
        let tag = rollout_tag(&context.entity_id, feature_id);
        self.assign_variant(feature_id, &tag, Utc::now())
    }

    fn feature_ids<'a>(&'a self, cancellation: &'a CancellationToken) -> FeatureIdStream<'a> {
        let ids: Vec<String> = self.features.keys().cloned().collect();
        Box::pin(futures::stream::iter(ids).map(move |id| {
            if cancellation.is_cancelled() {
                Err(Error::Cancelled { feature_id: id })
            } else {
                Ok(id)
            }
        }))
    }
}

fn ensure_not_cancelled(feature_id: &str, cancellation: &CancellationToken) -> Result<()> {
    if cancellation.is_cancelled() {
        return Err(Error::Cancelled {
            feature_id: feature_id.to_string(),
        });
    }
    Ok(())
}

fn rollout_tag(entity_id: &str, feature_id: &str) -> String {
    format!("{entity_id}:{feature_id}")
}

fn hash_tag(tag: &str) -> Result<u32> {
    murmur3::murmur3_32(&mut Cursor::new(tag), 0)
        .map_err(|e| Error::Other(format!("Cannot hash rollout tag '{tag}': {e}")))
}

/// Maps a rollout tag to a stable value in `0..100`.
fn random_value(tag: &str) -> Result<u32> {
    Ok(hash_tag(tag)? % 100)
}
