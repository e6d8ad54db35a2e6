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
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use log::debug;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::context::EvaluationContext;
use crate::errors::Result;
use crate::evaluator::FeatureEvaluator;
use crate::models::Variant;

/// The shared pending unit concurrent callers of one feature wait on.
type EnabledCell = Arc<OnceCell<Result<bool>>>;

/// A request-scoped view of feature state that guarantees consistent answers.
///
/// A snapshot wraps exactly one [`FeatureEvaluator`] and memoizes its
/// results per feature id, so that repeated checks of the same feature
/// within one logical request observe identical outcomes even if the
/// evaluator is non-deterministic or its configuration changes underneath.
///
/// Create one snapshot per request scope and drop it with the request. The
/// caches live and die with the instance and are never shared between
/// instances.
///
/// Consistency guarantees per operation:
///
/// * [`is_enabled`](Self::is_enabled) / [`is_enabled_for`](Self::is_enabled_for):
///   at most one evaluator call per feature id, even under concurrent
///   callers. All callers converge on the result of the first evaluation,
///   including a failed one. Both methods share one cache keyed by the bare
///   feature id, so the context seen by the evaluator is the one supplied by
///   whichever call populated the entry.
/// * [`get_variant`](Self::get_variant) / [`get_variant_for`](Self::get_variant_for):
///   memoized, but without the at-most-once guarantee. Racing first-time
///   callers for the same feature may each reach the evaluator; the last
///   writer wins the cache slot and every caller still receives a valid
///   variant. Failed assignments are not cached and are retried by later
///   callers.
/// * [`get_feature_ids`](Self::get_feature_ids): the id list is drained from
///   the evaluator once and replayed verbatim afterwards. A failure mid-way
///   caches nothing; the next call re-drains from scratch.
pub struct FeatureSnapshot {
    evaluator: Arc<dyn FeatureEvaluator>,
    enabled_cache: Mutex<HashMap<String, EnabledCell>>,
    variant_cache: Mutex<HashMap<String, Variant>>,
    feature_ids: OnceCell<Vec<String>>,
}

impl FeatureSnapshot {
    /// Creates a snapshot over the given evaluator.
    ///
    /// Nothing is evaluated up-front; every cache entry is populated lazily
    /// by the first query that needs it.
    pub fn new(evaluator: Arc<dyn FeatureEvaluator>) -> Self {
        Self {
            evaluator,
            enabled_cache: Mutex::new(HashMap::new()),
            variant_cache: Mutex::new(HashMap::new()),
            feature_ids: OnceCell::new(),
        }
    }

    /// Returns all feature ids known to the wrapped evaluator.
    ///
    /// The first successful call materializes the evaluator's id stream in
    /// full; later calls replay the cached list without touching the
    /// evaluator again, even if its universe changed in between. Concurrent
    /// first-time callers are serialized so the drain happens at most once.
    pub async fn get_feature_ids(&self, cancellation: &CancellationToken) -> Result<Vec<String>> {
        let ids = self
            .feature_ids
            .get_or_try_init(|| self.drain_feature_ids(cancellation))
            .await?;
        Ok(ids.clone())
    }

    /// Evaluates whether the feature is enabled, at most once per snapshot.
    pub async fn is_enabled(
        &self,
        feature_id: &str,
        cancellation: &CancellationToken,
    ) -> Result<bool> {
        let cell = self.enabled_cell(feature_id)?;
        cell.get_or_init(|| self.evaluator.is_enabled(feature_id, cancellation))
            .await
            .clone()
    }

    /// Evaluates whether the feature is enabled for the given context, at
    /// most once per snapshot.
    ///
    /// Shares its cache with [`is_enabled`](Self::is_enabled): if the
    /// feature was already resolved, the cached result is returned and the
    /// context is not looked at.
    pub async fn is_enabled_for(
        &self,
        feature_id: &str,
        context: &EvaluationContext,
        cancellation: &CancellationToken,
    ) -> Result<bool> {
        let cell = self.enabled_cell(feature_id)?;
        cell.get_or_init(|| {
            self.evaluator
                .is_enabled_for(feature_id, context, cancellation)
        })
        .await
        .clone()
    }

    /// Returns the variant assigned to this feature for the snapshot.
    pub async fn get_variant(
        &self,
        feature_id: &str,
        cancellation: &CancellationToken,
    ) -> Result<Variant> {
        let cache_key = variant_cache_key(feature_id);
        if let Some(variant) = self.cached_variant(&cache_key)? {
            return Ok(variant);
        }

        // Check and insert are two separate critical sections with the
        // evaluator call in between: racing callers for the same feature may
        // each evaluate, and the last writer wins the cache slot.
        let variant = self.evaluator.get_variant(feature_id, cancellation).await?;
        self.store_variant(cache_key, variant.clone())?;

        Ok(variant)
    }

    /// Returns the variant assigned to this feature for the snapshot,
    /// evaluating with the given context on a cache miss.
    pub async fn get_variant_for(
        &self,
        feature_id: &str,
        context: &EvaluationContext,
        cancellation: &CancellationToken,
    ) -> Result<Variant> {
        let cache_key = variant_cache_key(feature_id);
        if let Some(variant) = self.cached_variant(&cache_key)? {
            return Ok(variant);
        }

        let variant = self
            .evaluator
            .get_variant_for(feature_id, context, cancellation)
            .await?;
        self.store_variant(cache_key, variant.clone())?;

        Ok(variant)
    }

    async fn drain_feature_ids(&self, cancellation: &CancellationToken) -> Result<Vec<String>> {
        let mut stream = self.evaluator.feature_ids(cancellation);
        let mut ids = Vec::new();
        while let Some(id) = stream.next().await {
            // Any mid-stream failure aborts the drain before the list is
            // committed to the cache.
            ids.push(id?);
        }
        debug!("Materialized {} feature ids into the snapshot", ids.len());
        Ok(ids)
    }

    /// Returns the shared cell for this feature id, inserting an empty one
    /// if absent. The map lock is never held across an await; the cell
    /// itself serializes the evaluation.
    fn enabled_cell(&self, feature_id: &str) -> Result<EnabledCell> {
        let mut cache = self.enabled_cache.lock()?;
        Ok(cache
            .entry(feature_id.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone())
    }

    fn cached_variant(&self, cache_key: &str) -> Result<Option<Variant>> {
        let cache = self.variant_cache.lock()?;
        Ok(cache.get(cache_key).cloned())
    }

    fn store_variant(&self, cache_key: String, variant: Variant) -> Result<()> {
        let mut cache = self.variant_cache.lock()?;
        cache.insert(cache_key, variant);
        Ok(())
    }
}

impl std::fmt::Debug for FeatureSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureSnapshot").finish_non_exhaustive()
    }
}

/// Namespaces variant cache entries away from anything keyed by a bare
/// feature id, so the two can never collide.
fn variant_cache_key(feature_id: &str) -> String {
    format!("{}\n{}", std::any::type_name::<Variant>(), feature_id)
}
