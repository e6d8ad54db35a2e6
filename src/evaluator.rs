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

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::context::EvaluationContext;
use crate::errors::Result;
use crate::models::Variant;

/// Finite, lazy stream of feature ids produced by an evaluator.
pub type FeatureIdStream<'a> = BoxStream<'a, Result<String>>;

/// The engine that computes a feature's enablement or variant assignment.
///
/// Implementations may be slow (remote fetch, rule evaluation) and may be
/// non-deterministic across calls (percentage rollouts, time windows). For
/// consistent answers within one logical request, wrap an evaluator in a
/// [`FeatureSnapshot`](crate::FeatureSnapshot) instead of querying it
/// directly.
///
/// Every operation takes a [`CancellationToken`]; implementations are
/// expected to observe it and report cancellation as an ordinary error.
#[async_trait]
pub trait FeatureEvaluator: Send + Sync {
    /// Evaluates whether the feature is enabled.
    async fn is_enabled(&self, feature_id: &str, cancellation: &CancellationToken)
        -> Result<bool>;

    /// Evaluates whether the feature is enabled for the given context.
    ///
    /// The default implementation ignores the context.
    async fn is_enabled_for(
        &self,
        feature_id: &str,
        context: &EvaluationContext,
        cancellation: &CancellationToken,
    ) -> Result<bool> {
        let _ = context;
        self.is_enabled(feature_id, cancellation).await
    }

    /// Assigns a [`Variant`] of the feature.
    async fn get_variant(
        &self,
        feature_id: &str,
        cancellation: &CancellationToken,
    ) -> Result<Variant>;

    /// Assigns a [`Variant`] of the feature for the given context.
    ///
    /// The default implementation ignores the context.
    async fn get_variant_for(
        &self,
        feature_id: &str,
        context: &EvaluationContext,
        cancellation: &CancellationToken,
    ) -> Result<Variant> {
        let _ = context;
        self.get_variant(feature_id, cancellation).await
    }

    /// Returns all feature ids known to this evaluator.
    ///
    /// The stream is finite, produced lazily and may fail mid-way.
    fn feature_ids<'a>(&'a self, cancellation: &'a CancellationToken) -> FeatureIdStream<'a>;
}
