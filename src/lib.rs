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

//! Request-scoped feature flag snapshots.
//!
//! Feature flag evaluation is often non-deterministic (percentage rollouts,
//! time windows) or expensive (remote configuration, rule engines). When the
//! same flag is checked from several places while serving one request, those
//! checks must agree with each other. [`FeatureSnapshot`] wraps any
//! [`FeatureEvaluator`] and memoizes its answers per feature id, so every
//! check within one snapshot observes the same outcome and the evaluator is
//! asked at most once per flag.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use feature_snapshot::{
//!     EvaluationContext, FeatureSnapshot, FlagsConfiguration, OfflineEvaluator,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> feature_snapshot::Result<()> {
//! let configuration: FlagsConfiguration = serde_json::from_str(
//!     r#"{
//!         "features": [
//!             {
//!                 "feature_id": "checkout.new_flow",
//!                 "enabled": true,
//!                 "rollout_percentage": 50,
//!                 "variants": [
//!                     { "name": "control", "value": false, "weight": 50 },
//!                     { "name": "treatment", "value": true, "weight": 50 }
//!                 ]
//!             }
//!         ]
//!     }"#,
//! )
//! .expect("valid configuration");
//! let evaluator = Arc::new(OfflineEvaluator::from_configuration(configuration));
//!
//! // One snapshot per logical request.
//! let snapshot = FeatureSnapshot::new(evaluator);
//! let cancellation = CancellationToken::new();
//! let context = EvaluationContext::new("user123");
//!
//! let enabled = snapshot
//!     .is_enabled_for("checkout.new_flow", &context, &cancellation)
//!     .await?;
//! // Any later check within this snapshot agrees with the first one.
//! let again = snapshot
//!     .is_enabled_for("checkout.new_flow", &context, &cancellation)
//!     .await?;
//! assert_eq!(enabled, again);
//!
//! let variant = snapshot
//!     .get_variant_for("checkout.new_flow", &context, &cancellation)
//!     .await?;
//! println!("assigned arm: {}", variant.name);
//! # Ok(())
//! # }
//! ```

mod context;
mod errors;
mod evaluator;
mod models;
mod offline;
mod snapshot;

pub use context::EvaluationContext;
pub use errors::{DeserializationError, Error, Result};
pub use evaluator::{FeatureEvaluator, FeatureIdStream};
pub use models::{ConfigValue, Variant};
pub use offline::{ActiveWindow, FeatureConfig, FlagsConfiguration, OfflineEvaluator, VariantConfig};
pub use snapshot::FeatureSnapshot;
