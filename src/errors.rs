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

use std::sync::PoisonError;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by evaluators and by the snapshot layer.
///
/// The type is `Clone` on purpose: a snapshot memoizes the outcome of the
/// first enablement evaluation per feature, including failed outcomes, and
/// hands the very same error to every caller asking for that feature for the
/// rest of the snapshot's lifetime.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Cannot acquire snapshot lock")]
    CannotAcquireLock,

    #[error("Feature '{feature_id}' does not exist")]
    FeatureDoesNotExist { feature_id: String },

    #[error("Evaluation of feature '{feature_id}' was cancelled")]
    Cancelled { feature_id: String },

    #[error(transparent)]
    DeserializationError(#[from] DeserializationError),

    #[error("{0}")]
    Other(String),
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_value: PoisonError<T>) -> Self {
        Error::CannotAcquireLock
    }
}

/// An error that can be returned when deserializing data.
///
/// The underlying cause is captured as text so the error stays `Clone`.
#[derive(Debug, Clone, Error)]
#[error("Cannot deserialize '{string}': {reason}")]
pub struct DeserializationError {
    pub string: String,
    pub reason: String,
}
