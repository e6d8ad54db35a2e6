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

use serde::{Deserialize, Serialize};

/// Caller-supplied data passed through to the evaluator to influence
/// evaluation (e.g. user identity, plan, location).
///
/// The snapshot layer never inspects a context; it is handed to the
/// evaluator unmodified. Note that a snapshot caches enablement results by
/// feature id only: the context provided by the first caller is the one the
/// evaluation actually sees.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EvaluationContext {
    /// Identity the evaluation is performed for.
    pub entity_id: String,
    /// Free-form attributes interpreted by the evaluator.
    pub attributes: HashMap<String, serde_json::Value>,
}

impl EvaluationContext {
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}
