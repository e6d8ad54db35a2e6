use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use feature_snapshot::{Error, FeatureEvaluator, FeatureIdStream, Result, Variant};
use tokio_util::sync::CancellationToken;

/// Test evaluator with a mutable universe, counting every call that reaches
/// it. An optional delay keeps evaluations in flight long enough for
/// concurrent callers to pile up on the same feature.
pub struct CountingEvaluator {
    enabled: Mutex<HashMap<String, bool>>,
    variants: Mutex<HashMap<String, Variant>>,
    names: Mutex<Vec<String>>,
    fail_names_after: Mutex<Option<usize>>,
    delay: Option<Duration>,
    pub enabled_calls: AtomicUsize,
    pub variant_calls: AtomicUsize,
    pub name_drains: AtomicUsize,
}

impl CountingEvaluator {
    pub fn new() -> Self {
        Self {
            enabled: Mutex::new(HashMap::new()),
            variants: Mutex::new(HashMap::new()),
            names: Mutex::new(Vec::new()),
            fail_names_after: Mutex::new(None),
            delay: None,
            enabled_calls: AtomicUsize::new(0),
            variant_calls: AtomicUsize::new(0),
            name_drains: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn set_enabled(&self, feature_id: &str, value: bool) {
        self.enabled
            .lock()
            .unwrap()
            .insert(feature_id.to_string(), value);
    }

    pub fn set_variant(&self, feature_id: &str, variant: Variant) {
        self.variants
            .lock()
            .unwrap()
            .insert(feature_id.to_string(), variant);
    }

    pub fn set_names(&self, names: &[&str]) {
        *self.names.lock().unwrap() = names.iter().map(|n| n.to_string()).collect();
    }

    /// Makes the next name enumerations fail after yielding `count` names.
    pub fn fail_names_after(&self, count: Option<usize>) {
        *self.fail_names_after.lock().unwrap() = count;
    }

    async fn hold(&self, feature_id: &str, cancellation: &CancellationToken) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if cancellation.is_cancelled() {
            return Err(Error::Cancelled {
                feature_id: feature_id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FeatureEvaluator for CountingEvaluator {
    async fn is_enabled(&self, feature_id: &str, cancellation: &CancellationToken) -> Result<bool> {
        self.enabled_calls.fetch_add(1, Ordering::SeqCst);
        self.hold(feature_id, cancellation).await?;
        self.enabled
            .lock()
            .unwrap()
            .get(feature_id)
            .copied()
            .ok_or_else(|| Error::FeatureDoesNotExist {
                feature_id: feature_id.to_string(),
            })
    }

    async fn get_variant(
        &self,
        feature_id: &str,
        cancellation: &CancellationToken,
    ) -> Result<Variant> {
        self.variant_calls.fetch_add(1, Ordering::SeqCst);
        self.hold(feature_id, cancellation).await?;
        self.variants
            .lock()
            .unwrap()
            .get(feature_id)
            .cloned()
            .ok_or_else(|| Error::FeatureDoesNotExist {
                feature_id: feature_id.to_string(),
            })
    }

    fn feature_ids<'a>(&'a self, _cancellation: &'a CancellationToken) -> FeatureIdStream<'a> {
        self.name_drains.fetch_add(1, Ordering::SeqCst);
        let names = self.names.lock().unwrap().clone();
        let fail_after = *self.fail_names_after.lock().unwrap();

        let mut items: Vec<Result<String>> = names.into_iter().map(Ok).collect();
        if let Some(count) = fail_after {
            items.truncate(count);
            items.push(Err(Error::Other("universe fetch failed".to_string())));
        }
        Box::pin(futures::stream::iter(items))
    }
}
