//! Parallel multi-variation generation with partial-success aggregation

use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::{GenerationRequest, GenerationResult, ImageGenerator};
use crate::error::GenerationError;
use crate::pipeline::retry::{generate_with_retry, RetryPolicy};

const GENERIC_FAILURE: &str = "Image generation failed";

/// What a fan-out produced
#[derive(Debug, Clone)]
pub struct FanOutOutcome {
    pub results: Vec<GenerationResult>,
    /// Variation count after engine clamping
    pub attempted: u32,
    /// Set when some, but not all, variations failed
    pub warning: Option<String>,
}

/// Issues one retry-wrapped call per variation and joins them all
pub struct FanOutExecutor {
    generator: Arc<dyn ImageGenerator>,
    policy: RetryPolicy,
}

impl FanOutExecutor {
    pub fn new(generator: Arc<dyn ImageGenerator>, policy: RetryPolicy) -> Self {
        Self { generator, policy }
    }

    /// Generate up to `variations` images for the same request.
    ///
    /// Failures never cancel siblings. If nothing succeeds the first
    /// failure (in variation order) is returned. Placeholder substitution
    /// is left to the caller.
    pub async fn generate(
        &self,
        request: GenerationRequest,
        variations: u32,
    ) -> Result<FanOutOutcome, GenerationError> {
        let attempted = request.engine().clamp_variations(variations);
        if attempted != variations {
            info!(
                engine = %request.engine(),
                requested = variations,
                attempted,
                "Clamped variation count"
            );
        }

        let request = Arc::new(request);
        let handles = (0..attempted).map(|index| {
            let generator = self.generator.clone();
            let request = request.clone();
            let policy = self.policy;
            tokio::spawn(async move {
                let result = generate_with_retry(generator.as_ref(), &request, &policy, None).await;
                if let Err(e) = &result {
                    warn!(variation = index + 1, error = %e, "Variation failed");
                }
                result
            })
        });

        let mut results = Vec::new();
        let mut first_error = None;
        let mut failed = 0u32;
        for joined in join_all(handles).await {
            match joined {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(e)) => {
                    failed += 1;
                    first_error.get_or_insert(e);
                }
                Err(join_error) => {
                    failed += 1;
                    warn!(error = %join_error, "Variation task did not complete");
                }
            }
        }

        if results.is_empty() {
            return Err(first_error.unwrap_or_else(|| GenerationError::Aborted(GENERIC_FAILURE.to_string())));
        }

        let warning = (failed > 0).then(|| {
            format!(
                "Generated {} of {} variations. Some failed.",
                results.len(),
                attempted
            )
        });

        Ok(FanOutOutcome {
            results,
            attempted,
            warning,
        })
    }
}
