// Model fallback orchestration
//
// Drives the provider call across the ordered candidate list. One attempt at
// a time; the first success wins.

use crate::ai_provider::{Completion, CompletionRequest, ModelClient, ProviderError};
use crate::deadline::{run_bounded, Budget};
use crate::error::AttemptFailure;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A configured model id. Priority is its position in the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCandidate {
    pub model: String,
    pub priority: usize,
}

impl ModelCandidate {
    /// Candidates in list order.
    pub fn from_list(models: &[String]) -> Vec<ModelCandidate> {
        models
            .iter()
            .enumerate()
            .map(|(priority, model)| ModelCandidate {
                model: model.clone(),
                priority,
            })
            .collect()
    }
}

/// Everything an attempt needs apart from the model id.
#[derive(Debug, Clone)]
pub struct AttemptTemplate {
    pub prompt: String,
    pub system: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl AttemptTemplate {
    fn request(&self, model: &str, timeout: Duration) -> CompletionRequest {
        CompletionRequest {
            model: model.to_string(),
            prompt: self.prompt.clone(),
            system: self.system.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout,
        }
    }
}

/// First successful attempt and what it took to get there.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackSuccess {
    pub completion: Completion,
    pub model: String,
    /// Failures of the higher-priority candidates tried before this one
    pub failures: Vec<AttemptFailure>,
    pub attempts: usize,
}

#[derive(Debug)]
enum State {
    Pending {
        queue: VecDeque<ModelCandidate>,
        failures: Vec<AttemptFailure>,
    },
    Succeeded(FallbackSuccess),
    Exhausted(Vec<AttemptFailure>),
}

pub struct FallbackOrchestrator<'a> {
    client: &'a dyn ModelClient,
    candidates: &'a [ModelCandidate],
}

impl<'a> FallbackOrchestrator<'a> {
    pub fn new(client: &'a dyn ModelClient, candidates: &'a [ModelCandidate]) -> Self {
        Self { client, candidates }
    }

    /// Try candidates in priority order until one succeeds.
    ///
    /// Returns the per-candidate failures, one per candidate, when none does.
    pub async fn run(
        &self,
        template: &AttemptTemplate,
        budget: &Budget,
    ) -> Result<FallbackSuccess, Vec<AttemptFailure>> {
        let mut queue: Vec<ModelCandidate> = self.candidates.to_vec();
        queue.sort_by_key(|c| c.priority);

        let mut state = State::Pending {
            queue: queue.into(),
            failures: Vec::new(),
        };

        loop {
            state = match state {
                State::Pending {
                    mut queue,
                    mut failures,
                } => match queue.pop_front() {
                    None => State::Exhausted(failures),
                    Some(candidate) => {
                        let remaining = queue.len() + 1;
                        match self
                            .attempt(&candidate, template, budget, remaining, failures.len())
                            .await
                        {
                            Ok(completion) => State::Succeeded(FallbackSuccess {
                                completion,
                                model: candidate.model,
                                attempts: failures.len() + 1,
                                failures,
                            }),
                            Err(error) => {
                                failures.push(AttemptFailure {
                                    model: candidate.model,
                                    error,
                                });
                                State::Pending { queue, failures }
                            }
                        }
                    }
                },
                State::Succeeded(success) => return Ok(success),
                State::Exhausted(failures) => {
                    warn!(
                        "All {} candidate model(s) failed after {}ms",
                        failures.len(),
                        budget.elapsed().as_millis()
                    );
                    return Err(failures);
                }
            };
        }
    }

    async fn attempt(
        &self,
        candidate: &ModelCandidate,
        template: &AttemptTemplate,
        budget: &Budget,
        remaining_candidates: usize,
        attempts_made: usize,
    ) -> Result<Completion, ProviderError> {
        let Some(allowance) = budget.allowance(remaining_candidates, attempts_made) else {
            warn!(
                "Skipping model {}: request budget is spent",
                candidate.model
            );
            return Err(ProviderError::TimedOut {
                after: Duration::ZERO,
            });
        };

        info!(
            "Attempt {} with {} model {} (allowance {}ms)",
            attempts_made + 1,
            self.client.provider_name(),
            candidate.model,
            allowance.as_millis()
        );

        let request = template.request(&candidate.model, allowance);
        let result = match run_bounded(allowance, self.client.complete(&request)).await {
            Ok(result) => result,
            Err(elapsed) => Err(ProviderError::TimedOut {
                after: elapsed.after,
            }),
        };

        match &result {
            Ok(completion) => debug!(
                "Model {} answered with {} chars",
                candidate.model,
                completion.text.chars().count()
            ),
            Err(e) => warn!("Model {} failed: {}", candidate.model, e),
        }
        result
    }
}
