//! Generation Controller
//!
//! One turn, start to finish:
//!
//! ```text
//! classify ─┬─ account status ──────────────────────────────► status / ask for id
//!           ├─ FAQ (no recommendation, no calculation) ─────► compose, invoke once
//!           └─ gated loop (≤ max_retries invocations):
//!                compose ─► invoke ─► whitelist ─┬─ invalid ──► retry, same prompt
//!                                                ├─ valid, not a recommendation ─► accept
//!                                                └─ valid recommendation ─► groundedness
//!                                                      ├─ grounded ─► accept
//!                                                      └─ otherwise ─► re-ground, retry
//!           budget exhausted ──► fallback message
//! ```
//!
//! Provider faults never escape: each one is logged and spends an attempt.

use crate::classifier::IntentClassifier;
use crate::config::ControllerConfig;
use crate::error::AdvisorError;
use crate::models::{
    GroundednessVerdict, IntentFlags, OutcomeKind, ProductCategory, RetrievedContext, TurnOutcome,
    UserProfile,
};
use crate::prompt::PromptComposer;
use crate::providers::{Generator, GroundednessChecker};
use crate::session::ChatMessage;
use crate::status::format_status;
use crate::structured::{parse_recommendation, StructuredOutcome};
use crate::verification::WhitelistValidator;
use crate::Result;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub const FALLBACK_MESSAGE: &str =
    "아직까지 적절한 상품을 찾지 못했어요. 조금만 질문을 구체화해주실 수 있나요?";
pub const MISSING_IDENTIFIER_MESSAGE: &str = "사용자 ID를 제공해 주세요.";
pub const PROCESSING_ERROR_MESSAGE: &str = "추천 정보 처리에 오류가 발생했습니다. 다시 시도해 주세요.";
pub const SERVICE_UNAVAILABLE_MESSAGE: &str =
    "일시적으로 답변을 생성할 수 없습니다. 잠시 후 다시 시도해 주세요.";

pub struct GenerationController {
    classifier: IntentClassifier,
    composer: PromptComposer,
    validator: WhitelistValidator,
    generator: Arc<dyn Generator>,
    checker: Arc<dyn GroundednessChecker>,
    config: ControllerConfig,
}

impl GenerationController {
    pub fn new(
        generator: Arc<dyn Generator>,
        checker: Arc<dyn GroundednessChecker>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(),
            composer: PromptComposer::new(config.compound_policy, config.structured_recommendations),
            validator: WhitelistValidator::default(),
            generator,
            checker,
            config,
        }
    }

    pub fn with_classifier(mut self, classifier: IntentClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_validator(mut self, validator: WhitelistValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_composer(mut self, composer: PromptComposer) -> Self {
        self.composer = composer;
        self
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub async fn generate_response(
        &self,
        question: &str,
        context: &RetrievedContext,
        history: &[ChatMessage],
        profile: Option<&UserProfile>,
        category: ProductCategory,
    ) -> TurnOutcome {
        let intent = self.classifier.classify(question, context.text());

        if intent.is_account_status {
            return match profile {
                Some(profile) => {
                    info!(user_id = %profile.user_id, "Account status requested");
                    TurnOutcome::deterministic(format_status(profile), OutcomeKind::AccountStatus, intent)
                }
                None => {
                    info!("Account status requested without a user id");
                    TurnOutcome::deterministic(
                        MISSING_IDENTIFIER_MESSAGE.to_string(),
                        OutcomeKind::MissingIdentifier,
                        intent,
                    )
                }
            };
        }

        info!(
            %category,
            is_recommendation = intent.is_recommendation,
            calc = %intent.calc_kinds,
            has_profile = profile.is_some(),
            "Classified turn"
        );

        if !intent.is_recommendation && !intent.calc_kinds.any() {
            return self.answer_faq(question, context, history, profile, category, intent).await;
        }

        self.gated_loop(question, context, history, profile, category, intent).await
    }

    /// Single shot, returned without whitelist or groundedness gating
    async fn answer_faq(
        &self,
        question: &str,
        context: &RetrievedContext,
        history: &[ChatMessage],
        profile: Option<&UserProfile>,
        category: ProductCategory,
        intent: IntentFlags,
    ) -> TurnOutcome {
        let prompt = self
            .composer
            .compose(context.text(), question, profile, category, intent.calc_kinds)
            .render();

        let (response, kind) = match self.invoke(&prompt, history, question).await {
            Ok(answer) => (answer, OutcomeKind::Answered),
            Err(e) => {
                warn!(error = %e, %category, "FAQ generation failed");
                (SERVICE_UNAVAILABLE_MESSAGE.to_string(), OutcomeKind::Unavailable)
            }
        };

        TurnOutcome {
            response,
            kind,
            intent,
            attempts: 1,
            prompt: Some(prompt),
        }
    }

    async fn gated_loop(
        &self,
        question: &str,
        context: &RetrievedContext,
        history: &[ChatMessage],
        profile: Option<&UserProfile>,
        category: ProductCategory,
        intent: IntentFlags,
    ) -> TurnOutcome {
        let max_retries = self.config.max_retries;
        let parse_structured = intent.is_recommendation && self.config.structured_recommendations;

        let mut builder =
            self.composer
                .compose(context.text(), question, profile, category, intent.calc_kinds);
        let mut attempts: u32 = 0;
        let mut last_prompt = None;

        while attempts < max_retries {
            attempts += 1;
            let prompt = builder.render();

            debug!(attempt = attempts, max_retries, prompt_len = prompt.len(), "Invoking generation");

            let output = self.invoke(&prompt, history, question).await;
            last_prompt = Some(prompt);

            let output = match output {
                Ok(output) => output,
                Err(e) => {
                    warn!(attempt = attempts, max_retries, %category, error = %e, "Generation fault");
                    continue;
                }
            };

            let candidate = if parse_structured {
                match parse_recommendation(&output) {
                    StructuredOutcome::Structured(detail) => detail.render(),
                    StructuredOutcome::Unstructured(text) => text,
                    StructuredOutcome::ParseFault(reason) => {
                        warn!(attempt = attempts, %category, %reason, "Structured recommendation parse fault");
                        return TurnOutcome {
                            response: PROCESSING_ERROR_MESSAGE.to_string(),
                            kind: OutcomeKind::ProcessingError,
                            intent,
                            attempts,
                            prompt: last_prompt,
                        };
                    }
                }
            } else {
                output
            };

            if !self.validator.is_valid(&candidate) {
                info!(attempt = attempts, max_retries, %category, "Whitelist rejected output, retrying");
                continue;
            }

            if !intent.is_recommendation {
                info!(attempt = attempts, calc = %intent.calc_kinds, "Calculation answer accepted");
                return accepted(candidate, intent, attempts, last_prompt);
            }

            match self.check_grounded(context.text(), &candidate).await {
                Ok(GroundednessVerdict::Grounded) => {
                    info!(attempt = attempts, %category, "Recommendation grounded, accepted");
                    return accepted(candidate, intent, attempts, last_prompt);
                }
                Ok(verdict) => {
                    info!(attempt = attempts, max_retries, ?verdict, "Recommendation not grounded, re-grounding");
                    builder.push_regrounding();
                }
                Err(e) => {
                    warn!(attempt = attempts, max_retries, error = %e, "Groundedness check fault");
                }
            }
        }

        warn!(attempts, max_retries, %category, "Retry budget exhausted, returning fallback");
        TurnOutcome {
            response: FALLBACK_MESSAGE.to_string(),
            kind: OutcomeKind::Fallback,
            intent,
            attempts,
            prompt: last_prompt,
        }
    }

    async fn invoke(&self, prompt: &str, history: &[ChatMessage], question: &str) -> Result<String> {
        let limit = self.config.provider_timeout;
        timeout(limit, self.generator.generate(prompt, history, question))
            .await
            .map_err(|_| AdvisorError::ProviderTimeout(limit.as_secs()))?
    }

    async fn check_grounded(&self, context: &str, answer: &str) -> Result<GroundednessVerdict> {
        let limit = self.config.provider_timeout;
        timeout(limit, self.checker.check(context, answer))
            .await
            .map_err(|_| AdvisorError::ProviderTimeout(limit.as_secs()))?
    }
}

fn accepted(response: String, intent: IntentFlags, attempts: u32, prompt: Option<String>) -> TurnOutcome {
    TurnOutcome {
        response,
        kind: OutcomeKind::Accepted,
        intent,
        attempts,
        prompt,
    }
}
