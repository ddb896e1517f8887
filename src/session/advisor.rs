//! One turn end to end: notices, retrieval, profile, controller, history, audit

use crate::audit::{AuditLog, TurnRecord};
use crate::config::AdvisorConfig;
use crate::controller::GenerationController;
use crate::models::{ProductCategory, RetrievedContext, TurnOutcome, UserProfile};
use crate::profile::{build_profile_source, ProfileSource};
use crate::providers::{
    Generator, GroundednessChecker, MockGenerator, MockGroundednessChecker, UpstageClient,
};
use crate::retrieval::{retrieve_context, HttpRetriever, InMemoryRetriever, Retriever, RetrieverSet};
use crate::session::store::Session;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Non-blocking notices shown next to the answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnNotice {
    GuestMode,
    CategoryUnspecified,
}

impl TurnNotice {
    pub fn message(&self) -> &'static str {
        match self {
            TurnNotice::GuestMode => "No User ID provided. Continuing in Guest Mode.",
            TurnNotice::CategoryUnspecified => {
                "금융상품 종류가 입력되지 않았습니다. 기본 채팅모드로 진행합니다"
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    pub notices: Vec<TurnNotice>,
    pub audit_id: Uuid,
}

pub struct Advisor {
    controller: GenerationController,
    retrievers: RetrieverSet,
    profiles: Arc<dyn ProfileSource>,
    audit: AuditLog,
    top_k: usize,
}

impl Advisor {
    pub fn new(
        controller: GenerationController,
        retrievers: RetrieverSet,
        profiles: Arc<dyn ProfileSource>,
        top_k: usize,
    ) -> Self {
        Self {
            controller,
            retrievers,
            profiles,
            audit: AuditLog::new(),
            top_k,
        }
    }

    /// Wire providers, retrievers and the ledger from configuration.
    /// Without an API key the offline mock providers are used.
    pub fn from_config(config: &AdvisorConfig) -> Result<Self> {
        let (generator, checker): (Arc<dyn Generator>, Arc<dyn GroundednessChecker>) =
            match &config.upstage_api_key {
                Some(key) => {
                    let client = Arc::new(UpstageClient::new(
                        key.clone(),
                        config.upstage_base_url.clone(),
                        config.chat_model.clone(),
                        config.controller.provider_timeout,
                    )?);
                    info!(model = %config.chat_model, "Using Upstage providers");
                    let generator: Arc<dyn Generator> = client.clone();
                    let checker: Arc<dyn GroundednessChecker> = client;
                    (generator, checker)
                }
                None => {
                    warn!("UPSTAGE_API_KEY not set, using offline mock providers");
                    let generator: Arc<dyn Generator> = Arc::new(MockGenerator);
                    let checker: Arc<dyn GroundednessChecker> = Arc::new(MockGroundednessChecker);
                    (generator, checker)
                }
            };

        let controller = GenerationController::new(generator, checker, config.controller.clone());
        let retrievers = build_retrievers(config)?;
        let profiles =
            build_profile_source(config.database_url.as_deref(), config.ledger_path.as_deref())?;

        Ok(Self::new(controller, retrievers, profiles, config.top_k))
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub async fn handle_turn(&self, session: &mut Session, question: &str) -> TurnReport {
        let mut notices = Vec::new();
        if session.is_guest() {
            notices.push(TurnNotice::GuestMode);
        }
        if session.category == ProductCategory::Unspecified {
            notices.push(TurnNotice::CategoryUnspecified);
        }

        info!(
            session_id = %session.session_id,
            guest = session.is_guest(),
            category = %session.category,
            "Handling turn"
        );

        let profile = match session.user_id.as_deref() {
            Some(user_id) => Some(self.load_profile(user_id).await),
            None => None,
        };

        let context = if self.controller.classifier().is_account_status(question) {
            RetrievedContext::empty()
        } else {
            retrieve_context(
                &self.retrievers,
                question,
                session.category,
                self.top_k,
                self.controller.config().provider_timeout,
            )
            .await
        };

        let outcome = self
            .controller
            .generate_response(
                question,
                &context,
                session.history.messages(),
                profile.as_ref(),
                session.category,
            )
            .await;

        session.history.record_turn(question, &outcome.response);

        let audit_id = self
            .audit
            .record(TurnRecord::from_outcome(session.session_id, session.category, &outcome))
            .await;

        info!(
            session_id = %session.session_id,
            kind = ?outcome.kind,
            attempts = outcome.attempts,
            %audit_id,
            "Turn completed"
        );

        TurnReport {
            outcome,
            notices,
            audit_id,
        }
    }

    /// A ledger fault degrades to an empty profile
    async fn load_profile(&self, user_id: &str) -> UserProfile {
        match self.profiles.load_profile(user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(user_id, error = %e, "Profile lookup failed, using empty profile");
                UserProfile::from_holdings(user_id, Vec::new())
            }
        }
    }
}

/// HTTP search service when configured, otherwise per-channel corpus files
/// (`deposit.json`, `savings.json`, `combined.json`); a missing file is an
/// empty corpus
fn build_retrievers(config: &AdvisorConfig) -> Result<RetrieverSet> {
    if let Some(base_url) = &config.retrieval_api_base_url {
        info!(%base_url, "Retrieval: HTTP search service");
        let retriever = HttpRetriever::new(base_url, config.controller.provider_timeout)?;
        return Ok(RetrieverSet::uniform(Arc::new(retriever)));
    }

    let load = |file: &str| -> Result<Arc<dyn Retriever>> {
        let path = config.corpus_dir.as_ref().map(|dir| dir.join(file));
        match path {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "Retrieval: loading corpus");
                Ok(Arc::new(InMemoryRetriever::from_json_file(&path)?))
            }
            _ => Ok(Arc::new(InMemoryRetriever::new(Vec::new()))),
        }
    };

    Ok(RetrieverSet::new(
        load("deposit.json")?,
        load("savings.json")?,
        load("combined.json")?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::models::OutcomeKind;
    use crate::profile::InMemoryProfileSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRetriever {
        inner: InMemoryRetriever,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Retriever for CountingRetriever {
        async fn search(&self, q: &str, c: ProductCategory, k: usize) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.search(q, c, k).await
        }
    }

    fn advisor() -> (Advisor, Arc<CountingRetriever>) {
        let retriever = Arc::new(CountingRetriever {
            inner: InMemoryRetriever::new(vec![
                "<p>KB Star 정기예금 기본금리 3.0% 단리 예금</p>".to_string(),
                "예금자보호법은 1인당 5천만원까지 보호합니다".to_string(),
            ]),
            calls: AtomicUsize::new(0),
        });
        let profiles = InMemoryProfileSource::new().with_holding("user_1", "BankA", 60_000_000);
        let controller = GenerationController::new(
            Arc::new(MockGenerator),
            Arc::new(MockGroundednessChecker),
            ControllerConfig::default(),
        );

        let advisor = Advisor::new(
            controller,
            RetrieverSet::uniform(retriever.clone()),
            Arc::new(profiles),
            1,
        );
        (advisor, retriever)
    }

    #[tokio::test]
    async fn test_guest_turn_records_history_and_notices() {
        let (advisor, _) = advisor();
        let mut session = Session::new(None, ProductCategory::Unspecified);

        let report = advisor.handle_turn(&mut session, "예금자보호법 알려줘").await;

        assert_eq!(report.outcome.kind, OutcomeKind::Answered);
        assert_eq!(report.notices, vec![TurnNotice::GuestMode, TurnNotice::CategoryUnspecified]);
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history.messages()[1].content, report.outcome.response);
        assert!(advisor.audit().get(report.audit_id).await.is_some());
    }

    #[tokio::test]
    async fn test_account_status_skips_retrieval() {
        let (advisor, retriever) = advisor();
        let mut session = Session::new(Some("user_1".into()), ProductCategory::Deposit);

        let report = advisor.handle_turn(&mut session, "내 계좌 정보 알려줘").await;

        assert_eq!(report.outcome.kind, OutcomeKind::AccountStatus);
        assert!(report.outcome.response.contains("BankA : 60,000,000원"));
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);
        assert!(report.notices.is_empty());
    }

    #[tokio::test]
    async fn test_recommendation_turn_with_over_limit_profile() {
        let (advisor, retriever) = advisor();
        let mut session = Session::new(Some("user_1".into()), ProductCategory::Deposit);

        let report = advisor.handle_turn(&mut session, "추천해줘 예금").await;

        assert_eq!(retriever.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.outcome.kind, OutcomeKind::Accepted);
        assert!(report.outcome.intent.is_recommendation);

        let prompt = report.outcome.prompt.unwrap_or_default();
        assert!(prompt.contains("예금자 보호법에 따라 BankA 은행 외의 상품을 추천드립니다."));
        assert!(prompt.contains("KB Star 정기예금 기본금리 3.0% 단리 예금"));
        assert!(!prompt.contains("<p>"));
    }

    #[tokio::test]
    async fn test_history_carries_across_turns() {
        let (advisor, _) = advisor();
        let mut session = Session::new(None, ProductCategory::Deposit);

        advisor.handle_turn(&mut session, "예금자보호법 알려줘").await;
        advisor.handle_turn(&mut session, "내 계좌 잔액 알려줘").await;

        assert_eq!(session.history.len(), 4);
        assert_eq!(
            session.history.messages()[3].content,
            crate::controller::MISSING_IDENTIFIER_MESSAGE
        );
        assert_eq!(advisor.audit().list_for_session(session.session_id).await.len(), 2);
    }
}
