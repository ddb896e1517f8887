//! Provider traits for text generation and groundedness scoring
//!
//! The controller only sees these traits; the Upstage Solar client is the
//! production implementation, the mocks keep the pipeline runnable without
//! credentials.

use crate::models::GroundednessVerdict;
use crate::session::ChatMessage;
use crate::Result;
use async_trait::async_trait;

pub mod upstage;
pub use upstage::UpstageClient;

/// Text generation (LLM controlled)
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        user_input: &str,
    ) -> Result<String>;
}

/// Scores whether an answer is supported by the context
#[async_trait]
pub trait GroundednessChecker: Send + Sync {
    async fn check(&self, context: &str, answer: &str) -> Result<GroundednessVerdict>;
}

/// Offline generator: answers with the first context line found in the
/// prompt, or a fixed notice when there is none.
pub struct MockGenerator;

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(
        &self,
        system_prompt: &str,
        _history: &[ChatMessage],
        user_input: &str,
    ) -> Result<String> {
        let evidence = system_prompt
            .split("\nContext:\n")
            .nth(1)
            .and_then(|rest| rest.lines().find(|l| !l.trim().is_empty()))
            .map(str::trim)
            .unwrap_or("해당 정보가 제공된 문서에 포함되어 있지 않습니다.");

        Ok(format!("- {} 에 대한 답변: {}", user_input, evidence))
    }
}

/// Offline checker that accepts everything
pub struct MockGroundednessChecker;

#[async_trait]
impl GroundednessChecker for MockGroundednessChecker {
    async fn check(&self, _context: &str, _answer: &str) -> Result<GroundednessVerdict> {
        Ok(GroundednessVerdict::Grounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_generator_quotes_context() {
        let prompt = "system\n\nContext:\n희망정기적금 기본금리 3.0%\n\n질문: q";
        let answer = tokio_test::assert_ok!(MockGenerator.generate(prompt, &[], "금리?").await);
        assert!(answer.contains("희망정기적금 기본금리 3.0%"));
    }
}
