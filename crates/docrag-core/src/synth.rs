//! Grounded answer synthesis over retrieved contexts, with a labelled fallback
//! when no LLM is configured or the call fails.

use tracing::warn;

use crate::outcome::Outcome;
use crate::service::Synthesizer;

/// Max characters of joined context sent to the LLM.
pub const DEFAULT_CONTEXT_CHAR_BUDGET: usize = 12_000;

/// Characters of context shown in a fallback answer.
pub const FALLBACK_PREVIEW_CHARS: usize = 1_500;

pub const NOT_CONFIGURED_LABEL: &str = "[LLM not configured]";
pub const ERROR_LABEL: &str = "[LLM error]";
pub const NO_CONTEXT: &str = "No context available.";

const SYSTEM_PROMPT: &str = "You are a precise loan document assistant. \
Answer ONLY using the CONTEXT. If information is missing, say so. \
Prefer concise numeric answers for sanctioned amount, EMI, ROI, tenure.";

/// Joins the non-empty contexts with blank lines, truncated to `budget` characters.
pub fn combine_contexts(contexts: &[String], budget: usize) -> String {
    let joined = contexts
        .iter()
        .filter(|c| !c.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n\n");
    truncate_chars(&joined, budget).to_string()
}

/// Asks `synth` to answer `query` from `contexts`. Never fails: without a
/// synthesizer, or when it errors, the answer is a labelled preview of the context.
pub async fn synthesize_answer(
    synth: Option<&dyn Synthesizer>,
    query: &str,
    contexts: &[String],
    budget: usize,
) -> Outcome<String> {
    let combined = combine_contexts(contexts, budget);
    let Some(synth) = synth else {
        let preview = if combined.is_empty() {
            NO_CONTEXT
        } else {
            truncate_chars(&combined, FALLBACK_PREVIEW_CHARS)
        };
        return Outcome::degraded(
            format!("{NOT_CONFIGURED_LABEL}\n\n{preview}"),
            "no LLM model configured",
        );
    };

    let prompt = format!("CONTEXT:\n{combined}\n\nQUESTION: {query}\n\nAnswer:");
    match synth.complete(SYSTEM_PROMPT, &prompt).await {
        Ok(answer) => Outcome::Complete(answer),
        Err(e) => {
            warn!(model = synth.model_name(), error = %e, "answer synthesis failed");
            Outcome::degraded(
                format!(
                    "{ERROR_LABEL} {e}\n\n{}",
                    truncate_chars(&combined, FALLBACK_PREVIEW_CHARS)
                ),
                e.to_string(),
            )
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::service::ServiceError;

    struct Recording {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Synthesizer for Recording {
        fn model_name(&self) -> &str {
            "fake"
        }

        async fn complete(&self, _system: &str, prompt: &str) -> Result<String, ServiceError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                Err(ServiceError::Unavailable("connection refused".to_string()))
            } else {
                Ok("EMI is 21,500".to_string())
            }
        }
    }

    fn ctx(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn combine_skips_empty_and_truncates_by_chars() {
        assert_eq!(combine_contexts(&ctx(&["a", "", "b"]), 100), "a\n\nb");
        assert_eq!(combine_contexts(&ctx(&["₹₹₹₹", "x"]), 3), "₹₹₹");
    }

    #[tokio::test]
    async fn unconfigured_returns_labelled_preview() {
        let out = synthesize_answer(None, "EMI?", &ctx(&["EMI: 21,500", ""]), 100).await;
        assert!(out.is_degraded());
        assert_eq!(out.value(), "[LLM not configured]\n\nEMI: 21,500");

        let out = synthesize_answer(None, "EMI?", &ctx(&["", ""]), 100).await;
        assert_eq!(out.value(), "[LLM not configured]\n\nNo context available.");
    }

    #[tokio::test]
    async fn prompt_carries_budgeted_context() {
        let synth = Recording {
            prompts: Mutex::new(Vec::new()),
            fail: false,
        };
        let long = "x".repeat(50);
        let out = synthesize_answer(Some(&synth), "EMI?", &ctx(&[&long, "tail"]), 20).await;
        assert_eq!(out, Outcome::Complete("EMI is 21,500".to_string()));

        let prompts = synth.prompts.lock().unwrap();
        assert_eq!(prompts[0], format!("CONTEXT:\n{}\n\nQUESTION: EMI?\n\nAnswer:", "x".repeat(20)));
    }

    #[tokio::test]
    async fn failure_degrades_with_error_label() {
        let synth = Recording {
            prompts: Mutex::new(Vec::new()),
            fail: true,
        };
        let out = synthesize_answer(Some(&synth), "EMI?", &ctx(&["EMI: 21,500"]), 100).await;
        assert!(out.is_degraded());
        assert!(out.value().starts_with("[LLM error] service unavailable: connection refused"));
        assert!(out.value().ends_with("EMI: 21,500"));
    }
}
