use anyhow::Result;
use async_trait::async_trait;

/// Remote text-completion collaborator. Only used for intent classification;
/// provider selection and credentials live outside this crate.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

pub fn classification_prompt(text: &str) -> String {
    format!(
        "Classify the user message into exactly one of these labels: \
         ticket_creation, knowledge_query, general_chat.\n\
         Answer with the label only.\n\nMessage: {}",
        text.trim()
    )
}
