use std::sync::Arc;

use async_trait::async_trait;
use mall_core::errors::OracleError;
use mall_core::oracle::TextToQuery;
use mall_core::schema::SchemaRegistry;
use tracing::debug;

use crate::llm::LlmClient;
use crate::prompts::PromptTemplates;

/// Text-to-SQL oracle backed by an LLM completion.
///
/// The prompt describes the directory, the position table and one partition
/// per registered category, so the model only has to spell out SQL.
pub struct LlmTextToQuery {
    llm: Arc<dyn LlmClient>,
    templates: PromptTemplates,
    registry: SchemaRegistry,
}

impl LlmTextToQuery {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        templates: PromptTemplates,
        registry: SchemaRegistry,
    ) -> Self {
        Self { llm, templates, registry }
    }
}

#[async_trait]
impl TextToQuery for LlmTextToQuery {
    async fn translate(&self, instruction: &str) -> Result<String, OracleError> {
        let prompt = self
            .templates
            .text_to_sql(&self.registry, instruction)
            .map_err(|error| OracleError::Translation(format!("prompt rendering failed: {error}")))?;

        let completion = self
            .llm
            .complete(&prompt)
            .await
            .map_err(|error| OracleError::Translation(format!("{error:#}")))?;

        debug!(
            event_name = "oracle.translate.completed",
            completion_len = completion.len(),
            "llm returned query text"
        );
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use mall_core::errors::OracleError;
    use mall_core::oracle::TextToQuery;
    use mall_core::schema::SchemaRegistry;

    use super::LlmTextToQuery;
    use crate::llm::LlmClient;
    use crate::prompts::PromptTemplates;

    struct CannedLlm {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().expect("prompt log").push(prompt.to_string());
            self.reply.clone().map_err(|message| anyhow!(message))
        }
    }

    fn translator(reply: Result<String, String>) -> (Arc<CannedLlm>, LlmTextToQuery) {
        let llm = Arc::new(CannedLlm { reply, prompts: Mutex::new(Vec::new()) });
        let translator = LlmTextToQuery::new(
            llm.clone(),
            PromptTemplates::new().expect("templates"),
            SchemaRegistry::default(),
        );
        (llm, translator)
    }

    #[tokio::test]
    async fn prompt_carries_instruction_and_partitions() {
        let (llm, translator) = translator(Ok("SELECT x, y, z FROM posicao".to_string()));

        let query = translator
            .translate("Na tabela 'posicao', retorne x, y, z WHERE numero = 105")
            .await
            .expect("translation");

        assert_eq!(query, "SELECT x, y, z FROM posicao");
        let prompts = llm.prompts.lock().expect("prompt log");
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Na tabela 'posicao', retorne x, y, z WHERE numero = 105"));
        assert!(prompts[0].contains("Jogos: produto, tipo, qtd, preco, console"));
    }

    #[tokio::test]
    async fn llm_failure_becomes_translation_error() {
        let (_, translator) = translator(Err("connection refused".to_string()));

        let error = translator.translate("qualquer coisa").await.expect_err("should fail");

        assert!(matches!(error, OracleError::Translation(message) if message.contains("connection refused")));
    }
}
