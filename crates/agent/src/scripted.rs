use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use mall_core::errors::OracleError;
use mall_core::oracle::{QueryExecutor, QueryOracleAdapter, ResultRow, TextToQuery};

enum Reply {
    Rows(Vec<ResultRow>),
    Fail(OracleError),
}

struct Rule {
    needle: String,
    reply: Reply,
}

/// Deterministic oracle: the "query" is the instruction itself, answered by
/// the first rule whose needle it contains. Unmatched instructions return no
/// rows. Every instruction is recorded in arrival order.
#[derive(Default)]
pub struct ScriptedOracle {
    rules: Vec<Rule>,
    log: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, needle: impl Into<String>, rows: Vec<ResultRow>) -> Self {
        self.rules.push(Rule { needle: needle.into(), reply: Reply::Rows(rows) });
        self
    }

    pub fn fail(mut self, needle: impl Into<String>, error: OracleError) -> Self {
        self.rules.push(Rule { needle: needle.into(), reply: Reply::Fail(error) });
        self
    }

    pub fn adapter(self: Arc<Self>) -> QueryOracleAdapter {
        QueryOracleAdapter::new(self.clone(), self)
    }

    pub fn instructions(&self) -> Vec<String> {
        self.log().clone()
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.log().iter().filter(|instruction| instruction.contains(needle)).count()
    }

    fn log(&self) -> MutexGuard<'_, Vec<String>> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TextToQuery for ScriptedOracle {
    async fn translate(&self, instruction: &str) -> Result<String, OracleError> {
        self.log().push(instruction.to_string());
        Ok(instruction.to_string())
    }
}

#[async_trait]
impl QueryExecutor for ScriptedOracle {
    async fn execute(&self, query: &str) -> Result<Vec<ResultRow>, OracleError> {
        let rule = self.rules.iter().find(|rule| query.contains(&rule.needle));
        match rule.map(|rule| &rule.reply) {
            Some(Reply::Rows(rows)) => Ok(rows.clone()),
            Some(Reply::Fail(error)) => Err(error.clone()),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mall_core::errors::OracleError;
    use mall_core::oracle::CellValue;

    use super::ScriptedOracle;

    #[tokio::test]
    async fn first_matching_rule_answers_and_instructions_are_logged() {
        let oracle = Arc::new(
            ScriptedOracle::new()
                .respond("posicao", vec![vec![CellValue::Integer(1)]])
                .respond("posicao", vec![vec![CellValue::Integer(2)]])
                .fail("loja_", OracleError::Execution("no such table".to_string())),
        );
        let adapter = oracle.clone().adapter();

        let position = adapter.search("Na tabela 'posicao', retorne x").await;
        let partition = adapter.search("Na tabela 'loja_9', retorne produto").await;
        let unmatched = adapter.search("outra coisa").await;

        assert_eq!(position.rows, vec![vec![CellValue::Integer(1)]]);
        assert!(partition.is_empty());
        assert_eq!(partition.query_text, "Na tabela 'loja_9', retorne produto");
        assert!(unmatched.is_empty());
        assert_eq!(oracle.instructions().len(), 3);
        assert_eq!(oracle.count_matching("posicao"), 1);
    }
}
