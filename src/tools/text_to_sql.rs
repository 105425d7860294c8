use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;

use super::sql::{validate_statement, SqlMode};
use super::traits::Tool;
use crate::providers::Provider;
use crate::store::{schema, ErpStore};

/// Translates a natural-language question into one read-only query, runs it,
/// and returns both the query and its rows.
pub struct TextToSqlTool {
    store: ErpStore,
    provider: Arc<dyn Provider>,
}

impl TextToSqlTool {
    pub fn new(store: ErpStore, provider: Arc<dyn Provider>) -> Self {
        Self { store, provider }
    }

    fn translation_prompt(question: &str) -> String {
        let mut prompt = String::from(
            "You translate questions about an ERP database into a single SQLite SELECT query.\n\
             Reply with the SQL only: no explanation, no markdown.\n\n\
             Schema:\n",
        );
        prompt.push_str(schema::describe());
        let _ = write!(prompt, "\n\nQuestion: {question}\nSQL:");
        prompt
    }
}

#[async_trait]
impl Tool for TextToSqlTool {
    fn name(&self) -> &str {
        super::TEXT_TO_SQL
    }

    fn description(&self) -> &str {
        "Answers a data question by translating it into a read-only SQL query over the whole \
         ERP database. Input: the question in plain language."
    }

    async fn run(&self, input: &str) -> Result<String> {
        let generated = self
            .provider
            .complete(&Self::translation_prompt(input.trim()))
            .await?;
        let statement = validate_statement(&generated, SqlMode::Read, schema::ALL_TABLES)?;
        tracing::debug!(sql = %statement, "Generated analytics query");
        let result = self
            .store
            .query_in(&statement, schema::ALL_TABLES)
            .await?;
        Ok(format!("SQL: {statement}\nResult:\n{}", result.render()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ScriptedProvider;

    async fn seeded_store() -> ErpStore {
        let store = ErpStore::open_in_memory().unwrap();
        store
            .execute(
                "INSERT INTO customers (id, name, email) VALUES \
                 (1, 'Initech', 'ap@initech.test'), (2, 'Globex', 'ap@globex.test')",
            )
            .await
            .unwrap();
        store
            .execute("INSERT INTO invoices (customer_id, amount, status) VALUES (1, 120.5, 'paid')")
            .await
            .unwrap();
        store
            .execute("INSERT INTO invoices (customer_id, amount, status) VALUES (2, 80.0, 'open')")
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn runs_generated_query() {
        let provider = Arc::new(ScriptedProvider::new([
            "```sql\nSELECT COUNT(*) AS open_invoices FROM invoices WHERE status = 'open'\n```",
        ]));
        let tool = TextToSqlTool::new(seeded_store().await, provider.clone());
        let out = tool.run("How many open invoices are there?").await.unwrap();
        assert_eq!(
            out,
            "SQL: SELECT COUNT(*) AS open_invoices FROM invoices WHERE status = 'open'\n\
             Result:\nopen_invoices\n1"
        );
        let prompts = provider.prompts();
        assert!(prompts[0].contains("How many open invoices"));
        assert!(prompts[0].contains("invoices(id, customer_id"));
    }

    #[tokio::test]
    async fn refuses_generated_writes() {
        let provider = Arc::new(ScriptedProvider::new(["DELETE FROM invoices"]));
        let tool = TextToSqlTool::new(seeded_store().await, provider);
        assert!(tool.run("delete everything").await.is_err());
    }

    #[tokio::test]
    async fn generated_query_cannot_read_the_catalog() {
        let provider = Arc::new(ScriptedProvider::new([
            "SELECT name FROM [sqlite_master]",
            "SELECT name FROM main.\"sqlite_master\"",
        ]));
        let tool = TextToSqlTool::new(seeded_store().await, provider);
        assert!(tool.run("list the tables").await.is_err());
        assert!(tool.run("list the tables again").await.is_err());
    }
}
