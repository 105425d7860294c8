use anyhow::Result;
use async_trait::async_trait;

use super::traits::Tool;
use crate::store::ErpStore;

/// Looks up business terms in the `glossary` table.
pub struct GlossaryReadTool {
    store: ErpStore,
}

impl GlossaryReadTool {
    pub fn new(store: ErpStore) -> Self {
        Self { store }
    }
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[async_trait]
impl Tool for GlossaryReadTool {
    fn name(&self) -> &str {
        super::GLOSSARY_READ
    }

    fn description(&self) -> &str {
        "Looks up the definition of a business term in the glossary. Input: the term."
    }

    async fn run(&self, input: &str) -> Result<String> {
        let term = input.trim();
        let literal = quote_literal(term);

        let exact = self
            .store
            .query(&format!(
                "SELECT term, definition FROM glossary WHERE lower(term) = lower({literal}) LIMIT 1"
            ))
            .await?;
        let result = if exact.rows.is_empty() {
            let pattern = quote_literal(&format!("%{term}%"));
            self.store
                .query(&format!(
                    "SELECT term, definition FROM glossary WHERE term LIKE {pattern} ORDER BY term"
                ))
                .await?
        } else {
            exact
        };

        if result.rows.is_empty() {
            return Ok(format!("No definition found for '{term}'."));
        }
        Ok(result
            .rows
            .iter()
            .map(|row| format!("{}: {}", row[0], row[1]))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
