//! Tool subsystem: the named capabilities agents call during a reasoning loop.
//!
//! Every tool implements [`Tool`]: a name, a description, and an async `run`
//! taking one text input and returning observation text. Tools are registered
//! once into a [`ToolRegistry`] by [`build_registry`] before any agent is
//! built; agents then resolve their fixed toolsets from it by name.

pub mod classifier;
pub mod glossary;
pub mod registry;
pub mod sql;
pub mod text_to_sql;
pub mod traits;

pub use classifier::IntentClassifierTool;
pub use glossary::GlossaryReadTool;
pub use registry::{RegistryError, ToolRegistry};
pub use sql::{SqlMode, SqlTool};
pub use text_to_sql::TextToSqlTool;
pub use traits::{Tool, ToolSpec};

use crate::providers::Provider;
use crate::store::{schema, ErpStore};
use std::sync::Arc;

pub const SALES_SQL_READ: &str = "sales_sql_read";
pub const SALES_SQL_WRITE: &str = "sales_sql_write";
pub const FINANCE_SQL_READ: &str = "finance_sql_read";
pub const FINANCE_SQL_WRITE: &str = "finance_sql_write";
pub const INVENTORY_SQL_READ: &str = "inventory_sql_read";
pub const INVENTORY_SQL_WRITE: &str = "inventory_sql_write";
pub const TEXT_TO_SQL: &str = "text_to_sql_tool";
pub const GLOSSARY_READ: &str = "glossary_read";
pub const INTENT_CLASSIFIER: &str = "intent_classifier";

fn domain_sql_tool(
    store: &ErpStore,
    name: &str,
    domain: &str,
    mode: SqlMode,
    tables: &'static [&'static str],
) -> SqlTool {
    let verb = match mode {
        SqlMode::Read => "Runs one read-only SELECT query",
        SqlMode::Write => "Runs one INSERT, UPDATE or DELETE statement",
    };
    let description = format!("{verb} against the {domain} tables ({}).", tables.join(", "));
    SqlTool::new(name, &description, store.clone(), mode, tables)
}

fn sql_tools(store: &ErpStore) -> Vec<SqlTool> {
    use SqlMode::{Read, Write};
    vec![
        domain_sql_tool(store, SALES_SQL_READ, "sales", Read, schema::SALES_TABLES),
        domain_sql_tool(store, SALES_SQL_WRITE, "sales", Write, schema::SALES_TABLES),
        domain_sql_tool(store, FINANCE_SQL_READ, "finance", Read, schema::FINANCE_TABLES),
        domain_sql_tool(store, FINANCE_SQL_WRITE, "finance", Write, schema::FINANCE_TABLES),
        domain_sql_tool(store, INVENTORY_SQL_READ, "inventory", Read, schema::INVENTORY_TABLES),
        domain_sql_tool(store, INVENTORY_SQL_WRITE, "inventory", Write, schema::INVENTORY_TABLES),
    ]
}

/// Register every ERP tool. Called once at start-up.
pub fn build_registry(
    store: &ErpStore,
    provider: Arc<dyn Provider>,
) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    for tool in sql_tools(store) {
        registry.register(Arc::new(tool))?;
    }
    registry.register(Arc::new(TextToSqlTool::new(store.clone(), provider.clone())))?;
    registry.register(Arc::new(GlossaryReadTool::new(store.clone())))?;
    registry.register(Arc::new(IntentClassifierTool::new(provider)))?;
    tracing::debug!(tools = registry.len(), "Tool registry built");
    Ok(registry)
}
