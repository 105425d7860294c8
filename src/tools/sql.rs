//! Domain-scoped SQL tools.
//!
//! Each domain gets a read tool and a write tool over its own tables. The
//! statement is checked before it reaches the store: exactly one statement,
//! the right verb for the tool's mode, and only allow-listed tables.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::iter::Peekable;
use std::str::Chars;

use super::traits::Tool;
use crate::store::ErpStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlMode {
    /// `SELECT` / `WITH` only
    Read,
    /// `INSERT` / `UPDATE` / `DELETE` only
    Write,
}

const READ_VERBS: [&str; 2] = ["SELECT", "WITH"];
const WRITE_VERBS: [&str; 3] = ["INSERT", "UPDATE", "DELETE"];
const ALWAYS_FORBIDDEN: [&str; 8] = [
    "DROP", "ALTER", "CREATE", "ATTACH", "DETACH", "PRAGMA", "VACUUM", "REINDEX",
];
const TABLE_CLAUSES: [&str; 4] = ["FROM", "JOIN", "INTO", "UPDATE"];

/// Words that end a table reference instead of naming its alias.
const NOT_AN_ALIAS: [&str; 29] = [
    "WHERE", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "CROSS", "NATURAL", "OUTER", "ON",
    "USING", "GROUP", "ORDER", "LIMIT", "OFFSET", "HAVING", "UNION", "INTERSECT", "EXCEPT",
    "SET", "VALUES", "SELECT", "DEFAULT", "RETURNING", "WINDOW", "INDEXED", "NOT", "AS",
    "FROM",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Bare identifier or keyword, as written
    Word(String),
    /// `"name"`, `` `name` `` or `[name]` with the quotes removed
    Quoted(String),
    /// String or numeric literal
    Literal,
    Punct(char),
}

impl Token {
    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }

    fn is_any_keyword(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.is_keyword(k))
    }

    fn identifier(&self) -> Option<&str> {
        match self {
            Token::Word(name) | Token::Quoted(name) => Some(name),
            _ => None,
        }
    }
}

fn read_quoted(chars: &mut Peekable<Chars<'_>>, close: char) -> Result<String> {
    let mut text = String::new();
    while let Some(c) = chars.next() {
        if c == close {
            // A doubled quote is an escaped quote, except inside [brackets]
            if close != ']' && chars.peek() == Some(&close) {
                chars.next();
                text.push(close);
                continue;
            }
            return Ok(text);
        }
        text.push(c);
    }
    bail!("Unterminated quote in SQL statement")
}

/// Split a statement into SQL tokens. Comments are dropped.
fn tokenize(sql: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '-' if chars.peek() == Some(&'-') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                let mut closed = false;
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        closed = true;
                        break;
                    }
                    prev = c;
                }
                if !closed {
                    bail!("Unterminated comment in SQL statement");
                }
            }
            '\'' => {
                read_quoted(&mut chars, '\'')?;
                tokens.push(Token::Literal);
            }
            '"' | '`' => tokens.push(Token::Quoted(read_quoted(&mut chars, c)?)),
            '[' => tokens.push(Token::Quoted(read_quoted(&mut chars, ']')?)),
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if !(next.is_ascii_alphanumeric() || next == '_' || next == '$') {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
            c if c.is_ascii_digit() => {
                while chars
                    .peek()
                    .is_some_and(|n| n.is_ascii_alphanumeric() || *n == '.')
                {
                    chars.next();
                }
                tokens.push(Token::Literal);
            }
            other => tokens.push(Token::Punct(other)),
        }
    }
    Ok(tokens)
}

/// Index of the `)` matching the `(` at `open`, or the token count if unbalanced.
fn closing_paren(tokens: &[Token], open: usize) -> usize {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token {
            Token::Punct('(') => depth += 1,
            Token::Punct(')') => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
    }
    tokens.len()
}

#[derive(Debug)]
struct TableRef {
    name: String,
    /// Written as `schema.table`
    qualified: bool,
}

/// Every table named after FROM, JOIN, INTO or UPDATE, including each entry
/// of a comma-separated FROM list and the tables inside subqueries.
fn table_refs(tokens: &[Token]) -> Vec<TableRef> {
    let mut refs = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let starts_clause = tokens[i].is_any_keyword(&TABLE_CLAUSES)
            && !(i > 0 && tokens[i - 1].is_keyword("DISTINCT"));
        i += 1;
        if !starts_clause {
            continue;
        }
        // UPDATE OR IGNORE leads ...
        if tokens.get(i).is_some_and(|t| t.is_keyword("OR")) {
            i += 2;
        }
        loop {
            match tokens.get(i) {
                Some(Token::Punct('(')) => {
                    let close = closing_paren(tokens, i);
                    refs.extend(table_refs(&tokens[i + 1..close.min(tokens.len())]));
                    i = close + 1;
                }
                Some(token) => {
                    let Some(first) = token.identifier() else {
                        break;
                    };
                    let mut table = TableRef {
                        name: first.to_ascii_lowercase(),
                        qualified: false,
                    };
                    i += 1;
                    if tokens.get(i) == Some(&Token::Punct('.')) {
                        if let Some(name) = tokens.get(i + 1).and_then(Token::identifier) {
                            table = TableRef {
                                name: name.to_ascii_lowercase(),
                                qualified: true,
                            };
                            i += 2;
                        }
                    }
                    refs.push(table);
                }
                None => break,
            }
            // Optional alias
            if tokens.get(i).is_some_and(|t| t.is_keyword("AS")) {
                i += 2;
            } else if matches!(tokens.get(i), Some(Token::Word(_) | Token::Quoted(_)))
                && !tokens[i].is_any_keyword(&NOT_AN_ALIAS)
            {
                i += 1;
            }
            if tokens.get(i) == Some(&Token::Punct(',')) {
                i += 1;
            } else {
                break;
            }
        }
    }
    refs
}

/// Names bound by `WITH name [(columns)] AS [NOT] [MATERIALIZED] (...)`.
fn cte_names(tokens: &[Token]) -> Vec<String> {
    let mut names = Vec::new();
    for (start, token) in tokens.iter().enumerate() {
        if !token.is_keyword("WITH") {
            continue;
        }
        let mut i = start + 1;
        if tokens.get(i).is_some_and(|t| t.is_keyword("RECURSIVE")) {
            i += 1;
        }
        while let Some(name) = tokens.get(i).and_then(Token::identifier) {
            i += 1;
            if tokens.get(i) == Some(&Token::Punct('(')) {
                i = closing_paren(tokens, i) + 1;
            }
            if !tokens.get(i).is_some_and(|t| t.is_keyword("AS")) {
                break;
            }
            names.push(name.to_ascii_lowercase());
            i += 1;
            while tokens
                .get(i)
                .is_some_and(|t| t.is_keyword("NOT") || t.is_keyword("MATERIALIZED"))
            {
                i += 1;
            }
            if tokens.get(i) != Some(&Token::Punct('(')) {
                break;
            }
            i = closing_paren(tokens, i) + 1;
            if tokens.get(i) != Some(&Token::Punct(',')) {
                break;
            }
            i += 1;
        }
    }
    names
}

/// Remove surrounding markdown code fences (```sql ... ```).
pub(crate) fn strip_code_fences(input: &str) -> &str {
    let trimmed = input.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Check a statement against a mode and table allowlist.
///
/// Returns the normalised statement (fences and trailing `;` removed).
pub fn validate_statement(sql: &str, mode: SqlMode, tables: &[&str]) -> Result<String> {
    let statement = strip_code_fences(sql).trim().trim_end_matches(';').trim();
    if statement.is_empty() {
        bail!("Empty SQL statement");
    }
    let tokens = tokenize(statement)?;
    if tokens.contains(&Token::Punct(';')) {
        bail!("Only a single SQL statement is allowed");
    }

    let words: Vec<String> = tokens
        .iter()
        .filter_map(|t| match t {
            Token::Word(w) => Some(w.to_ascii_uppercase()),
            _ => None,
        })
        .collect();
    let verb = match tokens.first() {
        Some(Token::Word(w)) => w.to_ascii_uppercase(),
        _ => String::new(),
    };

    match mode {
        SqlMode::Read => {
            if !READ_VERBS.contains(&verb.as_str()) {
                bail!("Only SELECT queries are allowed with this tool");
            }
            if let Some(op) = words.iter().find(|w| WRITE_VERBS.contains(&w.as_str())) {
                bail!("{op} is not allowed in a read query");
            }
        }
        SqlMode::Write => {
            if !WRITE_VERBS.contains(&verb.as_str()) {
                bail!("Only INSERT, UPDATE or DELETE statements are allowed with this tool");
            }
        }
    }
    if let Some(op) = words
        .iter()
        .find(|w| ALWAYS_FORBIDDEN.contains(&w.as_str()))
    {
        bail!("{op} operations are not allowed");
    }

    let ctes = cte_names(&tokens);
    for table in table_refs(&tokens) {
        if !table.qualified && ctes.contains(&table.name) {
            continue;
        }
        if !tables.iter().any(|t| t.eq_ignore_ascii_case(&table.name)) {
            bail!(
                "Access to table '{}' is not allowed. Allowed tables: {}",
                table.name,
                tables.join(", ")
            );
        }
    }

    Ok(statement.to_string())
}

pub struct SqlTool {
    name: String,
    description: String,
    store: ErpStore,
    mode: SqlMode,
    tables: &'static [&'static str],
}

impl SqlTool {
    pub fn new(
        name: &str,
        description: &str,
        store: ErpStore,
        mode: SqlMode,
        tables: &'static [&'static str],
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            store,
            mode,
            tables,
        }
    }

    pub fn mode(&self) -> SqlMode {
        self.mode
    }
}

#[async_trait]
impl Tool for SqlTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, input: &str) -> Result<String> {
        let statement = validate_statement(input, self.mode, self.tables)?;
        tracing::debug!(tool = %self.name, sql = %statement, "Running SQL");
        match self.mode {
            SqlMode::Read => Ok(self
                .store
                .query_in(&statement, self.tables)
                .await?
                .render()),
            SqlMode::Write => {
                let affected = self.store.execute_in(&statement, self.tables).await?;
                Ok(format!(
                    "Statement executed successfully. {affected} row(s) affected."
                ))
            }
        }
    }
}
