//! Prompt construction and response cleanup for SQL++ generation.

use crate::metadata::{render_schema, DatasetMetadata};
use std::num::NonZeroU32;

/// sqlcoder-style task prompt with the dataverse schema inlined.
pub fn build_generation_prompt(
    natural_query: &str,
    metadata: &[DatasetMetadata],
    limit: NonZeroU32,
) -> String {
    format!(
        r#"### Task
Generate a SQL++ query to answer [QUESTION]{question}[/QUESTION]

### Instructions
- The query runs on Apache AsterixDB and must use SQL++ syntax.
- Return exactly one read-only SELECT statement. Never use DROP, DELETE, UPDATE, ALTER or INSERT.
- End the query with LIMIT {limit}.

### Database Schema
The query will run on a database with the following schema:
{schema}
### Answer
Given the database schema, here is the SQL++ query that [QUESTION]{question}[/QUESTION]
[SQL]
"#,
        question = natural_query.trim(),
        limit = limit,
        schema = render_schema(metadata),
    )
}

pub fn build_dataset_inference_prompt(natural_query: &str, metadata: &[DatasetMetadata]) -> String {
    let names: Vec<&str> = metadata.iter().map(|d| d.dataset_name.as_str()).collect();
    format!(
        r#"### Task
Identify the relevant dataset for the following natural language query:
[QUERY]{}[/QUERY]

### Available Datasets
{}

### Answer
The relevant dataset is:
"#,
        natural_query.trim(),
        names.join(", ")
    )
}

/// Extract the query text from a raw completion.
///
/// Handles echoed prompts (text after the last `[SQL]`), a closing `[/SQL]`
/// marker and markdown code fences. When the reply contains a fenced block
/// anywhere, the body of the first block is the query.
pub fn clean_generated_query(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(idx) = text.rfind("[SQL]") {
        text = &text[idx + "[SQL]".len()..];
    }
    if let Some(idx) = text.find("[/SQL]") {
        text = &text[..idx];
    }

    let text = text.trim();
    let inner = match text.find("```") {
        Some(open) => {
            let block = strip_language_tag(&text[open + 3..]);
            match block.find("```") {
                Some(close) => &block[..close],
                None => block,
            }
        }
        None => text,
    };
    inner.trim().to_string()
}

fn strip_language_tag(block: &str) -> &str {
    for tag in ["sqlpp", "sql"] {
        if let Some(rest) = block.strip_prefix(tag) {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                return rest;
            }
        }
    }
    block
}

/// First known dataset named as a whole word in the model's answer.
pub fn match_dataset<'a>(answer: &str, metadata: &'a [DatasetMetadata]) -> Option<&'a DatasetMetadata> {
    let words: Vec<String> = answer
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect();

    words.iter().find_map(|word| {
        metadata
            .iter()
            .find(|d| d.dataset_name.to_lowercase() == *word)
    })
}
