//! Bibliographic parameter extraction through the hosted LLM.
//!
//! The model is asked for a fixed-arity, `|`-delimited reply. Replies with
//! the wrong number of fields are re-prompted in the same conversation, up
//! to `MAX_RETRY` times. Failures come back as an error record, never as a
//! partial record.

use rig::message::Message;
use tracing::{info, warn};

use crate::llm::ChatModel;
use crate::models::{Extraction, PaperParameters, Parameters};

/// Characters of paper text sent to the model.
pub const TEXT_BUDGET: usize = 6000;
/// Re-prompts allowed after the first attempt.
pub const MAX_RETRY: usize = 3;
pub const DELIMITER: char = '|';

const EXPECTED_FIELDS: usize = PaperParameters::FIELDS.len();

/// Longest prefix of `text` holding at most `budget` characters.
pub fn truncate_chars(text: &str, budget: usize) -> &str {
    match text.char_indices().nth(budget) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

pub fn build_extraction_prompt(text: &str) -> String {
    let fields = PaperParameters::FIELDS
        .iter()
        .enumerate()
        .map(|(i, field)| format!("{}. {}", i + 1, field))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Extract the following parameters from this biomedical paper text:\n\
        {fields}\n\n\
        Return exactly {count} values in the order above, separated by the '{delim}' character.\n\
        Never use '{delim}' inside a value. Write N/A for any value you cannot find.\n\
        Return only the values, with no labels, numbering or commentary.\n\n\
        Text excerpt: {excerpt}",
        fields = fields,
        count = EXPECTED_FIELDS,
        delim = DELIMITER,
        excerpt = truncate_chars(text, TEXT_BUDGET),
    )
}

fn field_count_prompt(found: usize) -> String {
    format!(
        "Your previous response contained {found} fields, but exactly {expected} are required. \
        Return exactly {expected} values separated by '{delim}', in the same order, and nothing else.",
        found = found,
        expected = EXPECTED_FIELDS,
        delim = DELIMITER,
    )
}

/// Strips surrounding whitespace and a code fence. Delimiters are kept, so
/// an empty first or last field still counts.
fn clean_response(raw: &str) -> &str {
    let mut cleaned = raw.trim();
    if let Some(rest) = cleaned.strip_prefix("```") {
        // Drop the fence line, which may carry a language tag.
        cleaned = rest.split_once('\n').map_or("", |(_, body)| body);
        cleaned = cleaned.trim_end().trim_end_matches("```");
    }
    cleaned.trim()
}

/// Splits a reply into fields trimmed of surrounding whitespace only.
pub fn split_fields(raw: &str) -> Vec<String> {
    clean_response(raw)
        .split(DELIMITER)
        .map(|field| field.trim().to_string())
        .collect()
}

pub async fn extract_parameters(model: &dyn ChatModel, text: &str) -> Extraction {
    let mut history: Vec<Message> = Vec::new();
    let mut prompt = build_extraction_prompt(text);
    let mut last_count = 0;

    for attempt in 1..=MAX_RETRY + 1 {
        let reply = match model.chat(prompt.clone(), history.clone()).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(attempt, error = %e, "Parameter extraction request failed");
                return Extraction::failed(format!("LLM request failed: {}", e));
            }
        };

        let fields = split_fields(&reply);
        last_count = fields.len();

        if let Some(record) = PaperParameters::from_fields(fields) {
            info!(attempt, "Extracted paper parameters");
            let display = record
                .labelled()
                .iter()
                .map(|(_, value)| *value)
                .collect::<Vec<_>>()
                .join(" | ");
            return Extraction {
                parameters: Parameters::Record(record),
                display,
            };
        }

        warn!(
            attempt,
            field_count = last_count,
            expected = EXPECTED_FIELDS,
            "Field count mismatch in extraction reply"
        );
        history.push(Message::user(prompt));
        history.push(Message::assistant(reply));
        prompt = field_count_prompt(last_count);
    }

    Extraction::failed(format!(
        "Failed to extract {} parameters after {} attempts (last response had {} fields)",
        EXPECTED_FIELDS,
        MAX_RETRY + 1,
        last_count
    ))
}
