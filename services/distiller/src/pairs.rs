//! Instruction/answer pairs: the distillation prompt and response parsing

use serde::{Deserialize, Serialize};

/// One training example in instruction-tuning format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub instruction: String,
    pub input: String,
    pub output: String,
}

/// Build the prompt asking for `pairs` QA pairs about `chunk`.
pub fn build_prompt(chunk: &str, pairs: usize) -> String {
    format!(
        "You are a domain expert and instructional designer. Extract the core knowledge \
from the text below and write at least {pairs} high-quality question/answer pairs for \
fine-tuning a small language model.\n\
\n\
Requirements:\n\
1. Cover concepts, procedures, best practices and common problems.\n\
2. Answers must be accurate, detailed and grounded in the text.\n\
3. Leave the \"input\" field as an empty string.\n\
\n\
Respond with a JSON array only:\n\
[{{\"instruction\": \"question\", \"input\": \"\", \"output\": \"detailed answer\"}}]\n\
\n\
Text:\n\
{chunk}\n"
    )
}

/// Parse a model response into QA pairs.
///
/// Accepts an optional ```json fence. A response cut off mid-array is repaired
/// by keeping every complete object before the last `},`.
pub fn parse_pairs(text: &str) -> Result<Vec<QaPair>, String> {
    let mut body = strip_fence(text.trim()).trim().to_string();

    if !body.ends_with(']') {
        match body.rfind("},") {
            Some(last_complete) => {
                body.truncate(last_complete + 1);
                body.push_str("\n]");
            }
            None => return Err("response is not a complete JSON array".to_string()),
        }
    }

    let pairs: Vec<QaPair> =
        serde_json::from_str(&body).map_err(|e| format!("invalid JSON array of QA pairs: {e}"))?;
    if pairs.is_empty() {
        return Err("response contained no QA pairs".to_string());
    }
    Ok(pairs)
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest)
}
