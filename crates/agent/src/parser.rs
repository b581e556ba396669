//! Step parser — pure `text -> ParsedStep` over the ReAct wire grammar.
//!
//! The model speaks plain text with line markers: `Thought:`, `Action:`,
//! `Action Input:` (a JSON object), `Observation:`, `Final Answer:`.
//! Parsing priority: an `Action:` line is checked **before** `Final
//! Answer:` — a response containing both is a tool call, because acting
//! takes precedence over concluding. Once an `Action:` line is present the
//! response is committed to the tool-call interpretation, so a missing or
//! malformed `Action Input:` is a parse error even if a `Final Answer:`
//! line follows.
//!
//! JSON payloads tolerate markdown code fences and surrounding prose: the
//! first top-level `{...}` span is extracted by brace matching.

use serde_json::Value;

/// One parsed model response. Derived fresh each iteration, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedStep {
    /// The model wants to invoke a tool.
    ToolCall { tool: String, input: Value },
    /// The model declared its final answer.
    FinalAnswer { text: String },
    /// The response matched neither pattern (or the action input was bad).
    ParseError { message: String },
}

const ACTION_MARKER: &str = "Action:";
const ACTION_INPUT_MARKER: &str = "Action Input:";
const FINAL_ANSWER_MARKER: &str = "Final Answer:";

/// Parse a raw model response into a step.
pub fn parse_step(text: &str) -> ParsedStep {
    if let Some(action_line_end) = find_marker_line(text, ACTION_MARKER) {
        return parse_tool_call(text, action_line_end);
    }

    if let Some(pos) = text.find(FINAL_ANSWER_MARKER) {
        let answer = text[pos + FINAL_ANSWER_MARKER.len()..].trim();
        return ParsedStep::FinalAnswer {
            text: answer.to_string(),
        };
    }

    ParsedStep::ParseError {
        message: "Response contains neither an Action: line nor a Final Answer: line".into(),
    }
}

/// Returns the byte offset just past the `Action:` marker if some line
/// starts with it (after trimming leading whitespace).
fn find_marker_line(text: &str, marker: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with(marker) {
            let indent = line.len() - trimmed.len();
            return Some(offset + indent + marker.len());
        }
        offset += line.len();
    }
    None
}

fn parse_tool_call(text: &str, after_action: usize) -> ParsedStep {
    let rest = &text[after_action..];
    let tool = rest.lines().next().unwrap_or("").trim().to_string();
    if tool.is_empty() {
        return ParsedStep::ParseError {
            message: "Action: line names no tool".into(),
        };
    }

    let Some(input_pos) = rest.find(ACTION_INPUT_MARKER) else {
        return ParsedStep::ParseError {
            message: format!("Action: {tool} has no Action Input: block"),
        };
    };
    let input_text = &rest[input_pos + ACTION_INPUT_MARKER.len()..];

    match extract_json_object(input_text) {
        Some(json) => match serde_json::from_str::<Value>(&json) {
            Ok(input) => ParsedStep::ToolCall { tool, input },
            Err(e) => ParsedStep::ParseError {
                message: format!("Action Input for {tool} is not valid JSON: {e}"),
            },
        },
        None => ParsedStep::ParseError {
            message: format!("Action Input for {tool} contains no JSON object"),
        },
    }
}

/// Extract the first top-level `{...}` span from text that may contain
/// surrounding prose or markdown code fences.
///
/// Brace-matches while tracking string literals and escapes, so braces
/// inside JSON strings don't end the span early. A ```json fence interior
/// is tried first; when the fence holds no object the full text is
/// scanned, so a span outside the fence is still found. Returns the span
/// as an owned string with any fence markers already stripped.
pub fn extract_json_object(text: &str) -> Option<String> {
    if let Some(body) = fence_body(text)
        && let Some(span) = first_object_span(body)
    {
        return Some(span);
    }
    first_object_span(text)
}

/// The interior of the first ``` fence, language tag stripped.
fn fence_body(text: &str) -> Option<&str> {
    let fence_start = text.find("```")?;
    let after = &text[fence_start + 3..];
    // Skip the language tag (e.g. "json") up to the end of that line.
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    match body.find("```") {
        Some(fence_end) => Some(&body[..fence_end]),
        None => Some(body),
    }
}

fn first_object_span(candidate: &str) -> Option<String> {
    let bytes = candidate.as_bytes();
    let start = candidate.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(candidate[start..=i].to_string());
                }
            }
            _ => {}
        }
    }
    None
}
