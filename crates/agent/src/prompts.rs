//! Fixed prompt templates for the control loops.
//!
//! Every template is a pure function of its inputs so prompt rendering can
//! be asserted in tests. The ReAct instructions re-embed the *original*
//! user request each turn — after several tool observations the model
//! otherwise drifts from the task.

/// ReAct instruction template: grammar description, tool catalogue, and the
/// original request. Rendered as a human turn at the start of every
/// iteration.
pub fn react_instructions(question: &str, catalogue: &str) -> String {
    format!(
        r#"Answer the following question. You may use tools.

Available tools:
{catalogue}

Respond in exactly this format:

Thought: your reasoning about what to do next
Action: the tool name (one of the tools above)
Action Input: a JSON object with the tool's arguments

or, when you know the answer:

Thought: your reasoning
Final Answer: the answer to the question

Question: {question}"#
    )
}

/// Corrective turn pushed back into the conversation after a parse error.
pub fn repair_message(error: &str) -> String {
    format!(
        "Your previous response could not be interpreted: {error}. \
         Respond using the required format: either an Action: line with an \
         Action Input: JSON object, or a Final Answer: line."
    )
}

/// Observation turn carrying a tool result back to the model.
pub fn observation_message(output: &str) -> String {
    format!("Observation: {output}")
}

/// Router classification prompt. Asks for a JSON verdict against a fixed
/// taxonomy of tool capabilities.
pub fn router_prompt(query: &str, catalogue: &str) -> String {
    format!(
        r#"Classify the following request. Decide whether it can be answered directly from general knowledge ("direct") or needs one of these tools ("tool-use"):

{catalogue}

Respond with a JSON object:
{{"route": "direct" or "tool-use", "reasoning": "why", "confidence": 0.0 to 1.0, "suggestedTool": "tool name, only for tool-use"}}

Request: {query}"#
    )
}

/// Judge rubric prompt. Asks for four independent 0-1 ratings plus
/// qualitative feedback.
pub fn judge_prompt(question: &str, answer: &str) -> String {
    format!(
        r#"Rate the following answer on four independent dimensions, each from 0.0 to 1.0:
- accuracy: is it factually correct?
- relevance: does it address the question asked?
- clarity: is it well structured and easy to follow?
- completeness: does it cover what the question needs?

Respond with a JSON object:
{{"accuracy": 0.0, "relevance": 0.0, "clarity": 0.0, "completeness": 0.0, "feedback": "qualitative assessment", "suggestions": "concrete improvements, if any rating is low"}}

Question: {question}

Answer: {answer}"#
    )
}

/// Revision request for the improvement loop, conditioned on the previous
/// answer and the judge's feedback.
pub fn revision_prompt(
    question: &str,
    answer: &str,
    feedback: &str,
    suggestions: Option<&str>,
) -> String {
    let suggestions_block = match suggestions {
        Some(s) if !s.is_empty() => format!("\n\nSuggestions:\n{s}"),
        _ => String::new(),
    };
    format!(
        r#"Improve the following answer based on the reviewer feedback. Return only the improved answer, nothing else.

Question: {question}

Previous answer:
{answer}

Feedback:
{feedback}{suggestions_block}"#
    )
}

/// Stability hint appended to every regeneration request. Flaky generated
/// tests are usually timing or async-ordering bugs, so the hint steers the
/// model there.
pub const STABILITY_HINT: &str = "The code must pass repeated, independent runs. \
Pay particular attention to timing assumptions, async completion ordering, \
and shared state between test cases: avoid fixed sleeps, await every \
asynchronous operation, and make each run independent of the previous one.";

/// Regeneration request for the stability loop, conditioned on the failing
/// run's output.
pub fn regeneration_prompt(artifact: &str, failure_output: &str) -> String {
    format!(
        r#"The following generated test code failed when executed. Fix it and return only the corrected code, nothing else.

{STABILITY_HINT}

Current code:
{artifact}

Failure output:
{failure_output}"#
    )
}
