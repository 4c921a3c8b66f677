/* Copyright 2023- The Binedge, Lda team. All rights reserved.
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *     http://www.apache.org/licenses/LICENSE-2.0
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! The Function-Call Bridge: expands OpenAI `tools` into an instructional
//! system-prompt preamble for models with no native tool-calling support, and
//! parses the resulting `FUNCTION_CALL:`/`ARGUMENTS:` reply back into an
//! OpenAI `tool_calls` shape.
//!
//! The preamble wording and the reply regex are a fixed contract: both the
//! client and the model on the other end of the upstream depend on the
//! literal `FUNCTION_CALL:`/`ARGUMENTS:` text, so neither can drift
//! independently of the other.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde_json::Value;

use crate::openai_types::{ToolCall, ToolCallFunction};

static FUNCTION_CALL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)FUNCTION_CALL:\s*(\w+)\s*\nARGUMENTS:\s*(\{.*?\})").unwrap());

/// Builds the fixed instructional preamble for `tools`, ending with the
/// function list produced by [`schema_to_prompt`].
pub fn build_function_calling_preamble(tools: &[Value]) -> String {
    let function_descriptions = schema_to_prompt(tools);
    format!(
        "You are a helpful assistant with access to functions. When you want to call a function, use the exact format below in your response to the user:\n\n\
When an interaction requires a function call, respond IMMEDIATELY and ONLY with:\n\
FUNCTION_CALL: function_name\n\
ARGUMENTS: {{\"param1\": \"value1\", \"param2\": \"value2\"}}\n\n\
NEVER say \"I will\", \"Let me\", \"I'll retrieve\", or any explanatory text.\n\n\
Example:\n\
    User: \"What is the summary of document ABC?\"\n\
    Correct response: FUNCTION_CALL: get\\nARGUMENTS: {{\"docid\": \"ABC\"}}\n\
    Wrong response: \"I will retrieve the content for you.\"\n\n\
Just call the function immediately using the exact format above. The ARGUMENTS must be valid JSON. Use double quotes for string.\n\n\
Otherwise, respond normally with text.\n\n\
{function_descriptions}"
    )
}

/// Renders one `- name(param: type (required) - desc, ...): description`
/// line per tool, preceded by the `Available functions:` header.
fn schema_to_prompt(tools: &[Value]) -> String {
    let mut lines = vec!["Available functions:".to_string()];

    for tool in tools {
        let func = &tool["function"];
        let name = func.get("name").and_then(Value::as_str).unwrap_or("");
        let description = func.get("description").and_then(Value::as_str).unwrap_or("");

        let mut params = Vec::new();
        if let Some(properties) = func
            .get("parameters")
            .and_then(|p| p.get("properties"))
            .and_then(Value::as_object)
        {
            let required: Vec<&str> = func
                .get("parameters")
                .and_then(|p| p.get("required"))
                .and_then(Value::as_array)
                .map(|arr| arr.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();

            for (param_name, info) in properties {
                let param_type = info.get("type").and_then(Value::as_str).unwrap_or("string");
                let param_desc = info.get("description").and_then(Value::as_str).unwrap_or("");
                let mut param_str = format!("{param_name}: {param_type}");
                if required.contains(&param_name.as_str()) {
                    param_str.push_str(" (required)");
                }
                if !param_desc.is_empty() {
                    param_str.push_str(&format!(" - {param_desc}"));
                }
                params.push(param_str);
            }
        }

        lines.push(format!("- {name}({}): {description}", params.join(", ")));
    }

    lines.join("\n")
}

/// The parsed outcome of [`parse_function_call_response`].
pub struct ParsedFunctionCall {
    pub name: String,
    pub arguments: Value,
}

/// Matches `response_text` against the `FUNCTION_CALL:`/`ARGUMENTS:` pattern.
/// Returns `None` if the pattern doesn't match, or matches but the captured
/// arguments aren't valid JSON (the upstream treats both as plain text).
pub fn parse_function_call_response(response_text: &str) -> Option<ParsedFunctionCall> {
    let captures = FUNCTION_CALL_PATTERN.captures(response_text)?;
    let name = captures.get(1)?.as_str().trim().to_string();
    let arguments_str = captures.get(2)?.as_str().trim();
    let arguments: Value = serde_json::from_str(arguments_str).ok()?;
    Some(ParsedFunctionCall { name, arguments })
}

/// Generates a `call_<10hex>` tool-call id, matching `uuid4().hex[:10]`.
pub fn generate_tool_call_id() -> String {
    let mut rng = rand::thread_rng();
    let hex: String = (0..10)
        .map(|_| std::char::from_digit(rng.gen_range(0..16), 16).unwrap())
        .collect();
    format!("call_{hex}")
}

/// Builds the single-element `tool_calls` array the bridge installs when a
/// reply matches the function-call format.
pub fn to_tool_calls(parsed: &ParsedFunctionCall) -> Vec<ToolCall> {
    vec![ToolCall {
        id: generate_tool_call_id(),
        kind: "function".to_string(),
        function: ToolCallFunction {
            name: parsed.name.clone(),
            arguments: parsed.arguments.to_string(),
        },
    }]
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn preamble_lists_function_with_params() {
        let tools = vec![json!({
            "type": "function",
            "function": {
                "name": "get_weather",
                "description": "Fetch current weather",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "city": {"type": "string", "description": "city name"},
                    },
                    "required": ["city"],
                },
            },
        })];
        let preamble = build_function_calling_preamble(&tools);
        assert!(preamble.contains("FUNCTION_CALL: function_name"));
        assert!(preamble.contains("- get_weather(city: string (required) - city name): Fetch current weather"));
    }

    #[test]
    fn parses_valid_function_call() {
        let text = "FUNCTION_CALL: get_weather\nARGUMENTS: {\"city\": \"Chicago\"}";
        let parsed = parse_function_call_response(text).expect("should match");
        assert_eq!(parsed.name, "get_weather");
        assert_eq!(parsed.arguments, json!({"city": "Chicago"}));
    }

    #[test]
    fn parses_across_newlines_with_preceding_text() {
        let text = "Sure thing.\nFUNCTION_CALL: lookup\nARGUMENTS: {\n  \"id\": \"ABC\"\n}";
        let parsed = parse_function_call_response(text).expect("should match");
        assert_eq!(parsed.name, "lookup");
    }

    #[test]
    fn malformed_json_arguments_is_not_a_function_call() {
        let text = "FUNCTION_CALL: get_weather\nARGUMENTS: {not json}";
        assert!(parse_function_call_response(text).is_none());
    }

    #[test]
    fn plain_text_is_not_a_function_call() {
        assert!(parse_function_call_response("just a normal reply").is_none());
    }

    #[test]
    fn tool_call_id_has_expected_shape() {
        let id = generate_tool_call_id();
        assert!(id.starts_with("call_"));
        assert_eq!(id.len(), "call_".len() + 10);
    }
}
