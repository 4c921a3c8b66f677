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

//! Token Accountant: computes `prompt_tokens` over the final, shaped upstream
//! payload by concatenating whatever text the upstream will actually see
//! (`system`, then `prompt`/`messages[].content`) and handing it to the
//! opaque [`count_tokens`] estimator.

use serde_json::{Map, Value};

use argo_core::tokens::count_tokens;

/// Concatenates every piece of text the shaped payload sends upstream and
/// counts it. Shared across chat/completions/embeddings/responses, since all
/// four funnel through the same `system`/`prompt`/`messages` fields after
/// shaping.
pub fn prompt_tokens(shaped: &Map<String, Value>, model: &str) -> u32 {
    let mut text = String::new();

    if let Some(system) = shaped.get("system").and_then(Value::as_str) {
        text.push_str(system);
        text.push('\n');
    }

    if let Some(prompt) = shaped.get("prompt").and_then(Value::as_str) {
        text.push_str(prompt);
        text.push('\n');
    }

    if let Some(messages) = shaped.get("messages").and_then(Value::as_array) {
        for message in messages {
            if let Some(content) = message.get("content").and_then(Value::as_str) {
                text.push_str(content);
                text.push('\n');
            }
        }
    }

    count_tokens(&text, model)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn sums_messages_content() {
        let shaped = json!({
            "messages": [
                {"role": "user", "content": "one two"},
                {"role": "user", "content": "three"},
            ],
        });
        let shaped = shaped.as_object().unwrap();
        assert_eq!(prompt_tokens(shaped, "gpt4o"), 3);
    }

    #[test]
    fn includes_system_and_prompt() {
        let shaped = json!({"system": "a b", "prompt": "c"});
        let shaped = shaped.as_object().unwrap();
        assert_eq!(prompt_tokens(shaped, "gpt4o"), 3);
    }
}
