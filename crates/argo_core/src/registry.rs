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

//! The Model Registry: a frozen-after-startup mapping from client-facing
//! aliases to upstream model ids, plus the capability sets that drive the
//! Request Shaper's system-message-demotion and streaming-eligibility rules.
//!
//! The alias tables are static seed data baked into the binary; the registry
//! never reads a file at runtime.

use std::collections::HashSet;

/// What kind of model an id resolves within. Chat and embedding aliases are
/// partitioned so the same alias string can't accidentally resolve across
/// endpoint kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Chat,
    Embedding,
}

/// `(alias, upstream_id)` pairs, in declaration order — `/v1/models` exposes
/// them in this stable order.
const CHAT_MODELS: &[(&str, &str)] = &[
    ("argo:gpt-3.5-turbo", "gpt35"),
    ("argo:gpt-3.5-turbo-16k", "gpt35large"),
    ("argo:gpt-4", "gpt4"),
    ("argo:gpt-4-32k", "gpt4large"),
    ("argo:gpt-4-turbo-preview", "gpt4turbo"),
    ("argo:gpt-4o", "gpt4o"),
    ("argo:gpt-o1-preview", "gpto1preview"),
    ("argo:gpt-o1-mini", "gpto1mini"),
    ("argo:gpt-o3-mini", "gpto3mini"),
];

const EMBED_MODELS: &[(&str, &str)] = &[
    ("argo:text-embedding-ada-002", "ada002"),
    ("argo:text-embedding-3-small", "v3small"),
    ("argo:text-embedding-3-large", "v3large"),
];

const DEFAULT_CHAT_UPSTREAM: &str = "gpt4o";
const DEFAULT_EMBED_UPSTREAM: &str = "v3small";

/// Patterns (trailing `*` only) defining which upstream ids reject
/// system-roled messages. Expanded against the tables above once at startup.
const NO_SYS_MSG_PATTERNS: &[&str] = &["argo:gpt-o*", "argo:o*", "gpto*"];

fn glob_match(pattern: &str, value: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => value == pattern,
    }
}

/// The registry proper: two alias→upstream maps and two precomputed
/// capability sets, all built once and never mutated again.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    chat: Vec<(String, String)>,
    embed: Vec<(String, String)>,
    no_sys_msg: HashSet<String>,
    non_streamable: HashSet<String>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRegistry {
    /// Builds the registry from the static seed tables, precomputing the
    /// `no_sys_msg` and streaming-capability sets once so `no_sys_msg`/
    /// `streamable` are plain set lookups rather than a glob match per call.
    pub fn new() -> Self {
        let chat: Vec<(String, String)> = CHAT_MODELS
            .iter()
            .map(|(a, u)| (a.to_string(), u.to_string()))
            .collect();
        let embed: Vec<(String, String)> = EMBED_MODELS
            .iter()
            .map(|(a, u)| (a.to_string(), u.to_string()))
            .collect();

        let mut no_sys_msg = HashSet::new();
        let mut non_streamable = HashSet::new();
        for (alias, upstream) in chat.iter() {
            let matches_no_sys = NO_SYS_MSG_PATTERNS
                .iter()
                .any(|p| glob_match(p, alias) || glob_match(p, upstream));
            if matches_no_sys {
                no_sys_msg.insert(upstream.clone());
                // Every known no-sys-msg (reasoning) family is also
                // non-streamable upstream.
                non_streamable.insert(upstream.clone());
            }
        }

        ModelRegistry {
            chat,
            embed,
            no_sys_msg,
            non_streamable,
        }
    }

    /// Resolves a client-supplied name to an upstream id. Accepts either a
    /// public alias or an id that is already an upstream id. Falls back to
    /// the kind-specific default for anything unrecognized. Total: never
    /// fails.
    pub fn resolve(&self, name: &str, kind: ModelKind) -> String {
        let (table, default) = match kind {
            ModelKind::Chat => (&self.chat, DEFAULT_CHAT_UPSTREAM),
            ModelKind::Embedding => (&self.embed, DEFAULT_EMBED_UPSTREAM),
        };

        for (alias, upstream) in table {
            if alias == name || upstream == name {
                return upstream.clone();
            }
        }
        default.to_string()
    }

    /// True if `upstream_id` must not receive any system-roled message.
    pub fn no_sys_msg(&self, upstream_id: &str) -> bool {
        self.no_sys_msg.contains(upstream_id)
    }

    /// True if `upstream_id` accepts `stream: true`.
    pub fn streamable(&self, upstream_id: &str) -> bool {
        !self.non_streamable.contains(upstream_id)
    }

    /// Stable `(alias, upstream_id)` sequence for chat models.
    pub fn list_chat(&self) -> &[(String, String)] {
        &self.chat
    }

    /// Stable `(alias, upstream_id)` sequence for embedding models.
    pub fn list_embed(&self) -> &[(String, String)] {
        &self.embed
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn resolves_known_alias() {
        let reg = ModelRegistry::new();
        assert_eq!(reg.resolve("argo:gpt-4o", ModelKind::Chat), "gpt4o");
    }

    #[test]
    fn resolves_already_upstream_id() {
        let reg = ModelRegistry::new();
        assert_eq!(reg.resolve("gpt4o", ModelKind::Chat), "gpt4o");
    }

    #[test]
    fn unknown_alias_falls_back_to_default() {
        let reg = ModelRegistry::new();
        assert_eq!(
            reg.resolve("argo:nonsense", ModelKind::Chat),
            DEFAULT_CHAT_UPSTREAM
        );
        assert_eq!(
            reg.resolve("argo:nonsense", ModelKind::Embedding),
            DEFAULT_EMBED_UPSTREAM
        );
    }

    #[test]
    fn case_sensitive_match() {
        let reg = ModelRegistry::new();
        assert_eq!(
            reg.resolve("ARGO:GPT-4O", ModelKind::Chat),
            DEFAULT_CHAT_UPSTREAM
        );
    }

    #[test]
    fn no_sys_msg_covers_reasoning_family() {
        let reg = ModelRegistry::new();
        assert!(reg.no_sys_msg("gpto1mini"));
        assert!(reg.no_sys_msg("gpto3mini"));
        assert!(!reg.no_sys_msg("gpt4o"));
    }

    #[test]
    fn non_streamable_matches_no_sys_msg_family() {
        let reg = ModelRegistry::new();
        assert!(!reg.streamable("gpto1mini"));
        assert!(reg.streamable("gpt4o"));
    }

    #[test]
    fn list_chat_is_stable_order() {
        let reg = ModelRegistry::new();
        let ids: Vec<&str> = reg.list_chat().iter().map(|(a, _)| a.as_str()).collect();
        assert_eq!(ids.first(), Some(&"argo:gpt-3.5-turbo"));
    }

    #[test]
    fn glob_match_trailing_star() {
        assert!(glob_match("gpto*", "gpto1mini"));
        assert!(!glob_match("gpto*", "gpt4o"));
        assert!(glob_match("gpt4o", "gpt4o"));
    }
}
