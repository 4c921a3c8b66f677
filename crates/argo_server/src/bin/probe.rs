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

//! A small smoke-test client for the streaming chat endpoint. Sends one
//! request, prints each delta as it arrives, and reports the reassembled
//! text — useful for confirming a running proxy translates an upstream
//! stream correctly without reaching for a browser or curl.

use futures::StreamExt;
use reqwest_eventsource::{retry, Event, EventSource};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Sends one streaming chat request and prints the reassembled reply.
#[derive(argh::FromArgs, PartialEq, Debug)]
pub struct Probe {
    /// the base URL of the proxy to probe.
    #[argh(option, short = 'u', default = "String::from(\"http://127.0.0.1:44497\")")]
    pub url: String,

    /// the model alias to request.
    #[argh(option, short = 'm', default = "String::from(\"argo:gpt-4o\")")]
    pub model: String,

    /// the user message to send.
    #[argh(
        option,
        short = 'p',
        default = "String::from(\"Say hello in one short sentence.\")"
    )]
    pub prompt: String,
}

#[tokio::main]
async fn main() {
    let format = tracing_subscriber::fmt::layer().compact();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry().with(format).with(filter).init();

    let args: Probe = argh::from_env();

    let body = serde_json::json!({
        "model": args.model,
        "stream": true,
        "messages": [
            {"role": "user", "content": args.prompt},
        ],
    });

    let client = reqwest::Client::new();
    let builder = client
        .post(format!("{}/v1/chat/completions", args.url))
        .json(&body);

    let mut event_source = EventSource::new(builder).expect("failed to build request");
    event_source.set_retry_policy(Box::new(retry::Never));

    let mut text = String::new();
    while let Some(event) = event_source.next().await {
        match event {
            Ok(Event::Open) => {}
            Ok(Event::Message(message)) => {
                if message.data == "[DONE]" {
                    event_source.close();
                    break;
                }
                if let Ok(chunk) = serde_json::from_str::<serde_json::Value>(&message.data) {
                    if let Some(delta) = chunk["choices"][0]["delta"]["content"].as_str() {
                        print!("{delta}");
                        text.push_str(delta);
                    }
                }
            }
            Err(reqwest_eventsource::Error::StreamEnded) => break,
            Err(err) => {
                eprintln!("error: {err}");
                event_source.close();
                break;
            }
        }
    }

    println!();
    tracing::info!(len = text.len(), "reassembled reply");
}
