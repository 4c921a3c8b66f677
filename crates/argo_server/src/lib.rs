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

//! An OpenAI-compatible HTTP proxy translating to and from an internal
//! upstream chat/completion/embedding API.

use std::process::exit;
use std::time::Duration;

use tokio::select;
use tracing::{error, info};
use utoipa::OpenApi;

use argo_core::ModelRegistry;

pub mod accounting;
pub mod cli;
pub mod endpoints;
pub mod error;
pub mod fake_stream;
pub mod functions;
pub mod graceful_shutdown;
pub mod openai_types;
pub mod routes;
pub mod shaper;
pub mod state;
pub mod transport;
pub mod translator;

use state::AppState;
use transport::Transport;

/// The proxy's OpenAPI surface, covering the translation-engine routes.
/// `/v1/chat`, `/v1/status`, `/v1/docs` and `/health` are ambient
/// pass-through/convenience routes and are left out of the generated
/// document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "argoproxy API",
        description = "OpenAI-compatible proxy in front of an internal chat/completion/embedding API.",
    ),
    paths(
        endpoints::chat_completions::chat_completions,
        endpoints::completions::completions,
        endpoints::embeddings::embeddings,
        endpoints::responses::responses,
        endpoints::models::models,
    ),
    components(schemas(
        openai_types::ChatCompletionsRequest,
        openai_types::CompletionsRequest,
        openai_types::EmbeddingsRequest,
        openai_types::ResponsesRequest,
        openai_types::ChatMessage,
        openai_types::MessageContent,
        openai_types::StringOrArray,
        openai_types::ChatCompletion,
        openai_types::ChatCompletionChoice,
        openai_types::ChatCompletionMessage,
        openai_types::ToolCall,
        openai_types::ToolCallFunction,
        openai_types::Completion,
        openai_types::CompletionChoice,
        openai_types::EmbeddingList,
        openai_types::EmbeddingObject,
        openai_types::EmbeddingUsage,
        openai_types::ResponseEnvelope,
        openai_types::ResponseOutputMessage,
        openai_types::ResponseOutputText,
        openai_types::ResponseUsage,
        openai_types::ModelList,
        openai_types::ModelObject,
        openai_types::Usage,
        openai_types::ErrorBody,
    ))
)]
struct ApiDoc;

/// Result type for the process's top-level functions.
pub type ProxyResult = Result<(), String>;

/// Main entry point for the process; dispatches on the parsed CLI command.
pub fn start(command: &cli::TopLevel) -> ProxyResult {
    match &command.subcommand {
        None => serve(),
        Some(cli::Command::Serve(_)) => serve(),
        Some(cli::Command::Version(_)) => version(),
        Some(cli::Command::Oasgen(args)) => oasgen(args),
    }
}

/// Prints the version to stdout.
pub fn version() -> ProxyResult {
    println!(env!("CARGO_PKG_VERSION"));
    Ok(())
}

/// Prints the generated OpenAPI spec to stdout, in yaml unless `--json` was
/// given.
pub fn oasgen(args: &cli::Oasgen) -> ProxyResult {
    if args.json {
        println!("{}", ApiDoc::openapi().to_pretty_json().map_err(|e| e.to_string())?);
    } else {
        println!("{}", ApiDoc::openapi().to_yaml().map_err(|e| e.to_string())?);
    }
    Ok(())
}

fn serve() -> ProxyResult {
    start_server()
}

#[tokio::main]
async fn start_server() -> ProxyResult {
    let config = argo_core::config::load().map_err(|e| e.to_string())?;

    let filter = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    info!(host = %config.host, port = config.port, "starting argoproxy");

    let registry = ModelRegistry::new();
    let client = Transport::build_client(Duration::from_secs(config.timeout_secs))
        .map_err(|e| e.to_string())?;
    let transport = Transport::new(client);

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, registry, transport);
    let router = routes::build(state);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap_or_else(|err| {
        error!("could not bind to {addr}: {err}");
        exit(1)
    });

    info!("listening on {addr}");

    select! {
        result = axum::serve(listener, router).with_graceful_shutdown(graceful_shutdown::shutdown_starts()) => {
            if let Err(err) = result {
                error!("server error: {err}");
                exit(1);
            }
        }
        _ = graceful_shutdown::shutdown_ends() => {
            error!("shutdown grace period elapsed; exiting");
            exit(1);
        }
    }

    Ok(())
}
