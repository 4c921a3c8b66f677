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

//! Command line interface.

/// Toplevel CLI commands and options. Subcommands are optional; with none
/// given, `serve` runs with default options.
#[derive(argh::FromArgs, PartialEq, Debug)]
pub struct TopLevel {
    /// subcommands
    #[argh(subcommand)]
    pub subcommand: Option<Command>,
}

/// Subcommands.
#[derive(argh::FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
pub enum Command {
    /// starts the proxy server.
    Serve(Serve),

    /// prints the version to stdout.
    Version(Version),

    /// prints the OpenAPI spec for the proxy's routes to stdout.
    Oasgen(Oasgen),
}

/// Starts the proxy server. This is the default command when no command is
/// given.
#[derive(argh::FromArgs, PartialEq, Debug, Default)]
#[argh(subcommand, name = "serve")]
pub struct Serve {}

/// Prints the version to stdout.
#[derive(argh::FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "version")]
pub struct Version {}

/// Prints the OpenAPI spec in yaml (default) or json format.
#[derive(argh::FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "oasgen")]
pub struct Oasgen {
    /// if present, prints the spec in yaml format; this is the default and
    /// can be omitted.
    #[argh(switch, short = 'y')]
    pub yaml: bool,
    /// if present, prints the spec in json format.
    #[argh(switch, short = 'j')]
    pub json: bool,
}
