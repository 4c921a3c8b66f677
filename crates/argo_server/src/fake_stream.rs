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

//! The Fake-Stream Adapter: when a client asks for `stream: true` but the
//! resolved model can't be streamed upstream, buffer the full non-streaming
//! reply and re-emit it as fixed-size windows with a small inter-chunk delay,
//! so the translator's streaming path never has to know the difference.

use std::time::Duration;

use futures::Stream;

const WINDOW_SIZE: usize = 20;
const INTER_CHUNK_DELAY: Duration = Duration::from_millis(20);

/// Splits `text` into fixed-size character windows and yields each after a
/// short delay, the last one immediately preceded rather than followed (the
/// delay models upstream latency between chunks, not a trailing pause).
pub fn windows(text: String) -> impl Stream<Item = String> {
    async_stream::stream! {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return;
        }
        let mut first = true;
        for window in chars.chunks(WINDOW_SIZE) {
            if !first {
                tokio::time::sleep(INTER_CHUNK_DELAY).await;
            }
            first = false;
            yield window.iter().collect::<String>();
        }
    }
}
