// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Resolver configuration.

use std::time::Duration;

/// The tunable behavior of a [`Resolver`](super::Resolver).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolverConfig {
    /// The timeout of the first round of queries, in milliseconds. Each
    /// later round doubles it. Zero means no timeout.
    pub initial_timeout_ms: u64,

    /// The number of rounds of queries made before giving up.
    pub timeout_retries: u32,

    /// Whether only authoritative answers are accepted.
    pub authoritative_only: bool,

    /// Whether queries carry the RD (recursion desired) bit.
    pub recursion_desired: bool,

    /// The most background address lookups that may run at once.
    pub max_background_tasks: usize,

    /// Whether queries go over TCP from the start.
    pub force_tcp: bool,
}

impl ResolverConfig {
    /// Returns the exchange timeout for the given (zero-based) round,
    /// or [`None`] if there is no timeout.
    pub fn timeout_for_round(&self, round: u32) -> Option<Duration> {
        if self.initial_timeout_ms == 0 {
            None
        } else {
            let factor = 1u64.checked_shl(round).unwrap_or(u64::MAX);
            Some(Duration::from_millis(
                self.initial_timeout_ms.saturating_mul(factor),
            ))
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            initial_timeout_ms: 1000,
            timeout_retries: 4,
            authoritative_only: false,
            recursion_desired: true,
            max_background_tasks: 7,
            force_tcp: false,
        }
    }
}
