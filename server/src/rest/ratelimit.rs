// Receituario
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Per-client request rate limiting.

use futures::lock::Mutex;
use log::warn;
use receituario_core::clocks::Clock;
use receituario_core::rest::{RestError, RestResult};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

/// Number of tracked clients above which idle clients are forgotten.
const PRUNE_THRESHOLD: usize = 1024;

/// Counts the number of requests over the last minute with second resolution.
struct RequestCounter {
    /// Tracker of per-second counts within a minute.
    ///
    /// Each pair contains the timestamp of the ith second in the array and the counter of
    /// requests at that second.
    counts: [(i64, u16); 60],
}

impl RequestCounter {
    /// Creates a new request counter with no requests.
    fn new() -> Self {
        Self { counts: [(0, 0); 60] }
    }

    /// Adds a request to the counter at `now`, which is a number of seconds since the epoch.
    fn account(&mut self, now: i64) {
        let i = usize::try_from(now.rem_euclid(60)).unwrap_or(0);
        let (ts, count) = self.counts[i];
        if ts == now {
            self.counts[i] = (ts, count.saturating_add(1));
        } else {
            self.counts[i] = (now, 1);
        }
    }

    /// Counts the number of requests during the minute that precedes `now`.
    fn last_minute(&self, now: i64) -> usize {
        let since = now - 60;

        let mut total = 0;
        for (ts, count) in self.counts {
            if ts > since {
                total += usize::from(count);
            }
        }
        total
    }
}

/// Request counters of all known clients.
struct Clients {
    /// Request counters per client.
    counters: HashMap<Option<IpAddr>, RequestCounter>,

    /// Time of the last scan for idle clients, in seconds since the epoch.
    last_prune: i64,
}

impl Clients {
    /// Forgets clients without requests during the minute that precedes `now`.
    ///
    /// Only acts once the number of tracked clients reaches `PRUNE_THRESHOLD`, and at most once
    /// per second.
    fn prune(&mut self, now: i64) {
        if self.counters.len() < PRUNE_THRESHOLD || self.last_prune == now {
            return;
        }
        self.counters.retain(|_, counter| counter.last_minute(now) > 0);
        self.last_prune = now;
    }
}

/// Limits the number of requests that each client can issue per minute.
///
/// Clients are identified by their IP address.  Requests without a known peer address are all
/// accounted to the same client.
pub(crate) struct RateLimiter {
    /// Clock to obtain the current time from.
    clock: Arc<dyn Clock + Send + Sync>,

    /// Maximum number of requests per client over the last minute.  Zero disables limiting.
    max_per_minute: usize,

    /// Tracked clients.
    clients: Mutex<Clients>,
}

impl RateLimiter {
    /// Creates a new rate limiter backed by `clock` that allows `max_per_minute` requests per
    /// client.
    pub(crate) fn new(clock: Arc<dyn Clock + Send + Sync>, max_per_minute: usize) -> Self {
        let clients = Clients { counters: HashMap::default(), last_prune: 0 };
        Self { clock, max_per_minute, clients: Mutex::new(clients) }
    }

    /// Accounts a request from the client at `ip` and fails if the client exceeded its quota.
    ///
    /// Rejected requests count towards the quota too.
    pub(crate) async fn account(&self, ip: Option<IpAddr>) -> RestResult<()> {
        if self.max_per_minute == 0 {
            return Ok(());
        }

        let now = self.clock.now_utc().unix_timestamp();

        let mut clients = self.clients.lock().await;
        clients.prune(now);

        let counter = clients.counters.entry(ip).or_insert_with(RequestCounter::new);
        counter.account(now);
        if counter.last_minute(now) > self.max_per_minute {
            warn!("Rate limit exceeded for client {:?}", ip);
            return Err(RestError::TooManyRequests(format!(
                "Too many requests; limit is {} per minute",
                self.max_per_minute
            )));
        }
        Ok(())
    }
}
