// Copyright 2026 The Pulsewire Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Runtime configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the connection lifecycle and I/O concurrency engine.
///
/// The three `keep_alive_*` fields correspond directly to the parameters
/// named in the wire protocol's liveness contract: `interval` is the period
/// at which a well-behaved client is expected to send a `KEEP_ALIVE`
/// message, `check_period` is how many intervals the Liveness scanner waits
/// between scans, and `prod` is the age beyond which a connection's last
/// heartbeat is considered late enough to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Expected period between a client's `KEEP_ALIVE` messages.
    #[serde(with = "duration_secs")]
    pub keep_alive_interval: Duration,
    /// Multiplier: the Liveness scanner runs every
    /// `keep_alive_interval * keep_alive_check_period`.
    pub keep_alive_check_period: u32,
    /// Age beyond which a connection's last heartbeat is reported as late.
    #[serde(with = "duration_secs")]
    pub keep_alive_prod: Duration,
    /// Number of Reader worker threads draining the shared readiness queue.
    pub worker_threads: usize,
    /// `mio::Events` batch capacity per dispatcher wakeup.
    pub events_capacity: usize,
}

impl Config {
    /// Interval at which the Liveness scanner wakes up and scans the table.
    pub fn check_period(&self) -> Duration {
        self.keep_alive_interval * self.keep_alive_check_period
    }

    /// Parses a `Config` from a TOML document, falling back to
    /// [`Config::default`] for any field the document omits.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

impl Default for Config {
    fn default() -> Self {
        let keep_alive_interval = Duration::from_secs(5);
        Self {
            keep_alive_interval,
            keep_alive_check_period: 3,
            // prod >= 2 * interval keeps a couple of missed heartbeats from
            // false-positiving a timeout report.
            keep_alive_prod: keep_alive_interval * 3,
            worker_threads: 4,
            events_capacity: 1024,
        }
    }
}

/// (De)serializes a `Duration` as whole seconds, so a config file can write
/// `keep_alive_interval = 5` instead of a nested struct.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        value.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
