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

//! Decoded message envelope and the classifier used by the Reader.
//!
//! The JSON message schema itself is out of scope for this crate (callers
//! define their own `type`-tagged payloads); what lives here is the minimal
//! generic envelope needed to tell a heartbeat apart from everything else,
//! and to synthesize the software-error messages the core reports on the
//! caller's behalf.

use serde_json::Value;

use crate::error::DecodeError;

/// The sentinel `type` value that marks a heartbeat. Never delivered to a
/// consumer; see [`Message::is_keep_alive`].
pub const KEEP_ALIVE_TYPE: &str = "KEEP_ALIVE";

const SOFTWARE_ERROR_TYPE: &str = "SOFTWARE_ERROR";

/// A decoded JSON message, or a synthesized software-error report.
#[derive(Debug, Clone, PartialEq)]
pub struct Message(Value);

impl Message {
    /// Decodes one framed object's bytes into a `Message`. Pure: no I/O, no
    /// partial-decode state carried between calls.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(bytes).map(Message).map_err(DecodeError)
    }

    /// Builds a software-error message carrying `reason`, the shape the core
    /// uses to report decode failures and protocol errors to the consumer.
    pub fn software_error(reason: impl Into<String>) -> Self {
        Message(serde_json::json!({
            "type": SOFTWARE_ERROR_TYPE,
            "reason": reason.into(),
        }))
    }

    /// True when this message's sole purpose is to refresh a connection's
    /// liveness and must never reach the delivery queue.
    pub fn is_keep_alive(&self) -> bool {
        self.0.get("type").and_then(Value::as_str) == Some(KEEP_ALIVE_TYPE)
    }

    /// Borrows the decoded JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for Message {
    fn from(value: Value) -> Self {
        Message(value)
    }
}
