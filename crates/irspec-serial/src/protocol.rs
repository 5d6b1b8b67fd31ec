//! Line protocol spoken by the multiplexer firmware
//!
//! ASCII, one command per `\n`-terminated line, one reply line per command:
//!
//! | Command     | Reply          |
//! |-------------|----------------|
//! | `PING`      | `PONG`         |
//! | `MUX <n>`   | `MUX_SET <n>`  |
//! | `GET_MUX`   | `MUX_POS <n>`  |

use irspec_core::{DeviceError, DeviceResult};

pub const PROBE: &str = "PING";
pub const PROBE_REPLY: &str = "PONG";
pub const QUERY_POSITION: &str = "GET_MUX";

const SET_PREFIX: &str = "MUX";
const SET_ACK: &str = "MUX_SET";
const POSITION_TAG: &str = "MUX_POS";

/// A command as parsed on the device side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxCommand {
    Ping,
    SetPosition(i64),
    QueryPosition,
    Unknown(String),
}

impl MuxCommand {
    /// Parse one command line (without terminator)
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line == PROBE {
            return MuxCommand::Ping;
        }
        if line == QUERY_POSITION {
            return MuxCommand::QueryPosition;
        }
        if let Some(arg) = line.strip_prefix(SET_PREFIX).and_then(|r| r.strip_prefix(' ')) {
            if let Ok(n) = arg.trim().parse() {
                return MuxCommand::SetPosition(n);
            }
        }
        MuxCommand::Unknown(line.to_string())
    }

    /// Render the command as sent on the wire (without terminator)
    pub fn to_line(&self) -> String {
        match self {
            MuxCommand::Ping => PROBE.to_string(),
            MuxCommand::SetPosition(n) => format!("{} {}", SET_PREFIX, n),
            MuxCommand::QueryPosition => QUERY_POSITION.to_string(),
            MuxCommand::Unknown(line) => line.clone(),
        }
    }
}

pub fn set_ack(position: i64) -> String {
    format!("{} {}", SET_ACK, position)
}

pub fn position_report(position: i64) -> String {
    format!("{} {}", POSITION_TAG, position)
}

/// Liveness probe must be echoed exactly
pub fn check_probe_reply(reply: &str) -> DeviceResult<()> {
    if reply == PROBE_REPLY {
        Ok(())
    } else {
        Err(mismatch(PROBE_REPLY, reply))
    }
}

/// Set acknowledgement must be exactly `MUX_SET <n>`
pub fn check_set_reply(position: i64, reply: &str) -> DeviceResult<()> {
    let expected = set_ack(position);
    if reply == expected {
        Ok(())
    } else {
        Err(mismatch(&expected, reply))
    }
}

/// Parse a `MUX_POS <n>` report
pub fn parse_position_reply(reply: &str) -> DeviceResult<i64> {
    reply
        .strip_prefix(POSITION_TAG)
        .and_then(|rest| rest.strip_prefix(' '))
        .and_then(|n| n.trim().parse().ok())
        .ok_or_else(|| mismatch(&format!("{} <n>", POSITION_TAG), reply))
}

fn mismatch(expected: &str, received: &str) -> DeviceError {
    DeviceError::UnexpectedReply {
        expected: expected.to_string(),
        received: received.to_string(),
    }
}
