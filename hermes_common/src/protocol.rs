//! Control-channel message types for module processes.
//!
//! Commands that are not per-frame (stage, reset, terminate) travel over
//! the module's stdin/stdout as newline-delimited JSON; the backplane is
//! the data path and the barrier is the per-frame path. Pause and resume
//! never reach the wire - they only gate the coordinator's issuance of
//! step releases.

use serde::{Deserialize, Serialize};

/// A lifecycle command sent by the coordinator to a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    /// Initialize internal state and apply initial conditions.
    Stage,
    /// Revert to staged state.
    Reset,
    /// Detach resources and exit zero.
    Terminate,
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Stage => "stage",
            Self::Reset => "reset",
            Self::Terminate => "terminate",
        };
        f.write_str(s)
    }
}

/// One control-channel request line: `{"cmd": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// The command to execute.
    pub cmd: Command,
}

/// One control-channel reply line from the module.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "lowercase")]
pub enum Reply {
    /// Module has attached its resources and accepts commands.
    Ready,
    /// Command executed successfully.
    Ack {
        /// The command being acknowledged.
        cmd: Command,
    },
    /// Command failed; the module will exit non-zero.
    Error {
        /// Human-readable failure context.
        detail: String,
    },
}

impl Request {
    /// Serialize to one newline-terminated JSON line.
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).expect("request serialization is infallible");
        line.push('\n');
        line
    }

    /// Parse a request from one line.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}

impl Reply {
    /// Serialize to one newline-terminated JSON line.
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).expect("reply serialization is infallible");
        line.push('\n');
        line
    }

    /// Parse a reply from one line.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_roundtrip() {
        for cmd in [Command::Stage, Command::Reset, Command::Terminate] {
            let line = Request { cmd }.to_line();
            assert!(line.ends_with('\n'));
            let parsed = Request::from_line(&line).unwrap();
            assert_eq!(parsed.cmd, cmd);
        }
    }

    #[test]
    fn reply_roundtrip() {
        let ack = Reply::Ack {
            cmd: Command::Stage,
        };
        match Reply::from_line(&ack.to_line()).unwrap() {
            Reply::Ack { cmd } => assert_eq!(cmd, Command::Stage),
            other => panic!("expected ack, got {other:?}"),
        }

        match Reply::from_line(&Reply::Ready.to_line()).unwrap() {
            Reply::Ready => {}
            other => panic!("expected ready, got {other:?}"),
        }
    }

    #[test]
    fn wire_format_is_stable() {
        assert_eq!(
            Request {
                cmd: Command::Terminate
            }
            .to_line(),
            "{\"cmd\":\"terminate\"}\n"
        );
        assert_eq!(Reply::Ready.to_line(), "{\"reply\":\"ready\"}\n");
    }

    #[test]
    fn malformed_line_is_an_error() {
        assert!(Request::from_line("not json").is_err());
        assert!(Reply::from_line("{\"reply\":\"bogus\"}").is_err());
    }
}
