//! Response Codes
//!
//! The fixed set of reply codes a running instance can return for a
//! received command. On the wire a response is a single lowercase nick
//! followed by `\r\n`.

use std::fmt;

/// Reply code returned by the running instance for one command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Response {
    /// Transport-layer failure or protocol mismatch. Never produced by
    /// well-behaved application handlers.
    Invalid,
    /// The command was handled successfully.
    Ok,
    /// The command was handled and refused.
    Cancel,
    /// The command could not be carried out.
    Fail,
    /// The handler declined; dispatch continues with the next handler.
    Passthrough,
}

impl Response {
    /// The wire nick for this response.
    #[must_use]
    pub fn as_nick(self) -> &'static str {
        match self {
            Response::Invalid => "invalid",
            Response::Ok => "ok",
            Response::Cancel => "cancel",
            Response::Fail => "fail",
            Response::Passthrough => "passthrough",
        }
    }

    /// Parse a wire nick. Unrecognized tokens map to [`Response::Invalid`].
    #[must_use]
    pub fn from_nick(nick: &str) -> Self {
        match nick {
            "ok" => Response::Ok,
            "cancel" => Response::Cancel,
            "fail" => Response::Fail,
            "passthrough" => Response::Passthrough,
            _ => Response::Invalid,
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_nick())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nick_roundtrip() {
        for resp in [
            Response::Ok,
            Response::Cancel,
            Response::Fail,
            Response::Passthrough,
            Response::Invalid,
        ] {
            assert_eq!(Response::from_nick(resp.as_nick()), resp);
        }
    }

    #[test]
    fn unknown_nick_is_invalid() {
        assert_eq!(Response::from_nick("maybe"), Response::Invalid);
        assert_eq!(Response::from_nick(""), Response::Invalid);
        assert_eq!(Response::from_nick("OK"), Response::Invalid);
    }
}
