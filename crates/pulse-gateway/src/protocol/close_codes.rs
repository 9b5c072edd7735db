//! WebSocket close codes
//!
//! Application close codes sit in the 4000 range, outside the reserved
//! RFC 6455 space. Clients use `should_reconnect` to decide whether a
//! close is worth retrying or the session is over.

/// WebSocket close codes used by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CloseCode {
    /// Unknown error occurred
    UnknownError = 4000,
    /// Client sent a frame the gateway could not decode
    DecodeError = 4001,
    /// Authentication token expired mid-session
    AuthExpired = 4002,
    /// Client stopped sending heartbeats
    HeartbeatTimeout = 4003,
    /// Client violated gateway policy
    PolicyViolation = 4004,
    /// Gateway is shutting down
    Shutdown = 4005,
}

impl CloseCode {
    /// Convert from a raw u16 code
    #[must_use]
    pub const fn from_u16(code: u16) -> Option<Self> {
        match code {
            4000 => Some(Self::UnknownError),
            4001 => Some(Self::DecodeError),
            4002 => Some(Self::AuthExpired),
            4003 => Some(Self::HeartbeatTimeout),
            4004 => Some(Self::PolicyViolation),
            4005 => Some(Self::Shutdown),
            _ => None,
        }
    }

    /// Get the numeric code
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Whether the client should attempt to reconnect after this close
    ///
    /// Expired credentials and policy violations need client-side action
    /// first; everything else is safe to retry.
    #[must_use]
    pub const fn should_reconnect(self) -> bool {
        !matches!(self, Self::AuthExpired | Self::PolicyViolation)
    }

    /// Human-readable description of the close reason
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "An unknown error occurred",
            Self::DecodeError => "Failed to decode frame",
            Self::AuthExpired => "Authentication token expired",
            Self::HeartbeatTimeout => "No heartbeat received in time",
            Self::PolicyViolation => "Gateway policy violated",
            Self::Shutdown => "Gateway is shutting down",
        }
    }

    /// Short name of the code
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UnknownError => "UNKNOWN_ERROR",
            Self::DecodeError => "DECODE_ERROR",
            Self::AuthExpired => "AUTH_EXPIRED",
            Self::HeartbeatTimeout => "HEARTBEAT_TIMEOUT",
            Self::PolicyViolation => "POLICY_VIOLATION",
            Self::Shutdown => "SHUTDOWN",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.name(),
            self.as_u16(),
            self.description()
        )
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}
