//! Gateway protocol definitions
//!
//! The frame catalog itself lives in `pulse-core`; this module holds the
//! pieces that only matter at the socket edge, starting with the close
//! code register.

pub mod close_codes;

pub use close_codes::CloseCode;
