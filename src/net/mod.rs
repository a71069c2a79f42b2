//! Network reporting: readiness gating, the byte transport, the 4-byte
//! measurement codec, and the reporter that ties them together.

pub mod codec;
pub mod readiness;
pub mod reporter;
pub mod transport;
