//! Packet framing for line traffic.
//!
//! Every payload exchanged by the cipher layer is a [`Packet`]: a small
//! named-field [`Header`] plus an opaque body. The cipher layer never looks
//! inside the body of an encrypted packet; it only needs the header to be
//! empty on outer envelopes and to carry routing fields on handshakes.
//!
//! ```text
//! ┌──────────────────┬──────────────────────┬──────────────┐
//! │ header len (u16) │ header (JSON object) │ body (bytes) │
//! └──────────────────┴──────────────────────┴──────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
pub mod header;
pub mod packet;

pub use errors::{ProtocolError, Result};
pub use header::Header;
pub use packet::Packet;
