//! # MPEG Transport Stream (TS) Implementation
//!
//! This module models MPEG transport stream media one 188-byte packet at
//! a time, with support for:
//!
//! - TS packet header parsing and serialization
//! - Adaptation field handling, including PCR/OPCR clock references
//! - Packetized Elementary Stream (PES) sub-header parsing with PTS/DTS
//! - Ordered streams of segments with continuity counter maintenance
//!
//! ## Core Features
//!
//! - **Decoding**: split a byte source into structured [`Segment`]s
//! - **Repair**: renumber continuity counters, rewrite clock references,
//!   mark key frames
//! - **Re-emission**: serialize segments back to bytes, patching only the
//!   framing fields the codec owns so untouched packets round-trip
//!   byte-for-byte
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use tsfix::format::ts::TsStream;
//!
//! # #[tokio::main]
//! # async fn main() -> tsfix::Result<()> {
//! let mut stream = TsStream::open("input.ts");
//! let summary = stream.load().await?;
//! if !summary.is_complete() {
//!     eprintln!("stream truncated after {} segments", summary.loaded);
//! }
//!
//! let next = stream.renumber_continuity(0x100, 0);
//! println!("next continuity counter would be {}", next);
//!
//! stream.persist(None).await?;
//! # Ok(())
//! # }
//! ```

/// Low-level TS packet parsing
pub mod parser;

/// The in-memory model of one parsed packet
pub mod segment;

/// Ordered streams of segments read from one byte source
pub mod stream;

/// Core TS types and constants
pub mod types;

// Re-export commonly used types and constants
pub use parser::TsPacketParser;
pub use segment::Segment;
pub use stream::{LoadSummary, TsStream};
pub use types::{
    AdaptationField,
    PesHeader,
    TsHeader,
    PID_NULL,
    PID_PAT,
    TS_PACKET_SIZE,
    TS_PAYLOAD_SIZE,
};
