#![doc(html_root_url = "https://docs.rs/tsfix/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # tsfix - MPEG Transport Stream repair toolkit
//!
//! `tsfix` ingests MPEG transport stream (TS) media, models every 188-byte
//! packet as a structured segment, lets you repair selected fields, and
//! re-emits spec-compliant bytes. Untouched packets round-trip
//! byte-for-byte, so the toolkit is safe to run over media you only want
//! to patch, not remux.
//!
//! ## Features
//!
//! ### Packet codec
//! - Transport packet header, adaptation field, and PES sub-header parsing
//! - PCR/OPCR clock reference decoding (33-bit base + 9-bit extension)
//! - PTS/DTS timestamp extraction with marker-bit validation
//! - In-place serialization that only rewrites framing bytes
//!
//! ### Stream and playlist layers
//! - Ordered segment streams loaded from and persisted to byte sources
//! - Continuity counter inspection and renumbering per PID
//! - HLS playlist trees with cross-stream fixups: continuity repair
//!   across segment boundaries, PCR derivation from PTS, key-frame marking
//!
//! ## Quick Start
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! tsfix = "0.1.0"
//! ```
//!
//! ### Loading and repairing a stream
//!
//! ```rust,no_run
//! use tsfix::format::ts::TsStream;
//!
//! #[tokio::main]
//! async fn main() -> tsfix::Result<()> {
//!     let mut stream = TsStream::open("media/segment0.ts");
//!     let summary = stream.load().await?;
//!     println!("loaded {} segments", summary.loaded);
//!
//!     // Renumber the continuity counters of the video PID from zero
//!     stream.renumber_continuity(0x100, 0);
//!
//!     stream.persist(Some("media/segment0.fixed.ts")).await?;
//!     Ok(())
//! }
//! ```
//!
//! ### Fixing a playlist end-to-end
//!
//! ```rust,no_run
//! use tsfix::format::hls::Playlist;
//!
//! #[tokio::main]
//! async fn main() -> tsfix::Result<()> {
//!     let mut playlist = Playlist::new();
//!     let root = playlist.attach(None, "media/playlist.m3u8");
//!     playlist.parse(root).await?;
//!
//!     // Counters run continuously across every media segment
//!     playlist.fix_discontinuity(root, &[0x100]);
//!     playlist.update_pcr_by_pts(root, 0x100);
//!     playlist.fix_key_frame_info(root, 0x100);
//!
//!     playlist.persist_all(root).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `format::ts`: the transport stream packet codec, segment model, and
//!   stream aggregation
//! - `format::hls`: the playlist tree and its cross-stream fixups
//! - `error`: error types and the crate-wide `Result` alias

/// Error types and utilities
pub mod error;

/// Media format implementations (TS packets, HLS playlists)
pub mod format;

pub use error::{Result, TsFixError};
