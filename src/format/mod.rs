/// HLS playlist tree and cross-stream fixups
pub mod hls;

/// MPEG transport stream packet codec, segment model, and stream aggregation
pub mod ts;

pub use self::hls::{Playlist, PlaylistId};
pub use self::ts::{Segment, TsStream};
