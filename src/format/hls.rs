//! HLS playlist trees and the cross-stream fixups that run over them.
//!
//! A [`Playlist`] is an arena owning every node of one playlist tree;
//! [`PlaylistId`] handles stay valid for the arena's lifetime and parent
//! links are plain indices, never owning references. Each node keeps an
//! ordered child sequence of sub-playlists and media streams, and the
//! fixups visit every contained stream in document order - the property
//! that lets continuity counters run seamlessly across segment
//! boundaries.

use crate::error::{Result, TsFixError};
use crate::format::ts::TsStream;

/// Stable handle to one node of a [`Playlist`] tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaylistId(usize);

#[derive(Debug)]
enum PlaylistEntry {
    Sublist(PlaylistId),
    Media(TsStream),
}

#[derive(Debug)]
struct PlaylistNode {
    locator: String,
    parent: Option<PlaylistId>,
    children: Vec<PlaylistEntry>,
}

/// Arena-owned playlist tree mirroring an adaptive-streaming manifest.
#[derive(Debug, Default)]
pub struct Playlist {
    nodes: Vec<PlaylistNode>,
}

impl Playlist {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Creates a node and, when `parent` is given, appends it to the
    /// parent's child sequence. The arena owns the node either way; the
    /// parent holds only an ordering reference.
    pub fn attach(&mut self, parent: Option<PlaylistId>, locator: impl Into<String>) -> PlaylistId {
        let id = PlaylistId(self.nodes.len());
        self.nodes.push(PlaylistNode {
            locator: locator.into(),
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(PlaylistEntry::Sublist(id));
        }
        id
    }

    /// Appends an already-built media stream to a node's child sequence.
    pub fn attach_stream(&mut self, parent: PlaylistId, stream: TsStream) {
        self.nodes[parent.0].children.push(PlaylistEntry::Media(stream));
    }

    pub fn locator(&self, id: PlaylistId) -> &str {
        &self.nodes[id.0].locator
    }

    pub fn parent(&self, id: PlaylistId) -> Option<PlaylistId> {
        self.nodes[id.0].parent
    }

    /// Number of direct children (sub-playlists and media streams).
    pub fn size(&self, id: PlaylistId) -> usize {
        self.nodes[id.0].children.len()
    }

    /// Reads the manifest text at the node's locator and loads every
    /// referenced media segment as a child stream, in file order.
    ///
    /// Lines starting with `#` and blank lines are ignored; every other
    /// line is a media reference. A source that cannot be opened is
    /// logged and skipped; a partially-decoded stream is attached as-is.
    /// Returns the number of streams attached.
    pub async fn parse(&mut self, id: PlaylistId) -> Result<usize> {
        let locator = self.nodes[id.0].locator.clone();
        let manifest = tokio::fs::read_to_string(&locator)
            .await
            .map_err(|e| TsFixError::ResourceUnavailable(format!("{}: {}", locator, e)))?;

        let mut attached = 0;
        for line in manifest.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut stream = TsStream::open(line);
            match stream.load().await {
                Ok(summary) => {
                    if let Some(cause) = &summary.stopped {
                        log::warn!("partial load of {}: {}", line, cause);
                    }
                    self.nodes[id.0].children.push(PlaylistEntry::Media(stream));
                    attached += 1;
                }
                Err(e) => {
                    log::warn!("skipping {}: {}", line, e);
                }
            }
        }
        Ok(attached)
    }

    /// Visits every contained stream in document order: depth-first over
    /// sub-playlists, siblings in attachment order.
    pub fn for_each_stream<F: FnMut(&TsStream)>(&self, id: PlaylistId, mut f: F) {
        self.walk(id, &mut f);
    }

    fn walk<F: FnMut(&TsStream)>(&self, id: PlaylistId, f: &mut F) {
        for entry in &self.nodes[id.0].children {
            match entry {
                PlaylistEntry::Media(stream) => f(stream),
                PlaylistEntry::Sublist(child) => self.walk(*child, f),
            }
        }
    }

    /// Mutable document-order traversal; the ordering contract the
    /// fixups below rely on.
    pub fn for_each_stream_mut<F: FnMut(&mut TsStream)>(&mut self, id: PlaylistId, mut f: F) {
        self.walk_mut(id, &mut f);
    }

    fn walk_mut<F: FnMut(&mut TsStream)>(&mut self, id: PlaylistId, f: &mut F) {
        for index in 0..self.nodes[id.0].children.len() {
            let child = match &mut self.nodes[id.0].children[index] {
                PlaylistEntry::Media(stream) => {
                    f(stream);
                    None
                }
                PlaylistEntry::Sublist(child) => Some(*child),
            };
            if let Some(child) = child {
                self.walk_mut(child, f);
            }
        }
    }

    /// All contained streams in document order.
    pub fn streams(&self, id: PlaylistId) -> Vec<&TsStream> {
        let mut out = Vec::new();
        self.collect(id, &mut out);
        out
    }

    fn collect<'a>(&'a self, id: PlaylistId, out: &mut Vec<&'a TsStream>) {
        for entry in &self.nodes[id.0].children {
            match entry {
                PlaylistEntry::Media(stream) => out.push(stream),
                PlaylistEntry::Sublist(child) => self.collect(*child, out),
            }
        }
    }

    /// For each requested PID, renumbers that PID's continuity counters
    /// continuously across every stream in document order, starting at 0.
    pub fn fix_discontinuity(&mut self, id: PlaylistId, pids: &[u16]) {
        for &pid in pids {
            let mut counter = 0u8;
            self.for_each_stream_mut(id, |stream| {
                counter = stream.renumber_continuity(pid, counter);
            });
        }
    }

    /// Overwrites the PCR of every segment of `pid` that declares one and
    /// whose PES header carries a PTS with `pts * 300` (90 kHz ticks to
    /// 27 MHz clock-reference ticks). Segments lacking either field are
    /// skipped.
    pub fn update_pcr_by_pts(&mut self, id: PlaylistId, pid: u16) {
        self.for_each_stream_mut(id, |stream| {
            for segment in stream.segments_mut() {
                if segment.header.pid != pid || !segment.adaptation.has_pcr {
                    continue;
                }
                if let Some(pts) = segment.pes.as_ref().and_then(|pes| pes.pts) {
                    segment.adaptation.pcr = Some(pts * 300);
                }
            }
        });
    }

    /// Marks the random-access flag on every payload-unit-start segment
    /// of `pid` that already carries a PCR: PCR-bearing start packets are
    /// treated as splice points.
    pub fn fix_key_frame_info(&mut self, id: PlaylistId, pid: u16) {
        self.for_each_stream_mut(id, |stream| {
            for segment in stream.segments_mut() {
                if segment.header.payload_unit_start
                    && segment.header.pid == pid
                    && segment.adaptation.has_pcr
                {
                    segment.adaptation.random_access = true;
                }
            }
        });
    }

    /// Persists every contained stream in document order to its own
    /// locator. A failure on one stream is logged and does not abort its
    /// siblings. Returns the number persisted.
    pub async fn persist_all(&self, id: PlaylistId) -> usize {
        let mut streams = Vec::new();
        self.collect(id, &mut streams);

        let mut persisted = 0;
        for stream in streams {
            match stream.persist(None).await {
                Ok(()) => persisted += 1,
                Err(e) => log::warn!("failed to persist {}: {}", stream.locator(), e),
            }
        }
        persisted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ts::types::{pcr_parts, TS_PACKET_SIZE};
    use std::io::Cursor;
    use tokio::runtime::Runtime;

    fn media_packet(pid: u16, continuity: u8) -> Vec<u8> {
        let mut packet = vec![0xaau8; TS_PACKET_SIZE];
        packet[0] = 0x47;
        packet[1] = ((pid >> 8) & 0x1f) as u8;
        packet[2] = (pid & 0xff) as u8;
        packet[3] = 0x10 | (continuity & 0x0f);
        packet
    }

    fn encode_pts(dst: &mut [u8], marker: u8, pts: u64) {
        dst[0] = marker | ((((pts >> 30) & 0x07) as u8) << 1);
        dst[1] = ((pts >> 22) & 0xff) as u8;
        dst[2] = ((((pts >> 15) & 0x7f) as u8) << 1) | 0x01;
        dst[3] = ((pts >> 7) & 0xff) as u8;
        dst[4] = (((pts & 0x7f) as u8) << 1) | 0x01;
    }

    // Payload-unit-start packet with a PCR-bearing adaptation field and a
    // PES header carrying `pts`.
    fn keyed_packet(pid: u16, pts: u64) -> Vec<u8> {
        let mut packet = vec![0xffu8; TS_PACKET_SIZE];
        packet[0] = 0x47;
        packet[1] = 0x40 | ((pid >> 8) & 0x1f) as u8;
        packet[2] = (pid & 0xff) as u8;
        packet[3] = 0x30; // Adaptation + payload
        packet[4] = 7; // Adaptation field length
        packet[5] = 0x10; // PCR flag
        // PCR base = 90000, extension = 0
        packet[6..12].copy_from_slice(&[0x00, 0x00, 0xaf, 0xc8, 0x7e, 0x00]);
        packet[12..16].copy_from_slice(&[0x00, 0x00, 0x01, 0xe0]);
        packet[16] = 0x00;
        packet[17] = 0x20;
        packet[18] = 0x80;
        packet[19] = 0x80; // PTS only
        packet[20] = 5;
        encode_pts(&mut packet[21..26], 0x21, pts);
        packet
    }

    fn stream_from(bytes: Vec<u8>, locator: &str) -> TsStream {
        let rt = Runtime::new().unwrap();
        let mut stream = TsStream::open(locator);
        rt.block_on(async {
            stream.load_from(&mut Cursor::new(bytes)).await;
        });
        stream
    }

    #[test]
    fn test_size_counts_direct_children_only() {
        let mut playlist = Playlist::new();
        let root = playlist.attach(None, "root.m3u8");
        let child = playlist.attach(Some(root), "child.m3u8");
        playlist.attach(Some(root), "sibling.m3u8");
        playlist.attach_stream(root, TsStream::open("a.ts"));

        // Grandchildren must not count toward the root
        playlist.attach(Some(child), "grandchild.m3u8");
        playlist.attach_stream(child, TsStream::open("b.ts"));

        assert_eq!(playlist.size(root), 3);
        assert_eq!(playlist.size(child), 2);
        assert_eq!(playlist.parent(child), Some(root));
        assert_eq!(playlist.parent(root), None);
    }

    #[test]
    fn test_document_order_traversal() {
        let mut playlist = Playlist::new();
        let root = playlist.attach(None, "root.m3u8");
        playlist.attach_stream(root, TsStream::open("a.ts"));
        let sub = playlist.attach(Some(root), "sub.m3u8");
        playlist.attach_stream(sub, TsStream::open("b.ts"));
        playlist.attach_stream(root, TsStream::open("c.ts"));

        let order: Vec<String> = playlist
            .streams(root)
            .iter()
            .map(|s| s.locator().to_string())
            .collect();
        assert_eq!(order, ["a.ts", "b.ts", "c.ts"]);
    }

    #[test]
    fn test_fix_discontinuity_continues_across_streams() {
        let pid = 0x100;
        let mut a = Vec::new();
        for _ in 0..15 {
            a.extend_from_slice(&media_packet(pid, 7));
        }
        let mut b = Vec::new();
        for _ in 0..4 {
            b.extend_from_slice(&media_packet(pid, 2));
        }

        let mut playlist = Playlist::new();
        let root = playlist.attach(None, "root.m3u8");
        playlist.attach_stream(root, stream_from(a, "a.ts"));
        playlist.attach_stream(root, stream_from(b, "b.ts"));

        playlist.fix_discontinuity(root, &[pid]);

        let streams = playlist.streams(root);
        assert_eq!(streams[0].last_continuity(pid), 14);
        assert_eq!(
            streams[1].segments()[0].header.continuity_counter,
            15,
            "the second stream must continue where the first left off"
        );
        // 15, 0, 1, 2 after the wrap
        assert_eq!(streams[1].last_continuity(pid), 2);
    }

    #[test]
    fn test_fix_discontinuity_handles_pids_independently() {
        let video = 0x100;
        let audio = 0x101;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&media_packet(video, 9));
        bytes.extend_from_slice(&media_packet(audio, 9));
        bytes.extend_from_slice(&media_packet(video, 9));

        let mut playlist = Playlist::new();
        let root = playlist.attach(None, "root.m3u8");
        playlist.attach_stream(root, stream_from(bytes, "a.ts"));

        playlist.fix_discontinuity(root, &[video, audio]);

        let streams = playlist.streams(root);
        let counters: Vec<(u16, u8)> = streams[0]
            .segments()
            .iter()
            .map(|s| (s.header.pid, s.header.continuity_counter))
            .collect();
        assert_eq!(counters, [(video, 0), (audio, 0), (video, 1)]);
    }

    #[test]
    fn test_update_pcr_by_pts() {
        let pid = 0x100;
        // PTS = 9000 ticks at 90 kHz = 0.1 s
        let mut bytes = keyed_packet(pid, 9_000);
        bytes.extend_from_slice(&media_packet(pid, 1));

        let mut playlist = Playlist::new();
        let root = playlist.attach(None, "root.m3u8");
        playlist.attach_stream(root, stream_from(bytes, "a.ts"));

        playlist.update_pcr_by_pts(root, pid);

        let streams = playlist.streams(root);
        let segments = streams[0].segments();
        assert_eq!(segments[0].adaptation.pcr, Some(2_700_000));
        assert_eq!(pcr_parts(2_700_000), (9_000, 0));
        // The plain payload packet has no PCR and stays untouched
        assert!(segments[1].adaptation.pcr.is_none());
    }

    #[test]
    fn test_update_pcr_by_pts_skips_other_pids() {
        let mut playlist = Playlist::new();
        let root = playlist.attach(None, "root.m3u8");
        playlist.attach_stream(root, stream_from(keyed_packet(0x200, 9_000), "a.ts"));

        playlist.update_pcr_by_pts(root, 0x100);

        let streams = playlist.streams(root);
        assert_eq!(streams[0].segments()[0].adaptation.pcr, Some(27_000_000));
    }

    #[test]
    fn test_fix_key_frame_info() {
        let pid = 0x100;
        let mut bytes = keyed_packet(pid, 9_000);
        bytes.extend_from_slice(&media_packet(pid, 1));

        let mut playlist = Playlist::new();
        let root = playlist.attach(None, "root.m3u8");
        playlist.attach_stream(root, stream_from(bytes, "a.ts"));

        playlist.fix_key_frame_info(root, pid);

        let streams = playlist.streams(root);
        let segments = streams[0].segments();
        assert!(segments[0].adaptation.random_access);
        // No PCR, no payload start: not a key frame candidate
        assert!(!segments[1].adaptation.random_access);
    }

    #[test]
    fn test_parse_manifest_and_persist_all() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let dir = std::env::temp_dir().join(format!("tsfix-hls-{}", std::process::id()));
            tokio::fs::create_dir_all(&dir).await.unwrap();

            let seg0 = dir.join("seg0.ts");
            let seg1 = dir.join("seg1.ts");
            let pid = 0x100u16;
            tokio::fs::write(&seg0, media_packet(pid, 7)).await.unwrap();
            let mut second = media_packet(pid, 7);
            second.extend_from_slice(&media_packet(pid, 7));
            tokio::fs::write(&seg1, second).await.unwrap();

            let manifest_path = dir.join("playlist.m3u8");
            let manifest = format!(
                "#EXTM3U\n#EXT-X-TARGETDURATION:2\n#EXTINF:2.000,\n{}\n\n#EXTINF:2.000,\n{}\n{}\n#EXT-X-ENDLIST\n",
                seg0.display(),
                seg1.display(),
                dir.join("missing.ts").display(),
            );
            tokio::fs::write(&manifest_path, manifest).await.unwrap();

            let mut playlist = Playlist::new();
            let root = playlist.attach(None, manifest_path.to_str().unwrap());
            let attached = playlist.parse(root).await.unwrap();

            // The missing segment is skipped, the two real ones attach
            assert_eq!(attached, 2);
            assert_eq!(playlist.size(root), 2);

            playlist.fix_discontinuity(root, &[pid]);
            assert_eq!(playlist.persist_all(root).await, 2);

            // Reload and verify the counters run continuously
            let mut reloaded = TsStream::open(seg1.to_str().unwrap());
            reloaded.load().await.unwrap();
            let counters: Vec<u8> = reloaded
                .segments()
                .iter()
                .map(|s| s.header.continuity_counter)
                .collect();
            assert_eq!(counters, [1, 2]);

            tokio::fs::remove_dir_all(&dir).await.unwrap();
        });
    }

    #[test]
    fn test_parse_missing_manifest() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let mut playlist = Playlist::new();
            let root = playlist.attach(None, "/nonexistent/playlist.m3u8");
            assert!(matches!(
                playlist.parse(root).await,
                Err(TsFixError::ResourceUnavailable(_))
            ));
        });
    }
}
