use super::parser::TsPacketParser;
use super::segment::Segment;
use super::types::TS_PACKET_SIZE;
use crate::error::{Result, TsFixError};
use bytes::BytesMut;
use std::io::Write;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// Outcome of a single `load` call.
///
/// A decode failure is not a failure of the load: already-decoded
/// segments are kept, and the cause is reported here so callers can tell
/// a complete stream from a truncated one.
#[derive(Debug)]
pub struct LoadSummary {
    /// Number of segments appended by this call
    pub loaded: usize,
    /// The decode failure that stopped ingestion, if any
    pub stopped: Option<TsFixError>,
}

impl LoadSummary {
    /// Whether the byte source was consumed to a clean end.
    pub fn is_complete(&self) -> bool {
        self.stopped.is_none()
    }
}

/// An ordered sequence of segments read from one byte source.
///
/// Segment order is file order and is authoritative for continuity
/// counter checks. The stream owns its segments exclusively; no internal
/// locking is performed, so share a stream across threads only behind
/// external synchronization.
#[derive(Debug, Default)]
pub struct TsStream {
    locator: String,
    segments: Vec<Segment>,
    parser: TsPacketParser,
}

impl TsStream {
    /// Associates a stream with a byte source without reading it.
    pub fn open(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            segments: Vec::new(),
            parser: TsPacketParser::new(),
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segments_mut(&mut self) -> &mut [Segment] {
        &mut self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Reads the stream's byte source packet-by-packet, replacing any
    /// previously loaded segments.
    ///
    /// The source is held open only for the duration of this call. An
    /// unopenable source is an error; a decode failure partway through is
    /// not - ingestion stops there and the partial result is reported in
    /// the summary.
    pub async fn load(&mut self) -> Result<LoadSummary> {
        if self.locator.is_empty() {
            return Err(TsFixError::ResourceUnavailable(
                "stream has no locator".into(),
            ));
        }
        let mut file = File::open(&self.locator)
            .await
            .map_err(|e| TsFixError::ResourceUnavailable(format!("{}: {}", self.locator, e)))?;
        self.segments.clear();
        Ok(self.load_from(&mut file).await)
    }

    /// Reads packets from an arbitrary byte source, appending to any
    /// segments already held.
    pub async fn load_from<R: AsyncRead + Unpin>(&mut self, reader: &mut R) -> LoadSummary {
        let before = self.segments.len();
        let mut stopped = None;
        let mut packet = [0u8; TS_PACKET_SIZE];

        loop {
            match read_full(reader, &mut packet).await {
                Ok(0) => break,
                Ok(n) if n < TS_PACKET_SIZE => {
                    stopped = Some(TsFixError::TruncatedRead {
                        expected: TS_PACKET_SIZE,
                        actual: n,
                    });
                    break;
                }
                Ok(_) => match self.parser.parse_segment(&packet) {
                    Ok(segment) => self.segments.push(segment),
                    Err(e) => {
                        stopped = Some(e);
                        break;
                    }
                },
                Err(e) => {
                    stopped = Some(TsFixError::Io(e));
                    break;
                }
            }
        }

        let loaded = self.segments.len() - before;
        log::debug!("loaded {} segments from {}", loaded, self.locator);
        LoadSummary { loaded, stopped }
    }

    /// Last-seen continuity counter for `pid`, in segment order; 0 when
    /// the PID never occurs. Used to chain counters across streams
    /// spliced together.
    pub fn last_continuity(&self, pid: u16) -> u8 {
        let mut last = 0;
        for segment in &self.segments {
            if segment.header.pid == pid {
                last = segment.header.continuity_counter;
            }
        }
        last
    }

    /// Overwrites the continuity counters of every segment matching `pid`
    /// with an incrementing mod-16 sequence seeded at `start`. Returns the
    /// next value, ready to seed a subsequent stream.
    pub fn renumber_continuity(&mut self, pid: u16, start: u8) -> u8 {
        let mut counter = start & 0x0f;
        for segment in &mut self.segments {
            if segment.header.pid == pid {
                segment.header.continuity_counter = counter;
                counter = (counter + 1) & 0x0f;
            }
        }
        counter
    }

    /// Sets every owned PES header's declared packet length to 0
    /// ("unbounded"); serialization rewrites the wire field accordingly.
    pub fn reset_pes_lengths(&mut self) {
        for segment in &mut self.segments {
            if let Some(pes) = segment.pes.as_mut() {
                pes.packet_length = 0;
            }
        }
    }

    /// Serializes every segment in order and writes the concatenation to
    /// `destination`, or back to the stream's own locator when `None`.
    pub async fn persist(&self, destination: Option<&str>) -> Result<()> {
        let dest = destination.unwrap_or(&self.locator);
        if dest.is_empty() {
            return Err(TsFixError::ResourceUnavailable(
                "stream has no locator".into(),
            ));
        }

        let mut buf = BytesMut::with_capacity(self.segments.len() * TS_PACKET_SIZE);
        for segment in &self.segments {
            segment.write_to(&mut buf)?;
        }

        let mut file = File::create(dest)
            .await
            .map_err(|e| TsFixError::ResourceUnavailable(format!("{}: {}", dest, e)))?;
        file.write_all(&buf).await?;
        file.flush().await?;
        Ok(())
    }

    /// Releases every segment and the locator; idempotent.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.locator.clear();
    }

    /// Writes the human-readable trace of every segment to `out`.
    pub fn dump<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for segment in &self.segments {
            writeln!(out, "{}", segment)?;
        }
        Ok(())
    }

    /// Writes the trace of every payload-unit-start segment of `pid`.
    pub fn dump_pes<W: Write>(&self, pid: u16, out: &mut W) -> std::io::Result<()> {
        for segment in &self.segments {
            if segment.header.payload_unit_start && segment.header.pid == pid {
                writeln!(out, "{}", segment)?;
            }
        }
        Ok(())
    }
}

async fn read_full<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn load_bytes(stream: &mut TsStream, bytes: Vec<u8>) -> LoadSummary {
        let rt = Runtime::new().unwrap();
        rt.block_on(async { stream.load_from(&mut Cursor::new(bytes)).await })
    }

    #[test]
    fn test_load_counts_segments() {
        let mut bytes = Vec::new();
        for cc in 0..5 {
            bytes.extend_from_slice(&media_packet(0x100, cc));
        }

        let mut stream = TsStream::open("test.ts");
        let summary = load_bytes(&mut stream, bytes);
        assert_eq!(summary.loaded, 5);
        assert!(summary.is_complete());
        assert_eq!(stream.len(), 5);
    }

    #[test]
    fn test_desync_loads_nothing() {
        let mut bytes = vec![0u8; TS_PACKET_SIZE];
        bytes[0] = 0x46; // not a packet boundary

        let mut stream = TsStream::open("test.ts");
        let summary = load_bytes(&mut stream, bytes);
        assert_eq!(summary.loaded, 0);
        assert!(matches!(summary.stopped, Some(TsFixError::InvalidSync(0x46))));
        assert!(stream.is_empty());
    }

    #[test]
    fn test_partial_load_retained() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&media_packet(0x100, 0));
        bytes.extend_from_slice(&media_packet(0x100, 1));
        bytes.extend_from_slice(&[0x47, 0x01, 0x42]); // 3 trailing garbage bytes

        let mut stream = TsStream::open("test.ts");
        let summary = load_bytes(&mut stream, bytes);
        assert_eq!(summary.loaded, 2);
        assert!(matches!(
            summary.stopped,
            Some(TsFixError::TruncatedRead { actual: 3, .. })
        ));
        assert_eq!(stream.len(), 2);
    }

    #[test]
    fn test_mid_stream_desync_keeps_prefix() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&media_packet(0x100, 0));
        let mut bad = media_packet(0x100, 1);
        bad[0] = 0x00;
        bytes.extend_from_slice(&bad);
        bytes.extend_from_slice(&media_packet(0x100, 2));

        let mut stream = TsStream::open("test.ts");
        let summary = load_bytes(&mut stream, bytes);
        assert_eq!(summary.loaded, 1);
        assert!(!summary.is_complete());
    }

    #[test]
    fn test_last_continuity() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&media_packet(0x100, 3));
        bytes.extend_from_slice(&media_packet(0x200, 9));
        bytes.extend_from_slice(&media_packet(0x100, 4));

        let mut stream = TsStream::open("test.ts");
        load_bytes(&mut stream, bytes);
        assert_eq!(stream.last_continuity(0x100), 4);
        assert_eq!(stream.last_continuity(0x200), 9);
        assert_eq!(stream.last_continuity(0x300), 0);
    }

    #[test]
    fn test_renumber_continuity_sequence() {
        let mut bytes = Vec::new();
        for _ in 0..20 {
            bytes.extend_from_slice(&media_packet(0x100, 7));
        }
        bytes.extend_from_slice(&media_packet(0x200, 1));

        let mut stream = TsStream::open("test.ts");
        load_bytes(&mut stream, bytes);

        let next = stream.renumber_continuity(0x100, 14);
        assert_eq!(next, (14 + 20) % 16);

        let counters: Vec<u8> = stream
            .segments()
            .iter()
            .filter(|s| s.header.pid == 0x100)
            .map(|s| s.header.continuity_counter)
            .collect();
        let expected: Vec<u8> = (0..20u8).map(|i| (14 + i) % 16).collect();
        assert_eq!(counters, expected);

        // The other PID is untouched
        assert_eq!(stream.last_continuity(0x200), 1);
    }

    #[test]
    fn test_persist_and_reload_round_trip() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let path = std::env::temp_dir().join(format!("tsfix-stream-{}.ts", std::process::id()));
            let path = path.to_str().unwrap().to_string();

            let mut bytes = Vec::new();
            for cc in 0..4 {
                bytes.extend_from_slice(&media_packet(0x100, cc));
            }
            tokio::fs::write(&path, &bytes).await.unwrap();

            let mut stream = TsStream::open(path.clone());
            let summary = stream.load().await.unwrap();
            assert_eq!(summary.loaded, 4);

            stream.persist(None).await.unwrap();
            let written = tokio::fs::read(&path).await.unwrap();
            assert_eq!(written, bytes);

            tokio::fs::remove_file(&path).await.unwrap();
        });
    }

    #[test]
    fn test_load_missing_source() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let mut stream = TsStream::open("/nonexistent/tsfix-test.ts");
            assert!(matches!(
                stream.load().await,
                Err(TsFixError::ResourceUnavailable(_))
            ));
        });
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut stream = TsStream::open("test.ts");
        load_bytes(&mut stream, media_packet(0x100, 0));
        assert!(!stream.is_empty());

        stream.clear();
        assert!(stream.is_empty());
        assert_eq!(stream.locator(), "");

        stream.clear();
        assert!(stream.is_empty());
    }
}
