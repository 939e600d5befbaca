use super::segment::Segment;
use super::types::*;
use crate::error::{Result, TsFixError};

// PTS/DTS marker masks: 4-bit prefix plus the lowest marker bit of the
// first timestamp byte.
const PTS_ONLY_MARKER: u8 = 0b0010_0001;
const PTS_PAIR_MARKER: u8 = 0b0011_0001;
const DTS_MARKER: u8 = 0b0001_0001;

/// Stateless parser for the fields of a single transport packet: the
/// fixed header, the adaptation field, and the PES sub-header.
#[derive(Debug, Default)]
pub struct TsPacketParser;

impl TsPacketParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_header(&self, data: &[u8]) -> Result<TsHeader> {
        if data.len() < TS_HEADER_SIZE {
            return Err(TsFixError::TruncatedRead {
                expected: TS_HEADER_SIZE,
                actual: data.len(),
            });
        }

        if data[0] != TS_SYNC_BYTE {
            return Err(TsFixError::InvalidSync(data[0]));
        }

        Ok(TsHeader {
            sync_byte: data[0],
            transport_error: (data[1] & 0x80) != 0,
            payload_unit_start: (data[1] & 0x40) != 0,
            transport_priority: (data[1] & 0x20) != 0,
            pid: (((data[1] & 0x1f) as u16) << 8) | data[2] as u16,
            scrambling_control: (data[3] >> 6) & 0x03,
            adaptation_field_control: (data[3] >> 4) & 0x03,
            continuity_counter: data[3] & 0x0f,
        })
    }

    /// Parses the adaptation field at the start of `payload`, returning it
    /// together with the cursor past the declared length.
    ///
    /// The cursor always lands at `length + 1` (clamped to the region),
    /// whether or not every optional sub-field was present; trailing
    /// stuffing inside the field is skipped, not validated. When the
    /// header declares no adaptation field the default value and a zero
    /// cursor come back.
    pub fn parse_adaptation_field(
        &self,
        payload: &[u8],
        header: &TsHeader,
    ) -> (AdaptationField, usize) {
        if !header.has_adaptation_field() || payload.is_empty() {
            return (AdaptationField::default(), 0);
        }

        let mut field = AdaptationField {
            length: payload[0],
            ..Default::default()
        };
        let end = (1 + payload[0] as usize).min(payload.len());
        if field.length == 0 || end < 2 {
            return (field, end);
        }

        let flags = payload[1];
        field.discontinuity = (flags & 0x80) != 0;
        field.random_access = (flags & 0x40) != 0;
        field.es_priority = (flags & 0x20) != 0;
        field.has_pcr = (flags & 0x10) != 0;
        field.has_opcr = (flags & 0x08) != 0;
        field.has_splice = (flags & 0x04) != 0;
        field.has_private_data = (flags & 0x02) != 0;
        field.has_extension = (flags & 0x01) != 0;

        let mut pos = 2;
        if field.has_pcr {
            if pos + 6 <= end {
                field.pcr = Some(decode_pcr(&payload[pos..pos + 6]));
            }
            pos += 6;
        }
        if field.has_opcr {
            if pos + 6 <= end {
                field.opcr = Some(decode_pcr(&payload[pos..pos + 6]));
            }
            pos += 6;
        }
        if field.has_splice {
            if pos < end {
                field.splice_countdown = Some(payload[pos] as i8);
            }
            pos += 1;
        }
        if field.has_private_data && pos < end {
            let length = payload[pos] as usize;
            pos += 1;
            if pos + length <= end {
                field.private_data = Some(payload[pos..pos + length].to_vec());
            }
        }

        (field, end)
    }

    /// Probes for a PES sub-header at `cursor` and parses it when the
    /// 3-byte start code matches.
    ///
    /// Returns `Ok(None)` when the start code is absent - a
    /// payload-unit-start packet need not carry a PES header. On a match,
    /// returns the header and the cursor to the first elementary-stream
    /// byte after it. The reserved PTS/DTS indicator value surfaces
    /// [`TsFixError::UnsupportedPtsIndicator`].
    pub fn parse_pes_header(
        &self,
        payload: &[u8],
        cursor: usize,
    ) -> Result<Option<(PesHeader, usize)>> {
        let data = match payload.get(cursor..) {
            Some(data) if data.len() >= 6 => data,
            _ => return Ok(None),
        };
        if data[0] != 0x00 || data[1] != 0x00 || data[2] != 0x01 {
            return Ok(None);
        }

        let stream_id = data[3];
        let packet_length = ((data[4] as u16) << 8) | data[5] as u16;
        if packet_length == 0 {
            let header = PesHeader {
                stream_id,
                ..Default::default()
            };
            return Ok(Some((header, (cursor + 6).min(payload.len()))));
        }

        if data.len() < 9 {
            return Ok(None);
        }

        let pts_dts_indicator = (data[7] >> 6) & 0x03;
        if pts_dts_indicator == 0b01 {
            return Err(TsFixError::UnsupportedPtsIndicator(pts_dts_indicator));
        }

        let mut header = PesHeader {
            stream_id,
            packet_length,
            scrambling_control: (data[6] >> 4) & 0x03,
            priority: (data[6] & 0x08) != 0,
            data_alignment: (data[6] & 0x04) != 0,
            copyright: (data[6] & 0x02) != 0,
            original: (data[6] & 0x01) != 0,
            pts_dts_indicator,
            escr_flag: (data[7] & 0x20) != 0,
            es_rate_flag: (data[7] & 0x10) != 0,
            dsm_trick_mode_flag: (data[7] & 0x08) != 0,
            additional_copy_info_flag: (data[7] & 0x04) != 0,
            crc_flag: (data[7] & 0x02) != 0,
            extension_flag: (data[7] & 0x01) != 0,
            header_data_length: data[8],
            ..Default::default()
        };

        match pts_dts_indicator {
            0b10 => {
                header.pts = parse_timestamp(data.get(9..).unwrap_or_default(), PTS_ONLY_MARKER);
            }
            0b11 => {
                header.pts = parse_timestamp(data.get(9..).unwrap_or_default(), PTS_PAIR_MARKER);
                header.dts = parse_timestamp(data.get(14..).unwrap_or_default(), DTS_MARKER);
            }
            _ => {}
        }

        let start = cursor + 9 + header.header_data_length as usize;
        Ok(Some((header, start.min(payload.len()))))
    }

    /// Decodes one full 188-byte packet into a [`Segment`].
    pub fn parse_segment(&self, packet: &[u8]) -> Result<Segment> {
        if packet.len() < TS_PACKET_SIZE {
            return Err(TsFixError::TruncatedRead {
                expected: TS_PACKET_SIZE,
                actual: packet.len(),
            });
        }

        let header = self.parse_header(packet)?;
        let mut payload = [0u8; TS_PAYLOAD_SIZE];
        payload.copy_from_slice(&packet[TS_HEADER_SIZE..TS_PACKET_SIZE]);

        let (adaptation, cursor) = self.parse_adaptation_field(&payload, &header);
        let mut pes = None;
        let mut payload_start = cursor;
        if header.payload_unit_start {
            if let Some((parsed, start)) = self.parse_pes_header(&payload, cursor)? {
                pes = Some(parsed);
                payload_start = start;
            }
        }

        Ok(Segment {
            header,
            adaptation,
            pes,
            payload,
            payload_start,
        })
    }
}

/// Extracts a 33-bit timestamp from the 5-byte marker-checked encoding.
/// Returns `None` when the marker bits do not match `marker`.
fn parse_timestamp(src: &[u8], marker: u8) -> Option<u64> {
    if src.len() < 5 {
        return None;
    }
    if (src[0] & marker) != marker {
        return None;
    }

    let ts = ((((src[0] >> 1) & 0x07) as u64) << 30)
        | ((src[1] as u64) << 22)
        | ((((src[2] >> 1) & 0x7f) as u64) << 15)
        | ((src[3] as u64) << 7)
        | ((src[4] >> 1) as u64);
    Some(ts)
}
