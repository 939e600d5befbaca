use super::types::*;
use crate::error::Result;
use bytes::{BufMut, BytesMut};
use std::fmt;

/// One parsed 188-byte transport packet.
///
/// The 184-byte region after the fixed header is held raw;
/// `payload_start` marks where elementary-stream bytes begin after any
/// adaptation field and PES sub-header. Serialization re-emits that raw
/// region with only the framing bytes the codec owns patched in place
/// (continuity counter, random-access flag, PCR/OPCR, PES start
/// code/stream ID/length), so an unmodified segment reproduces its source
/// bytes exactly.
#[derive(Debug, Clone)]
pub struct Segment {
    pub header: TsHeader,
    /// Default-valued when the header declares no adaptation field
    pub adaptation: AdaptationField,
    /// Present only on payload-unit-start packets with a PES start code
    pub pes: Option<PesHeader>,
    pub(crate) payload: [u8; TS_PAYLOAD_SIZE],
    pub(crate) payload_start: usize,
}

impl Segment {
    /// The raw 184-byte region after the packet header.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Offset into the payload region of the first elementary-stream byte.
    pub fn payload_start(&self) -> usize {
        self.payload_start
    }

    /// The elementary-stream bytes carried by this packet.
    pub fn elementary(&self) -> &[u8] {
        &self.payload[self.payload_start..]
    }

    /// Serializes the segment as one 188-byte packet.
    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        self.header.write_to(buf)?;

        let mut region = self.payload;

        if self.header.has_adaptation_field() && self.adaptation.length > 0 {
            let end = (1 + self.adaptation.length as usize).min(region.len());
            if end >= 2 {
                if self.adaptation.random_access {
                    region[1] |= 0x40;
                }
                let mut pos = 2;
                if self.adaptation.has_pcr {
                    if let Some(pcr) = self.adaptation.pcr {
                        if pos + 6 <= end {
                            encode_pcr(&mut region[pos..pos + 6], pcr);
                        }
                    }
                    pos += 6;
                }
                if self.adaptation.has_opcr {
                    if let Some(opcr) = self.adaptation.opcr {
                        if pos + 6 <= end {
                            encode_pcr(&mut region[pos..pos + 6], opcr);
                        }
                    }
                }
            }
        }

        if let Some(pes) = &self.pes {
            let at = if self.header.has_adaptation_field() {
                1 + self.adaptation.length as usize
            } else {
                0
            };
            if at + 6 <= region.len() {
                region[at] = 0x00;
                region[at + 1] = 0x00;
                region[at + 2] = 0x01;
                region[at + 3] = pes.stream_id;
                region[at + 4] = (pes.packet_length >> 8) as u8;
                region[at + 5] = (pes.packet_length & 0xff) as u8;
            }
        }

        buf.put_slice(&region);
        Ok(())
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &self.header;
        write!(
            f,
            "[PID {} ({}) / TSC {} / AF {} / PUSI {} / Priority {} / CC {}]",
            h.pid,
            pid_description(h.pid),
            scrambling_description(h.scrambling_control),
            adaptation_control_description(h.adaptation_field_control),
            if h.payload_unit_start { "yes" } else { "no" },
            h.transport_priority as u8,
            h.continuity_counter
        )?;

        if h.has_adaptation_field() {
            let a = &self.adaptation;
            write!(
                f,
                "\n  > [len {} / discontinuity {} / random access {} / es priority {} / pcr {} / opcr {} / splice {} / private {} / ext {}]",
                a.length,
                a.discontinuity as u8,
                a.random_access as u8,
                a.es_priority as u8,
                a.has_pcr as u8,
                a.has_opcr as u8,
                a.has_splice as u8,
                a.has_private_data as u8,
                a.has_extension as u8
            )?;
            if let Some(pcr) = a.pcr {
                write!(f, "\n  >> PCR {} ({:.6} sec)", pcr, pcr as f64 / PCR_HZ as f64)?;
            }
        }

        write!(
            f,
            "\n  >>> payload {} bytes",
            TS_PAYLOAD_SIZE - self.payload_start
        )?;

        if let Some(pes) = &self.pes {
            write!(
                f,
                "\n  >>> [PES stream ID {:#04x} ({}) / length {} / {} / scramble {} / priority {} / aligned {} / copyright {} / header len {}]",
                pes.stream_id,
                stream_id_description(pes.stream_id),
                pes.packet_length,
                pts_indicator_description(pes.pts_dts_indicator),
                pes.scrambling_control,
                pes.priority as u8,
                pes.data_alignment as u8,
                pes.copyright as u8,
                pes.header_data_length
            )?;
            if let Some(pts) = pes.pts {
                write!(
                    f,
                    "\n  >>> PTS {} ({:.3} sec) / DTS {}",
                    pts,
                    pts as f64 / PTS_HZ as f64,
                    pes.dts
                        .map(|dts| dts.to_string())
                        .unwrap_or_else(|| "-".into())
                )?;
            }
        }

        Ok(())
    }
}
