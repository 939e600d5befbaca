use crate::error::Result;
use bytes::{BufMut, BytesMut};
use std::time::Duration;

// Constants
pub const TS_SYNC_BYTE: u8 = 0x47;
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_HEADER_SIZE: usize = 4;
pub const TS_PAYLOAD_SIZE: usize = 184;
pub const PTS_HZ: u64 = 90_000;
pub const PCR_HZ: u64 = 27_000_000;

// PIDs
pub const PID_PAT: u16 = 0x0000;
pub const PID_CAT: u16 = 0x0001;
pub const PID_NULL: u16 = 0x1fff;

// Adaptation field control codes
pub const ADAPTATION_RESERVED: u8 = 0;
pub const ADAPTATION_PAYLOAD_ONLY: u8 = 1;
pub const ADAPTATION_FIELD_ONLY: u8 = 2;
pub const ADAPTATION_FIELD_AND_PAYLOAD: u8 = 3;

/// Fixed 4-byte transport packet header.
///
/// All fields are plain integers/flags extracted with explicit shifts and
/// masks; the 2-bit `adaptation_field_control` code is kept raw so even
/// the reserved value 0 survives a round trip.
#[derive(Debug, Clone)]
pub struct TsHeader {
    pub sync_byte: u8, // Always 0x47
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub transport_priority: bool,
    pub pid: u16,
    pub scrambling_control: u8,
    pub adaptation_field_control: u8,
    pub continuity_counter: u8,
}

impl Default for TsHeader {
    fn default() -> Self {
        Self {
            sync_byte: TS_SYNC_BYTE,
            transport_error: false,
            payload_unit_start: false,
            transport_priority: false,
            pid: 0,
            scrambling_control: 0,
            adaptation_field_control: ADAPTATION_PAYLOAD_ONLY,
            continuity_counter: 0,
        }
    }
}

impl TsHeader {
    /// Whether the control code declares an adaptation field.
    pub fn has_adaptation_field(&self) -> bool {
        self.adaptation_field_control & 0x02 != 0
    }

    /// Whether the control code declares a payload.
    pub fn has_payload(&self) -> bool {
        self.adaptation_field_control & 0x01 != 0
    }

    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u8(self.sync_byte);

        let mut b1 = 0u8;
        if self.transport_error {
            b1 |= 0x80;
        }
        if self.payload_unit_start {
            b1 |= 0x40;
        }
        if self.transport_priority {
            b1 |= 0x20;
        }
        b1 |= ((self.pid >> 8) & 0x1f) as u8;
        buf.put_u8(b1);

        buf.put_u8((self.pid & 0xff) as u8);

        let mut b3 = (self.scrambling_control & 0x03) << 6;
        b3 |= (self.adaptation_field_control & 0x03) << 4;
        b3 |= self.continuity_counter & 0x0f;
        buf.put_u8(b3);

        Ok(())
    }
}

/// Variable-length adaptation field.
///
/// A segment whose header declares no adaptation field carries the
/// `Default` value: every flag false, every optional sub-field absent.
/// PCR and OPCR are stored as full 27 MHz values (`base * 300 + extension`);
/// use [`pcr_parts`] / [`pcr_from_parts`] to move between the combined
/// value and the 33+9-bit wire decomposition.
#[derive(Debug, Clone, Default)]
pub struct AdaptationField {
    pub length: u8,
    pub discontinuity: bool,
    pub random_access: bool,
    pub es_priority: bool,
    pub has_pcr: bool,
    pub has_opcr: bool,
    pub has_splice: bool,
    pub has_private_data: bool,
    pub has_extension: bool,
    pub pcr: Option<u64>,
    pub opcr: Option<u64>,
    pub splice_countdown: Option<i8>,
    pub private_data: Option<Vec<u8>>,
}

/// Packetized Elementary Stream (PES) sub-header.
///
/// Present only on payload-unit-start packets whose payload begins with
/// the `0x000001` start code. A `packet_length` of 0 means "unbounded"
/// and the extended sub-header (flags, timestamps) is absent on the wire.
#[derive(Debug, Clone)]
pub struct PesHeader {
    /// Stream identifier indicating content type (video/audio/etc.)
    pub stream_id: u8,
    /// Declared PES packet length; 0 = unbounded
    pub packet_length: u16,
    pub scrambling_control: u8,
    pub priority: bool,
    pub data_alignment: bool,
    pub copyright: bool,
    pub original: bool,
    /// 2-bit PTS/DTS presence indicator (0=none, 2=PTS, 3=PTS+DTS)
    pub pts_dts_indicator: u8,
    pub escr_flag: bool,
    pub es_rate_flag: bool,
    pub dsm_trick_mode_flag: bool,
    pub additional_copy_info_flag: bool,
    pub crc_flag: bool,
    pub extension_flag: bool,
    /// Length of the optional header data following the fixed sub-header
    pub header_data_length: u8,
    /// Presentation timestamp (33 bits, 90 kHz)
    pub pts: Option<u64>,
    /// Decode timestamp (33 bits, 90 kHz)
    pub dts: Option<u64>,
}

impl Default for PesHeader {
    fn default() -> Self {
        Self {
            stream_id: 0,
            packet_length: 0,
            scrambling_control: 0,
            priority: false,
            data_alignment: false,
            copyright: false,
            original: false,
            pts_dts_indicator: 0,
            escr_flag: false,
            es_rate_flag: false,
            dsm_trick_mode_flag: false,
            additional_copy_info_flag: false,
            crc_flag: false,
            extension_flag: false,
            header_data_length: 0,
            pts: None,
            dts: None,
        }
    }
}

impl PesHeader {
    /// Creates a new PES header with a specific stream ID.
    pub fn new(stream_id: u8) -> Self {
        Self {
            stream_id,
            ..Default::default()
        }
    }
}

/// Splits a 27 MHz clock reference into its 33-bit 90 kHz base and 9-bit
/// extension.
pub fn pcr_parts(pcr: u64) -> (u64, u16) {
    ((pcr / 300) & 0x1_ffff_ffff, (pcr % 300) as u16)
}

/// Recombines a 33-bit base and 9-bit extension into the full 27 MHz
/// clock reference value.
pub fn pcr_from_parts(base: u64, extension: u16) -> u64 {
    (base & 0x1_ffff_ffff) * 300 + extension as u64
}

/// Decodes the 48-bit wire form of a PCR/OPCR into the combined 27 MHz
/// value. `src` must hold at least 6 bytes.
pub(crate) fn decode_pcr(src: &[u8]) -> u64 {
    let base = ((src[0] as u64) << 25)
        | ((src[1] as u64) << 17)
        | ((src[2] as u64) << 9)
        | ((src[3] as u64) << 1)
        | ((src[4] as u64) >> 7);
    let extension = (((src[4] & 0x01) as u64) << 8) | src[5] as u64;
    base * 300 + extension
}

/// Encodes a combined 27 MHz value into the 48-bit wire form, reserved
/// bits set. `dst` must hold at least 6 bytes.
pub(crate) fn encode_pcr(dst: &mut [u8], pcr: u64) {
    let (base, extension) = pcr_parts(pcr);
    dst[0] = (base >> 25) as u8;
    dst[1] = (base >> 17) as u8;
    dst[2] = (base >> 9) as u8;
    dst[3] = (base >> 1) as u8;
    dst[4] = (((base & 0x01) as u8) << 7) | 0x7e | (((extension >> 8) & 0x01) as u8);
    dst[5] = (extension & 0xff) as u8;
}

// Time conversion utilities
pub fn pcr_to_time(pcr: u64) -> Duration {
    Duration::new(pcr / PCR_HZ, ((pcr % PCR_HZ) * 1_000_000_000 / PCR_HZ) as u32)
}

pub fn time_to_pcr(time: Duration) -> u64 {
    time.as_secs() * PCR_HZ + time.subsec_nanos() as u64 * PCR_HZ / 1_000_000_000
}

pub fn pts_to_time(pts: u64) -> Duration {
    Duration::new(pts / PTS_HZ, ((pts % PTS_HZ) * 1_000_000_000 / PTS_HZ) as u32)
}

pub fn time_to_pts(time: Duration) -> u64 {
    time.as_secs() * PTS_HZ + time.subsec_nanos() as u64 * PTS_HZ / 1_000_000_000
}

// Human-readable labels for trace output

pub fn pid_description(pid: u16) -> &'static str {
    match pid {
        PID_PAT => "PAT",
        PID_CAT => "CAT",
        0x02 => "TSDT",
        0x03 => "IPMP",
        0x1ffb => "ATSC MGT",
        PID_NULL => "Null Packet",
        _ => {
            if pid <= 15 {
                "Reserved"
            } else if pid <= 31 {
                "DVB Metadata"
            } else if pid <= 8190 {
                "Elementary Stream"
            } else {
                "Unknown"
            }
        }
    }
}

pub fn scrambling_description(code: u8) -> &'static str {
    match code {
        0 => "Not Scrambled",
        1 => "Reserved",
        2 => "Even Key",
        3 => "Odd Key",
        _ => "Unknown",
    }
}

pub fn adaptation_control_description(code: u8) -> &'static str {
    match code {
        ADAPTATION_RESERVED => "Reserved",
        ADAPTATION_PAYLOAD_ONLY => "Payload",
        ADAPTATION_FIELD_ONLY => "Ad Field",
        ADAPTATION_FIELD_AND_PAYLOAD => "Ad Field | Payload",
        _ => "Unknown",
    }
}

pub fn stream_id_description(stream_id: u8) -> &'static str {
    match stream_id {
        0xbd => "Private Stream 1",
        0xbe => "Padding Stream",
        0xbf => "Private Stream 2",
        0xc0..=0xdf => "Audio",
        0xe0..=0xef => "Video",
        _ => "Unknown",
    }
}

pub fn pts_indicator_description(indicator: u8) -> &'static str {
    match indicator {
        0 => "No PTS/DTS",
        1 => "Forbidden",
        2 => "PTS",
        3 => "PTS | DTS",
        _ => "Unknown",
    }
}
