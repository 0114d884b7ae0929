use bytes::Buf;
use crate::types::{
    ThermalRaster, THERMAL_HEIGHT, THERMAL_PIXELS, THERMAL_WIDTH,
};

/// VoSPI packet layout: 4-byte header + 80 big-endian 16-bit words.
pub const VOSPI_PACKET_LEN: usize = 164;
const VOSPI_HEADER_LEN: usize = 4;

const DISC_DATA: u8 = 0x0;
const DISC_TELEMETRY: u8 = 0xE;
const DISC_DISCARD: u8 = 0xF;

/// What one well-formed VoSPI packet carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PacketKind {
    /// A raster row in `[0, 60)`.
    Data(u8),
    /// A telemetry row. Rare on this device generation; counted and skipped.
    Telemetry,
    /// Padding the sensor emits between frames.
    Discard,
}

/// Inspect the 2-byte packet id: high nibble is the discriminator, low 12
/// bits the row number. Returns `None` for malformed headers.
pub(crate) fn packet_kind(packet: &[u8]) -> Option<PacketKind> {
    if packet.len() < VOSPI_HEADER_LEN {
        return None;
    }
    let id = u16::from_be_bytes([packet[0], packet[1]]);
    let discriminator = (id >> 12) as u8;
    let row = id & 0x0FFF;
    match discriminator {
        DISC_DISCARD => Some(PacketKind::Discard),
        DISC_TELEMETRY => Some(PacketKind::Telemetry),
        DISC_DATA if (row as usize) < THERMAL_HEIGHT => Some(PacketKind::Data(row as u8)),
        _ => None,
    }
}

/// A per-chunk invariant violation. The assembler reacts by dropping the
/// current thermal partial; the rest of the frame is unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermalDesync {
    /// Chunk length is not a whole number of packets.
    ShortPacket,
    /// Unrecognized discriminator or data row ≥ 60.
    BadHeader,
    /// The same row arrived twice before a frame sync.
    DuplicateRow(u8),
    /// A sample word had one of its top two bits set.
    SampleOutOfRange { row: u8, col: u8 },
}

impl std::fmt::Display for ThermalDesync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShortPacket => write!(f, "trailing partial packet"),
            Self::BadHeader => write!(f, "bad packet header"),
            Self::DuplicateRow(row) => write!(f, "duplicate row {}", row),
            Self::SampleOutOfRange { row, col } => {
                write!(f, "sample out of 14-bit range at row {} col {}", row, col)
            }
        }
    }
}

/// Summary of one chunk's worth of packets.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChunkIngest {
    pub data_rows: u32,
    pub telemetry_rows: u32,
    pub discard_packets: u32,
}

/// Working state of one thermal frame: sample buffer, row bitset and a
/// monotonic high-water cursor. Created on the first thermal packet after a
/// sync, finalized when all 60 rows are present or the next sync arrives.
#[derive(Debug)]
pub struct PartialThermalFrame {
    samples: Vec<u16>,
    rows_seen: u64,
    cursor: u8,
}

impl PartialThermalFrame {
    pub fn new() -> Self {
        Self {
            samples: vec![0u16; THERMAL_PIXELS],
            rows_seen: 0,
            cursor: 0,
        }
    }

    pub fn rows_filled(&self) -> u32 {
        self.rows_seen.count_ones()
    }

    pub fn is_complete(&self) -> bool {
        self.rows_filled() as usize == THERMAL_HEIGHT
    }

    /// Feed every packet in one `ThermalPacket` chunk. On the first
    /// violation the error is returned and the partial must be discarded;
    /// rows written before the violation are not rolled back.
    pub fn ingest_chunk(&mut self, data: &[u8]) -> Result<ChunkIngest, ThermalDesync> {
        if data.len() % VOSPI_PACKET_LEN != 0 {
            return Err(ThermalDesync::ShortPacket);
        }
        let mut summary = ChunkIngest::default();
        for packet in data.chunks_exact(VOSPI_PACKET_LEN) {
            match packet_kind(packet).ok_or(ThermalDesync::BadHeader)? {
                PacketKind::Discard => summary.discard_packets += 1,
                PacketKind::Telemetry => summary.telemetry_rows += 1,
                PacketKind::Data(row) => {
                    self.ingest_row(row, &packet[VOSPI_HEADER_LEN..])?;
                    summary.data_rows += 1;
                }
            }
        }
        Ok(summary)
    }

    /// A row is written only when all 80 of its words have been consumed.
    fn ingest_row(&mut self, row: u8, payload: &[u8]) -> Result<(), ThermalDesync> {
        let bit = 1u64 << row;
        if self.rows_seen & bit != 0 {
            return Err(ThermalDesync::DuplicateRow(row));
        }
        let mut words = [0u16; THERMAL_WIDTH];
        let mut buf = payload;
        for (col, slot) in words.iter_mut().enumerate() {
            let word = buf.get_u16();
            if word & 0xC000 != 0 {
                return Err(ThermalDesync::SampleOutOfRange {
                    row,
                    col: col as u8,
                });
            }
            *slot = word;
        }
        let start = row as usize * THERMAL_WIDTH;
        self.samples[start..start + THERMAL_WIDTH].copy_from_slice(&words);
        self.rows_seen |= bit;
        if row > self.cursor {
            self.cursor = row;
        }
        Ok(())
    }

    /// Convert into an immutable raster, or report how far we got.
    pub fn finalize(self) -> ThermalResult {
        if self.is_complete() {
            ThermalResult::Complete(ThermalRaster::from_samples(self.samples))
        } else {
            ThermalResult::Incomplete {
                rows_filled: self.rows_seen.count_ones(),
            }
        }
    }
}

impl Default for PartialThermalFrame {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of finalizing a thermal partial at a frame boundary.
#[derive(Debug)]
pub enum ThermalResult {
    Complete(ThermalRaster),
    /// Fewer than 60 rows arrived; the default policy drops these.
    Incomplete { rows_filled: u32 },
}
