use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Nominal size of one USB bulk transfer. The last transfer before a stall
/// and read-timeout heartbeats are shorter (possibly zero-length).
pub const CHUNK_LEN: usize = 32 * 1024;

/// Thermal raster width in pixels.
pub const THERMAL_WIDTH: usize = 80;
/// Thermal raster height in pixels (one VoSPI data row per raster row).
pub const THERMAL_HEIGHT: usize = 60;
/// Samples per thermal raster.
pub const THERMAL_PIXELS: usize = THERMAL_WIDTH * THERMAL_HEIGHT;
/// Radiometric samples are 14-bit counts; the top two bits must be clear.
pub const THERMAL_SAMPLE_MAX: u16 = (1 << 14) - 1;

/// One USB bulk transfer (or one replayed capture file), tagged with a
/// monotonically increasing, gap-free sequence index.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub seq: u64,
    pub data: Bytes,
}

impl Chunk {
    pub fn new(seq: u64, data: Bytes) -> Self {
        Self { seq, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Zero-length chunks are live read-timeout heartbeats.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Immutable 60×80 radiometric raster. Every sample is a 14-bit count
/// (`< 16384`) in the low bits of a `u16`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThermalRaster {
    samples: Vec<u16>,
}

impl ThermalRaster {
    /// Wrap a finished sample buffer. The decoder guarantees length and the
    /// 14-bit range before calling this.
    pub(crate) fn from_samples(samples: Vec<u16>) -> Self {
        debug_assert_eq!(samples.len(), THERMAL_PIXELS);
        Self { samples }
    }

    pub fn width(&self) -> usize {
        THERMAL_WIDTH
    }

    pub fn height(&self) -> usize {
        THERMAL_HEIGHT
    }

    /// Sample at column `x`, row `y`.
    pub fn get(&self, x: usize, y: usize) -> u16 {
        self.samples[y * THERMAL_WIDTH + x]
    }

    pub fn row(&self, y: usize) -> &[u16] {
        &self.samples[y * THERMAL_WIDTH..(y + 1) * THERMAL_WIDTH]
    }

    /// Row-major sample view.
    pub fn samples(&self) -> &[u16] {
        &self.samples
    }
}

/// Decoded visible-camera raster, 8-bit BGR interleaved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgrRaster {
    pub width: u32,
    pub height: u32,
    /// `width * height * 3` bytes, row-major, B then G then R.
    pub data: Vec<u8>,
}

/// Visible-camera image as delivered by the device: a complete JPEG
/// (SOI first, EOI last). Decoding is deferred until a consumer asks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleImage {
    jpeg: Bytes,
}

impl VisibleImage {
    pub(crate) fn from_jpeg(jpeg: Bytes) -> Self {
        Self { jpeg }
    }

    /// The compressed form, exactly as assembled from the wire.
    pub fn as_jpeg(&self) -> &[u8] {
        &self.jpeg
    }

    /// Decode to a BGR raster (nominally 1440×1080 on this device).
    /// Deterministic: the same bytes always decode to the same raster.
    pub fn decode(&self) -> Result<BgrRaster, image::ImageError> {
        let decoded =
            image::load_from_memory_with_format(&self.jpeg, image::ImageFormat::Jpeg)?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();
        let mut data = rgb.into_raw();
        for px in data.chunks_exact_mut(3) {
            px.swap(0, 2);
        }
        Ok(BgrRaster { width, height, data })
    }
}

/// Mechanical shutter state as reported by telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutterState {
    Open,
    Closed,
    Unknown,
}

/// Flat-field-correction cycle state as reported by telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FfcState {
    Idle,
    Running,
    Complete,
    Unknown,
}

/// Telemetry record. Every field is optional: a missing field simply was not
/// reported in that chunk. Telemetry is never carried across frame
/// boundaries; a frame with no telemetry chunk has `telemetry == None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Telemetry {
    pub battery_volts: Option<f64>,
    /// 0–100. Out-of-range reports are discarded as not-reported.
    pub battery_percent: Option<f64>,
    pub shutter_temp_k: Option<f64>,
    pub aux_temp_k: Option<f64>,
    pub shutter: Option<ShutterState>,
    pub ffc: Option<FfcState>,
}

/// 60×80 binary MSX edge mask, one bit per thermal pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeMask {
    bits: Vec<bool>,
}

impl EdgeMask {
    pub(crate) fn from_bits(bits: Vec<bool>) -> Self {
        debug_assert_eq!(bits.len(), THERMAL_PIXELS);
        Self { bits }
    }

    pub fn width(&self) -> usize {
        THERMAL_WIDTH
    }

    pub fn height(&self) -> usize {
        THERMAL_HEIGHT
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        self.bits[y * THERMAL_WIDTH + x]
    }

    /// Number of set (edge) pixels.
    pub fn popcount(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }
}

/// The public output unit: whatever arrived between two frame-sync
/// boundaries. At least one member is always present; a boundary interval
/// that accumulated nothing emits no frame and consumes no index.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeFrame {
    /// Monotonic, gap-free emission index starting at 0.
    pub idx: u64,
    /// Boundary counter from the sync slice that opened this interval.
    pub boundary_id: u32,
    /// Device timestamp in milliseconds, when the sync slice reported one.
    pub device_ts: Option<u32>,
    pub thermal: Option<ThermalRaster>,
    pub visible: Option<VisibleImage>,
    pub telemetry: Option<Telemetry>,
    pub edge_mask: Option<EdgeMask>,
}

/// Diagnostics counters accumulated over the life of a stream.
///
/// `desyncs` counts per-chunk invariant violations that were absorbed
/// locally (duplicate VoSPI row, bad packet header, out-of-range sample,
/// interrupted JPEG, malformed telemetry JSON, RLE run-sum mismatch).
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    pub chunks: u64,
    pub heartbeats: u64,
    pub frames_emitted: u64,
    pub desyncs: u64,
    pub unknown_chunks: u64,
    pub agc_legacy_chunks: u64,
    pub vospi_telemetry_rows: u64,
    pub incomplete_thermals: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thermal_raster_indexing() {
        let mut samples = vec![0u16; THERMAL_PIXELS];
        samples[3 * THERMAL_WIDTH + 7] = 1234;
        let raster = ThermalRaster::from_samples(samples);
        assert_eq!(raster.get(7, 3), 1234);
        assert_eq!(raster.row(3)[7], 1234);
        assert_eq!(raster.row(4)[7], 0);
    }

    #[test]
    fn edge_mask_indexing() {
        let mut bits = vec![false; THERMAL_PIXELS];
        bits[59 * THERMAL_WIDTH + 79] = true;
        let mask = EdgeMask::from_bits(bits);
        assert!(mask.get(79, 59));
        assert!(!mask.get(0, 0));
        assert_eq!(mask.popcount(), 1);
    }
}
