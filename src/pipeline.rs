use tracing::{debug, warn};

use crate::classify::{classify, ClassifyContext, SliceClass};
use crate::decode::thermal::{PartialThermalFrame, ThermalResult};
use crate::decode::visible::PartialJpeg;
use crate::decode::{edge, telemetry};
use crate::types::{Chunk, CompositeFrame, EdgeMask, PipelineStats, Telemetry, VisibleImage};

/// Identity of the sync slice that opened the current boundary interval.
#[derive(Debug, Clone, Copy)]
struct Boundary {
    id: u32,
    device_ts: Option<u32>,
}

/// Frame assembler: buffers partial artifacts under the sync discipline and
/// emits a [`CompositeFrame`] whenever a frame-boundary sync closes an
/// interval that accumulated at least one finalized artifact.
///
/// Decode desyncs are absorbed here: the offending partial is dropped, a
/// counter bumps, and the rest of the frame survives.
pub struct FrameAssembler {
    boundary: Option<Boundary>,
    thermal: Option<PartialThermalFrame>,
    jpeg: Option<PartialJpeg>,
    visible_latest: Option<VisibleImage>,
    telemetry_latest: Option<Telemetry>,
    edge_latest: Option<EdgeMask>,
    next_idx: u64,
    stats: PipelineStats,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            boundary: None,
            thermal: None,
            jpeg: None,
            visible_latest: None,
            telemetry_latest: None,
            edge_latest: None,
            next_idx: 0,
            stats: PipelineStats::default(),
        }
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Classify one chunk and fold it into the open frame. Returns a frame
    /// exactly when this chunk was a sync that closed a non-empty interval.
    pub fn ingest(&mut self, chunk: &Chunk) -> Option<CompositeFrame> {
        self.stats.chunks += 1;
        if chunk.is_empty() {
            // Live read-timeout heartbeat; not even worth an Unknown count.
            self.stats.heartbeats += 1;
            return None;
        }

        let class = classify(chunk, &*self);
        match class {
            SliceClass::FrameSync {
                boundary_id,
                device_ts,
            } => {
                let frame = self.close_interval();
                self.boundary = Some(Boundary {
                    id: boundary_id,
                    device_ts,
                });
                frame
            }
            _ if self.boundary.is_none() => {
                // Nothing can be emitted before the first boundary is
                // established, so don't accumulate either.
                debug!("chunk {} ({:?}) before first frame sync, ignored", chunk.seq, class);
                None
            }
            SliceClass::ThermalPacket { .. } => {
                self.ingest_thermal(chunk);
                None
            }
            SliceClass::VisibleJpeg { is_first, is_last } => {
                self.ingest_jpeg(chunk, is_first, is_last);
                None
            }
            SliceClass::TelemetryJson => {
                match telemetry::parse(&chunk.data) {
                    // Last write wins within a frame.
                    Ok(record) => self.telemetry_latest = Some(record),
                    Err(e) => {
                        warn!("telemetry desync at chunk {}: {}", chunk.seq, e);
                        self.stats.desyncs += 1;
                    }
                }
                None
            }
            SliceClass::EdgeRle => {
                match edge::decode(&chunk.data) {
                    Ok(mask) => self.edge_latest = Some(mask),
                    Err(e) => {
                        warn!("edge-mask desync at chunk {}: {}", chunk.seq, e);
                        self.stats.desyncs += 1;
                    }
                }
                None
            }
            SliceClass::AgcLegacy => {
                // Unreachable on this device generation; tag and drop.
                debug!("legacy AGC slice at chunk {}, dropped", chunk.seq);
                self.stats.agc_legacy_chunks += 1;
                None
            }
            SliceClass::Unknown { reason } => {
                self.stats.unknown_chunks += 1;
                // A foreign chunk in the middle of a JPEG means the fragment
                // stream was cut; the partial can never finalize cleanly.
                if self.jpeg.take().is_some() {
                    warn!(
                        "unknown chunk {} ({}) interrupted JPEG assembly",
                        chunk.seq, reason
                    );
                    self.stats.desyncs += 1;
                } else {
                    debug!("unknown chunk {} ignored: {}", chunk.seq, reason);
                }
                None
            }
        }
    }

    fn ingest_thermal(&mut self, chunk: &Chunk) {
        let partial = self.thermal.get_or_insert_with(PartialThermalFrame::new);
        match partial.ingest_chunk(&chunk.data) {
            Ok(summary) => {
                self.stats.vospi_telemetry_rows += summary.telemetry_rows as u64;
            }
            Err(e) => {
                // Thermal desync costs only the thermal partial; visible and
                // telemetry in this frame stay valid.
                warn!("thermal desync at chunk {}: {}", chunk.seq, e);
                self.thermal = None;
                self.stats.desyncs += 1;
            }
        }
    }

    fn ingest_jpeg(&mut self, chunk: &Chunk, is_first: bool, is_last: bool) {
        if is_first {
            if self.jpeg.take().is_some() {
                // A fresh SOI while a partial is open: the previous image
                // never completed.
                warn!("new SOI at chunk {} abandoned an open JPEG partial", chunk.seq);
                self.stats.desyncs += 1;
            }
            match PartialJpeg::begin(&chunk.data) {
                Ok(partial) => self.jpeg = Some(partial),
                Err(e) => {
                    warn!("jpeg desync at chunk {}: {}", chunk.seq, e);
                    self.stats.desyncs += 1;
                }
            }
        } else if let Some(partial) = &mut self.jpeg {
            partial.append(&chunk.data);
        }

        if is_last {
            if let Some(partial) = self.jpeg.take() {
                match partial.finalize() {
                    Ok(image) => self.visible_latest = Some(image),
                    Err(e) => {
                        warn!("jpeg desync at chunk {}: {}", chunk.seq, e);
                        self.stats.desyncs += 1;
                    }
                }
            }
        }
    }

    /// Finalize whatever accumulated since the last sync. Emits only if at
    /// least one artifact survived its finalization policy; an empty
    /// interval consumes no frame index.
    fn close_interval(&mut self) -> Option<CompositeFrame> {
        let boundary = match self.boundary {
            Some(b) => b,
            None => {
                // The very first sync after bring-up just establishes the
                // boundary. Anything accumulated before it is unanchored.
                self.reset_partials();
                return None;
            }
        };

        let thermal = match self.thermal.take().map(PartialThermalFrame::finalize) {
            Some(ThermalResult::Complete(raster)) => Some(raster),
            Some(ThermalResult::Incomplete { rows_filled }) => {
                // Default policy: an incomplete raster is dropped whole.
                debug!(
                    "dropping incomplete thermal ({}/60 rows) at boundary {}",
                    rows_filled, boundary.id
                );
                self.stats.incomplete_thermals += 1;
                None
            }
            None => None,
        };

        if let Some(partial) = self.jpeg.take() {
            warn!(
                "jpeg partial without EOI ({} fragments, {} bytes) at boundary {}",
                partial.fragments(),
                partial.len(),
                boundary.id
            );
            self.stats.desyncs += 1;
        }

        let visible = self.visible_latest.take();
        let telemetry = self.telemetry_latest.take();
        let edge_mask = self.edge_latest.take();

        if thermal.is_none() && visible.is_none() && telemetry.is_none() && edge_mask.is_none() {
            return None;
        }

        let idx = self.next_idx;
        self.next_idx += 1;
        self.stats.frames_emitted += 1;
        debug!(
            "🎞 frame {} (boundary {}): thermal={} visible={} telemetry={} edge={}",
            idx,
            boundary.id,
            thermal.is_some(),
            visible.is_some(),
            telemetry.is_some(),
            edge_mask.is_some()
        );
        Some(CompositeFrame {
            idx,
            boundary_id: boundary.id,
            device_ts: boundary.device_ts,
            thermal,
            visible,
            telemetry,
            edge_mask,
        })
    }

    fn reset_partials(&mut self) {
        self.thermal = None;
        self.jpeg = None;
        self.visible_latest = None;
        self.telemetry_latest = None;
        self.edge_latest = None;
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifyContext for FrameAssembler {
    fn jpeg_in_progress(&self) -> bool {
        self.jpeg.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FRAME_SYNC_MAGIC;
    use crate::decode::thermal::tests::data_packet;
    use crate::types::THERMAL_HEIGHT;
    use bytes::Bytes;

    struct Feed {
        assembler: FrameAssembler,
        seq: u64,
    }

    impl Feed {
        fn new() -> Self {
            Self {
                assembler: FrameAssembler::new(),
                seq: 0,
            }
        }

        fn push(&mut self, data: Vec<u8>) -> Option<CompositeFrame> {
            let chunk = Chunk::new(self.seq, Bytes::from(data));
            self.seq += 1;
            self.assembler.ingest(&chunk)
        }
    }

    fn sync(boundary_id: u32) -> Vec<u8> {
        let mut data = FRAME_SYNC_MAGIC.to_vec();
        data.extend_from_slice(&boundary_id.to_le_bytes());
        data
    }

    fn full_thermal_rows() -> Vec<Vec<u8>> {
        (0..THERMAL_HEIGHT as u8).map(|row| data_packet(row, 0)).collect()
    }

    #[test]
    fn thermal_only_frame() {
        let mut feed = Feed::new();
        assert!(feed.push(sync(1)).is_none());
        for row in full_thermal_rows() {
            assert!(feed.push(row).is_none());
        }
        let frame = feed.push(sync(2)).expect("one frame");
        assert_eq!(frame.idx, 0);
        assert_eq!(frame.boundary_id, 1);
        assert!(frame.thermal.is_some());
        assert!(frame.visible.is_none());
        assert!(frame.telemetry.is_none());
        assert!(frame.edge_mask.is_none());
    }

    #[test]
    fn missing_row_drops_thermal_and_emits_nothing() {
        let mut feed = Feed::new();
        feed.push(sync(1));
        for (i, row) in full_thermal_rows().into_iter().enumerate() {
            if i != 37 {
                feed.push(row);
            }
        }
        assert!(feed.push(sync(2)).is_none());
        assert_eq!(feed.assembler.stats().incomplete_thermals, 1);
        assert_eq!(feed.assembler.stats().frames_emitted, 0);
    }

    #[test]
    fn duplicate_row_spares_the_rest_of_the_frame() {
        let mut feed = Feed::new();
        feed.push(sync(1));
        feed.push(data_packet(5, 0));
        feed.push(data_packet(5, 0)); // desync: thermal partial dropped
        feed.push(br#"{"batt_pct":42}"#.to_vec());
        let frame = feed.push(sync(2)).expect("telemetry survives");
        assert!(frame.thermal.is_none());
        assert_eq!(
            frame.telemetry.as_ref().unwrap().battery_percent,
            Some(42.0)
        );
        assert_eq!(feed.assembler.stats().desyncs, 1);
    }

    #[test]
    fn telemetry_is_not_carried_across_boundaries() {
        let mut feed = Feed::new();
        feed.push(sync(1));
        feed.push(br#"{"batt_pct":90}"#.to_vec());
        let first = feed.push(sync(2)).expect("frame with telemetry");
        assert!(first.telemetry.is_some());

        feed.push(data_packet(0, 0));
        let second = feed.push(sync(3));
        // Only an incomplete thermal accumulated: nothing to emit, and the
        // old telemetry must not resurrect.
        assert!(second.is_none());
    }

    #[test]
    fn unknown_chunk_interrupts_jpeg() {
        let mut feed = Feed::new();
        feed.push(sync(1));
        feed.push(vec![0xFF, 0xD8, 0x01]);
        feed.push(b"{not json".to_vec()); // cuts the fragment stream
        feed.push(vec![0x02, 0xFF, 0xD9]); // tail now has no partial to join
        feed.push(br#"{"batt_pct":73}"#.to_vec());
        let frame = feed.push(sync(2)).expect("frame without visible");
        assert!(frame.visible.is_none());
        assert!(frame.telemetry.is_some());
        assert_eq!(feed.assembler.stats().desyncs, 1);
    }

    #[test]
    fn empty_interval_consumes_no_index() {
        let mut feed = Feed::new();
        feed.push(sync(1));
        assert!(feed.push(sync(2)).is_none());
        feed.push(br#"{"batt_pct":10}"#.to_vec());
        let frame = feed.push(sync(3)).expect("frame");
        assert_eq!(frame.idx, 0);
    }

    #[test]
    fn chunks_before_first_sync_are_ignored() {
        let mut feed = Feed::new();
        for row in full_thermal_rows() {
            feed.push(row);
        }
        assert!(feed.push(sync(1)).is_none());
        assert!(feed.push(sync(2)).is_none());
        assert_eq!(feed.assembler.stats().frames_emitted, 0);
    }

    #[test]
    fn jpeg_without_eoi_at_boundary_is_a_desync() {
        let mut feed = Feed::new();
        feed.push(sync(1));
        feed.push(vec![0xFF, 0xD8, 0x01]);
        assert!(feed.push(sync(2)).is_none());
        assert_eq!(feed.assembler.stats().desyncs, 1);
    }
}
