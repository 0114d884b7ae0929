use crate::decode::edge::EDGE_MAGIC;
use crate::decode::thermal::{packet_kind, PacketKind, VOSPI_PACKET_LEN};
use crate::decode::visible::{EOI, SOI};
use crate::types::Chunk;

/// Frame-boundary slice magic, distinct from every JPEG and JSON prefix.
pub const FRAME_SYNC_MAGIC: [u8; 4] = [0xEF, 0xBE, 0xAD, 0xDE];

/// Chunk length of the legacy 8-bit AGC thermal dump (60×80 bytes).
const AGC_LEGACY_LEN: usize = 4800;

/// Semantic class of one bulk-transfer slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceClass {
    FrameSync {
        boundary_id: u32,
        /// Device timestamp in ms; not every capture carries one.
        device_ts: Option<u32>,
    },
    ThermalPacket {
        /// Lowest and highest data row present, `None` if all packets in the
        /// slice were discard/telemetry.
        row_range: Option<(u8, u8)>,
    },
    VisibleJpeg {
        is_first: bool,
        is_last: bool,
    },
    TelemetryJson,
    EdgeRle,
    /// Legacy 8-bit AGC path; tagged and dropped.
    AgcLegacy,
    Unknown {
        reason: &'static str,
    },
}

/// State the classifier borrows from the assembler. Rule 3 (continuation
/// JPEG) is the only stateful rule; routing it through this trait keeps the
/// ownership local instead of global.
pub trait ClassifyContext {
    fn jpeg_in_progress(&self) -> bool;
}

/// Label one chunk. Rules apply in order and the first match wins;
/// unambiguous prefixes come before heuristics.
pub fn classify(chunk: &Chunk, cx: &dyn ClassifyContext) -> SliceClass {
    let data = &chunk.data[..];

    // Read-timeout heartbeat.
    if data.is_empty() {
        return SliceClass::Unknown {
            reason: "empty chunk",
        };
    }

    // Rule 1: frame-sync magic, boundary counter in the next 4 bytes.
    if data.starts_with(&FRAME_SYNC_MAGIC) {
        if data.len() < 8 {
            return SliceClass::Unknown {
                reason: "truncated frame sync",
            };
        }
        let boundary_id = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        let device_ts = if data.len() >= 12 {
            let ts = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
            (ts != 0).then_some(ts)
        } else {
            None
        };
        return SliceClass::FrameSync {
            boundary_id,
            device_ts,
        };
    }

    // Rule 2: JPEG start-of-image.
    if data.starts_with(&SOI) {
        return SliceClass::VisibleJpeg {
            is_first: true,
            is_last: data.ends_with(&EOI),
        };
    }

    // Rule 3: continuation of an in-progress JPEG, provided no other
    // recognized magic claims this chunk.
    if cx.jpeg_in_progress() && !has_recognized_prefix(data) {
        return SliceClass::VisibleJpeg {
            is_first: false,
            is_last: contains(data, &EOI),
        };
    }

    // Rule 4: telemetry JSON object.
    if data[0] == b'{' && json_probe(data) {
        return SliceClass::TelemetryJson;
    }

    // Rule 5: MSX edge-mask RLE.
    if data.starts_with(&EDGE_MAGIC) {
        return SliceClass::EdgeRle;
    }

    // Rule 6: VoSPI packet shape.
    if data.len() >= VOSPI_PACKET_LEN && data.len() % VOSPI_PACKET_LEN == 0 {
        match vospi_row_span(data) {
            Ok(row_range) => return SliceClass::ThermalPacket { row_range },
            Err(()) => {
                return SliceClass::Unknown {
                    reason: "bad vospi packet header",
                }
            }
        }
    }

    // Rule 7: legacy 8-bit AGC thermal dump.
    if data.len() == AGC_LEGACY_LEN {
        return SliceClass::AgcLegacy;
    }

    // Rule 8: report the discriminator that got closest.
    let reason = if data[0] == b'{' {
        "unterminated or non-utf8 json"
    } else {
        "unrecognized prefix"
    };
    SliceClass::Unknown { reason }
}

/// Prefixes rule 3 must yield to: frame sync, SOI, JSON, edge RLE.
fn has_recognized_prefix(data: &[u8]) -> bool {
    data.starts_with(&FRAME_SYNC_MAGIC)
        || data.starts_with(&SOI)
        || data[0] == b'{'
        || data.starts_with(&EDGE_MAGIC)
}

/// Cheap validity probe for rule 4: valid UTF-8 up to a closing brace. The
/// real parse happens in the telemetry decoder; a parse failure there is a
/// desync for that chunk only.
fn json_probe(data: &[u8]) -> bool {
    match data.iter().position(|b| *b == b'}') {
        Some(end) => std::str::from_utf8(&data[..=end]).is_ok(),
        None => false,
    }
}

fn contains(haystack: &[u8], needle: &[u8; 2]) -> bool {
    haystack.windows(2).any(|w| w == needle)
}

/// Whole-chunk VoSPI shape check: every 164-byte packet must carry a valid
/// header. Returns the span of data rows seen.
fn vospi_row_span(data: &[u8]) -> Result<Option<(u8, u8)>, ()> {
    let mut span: Option<(u8, u8)> = None;
    for packet in data.chunks_exact(VOSPI_PACKET_LEN) {
        match packet_kind(packet) {
            None => return Err(()),
            Some(PacketKind::Data(row)) => {
                span = Some(match span {
                    None => (row, row),
                    Some((lo, hi)) => (lo.min(row), hi.max(row)),
                });
            }
            Some(_) => {}
        }
    }
    Ok(span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    struct Ctx(bool);

    impl ClassifyContext for Ctx {
        fn jpeg_in_progress(&self) -> bool {
            self.0
        }
    }

    fn chunk(data: Vec<u8>) -> Chunk {
        Chunk::new(0, Bytes::from(data))
    }

    fn sync_chunk(boundary_id: u32, ts: u32) -> Chunk {
        let mut data = FRAME_SYNC_MAGIC.to_vec();
        data.extend_from_slice(&boundary_id.to_le_bytes());
        data.extend_from_slice(&ts.to_le_bytes());
        chunk(data)
    }

    #[test]
    fn frame_sync_with_timestamp() {
        assert_eq!(
            classify(&sync_chunk(41, 1234), &Ctx(false)),
            SliceClass::FrameSync {
                boundary_id: 41,
                device_ts: Some(1234)
            }
        );
    }

    #[test]
    fn frame_sync_zero_timestamp_is_unset() {
        assert_eq!(
            classify(&sync_chunk(7, 0), &Ctx(false)),
            SliceClass::FrameSync {
                boundary_id: 7,
                device_ts: None
            }
        );
    }

    #[test]
    fn jpeg_first_and_single() {
        let single = chunk(vec![0xFF, 0xD8, 0x00, 0xFF, 0xD9]);
        assert_eq!(
            classify(&single, &Ctx(false)),
            SliceClass::VisibleJpeg {
                is_first: true,
                is_last: true
            }
        );
    }

    #[test]
    fn jpeg_continuation_requires_active_partial() {
        let tail = chunk(vec![0x00, 0x11, 0xFF, 0xD9]);
        assert_eq!(
            classify(&tail, &Ctx(true)),
            SliceClass::VisibleJpeg {
                is_first: false,
                is_last: true
            }
        );
        assert!(matches!(
            classify(&tail, &Ctx(false)),
            SliceClass::Unknown { .. }
        ));
    }

    #[test]
    fn telemetry_wins_over_jpeg_continuation() {
        let json = chunk(br#"{"batt_pct":73}"#.to_vec());
        assert_eq!(classify(&json, &Ctx(true)), SliceClass::TelemetryJson);
    }

    #[test]
    fn unterminated_json_is_unknown_even_mid_jpeg() {
        let bad = chunk(b"{not json".to_vec());
        assert_eq!(
            classify(&bad, &Ctx(true)),
            SliceClass::Unknown {
                reason: "unterminated or non-utf8 json"
            }
        );
    }

    #[test]
    fn edge_rle_magic() {
        let mut data = EDGE_MAGIC.to_vec();
        data.extend_from_slice(&[80, 0, 60, 0]);
        assert_eq!(classify(&chunk(data), &Ctx(false)), SliceClass::EdgeRle);
    }

    #[test]
    fn vospi_chunk_reports_row_span() {
        let mut data = crate::decode::thermal::tests::data_packet(12, 0);
        data.extend_from_slice(&crate::decode::thermal::tests::data_packet(3, 0));
        assert_eq!(
            classify(&chunk(data), &Ctx(false)),
            SliceClass::ThermalPacket {
                row_range: Some((3, 12))
            }
        );
    }

    #[test]
    fn corrupt_vospi_header_is_unknown() {
        let mut data = crate::decode::thermal::tests::data_packet(12, 0);
        data[0] = 0x70; // discriminator 0x7 is not a thing
        assert_eq!(
            classify(&chunk(data), &Ctx(false)),
            SliceClass::Unknown {
                reason: "bad vospi packet header"
            }
        );
    }

    #[test]
    fn agc_legacy_by_length() {
        assert_eq!(
            classify(&chunk(vec![0x42; 4800]), &Ctx(false)),
            SliceClass::AgcLegacy
        );
    }

    #[test]
    fn empty_chunk_is_heartbeat() {
        assert_eq!(
            classify(&chunk(Vec::new()), &Ctx(false)),
            SliceClass::Unknown {
                reason: "empty chunk"
            }
        );
    }
}
