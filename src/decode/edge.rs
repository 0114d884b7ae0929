use bytes::Buf;
use crate::types::{EdgeMask, THERMAL_HEIGHT, THERMAL_WIDTH};

/// MSX edge-mask slice magic ("MX").
pub const EDGE_MAGIC: [u8; 2] = [0x4D, 0x58];

const HEADER_LEN: usize = 6;

/// Why an edge slice failed to decode. Absorbed locally as a desync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDesync {
    ShortHeader,
    BadMagic,
    /// The mask must be sized for the thermal raster.
    WrongDimensions { width: u16, height: u16 },
    /// Runs ended early or overshot `width × height`.
    RunSumMismatch,
}

impl std::fmt::Display for EdgeDesync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShortHeader => write!(f, "slice shorter than header"),
            Self::BadMagic => write!(f, "bad edge magic"),
            Self::WrongDimensions { width, height } => {
                write!(f, "unexpected mask dimensions {}x{}", width, height)
            }
            Self::RunSumMismatch => write!(f, "run lengths do not sum to mask size"),
        }
    }
}

/// Expand one edge slice: magic + width (u16 LE) + height (u16 LE), then
/// u16-LE run lengths alternating 0-bits / 1-bits, starting with 0-bits.
/// A zero-length run switches state without emitting. Bytes after the final
/// run are transfer padding and ignored.
pub fn decode(payload: &[u8]) -> Result<EdgeMask, EdgeDesync> {
    if payload.len() < HEADER_LEN {
        return Err(EdgeDesync::ShortHeader);
    }
    if payload[..2] != EDGE_MAGIC {
        return Err(EdgeDesync::BadMagic);
    }
    let mut buf = &payload[2..];
    let width = buf.get_u16_le();
    let height = buf.get_u16_le();
    if width as usize != THERMAL_WIDTH || height as usize != THERMAL_HEIGHT {
        return Err(EdgeDesync::WrongDimensions { width, height });
    }

    let total = width as usize * height as usize;
    let mut bits = Vec::with_capacity(total);
    let mut state = false;
    while bits.len() < total {
        if buf.remaining() < 2 {
            return Err(EdgeDesync::RunSumMismatch);
        }
        let run = buf.get_u16_le() as usize;
        if bits.len() + run > total {
            return Err(EdgeDesync::RunSumMismatch);
        }
        bits.resize(bits.len() + run, state);
        state = !state;
    }
    Ok(EdgeMask::from_bits(bits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::THERMAL_PIXELS;

    pub(crate) fn encode(runs: &[u16]) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&EDGE_MAGIC);
        payload.extend_from_slice(&(THERMAL_WIDTH as u16).to_le_bytes());
        payload.extend_from_slice(&(THERMAL_HEIGHT as u16).to_le_bytes());
        for run in runs {
            payload.extend_from_slice(&run.to_le_bytes());
        }
        payload
    }

    #[test]
    fn alternating_runs() {
        // 10 clear, 5 set, rest clear.
        let rest = (THERMAL_PIXELS - 15) as u16;
        let mask = decode(&encode(&[10, 5, rest])).unwrap();
        assert!(!mask.get(9, 0));
        assert!(mask.get(10, 0));
        assert!(mask.get(14, 0));
        assert!(!mask.get(15, 0));
        assert_eq!(mask.popcount(), 5);
    }

    #[test]
    fn zero_run_switches_state() {
        // Leading zero run means the mask starts with set bits.
        let rest = (THERMAL_PIXELS - 3) as u16;
        let mask = decode(&encode(&[0, 3, rest])).unwrap();
        assert!(mask.get(0, 0));
        assert!(mask.get(2, 0));
        assert!(!mask.get(3, 0));
    }

    #[test]
    fn padding_after_runs_is_ignored() {
        let mut payload = encode(&[THERMAL_PIXELS as u16]);
        payload.extend_from_slice(&[0xAA; 7]);
        let mask = decode(&payload).unwrap();
        assert_eq!(mask.popcount(), 0);
    }

    #[test]
    fn short_run_sum_is_rejected() {
        assert_eq!(decode(&encode(&[10, 5])), Err(EdgeDesync::RunSumMismatch));
    }

    #[test]
    fn overshooting_run_is_rejected() {
        assert_eq!(
            decode(&encode(&[4000, 1000])),
            Err(EdgeDesync::RunSumMismatch)
        );
    }

    #[test]
    fn wrong_dimensions_are_rejected() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&EDGE_MAGIC);
        payload.extend_from_slice(&32u16.to_le_bytes());
        payload.extend_from_slice(&24u16.to_le_bytes());
        assert_eq!(
            decode(&payload),
            Err(EdgeDesync::WrongDimensions {
                width: 32,
                height: 24
            })
        );
    }
}
