use bytes::BytesMut;
use crate::types::{VisibleImage, CHUNK_LEN};

/// JPEG start-of-image marker.
pub const SOI: [u8; 2] = [0xFF, 0xD8];
/// JPEG end-of-image marker.
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Why a JPEG partial was rejected. Absorbed locally as a desync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegDesync {
    /// First fragment did not start with SOI.
    MissingSoi,
    /// No EOI anywhere in the assembled buffer.
    MissingEoi,
    /// A second SOI after position 0: the stream restarted mid-image.
    EmbeddedSoi,
}

impl std::fmt::Display for JpegDesync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSoi => write!(f, "fragment stream did not start with SOI"),
            Self::MissingEoi => write!(f, "no EOI in assembled JPEG"),
            Self::EmbeddedSoi => write!(f, "SOI after position 0"),
        }
    }
}

/// Growing buffer of visible-camera JPEG fragments. Begins on a chunk that
/// starts with SOI, ends on the chunk containing EOI; fragments concatenate
/// in arrival order.
#[derive(Debug)]
pub struct PartialJpeg {
    buf: BytesMut,
    fragments: u32,
}

impl PartialJpeg {
    /// Start a new image from its first fragment.
    pub fn begin(first: &[u8]) -> Result<Self, JpegDesync> {
        if !first.starts_with(&SOI) {
            return Err(JpegDesync::MissingSoi);
        }
        let mut buf = BytesMut::with_capacity(CHUNK_LEN * 2);
        buf.extend_from_slice(first);
        Ok(Self { buf, fragments: 1 })
    }

    pub fn append(&mut self, fragment: &[u8]) {
        self.buf.reserve(fragment.len());
        self.buf.extend_from_slice(fragment);
        self.fragments += 1;
    }

    pub fn fragments(&self) -> u32 {
        self.fragments
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Validate and seal the image. The buffer is truncated just past the
    /// final EOI so the byte form always ends with `FF D9`.
    pub fn finalize(self) -> Result<VisibleImage, JpegDesync> {
        let end = find_last(&self.buf, &EOI).ok_or(JpegDesync::MissingEoi)?;
        let mut buf = self.buf;
        buf.truncate(end + EOI.len());
        if find_first(&buf[1..], &SOI).is_some() {
            return Err(JpegDesync::EmbeddedSoi);
        }
        Ok(VisibleImage::from_jpeg(buf.freeze()))
    }
}

fn find_first(haystack: &[u8], needle: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == needle)
}

fn find_last(haystack: &[u8], needle: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).rposition(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_fragment_assembly() {
        let mut partial = PartialJpeg::begin(&[0xFF, 0xD8, 0x01, 0x02]).unwrap();
        partial.append(&[0x03, 0x04]);
        partial.append(&[0x05, 0xFF, 0xD9]);
        assert_eq!(partial.fragments(), 3);
        let image = partial.finalize().unwrap();
        assert_eq!(
            image.as_jpeg(),
            &[0xFF, 0xD8, 0x01, 0x02, 0x03, 0x04, 0x05, 0xFF, 0xD9]
        );
    }

    #[test]
    fn trailing_padding_is_trimmed() {
        let mut partial = PartialJpeg::begin(&[0xFF, 0xD8, 0x00]).unwrap();
        partial.append(&[0xFF, 0xD9, 0xAA, 0xBB, 0xCC]);
        let image = partial.finalize().unwrap();
        assert!(image.as_jpeg().ends_with(&EOI));
        assert_eq!(image.as_jpeg().len(), 5);
    }

    #[test]
    fn rejects_missing_soi() {
        assert_eq!(
            PartialJpeg::begin(&[0x00, 0xFF, 0xD8]).unwrap_err(),
            JpegDesync::MissingSoi
        );
    }

    #[test]
    fn rejects_missing_eoi() {
        let partial = PartialJpeg::begin(&[0xFF, 0xD8, 0x01]).unwrap();
        assert_eq!(partial.finalize().unwrap_err(), JpegDesync::MissingEoi);
    }

    #[test]
    fn rejects_embedded_soi() {
        let mut partial = PartialJpeg::begin(&[0xFF, 0xD8, 0x01]).unwrap();
        partial.append(&[0xFF, 0xD8, 0xFF, 0xD9]);
        assert_eq!(partial.finalize().unwrap_err(), JpegDesync::EmbeddedSoi);
    }
}
