use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

use super::ChunkSource;
use crate::error::StreamError;
use crate::types::{Chunk, CHUNK_LEN};

/// Replays a directory of captured chunks (`chunk_<seq:08d>.txt`, hex-encoded
/// bytes, whitespace permitted) in lexicographic filename order.
///
/// `repeat` semantics: 0 or 1 is a single pass, N > 1 is N passes, negative
/// is forever. Sequence indices keep counting across passes.
pub struct OfflineSource {
    files: Vec<PathBuf>,
    cursor: usize,
    /// Passes still to run after the current one; `None` is infinite.
    passes_left: Option<u32>,
    seq: u64,
}

impl OfflineSource {
    pub fn open(dir: &Path, repeat: i32) -> Result<Self, StreamError> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(StreamError::Replay)? {
            let entry = entry.map_err(StreamError::Replay)?;
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        debug!("📼 offline source: {} chunk files in {:?}", files.len(), dir);

        let passes_left = if repeat < 0 {
            None
        } else {
            Some((repeat as u32).max(1) - 1)
        };
        Ok(Self {
            files,
            cursor: 0,
            passes_left,
            seq: 0,
        })
    }

    fn read_chunk_file(&self, path: &Path) -> Result<Bytes, StreamError> {
        let text = fs::read_to_string(path).map_err(StreamError::Replay)?;
        let compact: String = text.split_whitespace().collect();
        let data = hex::decode(&compact).map_err(|e| StreamError::ReplayFormat {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if data.len() > CHUNK_LEN {
            return Err(StreamError::ReplayFormat {
                path: path.to_path_buf(),
                reason: format!("chunk is {} bytes, larger than one bulk transfer", data.len()),
            });
        }
        Ok(Bytes::from(data))
    }
}

impl ChunkSource for OfflineSource {
    fn next_chunk(&mut self) -> Result<Option<Chunk>, StreamError> {
        if self.files.is_empty() {
            return Ok(None);
        }
        if self.cursor >= self.files.len() {
            match &mut self.passes_left {
                None => self.cursor = 0,
                Some(0) => return Ok(None),
                Some(n) => {
                    *n -= 1;
                    let left = *n;
                    self.cursor = 0;
                    debug!("📼 offline source: starting next pass, {} more after this", left);
                }
            }
        }
        let path = &self.files[self.cursor];
        self.cursor += 1;
        let data = self.read_chunk_file(path)?;
        let chunk = Chunk::new(self.seq, data);
        self.seq += 1;
        Ok(Some(chunk))
    }

    fn position(&self) -> u64 {
        self.seq
    }
}
