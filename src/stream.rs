use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::config::{LiveOptions, OfflineOptions};
use crate::error::StreamError;
use crate::pipeline::FrameAssembler;
use crate::source::live::LiveSource;
use crate::source::offline::OfflineSource;
use crate::source::record::Recorder;
use crate::source::ChunkSource;
use crate::types::{CompositeFrame, PipelineStats};

/// Open the attached FLIR One Pro and start streaming composite frames.
/// Fails if the device is absent or refuses the bring-up handshake.
pub fn open_live(options: LiveOptions) -> Result<Stream, StreamError> {
    let source = LiveSource::open(Duration::from_millis(options.read_timeout_ms))?;
    let stream = Stream::from_source(Box::new(source));
    match &options.record_dir {
        Some(dir) => stream.record_to(dir),
        None => Ok(stream),
    }
}

/// Replay a captured chunk directory as if it were the live device.
pub fn open_offline<P: AsRef<Path>>(
    dir: P,
    options: OfflineOptions,
) -> Result<Stream, StreamError> {
    let source = OfflineSource::open(dir.as_ref(), options.repeat)?;
    Ok(Stream::from_source(Box::new(source)))
}

/// Pull-based sequence of composite frames. Owns the transport, the
/// optional recorder and the whole decode pipeline; the pipeline runs on
/// the calling thread inside [`Stream::next_frame`].
pub struct Stream {
    source: Box<dyn ChunkSource>,
    recorder: Option<Recorder>,
    assembler: FrameAssembler,
    closed: bool,
    ended: bool,
}

impl Stream {
    /// Build a stream over any chunk transport. This is how mock transports
    /// get injected in tests and tools; `open_live` / `open_offline` are the
    /// two production constructors.
    pub fn from_source(source: Box<dyn ChunkSource>) -> Self {
        Self {
            source,
            recorder: None,
            assembler: FrameAssembler::new(),
            closed: false,
            ended: false,
        }
    }

    /// Tee every chunk this stream reads into `dir` as a replayable capture.
    pub fn record_to<P: AsRef<Path>>(mut self, dir: P) -> Result<Self, StreamError> {
        self.recorder = Some(Recorder::create(dir.as_ref())?);
        Ok(self)
    }

    /// Run the pipeline until one frame is emitted, the source ends
    /// (`Ok(None)`), or a fatal error terminates the stream.
    pub fn next_frame(&mut self) -> Result<Option<CompositeFrame>, StreamError> {
        if self.closed || self.ended {
            return Ok(None);
        }
        loop {
            let chunk = match self.source.next_chunk() {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    // A trailing interval with no closing sync is never
                    // emitted; frames exist only between two boundaries.
                    info!("stream ended after {} chunks", self.source.position());
                    self.ended = true;
                    return Ok(None);
                }
                Err(e) => {
                    self.close();
                    return Err(e);
                }
            };
            if let Some(recorder) = &mut self.recorder {
                if let Err(e) = recorder.record(&chunk) {
                    self.close();
                    return Err(e);
                }
            }
            if let Some(frame) = self.assembler.ingest(&chunk) {
                return Ok(Some(frame));
            }
        }
    }

    /// Diagnostics counters (desyncs, unknown chunks, emitted frames, …).
    pub fn stats(&self) -> &PipelineStats {
        self.assembler.stats()
    }

    /// Release the device interface claim and recorder handles. Idempotent;
    /// also runs on drop.
    pub fn close(&mut self) {
        if !self.closed {
            self.source.close();
            self.recorder = None;
            self.closed = true;
        }
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.close();
    }
}

impl Iterator for Stream {
    type Item = Result<CompositeFrame, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}
