use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use url::Url;

use crate::{error::TrackerResult, format::StreamFormat, playlist::RepresentationId};

/// Which stage of a representation a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Init,
    Index,
    Media,
}

/// An opened, readable handle to a segment's bytes.
pub trait Chunk: Send {
    /// Read the next block. `Ok(None)` marks the end of the chunk.
    fn read_block(&mut self) -> TrackerResult<Option<Bytes>>;

    fn content_type(&self) -> Option<&str>;

    /// The segment starts a new timeline.
    fn discontinuity(&self) -> bool;

    fn discontinuity_sequence(&self) -> u64;

    fn stream_format(&self) -> StreamFormat;

    fn set_stream_format(&mut self, format: StreamFormat);

    fn read_to_end(&mut self) -> TrackerResult<Bytes> {
        let mut data = BytesMut::new();
        while let Some(block) = self.read_block()? {
            data.extend_from_slice(&block);
        }
        Ok(data.freeze())
    }
}

/// Byte span of a segment inside a larger resource, as used by
/// `SegmentBase` indexes and `#EXT-X-BYTERANGE` playlists. An absent length
/// runs to the end of the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: Option<u64>,
}

/// Everything a [`ConnectionManager`] needs to open a segment.
#[derive(Debug, Clone)]
pub struct ChunkRequest {
    pub url: Url,
    pub byte_range: Option<ByteRange>,
    pub kind: SegmentKind,
    pub sequence: u64,
    pub representation: RepresentationId,
    pub content_type: Option<String>,
    pub discontinuity: bool,
    pub discontinuity_sequence: u64,
}

/// Opens segments into chunks. Transport lives entirely behind this trait.
pub trait ConnectionManager {
    fn open(&mut self, request: ChunkRequest) -> TrackerResult<Box<dyn Chunk>>;
}

impl<F> ConnectionManager for F
where
    F: FnMut(ChunkRequest) -> TrackerResult<Box<dyn Chunk>>,
{
    fn open(&mut self, request: ChunkRequest) -> TrackerResult<Box<dyn Chunk>> {
        self(request)
    }
}

/// A chunk backed by bytes already in memory.
pub struct MemoryChunk {
    blocks: VecDeque<Bytes>,
    content_type: Option<String>,
    discontinuity: bool,
    discontinuity_sequence: u64,
    format: StreamFormat,
}

impl MemoryChunk {
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let mut blocks = VecDeque::new();
        if !data.is_empty() {
            blocks.push_back(data);
        }

        Self {
            blocks,
            content_type: None,
            discontinuity: false,
            discontinuity_sequence: 0,
            format: StreamFormat::Unknown,
        }
    }

    /// Build a chunk carrying the metadata of `request`.
    pub fn from_request(request: &ChunkRequest, data: impl Into<Bytes>) -> Self {
        let mut chunk = Self::new(data);
        chunk.content_type = request.content_type.clone();
        chunk.discontinuity = request.discontinuity;
        chunk.discontinuity_sequence = request.discontinuity_sequence;
        chunk
    }

    /// Split the pending data into blocks of at most `block_size` bytes.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        let block_size = block_size.max(1);
        let mut blocks = VecDeque::new();
        for mut block in self.blocks.drain(..) {
            while block.len() > block_size {
                blocks.push_back(block.split_to(block_size));
            }
            blocks.push_back(block);
        }
        self.blocks = blocks;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_discontinuity(mut self, sequence: u64) -> Self {
        self.discontinuity = true;
        self.discontinuity_sequence = sequence;
        self
    }

    pub fn with_stream_format(mut self, format: StreamFormat) -> Self {
        self.format = format;
        self
    }
}

impl Chunk for MemoryChunk {
    fn read_block(&mut self) -> TrackerResult<Option<Bytes>> {
        Ok(self.blocks.pop_front())
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn discontinuity(&self) -> bool {
        self.discontinuity
    }

    fn discontinuity_sequence(&self) -> u64 {
        self.discontinuity_sequence
    }

    fn stream_format(&self) -> StreamFormat {
        self.format
    }

    fn set_stream_format(&mut self, format: StreamFormat) {
        self.format = format;
    }
}

/// Default number of leading bytes buffered for format detection.
pub const DEFAULT_PROBE_SIZE: usize = 2048;

/// Wraps a chunk so its leading bytes can be inspected without consuming them.
pub struct ProbeableChunk {
    inner: Box<dyn Chunk>,
    peeked: BytesMut,
    probe_size: usize,
    probed: bool,
}

impl ProbeableChunk {
    pub fn new(inner: Box<dyn Chunk>) -> Self {
        Self::with_probe_size(inner, DEFAULT_PROBE_SIZE)
    }

    pub fn with_probe_size(inner: Box<dyn Chunk>, probe_size: usize) -> Self {
        Self {
            inner,
            peeked: BytesMut::new(),
            probe_size,
            probed: false,
        }
    }

    /// Up to `probe_size` leading bytes. Less is returned only when the
    /// chunk is shorter than that.
    pub fn peek(&mut self) -> TrackerResult<&[u8]> {
        if !self.probed {
            while self.peeked.len() < self.probe_size {
                match self.inner.read_block()? {
                    Some(block) => self.peeked.extend_from_slice(&block),
                    None => break,
                }
            }
            self.probed = true;
        }
        Ok(&self.peeked)
    }
}

impl Chunk for ProbeableChunk {
    fn read_block(&mut self) -> TrackerResult<Option<Bytes>> {
        if !self.peeked.is_empty() {
            return Ok(Some(self.peeked.split().freeze()));
        }
        self.inner.read_block()
    }

    fn content_type(&self) -> Option<&str> {
        self.inner.content_type()
    }

    fn discontinuity(&self) -> bool {
        self.inner.discontinuity()
    }

    fn discontinuity_sequence(&self) -> u64 {
        self.inner.discontinuity_sequence()
    }

    fn stream_format(&self) -> StreamFormat {
        self.inner.stream_format()
    }

    fn set_stream_format(&mut self, format: StreamFormat) {
        self.inner.set_stream_format(format);
    }
}
