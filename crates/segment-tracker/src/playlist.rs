//! Playlist-side collaborators of the tracker.
//!
//! Parsing and refreshing manifests happens outside this crate. The tracker
//! only sees an [`AdaptationSet`] owning its representations, and asks each
//! [`Representation`] to resolve segment numbers into [`Segment`]s.

use std::{fmt, time::Duration};

use url::Url;

use crate::{
    chunk::{ByteRange, Chunk, ChunkRequest, ConnectionManager, SegmentKind},
    error::TrackerResult,
    format::StreamFormat,
};

/// Index of a representation inside its adaptation set.
///
/// Ids are only meaningful for the set that issued them; lookups through
/// [`AdaptationSet::representation`] are bounds checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepresentationId(pub usize);

impl RepresentationId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for RepresentationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Main,
    Alternate,
    Supplementary,
    Commentary,
    Dub,
    Caption,
    Subtitle,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CodecDescription {
    /// RFC 6381 codec string, e.g. `avc1.64001f`
    pub codec: String,
    pub language: Option<String>,
    pub description: Option<String>,
}

impl CodecDescription {
    pub fn new(codec: impl Into<String>) -> Self {
        Self {
            codec: codec.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackRange {
    pub start: Duration,
    pub end: Duration,
    pub length: Duration,
}

/// Result of resolving a media segment number.
#[derive(Debug, Clone)]
pub struct MediaSegment<T> {
    pub segment: T,
    /// The number actually resolved, which may differ from the requested one
    /// when the playlist no longer (or not yet) lists it.
    pub number: u64,
    /// Set when `number` is a substitute for an unavailable segment.
    pub gap: bool,
}

/// A retrievable unit of media data.
pub trait Segment {
    fn url(&self) -> Url;

    fn byte_range(&self) -> Option<ByteRange> {
        None
    }

    fn content_type(&self) -> Option<&str> {
        None
    }

    fn display_time(&self) -> Option<Duration> {
        None
    }

    fn discontinuity(&self) -> bool {
        false
    }

    fn discontinuity_sequence(&self) -> u64 {
        0
    }

    /// Open this segment through `connections`, bound to `number` in
    /// `representation`.
    fn to_chunk(
        &self,
        connections: &mut dyn ConnectionManager,
        kind: SegmentKind,
        number: u64,
        representation: RepresentationId,
    ) -> TrackerResult<Box<dyn Chunk>> {
        let request = ChunkRequest {
            url: self.url(),
            byte_range: self.byte_range(),
            kind,
            sequence: number,
            representation,
            content_type: self.content_type().map(str::to_string),
            discontinuity: self.discontinuity(),
            discontinuity_sequence: self.discontinuity_sequence(),
        };
        connections.open(request)
    }
}

/// One alternative encoding of a track.
pub trait Representation {
    type Segment: Segment;

    fn id(&self) -> &str;

    /// Resolve media segment `number`, substituting the nearest available one
    /// if it is gone. `None` means nothing can be served, e.g. the live window
    /// expired.
    fn next_media_segment(&self, number: u64) -> Option<MediaSegment<Self::Segment>>;

    fn init_segment(&self) -> Option<Self::Segment>;

    fn index_segment(&self) -> Option<Self::Segment>;

    fn needs_index(&self) -> bool {
        false
    }

    /// Whether the segment map must be refreshed before `number` can be
    /// resolved. `None` asks about the representation as a whole.
    fn needs_update(&self, number: Option<u64>) -> bool;

    /// Refresh the segment map. Returns whether a refresh happened.
    fn run_local_updates(&mut self) -> bool;

    fn schedule_next_update(&mut self, number: Option<u64>, updated: bool);

    /// The representation has left the playlist for good.
    fn can_no_longer_update(&self) -> bool {
        false
    }

    /// Translate `number` from the numbering of `from` into ours.
    fn translate_segment_number(&self, number: u64, from: &Self) -> Option<u64>;

    /// Duration of content available ahead of `number` before the live edge.
    fn min_ahead_time(&self, number: u64) -> Duration;

    fn segment_number_by_time(&self, time: Duration) -> Option<u64>;

    /// Start time and duration of segment `number` on the playback timeline.
    fn playback_time_duration_by_segment_number(&self, number: u64)
        -> Option<(Duration, Duration)>;

    fn media_playback_range(&self) -> Option<PlaybackRange>;

    fn stream_format(&self) -> StreamFormat;

    fn codecs_desc(&self) -> Vec<CodecDescription> {
        Vec::new()
    }
}

/// The group of representations of one logical track.
///
/// The set owns its representations; everything else refers to them through
/// [`RepresentationId`]s.
pub trait AdaptationSet {
    type Representation: Representation;

    fn stream_id(&self) -> u64;

    fn role(&self) -> Role {
        Role::default()
    }

    /// Segment boundaries line up across all representations.
    fn is_segment_aligned(&self) -> bool;

    /// Whether the owning playlist is live.
    fn is_live(&self) -> bool;

    fn representations(&self) -> &[Self::Representation];

    fn representations_mut(&mut self) -> &mut [Self::Representation];

    fn representation(&self, id: RepresentationId) -> Option<&Self::Representation> {
        self.representations().get(id.index())
    }

    fn representation_mut(&mut self, id: RepresentationId) -> Option<&mut Self::Representation> {
        self.representations_mut().get_mut(id.index())
    }
}
