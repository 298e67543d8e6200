#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    rc::Rc,
    time::Duration,
};

use bytes::Bytes;
use segment_tracker::{
    AdaptationLogic, AdaptationSet, BufferingLogic, ByteRange, Chunk, ChunkRequest, CodecDescription,
    ConnectionManager, MediaSegment, MemoryChunk, PlaybackRange, Representation,
    RepresentationId, Role, Segment, SegmentKind, SegmentTracker, StreamFormat, TrackerError,
    TrackerEvent, TrackerEventKind, TrackerListener, TrackerResult,
};
use url::Url;

pub const SEGMENT_DURATION: Duration = Duration::from_secs(4);
pub const INDEX_RANGE: ByteRange = ByteRange {
    offset: 0,
    length: Some(1024),
};

pub trait AssertWrapper {
    type Success;

    fn assert_success(self) -> Self::Success;
    fn assert_error(self);
}

impl<T, E> AssertWrapper for Result<T, E>
where
    E: std::fmt::Debug,
{
    type Success = T;

    fn assert_success(self) -> Self::Success {
        assert!(self.is_ok());

        self.unwrap()
    }

    fn assert_error(self) {
        assert!(self.is_err());
    }
}

impl<T> AssertWrapper for Option<T> {
    type Success = T;

    fn assert_success(self) -> Self::Success {
        assert!(self.is_some());
        self.unwrap()
    }

    fn assert_error(self) {
        assert!(self.is_none());
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::DEBUG.into())
                .from_env_lossy(),
        )
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
pub struct MockSegment {
    pub url: Url,
    pub byte_range: Option<ByteRange>,
    pub discontinuity: Option<u64>,
}

impl Segment for MockSegment {
    fn url(&self) -> Url {
        self.url.clone()
    }

    fn byte_range(&self) -> Option<ByteRange> {
        self.byte_range
    }

    fn display_time(&self) -> Option<Duration> {
        None
    }

    fn discontinuity(&self) -> bool {
        self.discontinuity.is_some()
    }

    fn discontinuity_sequence(&self) -> u64 {
        self.discontinuity.unwrap_or_default()
    }
}

/// A representation whose segment `n` covers `[n * duration, (n + 1) * duration)`.
#[derive(Debug, Clone)]
pub struct MockRepresentation {
    pub id: String,
    /// Available media segment numbers, inclusive. `None` when the playlist
    /// lists nothing.
    pub available: Option<(u64, u64)>,
    /// Availability after the next successful refresh.
    pub refreshed: Option<(u64, u64)>,
    pub has_init: bool,
    pub has_index: bool,
    pub segment_duration: Duration,
    pub stale: bool,
    pub refresh_succeeds: bool,
    pub refreshes: usize,
    pub expired: bool,
    pub min_ahead: Option<Duration>,
    /// media segment number -> discontinuity sequence
    pub discontinuities: BTreeMap<u64, u64>,
    pub format: StreamFormat,
}

impl MockRepresentation {
    pub fn new(id: &str, first: u64, last: u64) -> Self {
        Self {
            id: id.to_string(),
            available: Some((first, last)),
            refreshed: None,
            has_init: true,
            has_index: true,
            segment_duration: SEGMENT_DURATION,
            stale: false,
            refresh_succeeds: true,
            refreshes: 0,
            expired: false,
            min_ahead: None,
            discontinuities: BTreeMap::new(),
            format: StreamFormat::Mp4,
        }
    }

    fn segment(&self, name: &str, discontinuity: Option<u64>) -> MockSegment {
        MockSegment {
            url: Url::parse(&format!("https://example.com/{}/{name}", self.id))
                .expect("valid url"),
            byte_range: None,
            discontinuity,
        }
    }

    fn contains(&self, number: u64) -> bool {
        self.available
            .map_or(false, |(first, last)| (first..=last).contains(&number))
    }
}

impl Representation for MockRepresentation {
    type Segment = MockSegment;

    fn id(&self) -> &str {
        &self.id
    }

    fn next_media_segment(&self, number: u64) -> Option<MediaSegment<Self::Segment>> {
        let (first, last) = self.available?;
        let resolved = number.max(first);
        if resolved > last {
            return None;
        }
        let discontinuity = self.discontinuities.get(&resolved).copied();
        Some(MediaSegment {
            segment: self.segment(&format!("{resolved}.m4s"), discontinuity),
            number: resolved,
            gap: resolved != number,
        })
    }

    fn init_segment(&self) -> Option<Self::Segment> {
        self.has_init.then(|| self.segment("init.mp4", None))
    }

    fn index_segment(&self) -> Option<Self::Segment> {
        self.has_index.then(|| MockSegment {
            byte_range: Some(INDEX_RANGE),
            ..self.segment("index.sidx", None)
        })
    }

    fn needs_index(&self) -> bool {
        self.has_index
    }

    fn needs_update(&self, _number: Option<u64>) -> bool {
        self.stale
    }

    fn run_local_updates(&mut self) -> bool {
        self.refreshes += 1;
        if !self.refresh_succeeds {
            return false;
        }
        self.stale = false;
        if let Some(refreshed) = self.refreshed.take() {
            self.available = Some(refreshed);
        }
        true
    }

    fn schedule_next_update(&mut self, _number: Option<u64>, _updated: bool) {}

    fn can_no_longer_update(&self) -> bool {
        self.expired
    }

    fn translate_segment_number(&self, number: u64, from: &Self) -> Option<u64> {
        let time = from.segment_duration * number as u32;
        let translated = (time.as_millis() / self.segment_duration.as_millis()) as u64;
        self.contains(translated).then_some(translated)
    }

    fn min_ahead_time(&self, number: u64) -> Duration {
        if let Some(min_ahead) = self.min_ahead {
            return min_ahead;
        }
        match self.available {
            Some((_, last)) if number < last => self.segment_duration * (last - number) as u32,
            _ => Duration::ZERO,
        }
    }

    fn segment_number_by_time(&self, time: Duration) -> Option<u64> {
        let number = (time.as_millis() / self.segment_duration.as_millis()) as u64;
        self.contains(number).then_some(number)
    }

    fn playback_time_duration_by_segment_number(
        &self,
        number: u64,
    ) -> Option<(Duration, Duration)> {
        self.contains(number)
            .then(|| (self.segment_duration * number as u32, self.segment_duration))
    }

    fn media_playback_range(&self) -> Option<PlaybackRange> {
        let (first, last) = self.available?;
        let start = self.segment_duration * first as u32;
        let end = self.segment_duration * (last + 1) as u32;
        Some(PlaybackRange {
            start,
            end,
            length: end - start,
        })
    }

    fn stream_format(&self) -> StreamFormat {
        self.format
    }

    fn codecs_desc(&self) -> Vec<CodecDescription> {
        vec![CodecDescription::new(format!("avc1.{}", self.id))]
    }
}

pub struct MockAdaptationSet {
    pub stream_id: u64,
    pub aligned: bool,
    pub live: bool,
    pub representations: Vec<MockRepresentation>,
}

impl MockAdaptationSet {
    pub fn new(representations: Vec<MockRepresentation>) -> Self {
        Self {
            stream_id: 1,
            aligned: true,
            live: false,
            representations,
        }
    }
}

impl AdaptationSet for MockAdaptationSet {
    type Representation = MockRepresentation;

    fn stream_id(&self) -> u64 {
        self.stream_id
    }

    fn role(&self) -> Role {
        Role::Main
    }

    fn is_segment_aligned(&self) -> bool {
        self.aligned
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn representations(&self) -> &[Self::Representation] {
        &self.representations
    }

    fn representations_mut(&mut self) -> &mut [Self::Representation] {
        &mut self.representations
    }
}

/// Picks whatever the test puts into `choice`.
#[derive(Clone, Default)]
pub struct ScriptedLogic {
    pub choice: Rc<Cell<Option<RepresentationId>>>,
    pub events: Rc<RefCell<Vec<TrackerEvent>>>,
}

impl ScriptedLogic {
    pub fn choosing(id: usize) -> Self {
        let logic = Self::default();
        logic.choice.set(Some(RepresentationId(id)));
        logic
    }
}

impl TrackerListener for ScriptedLogic {
    fn tracker_event(&mut self, event: &TrackerEvent) {
        self.events.borrow_mut().push(*event);
    }
}

impl AdaptationLogic<MockAdaptationSet> for ScriptedLogic {
    fn next_representation(
        &mut self,
        set: &MockAdaptationSet,
        _current: Option<RepresentationId>,
    ) -> Option<RepresentationId> {
        self.choice
            .get()
            .filter(|id| set.representation(*id).is_some())
    }
}

/// Joins at the first available segment.
pub struct StartAtFirst;

impl BufferingLogic<MockAdaptationSet> for StartAtFirst {
    fn start_segment_number(&self, representation: &MockRepresentation) -> Option<u64> {
        representation.available.map(|(first, _)| first)
    }
}

pub fn mp4_payload(kind: SegmentKind) -> Bytes {
    let magic: &[u8; 4] = match kind {
        SegmentKind::Init => b"ftyp",
        SegmentKind::Index => b"sidx",
        SegmentKind::Media => b"moof",
    };
    let mut data = vec![0x00, 0x00, 0x00, 0x10];
    data.extend_from_slice(magic);
    data.extend_from_slice(&[0u8; 8]);
    Bytes::from(data)
}

pub fn ts_payload() -> Bytes {
    let mut data = vec![0u8; 188 * 2];
    data[0] = 0x47;
    data[188] = 0x47;
    Bytes::from(data)
}

/// A chunk whose every read fails.
pub struct BrokenChunk;

impl Chunk for BrokenChunk {
    fn read_block(&mut self) -> TrackerResult<Option<Bytes>> {
        Err(std::io::Error::from(std::io::ErrorKind::ConnectionReset).into())
    }

    fn content_type(&self) -> Option<&str> {
        None
    }

    fn discontinuity(&self) -> bool {
        false
    }

    fn discontinuity_sequence(&self) -> u64 {
        0
    }

    fn stream_format(&self) -> StreamFormat {
        StreamFormat::Unknown
    }

    fn set_stream_format(&mut self, _format: StreamFormat) {}
}

/// Serves every request from memory and remembers what was opened.
pub struct MockConnections {
    pub opened: Vec<ChunkRequest>,
    pub fail: bool,
    /// Open chunks that cannot be read.
    pub broken: bool,
    pub payload: Box<dyn Fn(&ChunkRequest) -> Bytes>,
    pub content_type: Option<String>,
}

impl Default for MockConnections {
    fn default() -> Self {
        Self {
            opened: Vec::new(),
            fail: false,
            broken: false,
            payload: Box::new(|request| mp4_payload(request.kind)),
            content_type: None,
        }
    }
}

impl MockConnections {
    pub fn with_payload(payload: impl Fn(&ChunkRequest) -> Bytes + 'static) -> Self {
        Self {
            payload: Box::new(payload),
            ..Default::default()
        }
    }

    pub fn last(&self) -> &ChunkRequest {
        self.opened.last().expect("a chunk was opened")
    }
}

impl ConnectionManager for MockConnections {
    fn open(&mut self, request: ChunkRequest) -> TrackerResult<Box<dyn Chunk>> {
        if self.fail {
            return Err(TrackerError::ChunkOpen(request.url.to_string()));
        }
        if self.broken {
            self.opened.push(request);
            return Ok(Box::new(BrokenChunk));
        }
        let mut chunk = MemoryChunk::from_request(&request, (self.payload)(&request));
        if let Some(content_type) = &self.content_type {
            chunk = chunk.with_content_type(content_type.clone());
        }
        self.opened.push(request);
        Ok(Box::new(chunk))
    }
}

pub type Events = Rc<RefCell<Vec<TrackerEvent>>>;

pub fn recorder() -> (Events, impl TrackerListener + 'static) {
    let events: Events = Default::default();
    let sink = events.clone();
    (events, move |event: &TrackerEvent| {
        sink.borrow_mut().push(*event)
    })
}

pub fn kinds(events: &Events) -> Vec<TrackerEventKind> {
    events.borrow().iter().map(TrackerEvent::kind).collect()
}

pub fn take_kinds(events: &Events) -> Vec<TrackerEventKind> {
    events.borrow_mut().drain(..).map(|e| e.kind()).collect()
}

pub struct Fixture {
    pub tracker: SegmentTracker<MockAdaptationSet>,
    pub logic: ScriptedLogic,
    pub events: Events,
    pub connections: MockConnections,
}

impl Fixture {
    pub fn new(set: MockAdaptationSet) -> Self {
        init_tracing();

        let logic = ScriptedLogic::choosing(0);
        let (events, listener) = recorder();
        let tracker = SegmentTracker::new(set, logic.clone(), StartAtFirst).with_listener(listener);
        Self {
            tracker,
            logic,
            events,
            connections: MockConnections::default(),
        }
    }

    pub fn single(first: u64, last: u64) -> Self {
        Self::new(MockAdaptationSet::new(vec![MockRepresentation::new(
            "a", first, last,
        )]))
    }

    pub fn next_chunk(&mut self, switch_allowed: bool) -> Option<Box<dyn Chunk>> {
        self.tracker
            .get_next_chunk(switch_allowed, &mut self.connections)
    }

    pub fn representation_mut(&mut self, id: usize) -> &mut MockRepresentation {
        &mut self.tracker.adaptation_set_mut().representations[id]
    }
}
