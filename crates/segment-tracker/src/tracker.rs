use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use crate::{
    chunk::{Chunk, ConnectionManager, ProbeableChunk, SegmentKind, DEFAULT_PROBE_SIZE},
    error::{TrackerError, TrackerResult},
    event::{TrackerEvent, TrackerListener},
    format::StreamFormat,
    logic::{AdaptationLogic, BufferingLogic},
    playlist::{
        AdaptationSet, CodecDescription, PlaybackRange, Representation, RepresentationId, Role,
        Segment,
    },
    position::Position,
    sync::{SynchronizationReference, SynchronizationReferences, Times},
};

/// A prepared chunk waiting to be handed out, with the position it was
/// prepared for.
pub struct ChunkEntry {
    chunk: Option<Box<dyn Chunk>>,
    position: Position,
    start_time: Option<Duration>,
    duration: Duration,
    display_time: Option<Duration>,
}

impl ChunkEntry {
    pub fn invalid() -> Self {
        Self {
            chunk: None,
            position: Position::Invalid,
            start_time: None,
            duration: Duration::ZERO,
            display_time: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.chunk.is_some() && self.position.is_valid()
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Playback start of the segment, when the timeline knows it.
    pub fn start_time(&self) -> Option<Duration> {
        self.start_time
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn display_time(&self) -> Option<Duration> {
        self.display_time
    }

    pub fn chunk(&self) -> Option<&dyn Chunk> {
        self.chunk.as_deref()
    }

    /// Detach the chunk, transferring its ownership to the caller.
    pub fn take_chunk(&mut self) -> Option<Box<dyn Chunk>> {
        self.chunk.take()
    }
}

impl Default for ChunkEntry {
    fn default() -> Self {
        Self::invalid()
    }
}

impl fmt::Debug for ChunkEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkEntry")
            .field("chunk", &self.chunk.is_some())
            .field("position", &self.position)
            .field("start_time", &self.start_time)
            .field("duration", &self.duration)
            .field("display_time", &self.display_time)
            .finish()
    }
}

/// Decides, segment by segment, what one track fetches next.
///
/// The tracker walks a [`Position`] through the init, index and media
/// segments of the representation chosen by its [`AdaptationLogic`],
/// switching representations only where the byte stream allows it, and
/// reports every state change to its listeners.
///
/// All methods run synchronously on the caller's thread. Metadata refreshes
/// triggered through [`Representation::run_local_updates`] block the caller.
pub struct SegmentTracker<S: AdaptationSet> {
    adaptation_set: S,
    logic: Box<dyn AdaptationLogic<S>>,
    buffering: Box<dyn BufferingLogic<S>>,
    synchronization_references: Arc<Mutex<SynchronizationReferences>>,
    listeners: Vec<Box<dyn TrackerListener>>,

    /// Position of the last chunk handed out.
    current: Position,
    /// Position of the chunk to prepare next.
    next: Position,
    format: StreamFormat,
    initializing: bool,
    /// At most one prepared chunk.
    lookahead: Option<ChunkEntry>,
    probe_size: usize,
}

impl<S: AdaptationSet> SegmentTracker<S> {
    pub fn new<L, B>(adaptation_set: S, logic: L, buffering: B) -> Self
    where
        L: AdaptationLogic<S> + 'static,
        B: BufferingLogic<S> + 'static,
    {
        Self {
            adaptation_set,
            logic: Box::new(logic),
            buffering: Box::new(buffering),
            synchronization_references: Default::default(),
            listeners: Vec::new(),

            current: Position::Invalid,
            next: Position::Invalid,
            format: StreamFormat::Unknown,
            initializing: true,
            lookahead: None,
            probe_size: DEFAULT_PROBE_SIZE,
        }
    }

    pub fn with_listener(mut self, listener: impl TrackerListener + 'static) -> Self {
        self.register_listener(listener);
        self
    }

    /// Share a reference store with the trackers of the other tracks.
    pub fn with_synchronization_references(
        mut self,
        references: Arc<Mutex<SynchronizationReferences>>,
    ) -> Self {
        self.synchronization_references = references;
        self
    }

    /// Number of leading bytes buffered to detect the format of a chunk.
    pub fn with_probe_size(mut self, probe_size: usize) -> Self {
        self.probe_size = probe_size.max(1);
        self
    }

    pub fn register_listener(&mut self, listener: impl TrackerListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Replace the adaptation logic. The new logic receives all further events
    /// ahead of the other listeners.
    pub fn set_adaptation_logic(&mut self, logic: impl AdaptationLogic<S> + 'static) {
        self.logic = Box::new(logic);
    }

    pub fn adaptation_set(&self) -> &S {
        &self.adaptation_set
    }

    /// Mutable access to the playlist side, e.g. for refreshing it from
    /// outside. Representations must not be added or removed while positions
    /// refer to them.
    pub fn adaptation_set_mut(&mut self) -> &mut S {
        &mut self.adaptation_set
    }

    pub fn current_position(&self) -> Position {
        self.current
    }

    pub fn next_position(&self) -> Position {
        self.next
    }

    /// Format recorded from the chunks handed out so far.
    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn is_initializing(&self) -> bool {
        self.initializing
    }

    /// Forget everything about the stream and start over from scratch.
    pub fn reset(&mut self) {
        self.notify(TrackerEvent::RepresentationSwitch {
            prev: self.current.representation(),
            next: None,
        });
        self.current = Position::Invalid;
        self.next = Position::Invalid;
        self.lookahead = None;
        self.initializing = true;
        self.format = StreamFormat::Unknown;
    }

    /// Prepare the chunk for `pos`, resolving a start position if `pos` is
    /// invalid and switching representation when allowed.
    ///
    /// Any failure yields an invalid entry.
    pub fn prepare_chunk(
        &mut self,
        switch_allowed: bool,
        pos: Position,
        connections: &mut dyn ConnectionManager,
    ) -> ChunkEntry {
        let mut pos = if !pos.is_valid() {
            let start = self.start_position();
            if !start.is_valid() {
                tracing::debug!("No start position available");
                return ChunkEntry::invalid();
            }
            start
        } else {
            // switching before init and index went out would corrupt the stream
            let switch_allowed = switch_allowed
                && self.adaptation_set.is_segment_aligned()
                && pos.init_sent()
                && pos.index_sent();

            match switch_allowed.then(|| self.switch_candidate(pos)).flatten() {
                Some(switched) => {
                    tracing::debug!("Switching from {pos} to {switched}");
                    switched
                }
                None => pos,
            }
        };

        let Some(representation_id) = pos.representation() else {
            return ChunkEntry::invalid();
        };
        let Some(representation) = self.adaptation_set.representation(representation_id) else {
            tracing::warn!("Representation {representation_id} is gone");
            return ChunkEntry::invalid();
        };
        let Some(media) = pos
            .number()
            .and_then(|number| representation.next_media_segment(number))
        else {
            tracing::debug!("No segment available for {pos}");
            return ChunkEntry::invalid();
        };
        if media.gap {
            tracing::debug!("Segment {pos} unavailable, resuming at #{}", media.number);
        }
        pos = pos.with_number(media.number);
        if !pos.is_valid() {
            tracing::debug!("Segment #{} cannot be tracked", media.number);
            return ChunkEntry::invalid();
        }
        let number = media.number;

        let mut stage = None;
        if !pos.init_sent() {
            stage = representation
                .init_segment()
                .map(|segment| (SegmentKind::Init, segment));
            if stage.is_none() {
                pos.advance();
            }
        }
        if stage.is_none() && !pos.index_sent() {
            if representation.needs_index() {
                stage = representation
                    .index_segment()
                    .map(|segment| (SegmentKind::Index, segment));
            }
            if stage.is_none() {
                pos.advance();
            }
        }

        let display_time = media.segment.display_time();
        let (kind, segment) = stage.unwrap_or((SegmentKind::Media, media.segment));

        let chunk = match segment.to_chunk(connections, kind, number, representation_id) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!("Failed to open {kind:?} segment for {pos}: {e}");
                return ChunkEntry::invalid();
            }
        };

        // timings belong to the timeline, not to the segment
        let (start_time, duration) = representation
            .playback_time_duration_by_segment_number(number)
            .map(|(start, duration)| (Some(start), duration))
            .unwrap_or((None, Duration::ZERO));

        ChunkEntry {
            chunk: Some(chunk),
            position: pos,
            start_time,
            duration,
            display_time,
        }
    }

    /// Hand out the next chunk of the stream.
    ///
    /// `None` means nothing can be delivered right now; the caller retries
    /// later, e.g. after the playlist has been refreshed.
    pub fn get_next_chunk(
        &mut self,
        switch_allowed: bool,
        connections: &mut dyn ConnectionManager,
    ) -> Option<Box<dyn Chunk>> {
        if !self.next.is_valid() {
            return None;
        }

        let mut entry = match self.lookahead.take() {
            Some(entry) => entry,
            None => self.prepare_chunk(switch_allowed, self.next, connections),
        };
        if !entry.is_valid() {
            tracing::debug!("Dropping invalid chunk for {}", self.next);
            return None;
        }

        let position = entry.position;
        let (chunk_discontinuity, discontinuity_sequence) = match entry.chunk() {
            Some(chunk) => (chunk.discontinuity(), chunk.discontinuity_sequence()),
            None => return None,
        };

        // next is the position we asked for
        let mut gap = self.next.number() != position.number();
        let switched = self.next.representation() != position.representation()
            || !self.current.is_valid();
        let discontinuity = chunk_discontinuity
            && self.current.is_valid()
            && self.current.number() != self.next.number();

        if switched {
            self.notify(TrackerEvent::RepresentationSwitch {
                prev: self.next.representation(),
                next: position.representation(),
            });
            self.initializing = true;
        }

        self.current = position;
        self.next = position;

        if self.format == StreamFormat::Unsupported {
            // no demuxer can take this chunk, keep it until reset
            self.lookahead = Some(entry);
            return None;
        }

        let chunk = entry.take_chunk()?;
        let (chunk, chunk_format) = self.resolve_format(chunk);
        if chunk_format != self.format && chunk_format != StreamFormat::Unknown {
            tracing::info!("Stream format changed from {} to {chunk_format}", self.format);
            self.format = chunk_format;
            self.notify(TrackerEvent::FormatChanged(chunk_format));
        }

        if self.initializing {
            // no gap on the first chunk of a stream
            gap = false;
            self.initializing = false;
        }

        if gap {
            tracing::warn!("Segment gap, resumed at {position}");
            self.notify(TrackerEvent::SegmentGap);
        }
        if discontinuity {
            tracing::debug!("Discontinuity #{discontinuity_sequence} at {position}");
            self.notify(TrackerEvent::Discontinuity {
                sequence: discontinuity_sequence,
            });
        }

        let stream_id = self.adaptation_set.stream_id();
        self.notify(TrackerEvent::SegmentChanged {
            stream_id,
            sequence: discontinuity_sequence,
            start_time: entry.start_time,
            duration: entry.duration,
            display_time: entry.display_time,
        });

        if !gap {
            self.next.advance();
        }

        Some(chunk)
    }

    /// Seek to `time`. Returns whether a segment covers `time`; with
    /// `try_only` the position is left untouched.
    ///
    /// Fails when the representation has to be refreshed first and the
    /// refresh fails, as a seek needs accurate segment boundaries.
    pub fn set_position_by_time(
        &mut self,
        time: Duration,
        restarted: bool,
        try_only: bool,
    ) -> TrackerResult<bool> {
        let (representation_id, number) = match self.current {
            Position::Valid {
                representation,
                number,
                ..
            } => (representation, Some(number)),
            Position::Invalid => match self.select_representation(None) {
                Some(representation) => (representation, None),
                None => return Ok(false),
            },
        };
        let Some(representation) = self.adaptation_set.representation_mut(representation_id)
        else {
            return Ok(false);
        };

        // the stream might not have been loaded at all yet, or expired
        if representation.needs_update(number) {
            if !representation.run_local_updates() {
                let id = representation.id().to_string();
                tracing::error!("Failed to update representation {id}");
                return Err(TrackerError::RepresentationUpdate { id });
            }
            representation.schedule_next_update(number, true);
            self.notify(TrackerEvent::RepresentationUpdated(representation_id));
        }

        let Some(number) = self
            .adaptation_set
            .representation(representation_id)
            .and_then(|r| r.segment_number_by_time(time))
        else {
            return Ok(false);
        };

        if !try_only {
            self.set_position(Position::new(representation_id, number), restarted);
        }
        Ok(true)
    }

    /// Continue from `pos` with the next chunk, dropping anything prepared.
    pub fn set_position(&mut self, pos: Position, restarted: bool) {
        if restarted {
            self.initializing = true;
        }
        self.current = Position::Invalid;
        self.next = pos;
        self.lookahead = None;

        let resume_time = self.playback_time(true);
        self.notify(TrackerEvent::PositionChanged { resume_time });
    }

    /// Where a fresh stream would start, as decided by the adaptation and
    /// buffering logics.
    pub fn start_position(&mut self) -> Position {
        let Some(representation_id) = self.select_representation(None) else {
            return Position::Invalid;
        };
        let Some(representation) = self.adaptation_set.representation_mut(representation_id)
        else {
            return Position::Invalid;
        };

        let updated = representation.needs_update(None) && representation.run_local_updates();
        let number = self.buffering.start_segment_number(representation);
        representation.schedule_next_update(number, updated);
        if updated {
            self.notify(TrackerEvent::RepresentationUpdated(representation_id));
        }

        match number {
            Some(number) => Position::new(representation_id, number),
            None => Position::Invalid,
        }
    }

    pub fn set_start_position(&mut self) -> bool {
        if self.next.is_valid() {
            return true;
        }

        let pos = self.start_position();
        if !pos.is_valid() {
            return false;
        }
        self.next = pos;
        true
    }

    pub fn current_format(&mut self) -> StreamFormat {
        let Some(representation_id) = self.active_representation() else {
            return StreamFormat::Unknown;
        };
        self.update_representation(representation_id, self.next.number());

        self.adaptation_set
            .representation(representation_id)
            .map(|r| r.stream_format())
            .unwrap_or_default()
    }

    pub fn codecs_desc(&mut self) -> Vec<CodecDescription> {
        let Some(representation_id) = self.active_representation() else {
            return Vec::new();
        };
        self.update_representation(representation_id, self.next.number());

        self.adaptation_set
            .representation(representation_id)
            .map(|r| r.codecs_desc())
            .unwrap_or_default()
    }

    pub fn stream_role(&self) -> Role {
        self.adaptation_set.role()
    }

    /// Playback time of the current segment, or of the next one.
    pub fn playback_time(&mut self, next: bool) -> Duration {
        let number = if next {
            self.next.number()
        } else {
            self.current.number()
        };

        self.active_representation()
            .and_then(|id| self.adaptation_set.representation(id))
            .zip(number)
            .and_then(|(r, number)| r.playback_time_duration_by_segment_number(number))
            .map(|(time, _)| time)
            .unwrap_or_default()
    }

    /// Only answers once a chunk has been handed out.
    pub fn media_playback_range(&self) -> Option<PlaybackRange> {
        self.current
            .representation()
            .and_then(|id| self.adaptation_set.representation(id))
            .and_then(|r| r.media_playback_range())
    }

    /// Content available ahead of the playback position before the live
    /// edge.
    pub fn min_ahead_time(&mut self) -> Duration {
        let Some(representation_id) = self.active_representation() else {
            return Duration::ZERO;
        };
        if self.update_representation(representation_id, self.next.number()) {
            self.notify(TrackerEvent::RepresentationUpdated(representation_id));
        }

        let Some(representation) = self.adaptation_set.representation(representation_id) else {
            return Duration::ZERO;
        };
        self.current
            .number()
            .or_else(|| self.buffering.start_segment_number(representation))
            .map(|number| representation.min_ahead_time(number))
            .unwrap_or_default()
    }

    pub fn buffering_available(&mut self) -> bool {
        if self.adaptation_set.is_live() {
            return self.min_ahead_time() > Duration::ZERO;
        }
        true
    }

    /// Periodic maintenance of the selected representation.
    pub fn update_selected(&mut self) {
        let Some(representation_id) = self.current.representation() else {
            return;
        };
        let Some(representation) = self.adaptation_set.representation_mut(representation_id)
        else {
            return;
        };

        let mut updated = false;
        if representation.needs_update(self.next.number()) {
            updated = representation.run_local_updates();
            representation.schedule_next_update(self.current.number(), updated);
        }
        let expired = representation.can_no_longer_update();

        if updated {
            self.notify(TrackerEvent::RepresentationUpdated(representation_id));
        }
        if expired {
            tracing::warn!("Representation {representation_id} can no longer be updated");
            self.notify(TrackerEvent::RepresentationUpdateFailed(representation_id));
        }
    }

    pub fn synchronization_reference(
        &self,
        discontinuity_sequence: u64,
        time: Duration,
    ) -> Option<SynchronizationReference> {
        self.synchronization_references
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reference(discontinuity_sequence, time)
    }

    pub fn update_synchronization_reference(&self, discontinuity_sequence: u64, times: Times) {
        self.synchronization_references
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add_reference(discontinuity_sequence, times);
    }

    pub fn notify_buffering_state(&mut self, enabled: bool) {
        let stream_id = self.adaptation_set.stream_id();
        self.notify(TrackerEvent::BufferingStateUpdate { stream_id, enabled });
    }

    pub fn notify_buffering_level(
        &mut self,
        minimum: Duration,
        maximum: Duration,
        current: Duration,
        target: Duration,
    ) {
        let stream_id = self.adaptation_set.stream_id();
        self.notify(TrackerEvent::BufferingLevelChange {
            stream_id,
            minimum,
            maximum,
            current,
            target,
        });
    }

    fn notify(&mut self, event: TrackerEvent) {
        self.logic.tracker_event(&event);
        for listener in self.listeners.iter_mut() {
            listener.tracker_event(&event);
        }
    }

    fn select_representation(
        &mut self,
        current: Option<RepresentationId>,
    ) -> Option<RepresentationId> {
        self.logic.next_representation(&self.adaptation_set, current)
    }

    /// The current representation, or whatever the logic would start with.
    fn active_representation(&mut self) -> Option<RepresentationId> {
        match self.current.representation() {
            Some(id) => Some(id),
            None => self.select_representation(None),
        }
    }

    /// Refresh ephemeral metadata if `number` needs it. Returns whether a
    /// refresh happened.
    fn update_representation(&mut self, id: RepresentationId, number: Option<u64>) -> bool {
        let Some(representation) = self.adaptation_set.representation_mut(id) else {
            return false;
        };
        if !representation.needs_update(number) {
            return false;
        }
        let updated = representation.run_local_updates();
        representation.schedule_next_update(number, updated);
        updated
    }

    /// A position in another representation to continue `pos` from, if the
    /// logic wants to switch and the switch is safe.
    fn switch_candidate(&mut self, pos: Position) -> Option<Position> {
        let from = pos.representation()?;
        let number = pos.number()?;
        let to = self.select_representation(Some(from))?;
        if to == from {
            return None;
        }

        // representations may be segmented differently
        let mut translated = self.translate_segment_number(from, to, number);
        self.update_representation(to, translated);
        if translated.is_none() {
            // numbers may only resolve after a refresh
            translated = self.translate_segment_number(from, to, number);
        }
        let Some(translated) = translated else {
            tracing::debug!("Cannot translate segment #{number} from {from} to {to}");
            return None;
        };

        let representation = self.adaptation_set.representation(to)?;
        if representation.min_ahead_time(translated).is_zero() {
            tracing::debug!("Cancelling switch to {to} past the live edge");
            return None;
        }

        Some(Position::new(to, translated))
    }

    fn translate_segment_number(
        &self,
        from: RepresentationId,
        to: RepresentationId,
        number: u64,
    ) -> Option<u64> {
        let from = self.adaptation_set.representation(from)?;
        self.adaptation_set
            .representation(to)?
            .translate_segment_number(number, from)
    }

    /// Detect the format of a chunk with none recorded, by its leading bytes
    /// and then its content type. The detected format is stored on the chunk.
    fn resolve_format(&self, chunk: Box<dyn Chunk>) -> (Box<dyn Chunk>, StreamFormat) {
        let format = chunk.stream_format();
        if format != StreamFormat::Unknown {
            return (chunk, format);
        }

        let mut probe = ProbeableChunk::with_probe_size(chunk, self.probe_size);
        let mut format = match probe.peek() {
            Ok(data) => StreamFormat::from_bytes(data),
            Err(e) => {
                tracing::warn!("Failed to probe chunk: {e}");
                StreamFormat::Unknown
            }
        };
        if format == StreamFormat::Unknown {
            format = probe
                .content_type()
                .map(StreamFormat::from_mime_type)
                .unwrap_or_default();
        }
        probe.set_stream_format(format);

        (Box::new(probe), format)
    }
}

impl<S: AdaptationSet> Drop for SegmentTracker<S> {
    fn drop(&mut self) {
        self.reset();
    }
}
