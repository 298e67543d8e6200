use std::time::Duration;

use crate::{format::StreamFormat, playlist::RepresentationId};

/// State changes published by a segment tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackerEvent {
    /// The timeline restarts with discontinuity sequence `sequence`.
    Discontinuity { sequence: u64 },
    /// The requested segment was unavailable and another one was delivered.
    SegmentGap,
    RepresentationSwitch {
        prev: Option<RepresentationId>,
        next: Option<RepresentationId>,
    },
    RepresentationUpdated(RepresentationId),
    RepresentationUpdateFailed(RepresentationId),
    FormatChanged(StreamFormat),
    SegmentChanged {
        stream_id: u64,
        sequence: u64,
        start_time: Option<Duration>,
        duration: Duration,
        display_time: Option<Duration>,
    },
    BufferingStateUpdate {
        stream_id: u64,
        enabled: bool,
    },
    BufferingLevelChange {
        stream_id: u64,
        minimum: Duration,
        maximum: Duration,
        current: Duration,
        target: Duration,
    },
    PositionChanged {
        resume_time: Duration,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerEventKind {
    Discontinuity,
    SegmentGap,
    RepresentationSwitch,
    RepresentationUpdated,
    RepresentationUpdateFailed,
    FormatChanged,
    SegmentChanged,
    BufferingStateUpdate,
    BufferingLevelChange,
    PositionChanged,
}

impl TrackerEvent {
    pub fn kind(&self) -> TrackerEventKind {
        match self {
            Self::Discontinuity { .. } => TrackerEventKind::Discontinuity,
            Self::SegmentGap => TrackerEventKind::SegmentGap,
            Self::RepresentationSwitch { .. } => TrackerEventKind::RepresentationSwitch,
            Self::RepresentationUpdated(_) => TrackerEventKind::RepresentationUpdated,
            Self::RepresentationUpdateFailed(_) => TrackerEventKind::RepresentationUpdateFailed,
            Self::FormatChanged(_) => TrackerEventKind::FormatChanged,
            Self::SegmentChanged { .. } => TrackerEventKind::SegmentChanged,
            Self::BufferingStateUpdate { .. } => TrackerEventKind::BufferingStateUpdate,
            Self::BufferingLevelChange { .. } => TrackerEventKind::BufferingLevelChange,
            Self::PositionChanged { .. } => TrackerEventKind::PositionChanged,
        }
    }
}

/// Receives tracker events synchronously, in registration order.
pub trait TrackerListener {
    fn tracker_event(&mut self, event: &TrackerEvent);
}

impl<F> TrackerListener for F
where
    F: FnMut(&TrackerEvent),
{
    fn tracker_event(&mut self, event: &TrackerEvent) {
        self(event)
    }
}
