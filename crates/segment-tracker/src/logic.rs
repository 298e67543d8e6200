//! Strategies the tracker consults but does not implement.

use crate::{
    event::{TrackerEvent, TrackerListener},
    playlist::{AdaptationSet, RepresentationId},
};

/// Bitrate decision. The logic also listens to the tracker, so it can learn
/// about switches, segment durations and buffering levels.
pub trait AdaptationLogic<S: AdaptationSet>: TrackerListener {
    /// Pick the representation to fetch next. `current` is `None` when
    /// nothing has been selected yet, in which case any representation will
    /// do.
    fn next_representation(
        &mut self,
        set: &S,
        current: Option<RepresentationId>,
    ) -> Option<RepresentationId>;
}

/// Decides where a fresh stream joins the playlist.
pub trait BufferingLogic<S: AdaptationSet> {
    fn start_segment_number(&self, representation: &S::Representation) -> Option<u64>;
}

/// Always selects the same representation.
#[derive(Debug, Clone, Copy)]
pub struct FixedAdaptationLogic {
    representation: RepresentationId,
}

impl FixedAdaptationLogic {
    pub fn new(representation: RepresentationId) -> Self {
        Self { representation }
    }
}

impl TrackerListener for FixedAdaptationLogic {
    fn tracker_event(&mut self, _event: &TrackerEvent) {}
}

impl<S: AdaptationSet> AdaptationLogic<S> for FixedAdaptationLogic {
    fn next_representation(
        &mut self,
        set: &S,
        _current: Option<RepresentationId>,
    ) -> Option<RepresentationId> {
        set.representation(self.representation)
            .map(|_| self.representation)
    }
}
