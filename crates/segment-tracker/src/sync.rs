use std::{collections::VecDeque, time::Duration};

/// Timestamps of one point in a stream, on the output and media timelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Times {
    /// Continuous output timeline, shared by all tracks.
    pub continuous: Duration,
    /// Timestamp carried by the media itself.
    pub media: Option<Duration>,
    pub display: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynchronizationReference {
    pub discontinuity_sequence: u64,
    pub times: Times,
}

const DEFAULT_CAPACITY: usize = 10;

/// Timestamp anchors per discontinuity sequence, shared between the trackers
/// of one presentation so every track realigns the same way after a
/// discontinuity.
#[derive(Debug, Clone)]
pub struct SynchronizationReferences {
    // newest first
    references: VecDeque<SynchronizationReference>,
    capacity: usize,
}

impl Default for SynchronizationReferences {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl SynchronizationReferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            references: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record `times` for `discontinuity_sequence`. A reference at the same
    /// continuous time is replaced; beyond capacity the oldest one is dropped.
    pub fn add_reference(&mut self, discontinuity_sequence: u64, times: Times) {
        self.references.retain(|r| {
            r.discontinuity_sequence != discontinuity_sequence
                || r.times.continuous != times.continuous
        });
        self.references.push_front(SynchronizationReference {
            discontinuity_sequence,
            times,
        });
        self.references.truncate(self.capacity);
    }

    /// The reference of `discontinuity_sequence` closest to `time` on the
    /// continuous timeline.
    pub fn reference(
        &self,
        discontinuity_sequence: u64,
        time: Duration,
    ) -> Option<SynchronizationReference> {
        self.references
            .iter()
            .filter(|r| r.discontinuity_sequence == discontinuity_sequence)
            .min_by_key(|r| {
                let continuous = r.times.continuous;
                continuous.max(time) - continuous.min(time)
            })
            .copied()
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn clear(&mut self) {
        self.references.clear();
    }
}
