use std::fmt;

use crate::playlist::RepresentationId;

const UNSET_NUMBER: u64 = u64::MAX;

/// Which segment of which representation comes next, and which stage of it.
///
/// A representation is sent as its init segment, then its index segment,
/// then media segments in order. [`Position::advance`] walks that sequence.
///
/// Segment number `u64::MAX` is never a valid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Invalid,
    Valid {
        representation: RepresentationId,
        number: u64,
        init_sent: bool,
        index_sent: bool,
    },
}

impl Position {
    pub fn new(representation: RepresentationId, number: u64) -> Self {
        if number == UNSET_NUMBER {
            return Self::Invalid;
        }
        Self::Valid {
            representation,
            number,
            init_sent: false,
            index_sent: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    pub fn representation(&self) -> Option<RepresentationId> {
        match self {
            Self::Valid { representation, .. } => Some(*representation),
            Self::Invalid => None,
        }
    }

    pub fn number(&self) -> Option<u64> {
        match self {
            Self::Valid { number, .. } => Some(*number),
            Self::Invalid => None,
        }
    }

    pub fn init_sent(&self) -> bool {
        matches!(self, Self::Valid { init_sent: true, .. })
    }

    pub fn index_sent(&self) -> bool {
        matches!(self, Self::Valid { index_sent: true, .. })
    }

    /// Same stage flags, different segment number.
    pub(crate) fn with_number(self, new_number: u64) -> Self {
        match self {
            Self::Valid { .. } if new_number == UNSET_NUMBER => Self::Invalid,
            Self::Valid {
                representation,
                init_sent,
                index_sent,
                ..
            } => Self::Valid {
                representation,
                number: new_number,
                init_sent,
                index_sent,
            },
            Self::Invalid => Self::Invalid,
        }
    }

    /// Move to the next stage: init, then index, then one media segment
    /// after another. Flags are never cleared. No-op on an invalid position;
    /// running out of segment numbers invalidates the position.
    pub fn advance(&mut self) -> &mut Self {
        let mut exhausted = false;
        if let Self::Valid {
            number,
            init_sent,
            index_sent,
            ..
        } = self
        {
            if *index_sent {
                match number.checked_add(1).filter(|n| *n != UNSET_NUMBER) {
                    Some(next) => *number = next,
                    None => exhausted = true,
                }
            } else if *init_sent {
                *index_sent = true;
            } else {
                *init_sent = true;
            }
        }
        if exhausted {
            *self = Self::Invalid;
        }
        self
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid {
                representation,
                number,
                init_sent,
                index_sent,
            } => write!(
                f,
                "seg# {number} {}:{} {representation}",
                *init_sent as u8, *index_sent as u8
            ),
            Self::Invalid => f.write_str("invalid"),
        }
    }
}
