//! Segment sequencing and representation switching for adaptive streams.
//!
//! ```text
//! ┌──────────────────┐  next_representation  ┌──────────────────┐
//! │                  ├───────────────────────►                  │
//! │                  │                       │ AdaptationLogic  │
//! │                  ◄───────────────────────┤                  │
//! │                  │                       └──────────────────┘
//! │                  │  next_media_segment   ┌──────────────────┐
//! │                  ├───────────────────────►                  │
//! │  SegmentTracker  │  init / index segment │  Representation  │
//! │                  ◄───────────────────────┤                  │
//! │   [Position]     │                       └──────────────────┘
//! │   [lookahead]    │  open                 ┌──────────────────┐
//! │                  ├───────────────────────► ConnectionManager│
//! │                  ◄───────────────────────┤                  │
//! │                  │                       └──────────────────┘
//! │                  │  TrackerEvent         ┌──────────────────┐
//! │                  ├───────────────────────►    Listeners     │
//! └────────┬─────────┘                       └──────────────────┘
//!          │ get_next_chunk
//!          ▼
//!   Box<dyn Chunk>
//! ```

pub mod chunk;
pub mod error;
pub mod event;
pub mod format;
pub mod logic;
pub mod playlist;
pub mod position;
pub mod sync;
pub mod tracker;

pub use chunk::{
    ByteRange, Chunk, ChunkRequest, ConnectionManager, MemoryChunk, ProbeableChunk, SegmentKind,
};
pub use error::{TrackerError, TrackerResult};
pub use event::{TrackerEvent, TrackerEventKind, TrackerListener};
pub use format::StreamFormat;
pub use logic::{AdaptationLogic, BufferingLogic, FixedAdaptationLogic};
pub use playlist::{
    AdaptationSet, CodecDescription, MediaSegment, PlaybackRange, Representation,
    RepresentationId, Role, Segment,
};
pub use position::Position;
pub use sync::{SynchronizationReference, SynchronizationReferences, Times};
pub use tracker::{ChunkEntry, SegmentTracker};
