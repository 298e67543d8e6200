use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Failed to update representation {id}")]
    RepresentationUpdate { id: String },

    #[error("Failed to open chunk: {0}")]
    ChunkOpen(String),

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

pub type TrackerResult<T> = Result<T, TrackerError>;
