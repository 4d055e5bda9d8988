use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("video directory not configured")]
    LibraryUnavailable,
    #[error("no video file with number {0}")]
    BadIndex(usize),
    #[error("media directory error: {0}")]
    Io(#[from] std::io::Error),
    #[error("coordinator has shut down")]
    CoordinatorClosed,
}
