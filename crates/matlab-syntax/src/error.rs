use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the extraction core.
///
/// Structural ambiguity is never an error; it is recorded as warnings on the
/// parse result instead.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
