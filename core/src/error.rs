//! Error taxonomy shared by every crate in the workspace.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Too few correspondences survived filtering to fit a homography.
    #[error("insufficient matches: found {found}, need at least {required}")]
    InsufficientMatches { found: usize, required: usize },

    /// The fitted transform cannot be used to place an image.
    #[error("degenerate transform: {0}")]
    DegenerateTransform(String),

    #[error("canvas of {width}x{height} exceeds the limit of {limit} pixels")]
    CanvasTooLarge { width: u64, height: u64, limit: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("image error: {0}")]
    Image(#[from] ::image::ImageError),
}

impl Error {
    /// True for failures the caller can reasonably retry with other inputs
    /// or a looser configuration.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::InsufficientMatches { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_matches_message_names_counts() {
        let err = Error::InsufficientMatches {
            found: 2,
            required: 4,
        };
        assert_eq!(
            err.to_string(),
            "insufficient matches: found 2, need at least 4"
        );
        assert!(err.is_recoverable());
    }

    #[test]
    fn degenerate_transform_is_not_recoverable() {
        let err = Error::DegenerateTransform("singular".into());
        assert!(!err.is_recoverable());
    }
}
