use thiserror::Error;

/// Primary error type for lrpick operations.
///
/// Every fallible operation across the workspace returns one of these
/// variants. Errors are always propagated to the caller; nothing is
/// swallowed internally.
#[derive(Error, Debug)]
pub enum PickError {
    /// A method was invoked after `close`.
    #[error("picker method called after close")]
    Closed,

    /// A selection was requested from a picker holding no keys.
    #[error("selection from an empty picker")]
    Empty,

    /// A structural invariant was violated mid-operation.
    ///
    /// This indicates the tree was damaged, almost always by sharing an
    /// unsynchronized picker across threads. The picker must be discarded.
    #[error("picker state is corrupt; do not share an unsynchronized picker across threads")]
    Corrupt,

    /// The next generation would exceed the representable range.
    ///
    /// The picker is unusable once this is returned and must be recreated.
    #[error("generation overflow; destroy and recreate the picker")]
    Overflow,

    /// A negative value was supplied where a non-negative one is required.
    ///
    /// Negative infinity counts as negative.
    #[error("negative values are not accepted")]
    Negative,

    /// A NaN bias was supplied.
    #[error("NaN is not a valid bias")]
    Nan,

    /// `unique_n` was asked for more unique keys than the picker holds.
    #[error("cannot pick {requested} unique keys from a picker holding {available}")]
    InsufficientUnique {
        requested: usize,
        available: usize,
    },

    /// Parallel key/generation lists of differing lengths were supplied
    /// to a bulk load.
    #[error("length mismatch in bulk load: {keys} keys but {generations} generations")]
    LengthMismatch {
        keys: usize,
        generations: usize,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error surfaced by the backing key-value store.
    #[cfg(feature = "rocksdb")]
    #[error("store error: {0}")]
    Store(#[from] rocksdb::Error),
}

impl PickError {
    /// Process exit code for this error (for CLI use).
    ///
    /// Request errors map to 1, lifecycle misuse to 2, overflow to 3,
    /// corruption to 4, and store/file I/O failures to 5.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Empty
            | Self::Negative
            | Self::Nan
            | Self::InsufficientUnique { .. }
            | Self::LengthMismatch { .. } => 1,
            Self::Closed => 2,
            Self::Overflow => 3,
            Self::Corrupt => 4,
            Self::Io(_) => 5,
            #[cfg(feature = "rocksdb")]
            Self::Store(_) => 5,
        }
    }

    /// Whether retrying the same call can ever succeed without other
    /// intervening operations.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Closed | Self::Overflow | Self::Corrupt)
    }
}

/// Result type alias using [`PickError`].
pub type Result<T> = std::result::Result<T, PickError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            PickError::Empty.to_string(),
            "selection from an empty picker"
        );
        assert_eq!(
            PickError::InsufficientUnique {
                requested: 6,
                available: 5
            }
            .to_string(),
            "cannot pick 6 unique keys from a picker holding 5"
        );
        assert_eq!(
            PickError::LengthMismatch {
                keys: 3,
                generations: 2
            }
            .to_string(),
            "length mismatch in bulk load: 3 keys but 2 generations"
        );
    }

    #[test]
    fn exit_codes() {
        assert_eq!(PickError::Empty.exit_code(), 1);
        assert_eq!(PickError::Nan.exit_code(), 1);
        assert_eq!(PickError::Closed.exit_code(), 2);
        assert_eq!(PickError::Overflow.exit_code(), 3);
        assert_eq!(PickError::Corrupt.exit_code(), 4);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(PickError::Io(io).exit_code(), 5);
    }

    #[test]
    fn permanence() {
        assert!(PickError::Closed.is_permanent());
        assert!(PickError::Overflow.is_permanent());
        assert!(PickError::Corrupt.is_permanent());
        assert!(!PickError::Empty.is_permanent());
        assert!(
            !PickError::InsufficientUnique {
                requested: 1,
                available: 0
            }
            .is_permanent()
        );
    }

    #[test]
    fn io_error_from() {
        let io = std::io::Error::other("boom");
        let err: PickError = io.into();
        assert!(matches!(err, PickError::Io(_)));
    }
}
