//! Error types for the topology and routing engine.

use thiserror::Error;

/// Result type alias for topology operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the topology and routing engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Structural errors in a cluster descriptor. The whole parse fails;
    /// no partial snapshot is ever produced.
    #[error("descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    /// Constraint violations when synthesizing a topology.
    #[error("generation error: {0}")]
    Generation(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Descriptor(DescriptorError::Json(e.to_string()))
    }
}

/// Structural errors raised while parsing a cluster descriptor.
#[derive(Error, Debug)]
pub enum DescriptorError {
    /// The descriptor text was not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(String),

    /// A required field was absent.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// A field was present but had the wrong shape.
    #[error("field '{field}' is not {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    /// A `host:port` string could not be split or its port parsed.
    #[error("malformed address '{0}': expected 'host:port'")]
    MalformedAddress(String),

    /// A views API base URL was missing its port or path.
    #[error("malformed views URL '{0}'")]
    MalformedUrl(String),

    /// A port value fell outside the 16-bit range.
    #[error("port {0} out of range")]
    PortOutOfRange(i64),

    /// A partition row did not match the declared replica count.
    #[error("partition row {row} has {got} entries, expected {want}")]
    PartitionRowShape { row: usize, got: usize, want: usize },

    /// The forward map did not match the live map's partition count.
    #[error("forward map has {got} partitions, live map has {want}")]
    ForwardShape { got: usize, want: usize },

    /// The partition map declared no partitions.
    #[error("empty partition map")]
    EmptyPartitionMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_error_messages() {
        let err = Error::from(DescriptorError::MissingField("vBucketMap"));
        assert_eq!(
            err.to_string(),
            "descriptor error: missing required field 'vBucketMap'"
        );

        let err = DescriptorError::PartitionRowShape {
            row: 3,
            got: 1,
            want: 2,
        };
        assert_eq!(err.to_string(), "partition row 3 has 1 entries, expected 2");
    }
}
