use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Frame length differs from the fixed packet size
    InvalidLength { expected: usize, actual: usize },
    /// Textual MAC address could not be parsed
    InvalidAddress,
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength { expected, actual } => write!(
                f,
                "Invalid frame length: {} bytes (expected {})",
                actual, expected
            ),
            Self::InvalidAddress => write!(f, "Invalid MAC address"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PacketError {}

pub type Result<T> = core::result::Result<T, PacketError>;
