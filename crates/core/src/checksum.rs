//! Algorithm-tagged checksums and the layer digest.

use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Supported checksum algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    Sha256,
}

impl ChecksumAlgorithm {
    /// The tag used in the `algorithm:hex` representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "sha256" => Ok(Self::Sha256),
            other => Err(crate::Error::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A checksum in `algorithm:hexdigest` form.
///
/// Parsing only checks the shape. The algorithm tag is kept verbatim so the
/// declared value can be stored unchanged and rejected later, at upload time,
/// if the algorithm is not supported.
#[derive(Clone, PartialEq, Eq)]
pub struct Checksum {
    algorithm: String,
    hex: String,
}

impl Checksum {
    /// Parse a checksum string. Exactly one `:` separator is accepted.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(algorithm), Some(hex), None) => Ok(Self {
                algorithm: algorithm.to_string(),
                hex: hex.to_string(),
            }),
            _ => Err(crate::Error::InvalidChecksum(format!(
                "expected `algorithm:hexdigest`, got {s:?}"
            ))),
        }
    }

    /// The raw algorithm tag.
    pub fn algorithm_tag(&self) -> &str {
        &self.algorithm
    }

    /// The algorithm, if it is supported.
    pub fn algorithm(&self) -> crate::Result<ChecksumAlgorithm> {
        self.algorithm.parse()
    }

    /// The hex digest exactly as declared.
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Case-insensitive comparison against a computed hex digest.
    pub fn matches(&self, computed_hex: &str) -> bool {
        self.hex.eq_ignore_ascii_case(computed_hex)
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({self})")
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

/// Incremental digest over `metadata ++ "\n" ++ layer`.
///
/// This is the value a client declares in its checksum header when it
/// registers image metadata.
pub struct LayerHasher(Sha256);

impl LayerHasher {
    /// Start a digest for the given algorithm, seeded with the stored metadata.
    pub fn new(algorithm: ChecksumAlgorithm, metadata: &[u8]) -> Self {
        match algorithm {
            ChecksumAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(metadata);
                hasher.update(b"\n");
                Self(hasher)
            }
        }
    }

    /// Feed layer bytes.
    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    /// Finalize and return the lowercase hex digest.
    pub fn finalize_hex(self) -> String {
        to_hex(&self.0.finalize())
    }
}

/// Compute the layer checksum string for metadata and layer bytes held in memory.
pub fn layer_checksum(metadata: &[u8], layer: &[u8]) -> Checksum {
    let mut hasher = LayerHasher::new(ChecksumAlgorithm::Sha256, metadata);
    hasher.update(layer);
    Checksum {
        algorithm: ChecksumAlgorithm::Sha256.as_str().to_string(),
        hex: hasher.finalize_hex(),
    }
}

/// Encode bytes as lowercase hex.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
