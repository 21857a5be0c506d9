// src/hash.rs

//! Integrity digests for downloaded sources and patches
//!
//! Recipes declare checksums as `algorithm:hex` (for example
//! `sha256:161c04...`). A bare hex string is read as SHA-256, which is what
//! upstream formula files publish.
//!
//! Only cryptographic algorithms are accepted here: a checksum is the sole
//! thing standing between a recipe and whatever bytes a mirror hands back.

use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::str::FromStr;

/// Hash algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    /// SHA-256 (256-bit)
    #[default]
    Sha256,

    /// SHA-512 (512-bit)
    Sha512,
}

impl HashAlgorithm {
    /// Get the hash output length in bytes
    #[inline]
    pub const fn output_len(&self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha512 => 64,
        }
    }

    /// Get the hash output length as a hex string
    #[inline]
    pub const fn hex_len(&self) -> usize {
        self.output_len() * 2
    }

    /// Get the algorithm name as a string
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "sha512" | "sha-512" => Ok(Self::Sha512),
            _ => Err(HashError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Checksum parsing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// Unknown hash algorithm name
    UnknownAlgorithm(String),
    /// Hash string has wrong length for algorithm
    InvalidLength { expected: usize, got: usize },
    /// Hash string contains invalid hex characters
    InvalidHex(String),
}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAlgorithm(name) => {
                write!(f, "unsupported checksum algorithm: {} (supported: sha256, sha512)", name)
            }
            Self::InvalidLength { expected, got } => {
                write!(f, "invalid hash length: expected {}, got {}", expected, got)
            }
            Self::InvalidHex(s) => write!(f, "invalid hex in hash: {}", s),
        }
    }
}

impl std::error::Error for HashError {}

/// A hash value with its algorithm
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hash {
    /// The algorithm used
    pub algorithm: HashAlgorithm,
    /// The hash value as a lowercase hex string
    pub value: String,
}

impl Hash {
    /// Create a new hash value, validating length and hex digits
    pub fn new(algorithm: HashAlgorithm, value: impl Into<String>) -> Result<Self, HashError> {
        let value = value.into();
        let expected_len = algorithm.hex_len();

        if value.len() != expected_len {
            return Err(HashError::InvalidLength {
                expected: expected_len,
                got: value.len(),
            });
        }

        if !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HashError::InvalidHex(value));
        }

        Ok(Self {
            algorithm,
            value: value.to_lowercase(),
        })
    }

    fn new_unchecked(algorithm: HashAlgorithm, value: String) -> Self {
        Self { algorithm, value }
    }

    /// Get the hash value as a hex string
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Parse a prefixed hash string (e.g., "sha256:abc123...")
    pub fn parse_prefixed(s: &str) -> Result<Self, HashError> {
        let s = s.trim();
        if let Some((algo, hash)) = s.split_once(':') {
            let algorithm = algo.parse()?;
            Self::new(algorithm, hash)
        } else {
            Self::new(HashAlgorithm::Sha256, s)
        }
    }

    /// Format as a prefixed string (e.g., "sha256:abc123...")
    pub fn to_prefixed_string(&self) -> String {
        format!("{}:{}", self.algorithm.name(), self.value)
    }

    /// Check whether `data` hashes to this value
    pub fn matches(&self, data: &[u8]) -> bool {
        hash_bytes(self.algorithm, data) == *self
    }

    /// Key under which content with this hash is stored in the source cache
    pub fn cache_key(&self) -> String {
        format!("{}_{}", self.algorithm.name(), self.value)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_prefixed_string())
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_prefixed_string())
    }
}

/// Incremental hasher over any supported algorithm
pub struct Hasher {
    algorithm: HashAlgorithm,
    state: HasherState,
}

enum HasherState {
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Hasher {
    /// Create a new hasher with the specified algorithm
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let state = match algorithm {
            HashAlgorithm::Sha256 => HasherState::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => HasherState::Sha512(Sha512::new()),
        };
        Self { algorithm, state }
    }

    /// Update the hasher with more data
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            HasherState::Sha256(hasher) => hasher.update(data),
            HasherState::Sha512(hasher) => hasher.update(data),
        }
    }

    /// Finalize and return the hash
    pub fn finalize(self) -> Hash {
        let value = match self.state {
            HasherState::Sha256(hasher) => format!("{:x}", hasher.finalize()),
            HasherState::Sha512(hasher) => format!("{:x}", hasher.finalize()),
        };
        Hash::new_unchecked(self.algorithm, value)
    }
}

/// Compute hash of a byte slice
pub fn hash_bytes(algorithm: HashAlgorithm, data: &[u8]) -> Hash {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

/// Compute SHA-256 hash as hex
#[inline]
pub fn sha256(data: &[u8]) -> String {
    hash_bytes(HashAlgorithm::Sha256, data).value
}
