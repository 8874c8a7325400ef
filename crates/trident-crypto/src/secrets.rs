use dashmap::DashSet;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::hashing::{sha256, Digest32};

/// 32-byte hashlock preimage. Zeroized on drop.
///
/// A secret is revealed on-chain the moment its leg is claimed, so the
/// hygiene here protects only the pre-claim window: quote time through
/// funding.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret([u8; 32]);

impl Secret {
    /// Wrap raw preimage bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw preimage bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encode as hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode from hex.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_str)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| CryptoError::InvalidDigestLength(b.len()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print preimage bytes
        write!(f, "Secret(..)")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(D::Error::custom)
    }
}

/// SHA-256 digest of a secret. Hex in JSON, raw 32 bytes on-chain.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hashlock(Digest32);

impl Hashlock {
    /// Compute the hashlock of a secret.
    pub fn of(secret: &Secret) -> Self {
        Self(sha256(secret.as_bytes()))
    }

    /// Wrap an existing 32-byte digest.
    pub fn from_bytes(bytes: Digest32) -> Self {
        Self(bytes)
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &Digest32 {
        &self.0
    }

    /// Whether `secret` is the preimage of this hashlock.
    pub fn matches(&self, secret: &Secret) -> bool {
        sha256(secret.as_bytes()) == self.0
    }

    /// A hashlock of all zero bytes. Rejected everywhere it would be
    /// used, since no known preimage exists and none should be claimed.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Encode as hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode from hex.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_str)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| CryptoError::InvalidDigestLength(b.len()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Hashlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hashlock({})", self.to_hex())
    }
}

impl fmt::Display for Hashlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Hashlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hashlock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(D::Error::custom)
    }
}

/// The three secrets of one swap in canonical protocol order
/// (user, lp1, lp2). Every chain encoder consumes them in this order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretTriple {
    pub user: Secret,
    pub lp1: Secret,
    pub lp2: Secret,
}

impl SecretTriple {
    /// The matching hashlocks, in the same canonical order.
    pub fn hashlocks(&self) -> HashlockTriple {
        HashlockTriple {
            user: Hashlock::of(&self.user),
            lp1: Hashlock::of(&self.lp1),
            lp2: Hashlock::of(&self.lp2),
        }
    }

    /// Secrets as an array in canonical order.
    pub fn as_array(&self) -> [&Secret; 3] {
        [&self.user, &self.lp1, &self.lp2]
    }
}

/// The three hashlocks of one swap in canonical protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashlockTriple {
    pub user: Hashlock,
    pub lp1: Hashlock,
    pub lp2: Hashlock,
}

impl HashlockTriple {
    /// Hashlocks as an array in canonical order.
    pub fn as_array(&self) -> [Hashlock; 3] {
        [self.user, self.lp1, self.lp2]
    }

    /// Whether any of the three hashlocks is the zero digest.
    pub fn any_zero(&self) -> bool {
        self.as_array().iter().any(Hashlock::is_zero)
    }

    /// Check a candidate secret triple against all three hashlocks.
    pub fn all_match(&self, secrets: &SecretTriple) -> bool {
        self.first_mismatch(secrets).is_none()
    }

    /// Role name of the first hashlock the candidate secrets fail to
    /// open, if any. Every chain verifies claims through this one
    /// check so mismatch reporting is identical across rails.
    pub fn first_mismatch(&self, secrets: &SecretTriple) -> Option<&'static str> {
        if !self.user.matches(&secrets.user) {
            return Some("user");
        }
        if !self.lp1.matches(&secrets.lp1) {
            return Some("lp1");
        }
        if !self.lp2.matches(&secrets.lp2) {
            return Some("lp2");
        }
        None
    }
}

/// Generates and verifies hashlock secrets and enforces that no
/// hashlock is ever reused across swaps.
///
/// `generate` hands out fresh pairs without registering them; a plan
/// builder calls `bind` with the full triple once, which either claims
/// all three hashlocks or fails without side effect.
pub struct SecretManager {
    bound: DashSet<Hashlock>,
}

impl SecretManager {
    /// Create a manager with an empty reuse registry.
    pub fn new() -> Self {
        Self {
            bound: DashSet::new(),
        }
    }

    /// Generate a fresh secret/hashlock pair from OS entropy.
    pub fn generate(&self) -> (Secret, Hashlock) {
        loop {
            let mut bytes = [0u8; 32];
            OsRng.fill_bytes(&mut bytes);
            let secret = Secret::from_bytes(bytes);
            let hashlock = Hashlock::of(&secret);
            // Collision with a bound hashlock is astronomically rare;
            // looping keeps the pair usable regardless.
            if !self.bound.contains(&hashlock) {
                return (secret, hashlock);
            }
        }
    }

    /// Generate the three pairs for one swap in canonical order.
    pub fn generate_triple(&self) -> (SecretTriple, HashlockTriple) {
        let (user, h_user) = self.generate();
        let (lp1, h_lp1) = self.generate();
        let (lp2, h_lp2) = self.generate();
        (
            SecretTriple { user, lp1, lp2 },
            HashlockTriple {
                user: h_user,
                lp1: h_lp1,
                lp2: h_lp2,
            },
        )
    }

    /// Verify a secret against a hashlock by exact SHA-256 equality.
    pub fn verify(&self, secret: &Secret, hashlock: &Hashlock) -> bool {
        hashlock.matches(secret)
    }

    /// Bind all three hashlocks to a plan. Fails with no side effect if
    /// any of them was already bound to an earlier plan.
    pub fn bind(&self, triple: &HashlockTriple) -> Result<(), CryptoError> {
        let mut claimed: Vec<Hashlock> = Vec::with_capacity(3);
        for hashlock in triple.as_array() {
            if self.bound.insert(hashlock) {
                claimed.push(hashlock);
            } else {
                for undo in claimed {
                    self.bound.remove(&undo);
                }
                return Err(CryptoError::HashlockReused(hashlock.to_hex()));
            }
        }
        Ok(())
    }

    /// Whether a hashlock is already bound to a plan.
    pub fn is_bound(&self, hashlock: &Hashlock) -> bool {
        self.bound.contains(hashlock)
    }
}

impl Default for SecretManager {
    fn default() -> Self {
        Self::new()
    }
}
