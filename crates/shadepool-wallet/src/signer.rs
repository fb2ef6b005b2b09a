//! secp256k1 signing over prehashed EIP-712 digests.

use async_trait::async_trait;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use shadepool_core::{keccak256, Address, Hash32};

use crate::capabilities::Signer;
use crate::error::WalletError;

/// Uncompressed public key coordinates, as the circuit takes them.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PublicKey {
    /// x coordinate, big-endian.
    pub x: [u8; 32],
    /// y coordinate, big-endian.
    pub y: [u8; 32],
}

impl PublicKey {
    /// From a 65-byte SEC1 uncompressed encoding (`0x04 || x || y`).
    pub fn from_uncompressed(bytes: &[u8]) -> Result<Self, WalletError> {
        if bytes.len() != 65 || bytes[0] != 0x04 {
            return Err(WalletError::Key("expected uncompressed public key".into()));
        }
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        x.copy_from_slice(&bytes[1..33]);
        y.copy_from_slice(&bytes[33..65]);
        Ok(Self { x, y })
    }

    fn from_verifying_key(key: &VerifyingKey) -> Result<Self, WalletError> {
        Self::from_uncompressed(key.to_encoded_point(false).as_bytes())
    }

    /// Ethereum address: low 20 bytes of `keccak256(x || y)`.
    pub fn address(&self) -> Address {
        let digest = keccak256(&[&self.x, &self.y]);
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest[12..]);
        Address(out)
    }
}

/// `r || s` plus the recovery byte (27 or 28).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RecoverableSignature {
    /// Signature r, big-endian.
    pub r: [u8; 32],
    /// Signature s, big-endian.
    pub s: [u8; 32],
    /// Recovery byte.
    pub v: u8,
}

impl RecoverableSignature {
    /// 65-byte `r || s || v` encoding.
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }

    /// From the 65-byte `r || s || v` encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        if bytes.len() != 65 {
            return Err(WalletError::Key(format!(
                "signature must be 65 bytes, got {}",
                bytes.len()
            )));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self { r, s, v: bytes[64] })
    }

    /// The circuit checks `r || s` only.
    pub fn compact(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&self.r);
        out.extend_from_slice(&self.s);
        out
    }

    fn recovery_id(&self) -> Result<RecoveryId, WalletError> {
        let raw = if self.v >= 27 { self.v - 27 } else { self.v };
        RecoveryId::from_byte(raw).ok_or_else(|| WalletError::Key(format!("bad recovery byte {}", self.v)))
    }
}

/// Recover the signer's public key from a digest and its signature.
pub fn recover_public_key(
    digest: &Hash32,
    sig: &RecoverableSignature,
) -> Result<PublicKey, WalletError> {
    let signature = Signature::from_slice(&sig.compact()).map_err(|e| WalletError::Key(e.to_string()))?;
    let key = VerifyingKey::recover_from_prehash(digest.as_bytes(), &signature, sig.recovery_id()?)
        .map_err(|e| WalletError::Key(e.to_string()))?;
    PublicKey::from_verifying_key(&key)
}

/// In-process signer holding a decrypted key.
pub struct LocalSigner {
    key: SigningKey,
    public: PublicKey,
}

impl LocalSigner {
    /// Fresh key from `rng`.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, WalletError> {
        Self::from_key(SigningKey::random(rng))
    }

    /// From a 32-byte secret scalar.
    pub fn from_bytes(secret: &[u8]) -> Result<Self, WalletError> {
        let key = SigningKey::from_slice(secret).map_err(|e| WalletError::Key(e.to_string()))?;
        Self::from_key(key)
    }

    fn from_key(key: SigningKey) -> Result<Self, WalletError> {
        let public = PublicKey::from_verifying_key(key.verifying_key())?;
        Ok(Self { key, public })
    }

    /// Public key of this signer.
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Secret scalar; zeroed on drop.
    pub fn secret_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.key.to_bytes().to_vec())
    }

    /// Sign `digest` as is, without rehashing.
    pub fn sign_prehash(&self, digest: &Hash32) -> Result<RecoverableSignature, WalletError> {
        let (signature, recid) = self
            .key
            .sign_prehash_recoverable(digest.as_bytes())
            .map_err(|e| WalletError::Key(e.to_string()))?;
        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Ok(RecoverableSignature {
            r,
            s,
            v: 27 + recid.to_byte(),
        })
    }
}

#[async_trait]
impl Signer for LocalSigner {
    fn address(&self) -> Address {
        self.public.address()
    }

    async fn sign(&self, digest: Hash32) -> Result<RecoverableSignature, WalletError> {
        self.sign_prehash(&digest)
    }
}
