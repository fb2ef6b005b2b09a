//! Password-encrypted signing keys kept next to the note store.
//!
//! Argon2 derives a 32-byte key from the password and a random salt;
//! XChaCha20-Poly1305 seals the secp256k1 secret.

use argon2::{password_hash::SaltString, Argon2};
use borsh::{BorshDeserialize, BorshSerialize};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand_core::{OsRng, RngCore};
use zeroize::Zeroizing;

use shadepool_core::Address;

use crate::error::WalletError;
use crate::signer::LocalSigner;

const TREE_KEYS: &str = "keys";
const TREE_META: &str = "meta";
const META_DEFAULT: &str = "default_key";

fn argon2_params() -> Argon2<'static> {
    Argon2::default()
}

/// Argon2-derived key material and the sealed secret.
#[derive(BorshSerialize, BorshDeserialize, Clone)]
pub struct EncryptedKey {
    /// Argon2 salt.
    pub salt: Vec<u8>,
    /// XChaCha20-Poly1305 nonce.
    pub nonce: Vec<u8>,
    /// Sealed secret key.
    pub ciphertext: Vec<u8>,
}

/// Stored form of one key.
#[derive(BorshSerialize, BorshDeserialize, Clone)]
pub struct KeyRecord {
    /// Encrypted secret.
    pub enc: EncryptedKey,
    /// Address the secret controls.
    pub address: Address,
}

/// Password-encrypted keys in the wallet database.
pub struct KeyStore {
    keys: sled::Tree,
    meta: sled::Tree,
}

impl KeyStore {
    /// Open the key trees of `db`.
    pub fn new(db: &sled::Db) -> Result<Self, WalletError> {
        Ok(Self {
            keys: db.open_tree(TREE_KEYS)?,
            meta: db.open_tree(TREE_META)?,
        })
    }

    /// Generate the first key. Fails if any key exists.
    pub fn init(&self, password: &str) -> Result<Address, WalletError> {
        if !self.keys.is_empty() {
            return Err(WalletError::Key("wallet already initialized".into()));
        }
        let signer = LocalSigner::random(&mut OsRng)?;
        self.store(&signer, password)
    }

    /// Import a hex secret key. Fails if the key is already present.
    pub fn import_key_hex(&self, key_hex: &str, password: &str) -> Result<Address, WalletError> {
        let secret = Zeroizing::new(
            hex::decode(key_hex.trim_start_matches("0x"))
                .map_err(|_| WalletError::Key("invalid hex".into()))?,
        );
        if secret.len() != 32 {
            return Err(WalletError::Key("expected 32-byte secret key".into()));
        }
        let signer = LocalSigner::from_bytes(&secret)?;
        if self.keys.contains_key(signer_address(&signer).as_bytes())? {
            return Err(WalletError::Key("key already present".into()));
        }
        self.store(&signer, password)
    }

    fn store(&self, signer: &LocalSigner, password: &str) -> Result<Address, WalletError> {
        let address = signer_address(signer);
        let record = KeyRecord {
            enc: encrypt_key(&signer.secret_bytes(), password)?,
            address,
        };
        self.keys
            .insert(address.as_bytes(), borsh::to_vec(&record)?)?;
        if self.meta.get(META_DEFAULT)?.is_none() {
            self.meta.insert(META_DEFAULT, address.as_bytes().to_vec())?;
        }
        Ok(address)
    }

    /// First key created or imported.
    pub fn default_address(&self) -> Result<Address, WalletError> {
        let bytes = self
            .meta
            .get(META_DEFAULT)?
            .ok_or_else(|| WalletError::Key("wallet not initialized".into()))?;
        let raw: [u8; 20] = bytes
            .as_ref()
            .try_into()
            .map_err(|_| WalletError::Key("corrupt default key entry".into()))?;
        Ok(Address(raw))
    }

    /// Every stored address.
    pub fn addresses(&self) -> Result<Vec<Address>, WalletError> {
        let mut out = Vec::new();
        for item in self.keys.iter() {
            let (_, v) = item?;
            out.push(KeyRecord::try_from_slice(&v)?.address);
        }
        Ok(out)
    }

    /// Decrypt the key for `address` into a signer.
    pub fn unlock(&self, address: Address, password: &str) -> Result<LocalSigner, WalletError> {
        let bytes = self
            .keys
            .get(address.as_bytes())?
            .ok_or_else(|| WalletError::Key(format!("no key for {address}")))?;
        let record = KeyRecord::try_from_slice(&bytes)?;
        let secret = decrypt_key(&record.enc, password)?;
        LocalSigner::from_bytes(&secret)
    }

    /// Decrypt and hex-encode the secret for `address`.
    pub fn export_key_hex(&self, address: Address, password: &str) -> Result<String, WalletError> {
        let signer = self.unlock(address, password)?;
        Ok(hex::encode(&*signer.secret_bytes()))
    }
}

fn signer_address(signer: &LocalSigner) -> Address {
    signer.public_key().address()
}

fn derive_key(password: &str, salt: &SaltString) -> Result<Zeroizing<[u8; 32]>, WalletError> {
    let mut key = Zeroizing::new([0u8; 32]);
    let salt_binding = salt.as_salt();
    let salt_bytes = salt_binding.as_str().as_bytes();
    argon2_params()
        .hash_password_into(password.as_bytes(), salt_bytes, &mut key[..])
        .map_err(|e| WalletError::Key(e.to_string()))?;
    Ok(key)
}

fn encrypt_key(priv_bytes: &[u8], password: &str) -> Result<EncryptedKey, WalletError> {
    let salt = SaltString::generate(&mut OsRng);
    let key = derive_key(password, &salt)?;
    let cipher = XChaCha20Poly1305::new((&*key).into());
    let mut nonce = [0u8; 24];
    OsRng.fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), priv_bytes)
        .map_err(|e| WalletError::Key(e.to_string()))?;
    Ok(EncryptedKey {
        salt: salt.as_str().as_bytes().to_vec(),
        nonce: nonce.to_vec(),
        ciphertext,
    })
}

fn decrypt_key(enc: &EncryptedKey, password: &str) -> Result<Zeroizing<Vec<u8>>, WalletError> {
    let salt_str =
        std::str::from_utf8(&enc.salt).map_err(|e| WalletError::Key(e.to_string()))?;
    let salt = SaltString::from_b64(salt_str).map_err(|e| WalletError::Key(e.to_string()))?;
    let key = derive_key(password, &salt)?;
    if enc.nonce.len() != 24 {
        return Err(WalletError::Key("corrupt nonce".into()));
    }
    let cipher = XChaCha20Poly1305::new((&*key).into());
    let plaintext = cipher
        .decrypt(XNonce::from_slice(&enc.nonce), enc.ciphertext.as_ref())
        .map_err(|_| WalletError::Key("wrong password or corrupt key".into()))?;
    Ok(Zeroizing::new(plaintext))
}
