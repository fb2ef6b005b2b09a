//! EIP-712 authorization of a shielded transfer.
//!
//! The owner signs the typed `ShieldedTx` struct; the circuit then checks
//! that signature against `hashed_message`, so the digest has to be a
//! canonical field element as well as a keccak output.

use serde::{Deserialize, Serialize};

use shadepool_core::{
    keccak256, Address, Fr, Hash32, Withdrawal, DEFAULT_DOMAIN_NAME, DEFAULT_DOMAIN_VERSION,
};

use crate::error::WalletError;

/// EIP-712 type string of the domain.
pub const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
/// EIP-712 type string of a payout.
pub const WITHDRAWAL_TYPE: &str = "Withdrawal(address to,address asset,uint256 id,uint256 amount)";
/// EIP-712 type string of the transfer message, referenced types appended.
pub const SHIELDED_TX_TYPE: &str = "ShieldedTx(uint64 chainId,bytes32 wormholeRoot,bytes32 wormholeNullifier,bytes32 shieldedRoot,bytes32[] nullifiers,uint256[] commitments,Withdrawal[] withdrawals)Withdrawal(address to,address asset,uint256 id,uint256 amount)";

/// Signing domain of the pool contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip712Domain {
    /// Contract name.
    pub name: String,
    /// Contract version.
    pub version: String,
    /// Chain the contract lives on.
    pub chain_id: u64,
    /// Pool contract address.
    pub verifying_contract: Address,
}

impl Eip712Domain {
    /// Domain with the default name and version.
    pub fn new(chain_id: u64, verifying_contract: Address) -> Self {
        Self {
            name: DEFAULT_DOMAIN_NAME.to_string(),
            version: DEFAULT_DOMAIN_VERSION.to_string(),
            chain_id,
            verifying_contract,
        }
    }

    /// `hashStruct` of the domain.
    pub fn separator(&self) -> [u8; 32] {
        keccak256(&[
            &keccak256(&[DOMAIN_TYPE.as_bytes()]),
            &keccak256(&[self.name.as_bytes()]),
            &keccak256(&[self.version.as_bytes()]),
            &word_u128(u128::from(self.chain_id)),
            &word_address(self.verifying_contract),
        ])
    }
}

/// The typed message the relayer submits alongside the proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShieldedTxMessage {
    /// Chain the transfer is bound to.
    pub chain_id: u64,
    /// Wormhole root the bridge input is proven against.
    pub wormhole_root: Fr,
    /// Real or pseudo wormhole nullifier.
    pub wormhole_nullifier: Fr,
    /// Shielded root the inputs are proven against.
    pub shielded_root: Fr,
    /// Input nullifiers, padding included.
    pub nullifiers: Vec<Fr>,
    /// Output commitments.
    pub commitments: Vec<Fr>,
    /// Public payouts.
    pub withdrawals: Vec<Withdrawal>,
}

impl ShieldedTxMessage {
    /// `hashStruct` of the message.
    pub fn struct_hash(&self) -> [u8; 32] {
        let nullifiers = concat_words(self.nullifiers.iter().map(|n| n.to_bytes()));
        let commitments = concat_words(self.commitments.iter().map(|c| c.to_bytes()));
        let withdrawals = concat_words(self.withdrawals.iter().map(withdrawal_hash));
        keccak256(&[
            &keccak256(&[SHIELDED_TX_TYPE.as_bytes()]),
            &word_u128(u128::from(self.chain_id)),
            self.wormhole_root.as_bytes(),
            self.wormhole_nullifier.as_bytes(),
            self.shielded_root.as_bytes(),
            &keccak256(&[&nullifiers]),
            &keccak256(&[&commitments]),
            &keccak256(&[&withdrawals]),
        ])
    }

    /// `keccak256(0x1901 || domainSeparator || structHash)`.
    pub fn signing_digest(&self, domain: &Eip712Domain) -> Hash32 {
        Hash32(keccak256(&[
            &[0x19, 0x01],
            &domain.separator(),
            &self.struct_hash(),
        ]))
    }

    /// Digest together with its field embedding. Fails if the digest is not
    /// below the modulus.
    pub fn hashed_message(&self, domain: &Eip712Domain) -> Result<(Hash32, Fr), WalletError> {
        let digest = self.signing_digest(domain);
        let fr = Fr::from_be_bytes(digest.0).map_err(|_| WalletError::FieldOverflow(digest))?;
        Ok((digest, fr))
    }
}

fn withdrawal_hash(w: &Withdrawal) -> [u8; 32] {
    keccak256(&[
        &keccak256(&[WITHDRAWAL_TYPE.as_bytes()]),
        &word_address(w.to),
        &word_address(w.asset),
        &word_u128(w.token_id),
        &word_u128(w.amount.units()),
    ])
}

fn concat_words(words: impl Iterator<Item = [u8; 32]>) -> Vec<u8> {
    words.flatten().collect()
}

fn word_u128(v: u128) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[16..].copy_from_slice(&v.to_be_bytes());
    out
}

fn word_address(a: Address) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(a.as_bytes());
    out
}
