//! Protocol-wide constants shared by the wallet, the projector and the circuits.

/// Length in bytes of a canonical field element encoding.
pub const FIELD_BYTES: usize = 32;

/// Length in bytes of a public-ledger address.
pub const ADDRESS_LEN: usize = 20;

/// BN254 scalar field modulus, big-endian.
///
/// `p = 21888242871839275222246405745257275088548364400416034343698204186575808495617`
pub const BN254_MODULUS_BE: [u8; FIELD_BYTES] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91, 0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x01,
];

/// Depth of every Merkle tree the circuits verify membership against.
///
/// Sibling paths are always padded to this length before proving.
pub const MERKLE_TREE_DEPTH: usize = 20;

/// Maximum number of leaves a single tree id can hold.
pub const MAX_TREE_LEAVES: u64 = 1 << MERKLE_TREE_DEPTH;

/// Number of shielded input notes consumed by one transfer.
pub const INPUT_NOTES: usize = 2;

/// Number of output notes created by one transfer.
pub const OUTPUT_NOTES: usize = 2;

/// Poseidon2 permutation width over BN254.
pub const POSEIDON2_WIDTH: usize = 4;

/// Poseidon2 sponge rate (width minus one capacity lane).
pub const POSEIDON2_RATE: usize = POSEIDON2_WIDTH - 1;

/// ASCII tag mixed into burn-address derivation.
///
/// Interpreted as a big-endian integer, not hashed.
pub const WORMHOLE_DOMAIN_TAG: &[u8] = b"ZKWORMHOLE";

/// Default EIP-712 domain name of the pool contract.
pub const DEFAULT_DOMAIN_NAME: &str = "ShieldedPool";

/// Default EIP-712 domain version of the pool contract.
pub const DEFAULT_DOMAIN_VERSION: &str = "1";
