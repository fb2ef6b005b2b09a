//! Poseidon2 sponge over BN254.
//!
//! The sponge matches Noir's `std::hash::poseidon2::Poseidon2::hash` for
//! fixed-length input: width 4, rate 3, the capacity lane seeded with
//! `len * 2^64`, absorb into a rate-sized cache and duplex when it fills,
//! squeeze by one final duplex and returning lane 0.
//!
//! The permutation is delegated to `bn254_blackbox_solver`, the same
//! barretenberg-compatible implementation the Noir toolchain executes.

use acir_field::FieldElement;
use bn254_blackbox_solver::poseidon2_permutation;

use crate::constants::{POSEIDON2_RATE, POSEIDON2_WIDTH};
use crate::field::Fr;

struct Sponge {
    state: [FieldElement; POSEIDON2_WIDTH],
    cache: [FieldElement; POSEIDON2_RATE],
    cache_size: usize,
}

impl Sponge {
    fn new(message_len: usize) -> Self {
        let iv = Fr::from_u128((message_len as u128) << 64);
        let mut state = [FieldElement::zero(); POSEIDON2_WIDTH];
        state[POSEIDON2_RATE] = to_element(iv);
        Self {
            state,
            cache: [FieldElement::zero(); POSEIDON2_RATE],
            cache_size: 0,
        }
    }

    fn absorb(&mut self, input: FieldElement) {
        if self.cache_size == POSEIDON2_RATE {
            self.duplex();
            self.cache[0] = input;
            self.cache_size = 1;
        } else {
            self.cache[self.cache_size] = input;
            self.cache_size += 1;
        }
    }

    fn squeeze(mut self) -> FieldElement {
        self.duplex();
        self.state[0]
    }

    fn duplex(&mut self) {
        for (lane, cached) in self.state.iter_mut().zip(&self.cache[..self.cache_size]) {
            *lane = *lane + *cached;
        }
        self.state = permute(&self.state);
    }
}

fn permute(state: &[FieldElement; POSEIDON2_WIDTH]) -> [FieldElement; POSEIDON2_WIDTH] {
    match poseidon2_permutation(state, POSEIDON2_WIDTH as u32) {
        Ok(out) => {
            let mut next = [FieldElement::zero(); POSEIDON2_WIDTH];
            for (slot, value) in next.iter_mut().zip(out) {
                *slot = value;
            }
            next
        }
        // Only reachable on a width mismatch, and the width is a constant.
        Err(_) => unreachable!("poseidon2 permutation rejected a width-4 state"),
    }
}

fn to_element(fr: Fr) -> FieldElement {
    FieldElement::from_be_bytes_reduce(fr.as_bytes())
}

fn from_element(fe: FieldElement) -> Fr {
    Fr::from_be_bytes_reduce(&fe.to_be_bytes())
}

/// Hash a fixed-length message of field elements.
pub fn poseidon2_hash(inputs: &[Fr]) -> Fr {
    let mut sponge = Sponge::new(inputs.len());
    for input in inputs {
        sponge.absorb(to_element(*input));
    }
    from_element(sponge.squeeze())
}

/// `H(a, b)`; also the Merkle node combiner.
pub fn hash2(a: Fr, b: Fr) -> Fr {
    poseidon2_hash(&[a, b])
}

/// `H(a, b, c)`.
pub fn hash3(a: Fr, b: Fr, c: Fr) -> Fr {
    poseidon2_hash(&[a, b, c])
}

/// `H(a, b, c, d)`.
pub fn hash4(a: Fr, b: Fr, c: Fr, d: Fr) -> Fr {
    poseidon2_hash(&[a, b, c, d])
}

/// `H(a, b, c, d, e)`.
pub fn hash5(a: Fr, b: Fr, c: Fr, d: Fr, e: Fr) -> Fr {
    poseidon2_hash(&[a, b, c, d, e])
}
