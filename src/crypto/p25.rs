//! P25 Crypto Engine (C3, spec §4.3): MI generation/chaining, AES-256/ARC4
//! keystream derivation, and in-place XOR application over IMBE codewords.

use crate::types::IMBE_CODEWORD_LEN;
use aes::cipher::{KeyIvInit, StreamCipher};
use rand::RngCore;

pub const ALGO_UNENCRYPT: u8 = 0x80;
pub const ALGO_AES_256: u8 = 0x84;
pub const ALGO_ARC4: u8 = 0xAA;

pub const MI_LEN: usize = 9;

/// One LDU1+LDU2 pair carries 18 IMBE voice slots; the keystream must cover
/// all of them (spec §4.3 `generate_keystream`).
const IMBE_SLOTS_PER_SUPERFRAME: usize = 18;
const KEYSTREAM_LEN: usize = IMBE_SLOTS_PER_SUPERFRAME * IMBE_CODEWORD_LEN;

type Aes256Ctr = ctr::Ctr64BE<aes::Aes256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TekAlgo {
    Unencrypt,
    Aes256,
    Arc4,
}

impl TekAlgo {
    pub fn from_str_config(s: &str) -> Self {
        match s {
            "aes" => TekAlgo::Aes256,
            "arc4" => TekAlgo::Arc4,
            _ => TekAlgo::Unencrypt,
        }
    }

    pub fn algo_id(self) -> u8 {
        match self {
            TekAlgo::Unencrypt => ALGO_UNENCRYPT,
            TekAlgo::Aes256 => ALGO_AES_256,
            TekAlgo::Arc4 => ALGO_ARC4,
        }
    }

    pub fn from_algo_id(id: u8) -> Self {
        match id {
            ALGO_AES_256 => TekAlgo::Aes256,
            ALGO_ARC4 => TekAlgo::Arc4,
            _ => TekAlgo::Unencrypt,
        }
    }
}

pub struct P25Crypto {
    tek_algo: TekAlgo,
    tek_key_id: u16,
    key: Vec<u8>,
    mi: Option<[u8; MI_LEN]>,
    keystream: Option<Vec<u8>>,
}

impl Default for P25Crypto {
    fn default() -> Self {
        Self::new()
    }
}

impl P25Crypto {
    pub fn new() -> Self {
        P25Crypto {
            tek_algo: TekAlgo::Unencrypt,
            tek_key_id: 0,
            key: Vec::new(),
            mi: None,
            keystream: None,
        }
    }

    pub fn set_tek_algo(&mut self, algo: TekAlgo) {
        self.tek_algo = algo;
    }

    pub fn tek_algo(&self) -> TekAlgo {
        self.tek_algo
    }

    pub fn set_tek_key_id(&mut self, kid: u16) {
        self.tek_key_id = kid;
    }

    pub fn tek_key_id(&self) -> u16 {
        self.tek_key_id
    }

    pub fn set_key(&mut self, bytes: &[u8]) {
        self.key = bytes.to_vec();
    }

    pub fn get_tek_length(&self) -> usize {
        self.key.len()
    }

    pub fn clear_key(&mut self) {
        self.key.clear();
    }

    pub fn set_mi(&mut self, mi: [u8; MI_LEN]) {
        self.mi = Some(mi);
    }

    pub fn get_mi(&self) -> Option<[u8; MI_LEN]> {
        self.mi
    }

    pub fn has_valid_mi(&self) -> bool {
        self.mi.is_some()
    }

    pub fn has_valid_keystream(&self) -> bool {
        self.keystream.is_some()
    }

    pub fn clear_mi(&mut self) {
        self.mi = None;
    }

    pub fn reset_keystream(&mut self) {
        self.keystream = None;
    }

    /// New-call MI: random 9 bytes, generated iff the first outbound frame
    /// of the call is encrypted (spec §3 MessageIndicator invariant).
    pub fn generate_mi(&mut self) {
        let mut mi = [0u8; MI_LEN];
        rand::thread_rng().fill_bytes(&mut mi);
        self.mi = Some(mi);
    }

    /// Deterministic LFSR-style advance from the current MI, called once per
    /// LDU2 (spec §3, §4.2b).
    pub fn generate_next_mi(&mut self) {
        if let Some(mi) = self.mi.as_mut() {
            *mi = advance_mi(mi);
        }
    }

    /// Materializes keystream for one LDU1+LDU2 pair from (MI, TEK, algo).
    pub fn generate_keystream(&mut self) {
        if self.tek_algo == TekAlgo::Unencrypt {
            self.keystream = None;
            return;
        }
        let mi = match self.mi {
            Some(mi) => mi,
            None => {
                self.keystream = None;
                return;
            }
        };
        let ks = match self.tek_algo {
            TekAlgo::Aes256 => aes256_keystream(&self.key, &mi),
            TekAlgo::Arc4 => arc4_keystream(&self.key, &mi),
            TekAlgo::Unencrypt => unreachable!(),
        };
        self.keystream = ks;
    }

    fn keystream_slice(&self, duid_index: usize) -> Option<&[u8]> {
        let start = duid_index * IMBE_CODEWORD_LEN;
        self.keystream
            .as_ref()
            .and_then(|ks| ks.get(start..start + IMBE_CODEWORD_LEN))
    }

    /// XORs `imbe` in-place with the keystream slice for `duid_index` (the
    /// IMBE's position, 0..17, within the LDU1/LDU2 superframe pair).
    pub fn crypt_imbe(&self, imbe: &mut [u8], duid_index: usize) {
        if self.tek_algo == TekAlgo::Unencrypt {
            return;
        }
        if let Some(slice) = self.keystream_slice(duid_index) {
            for (b, k) in imbe.iter_mut().zip(slice.iter()) {
                *b ^= k;
            }
        }
    }
}

fn advance_mi(mi: &[u8; MI_LEN]) -> [u8; MI_LEN] {
    // Treat the 9 bytes as a 72-bit shift register; shift left one bit,
    // feeding back XOR of taps at bits 71, 70, 67, 65 (a maximal-length-ish
    // polynomial) into bit 0. Deterministic and reversible in direction,
    // which is all the call-chaining invariant in spec §3 requires.
    let mut bits = [false; MI_LEN * 8];
    for (i, byte) in mi.iter().enumerate() {
        for b in 0..8 {
            bits[i * 8 + b] = (byte >> (7 - b)) & 1 == 1;
        }
    }
    let feedback = bits[0] ^ bits[1] ^ bits[4] ^ bits[6];
    let mut out_bits = [false; MI_LEN * 8];
    out_bits[..MI_LEN * 8 - 1].copy_from_slice(&bits[1..]);
    out_bits[MI_LEN * 8 - 1] = feedback;

    let mut out = [0u8; MI_LEN];
    for (i, chunk) in out_bits.chunks(8).enumerate() {
        let mut byte = 0u8;
        for (b, bit) in chunk.iter().enumerate() {
            if *bit {
                byte |= 1 << (7 - b);
            }
        }
        out[i] = byte;
    }
    out
}

fn aes256_keystream(key: &[u8], mi: &[u8; MI_LEN]) -> Option<Vec<u8>> {
    if key.len() != 32 {
        return None;
    }
    let mut iv = [0u8; 16];
    iv[..MI_LEN].copy_from_slice(mi);
    let mut cipher = Aes256Ctr::new(key.into(), &iv.into());
    let mut buf = vec![0u8; KEYSTREAM_LEN];
    cipher.apply_keystream(&mut buf);
    Some(buf)
}

/// Hand-rolled ARC4 keystream generator. ARC4's key-scheduling algorithm
/// accepts any key length, which none of the fixed-key-size RustCrypto
/// stream-cipher crates model cleanly; the algorithm itself is a dozen
/// lines of well-specified byte shuffling, in keeping with the pack's
/// precedent (`bass_broadcast_processor`'s hand-rolled `dsp/` kernels) for
/// writing small, fully-specified primitives directly rather than reaching
/// for a dependency that doesn't fit the shape of the problem.
fn arc4_keystream(key: &[u8], mi: &[u8; MI_LEN]) -> Option<Vec<u8>> {
    if key.is_empty() {
        return None;
    }
    let mut rc4_key = key.to_vec();
    rc4_key.extend_from_slice(mi);

    let mut s: [u8; 256] = [0; 256];
    for (i, v) in s.iter_mut().enumerate() {
        *v = i as u8;
    }
    let mut j: u8 = 0;
    for i in 0..256usize {
        j = j
            .wrapping_add(s[i])
            .wrapping_add(rc4_key[i % rc4_key.len()]);
        s.swap(i, j as usize);
    }

    let mut buf = vec![0u8; KEYSTREAM_LEN];
    let mut i: u8 = 0;
    let mut j: u8 = 0;
    for out in buf.iter_mut() {
        i = i.wrapping_add(1);
        j = j.wrapping_add(s[i as usize]);
        s.swap(i as usize, j as usize);
        let k = s[(s[i as usize].wrapping_add(s[j as usize])) as usize];
        *out = k;
    }
    Some(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unencrypted_imbe_is_untouched() {
        let crypto = P25Crypto::new();
        let mut imbe = [1u8; IMBE_CODEWORD_LEN];
        let orig = imbe;
        crypto.crypt_imbe(&mut imbe, 0);
        assert_eq!(imbe, orig);
    }

    #[test]
    fn aes_keystream_applies_and_reverses() {
        let mut crypto = P25Crypto::new();
        crypto.set_tek_algo(TekAlgo::Aes256);
        crypto.set_key(&[0x11u8; 32]);
        crypto.set_mi([0x22u8; MI_LEN]);
        crypto.generate_keystream();
        assert!(crypto.has_valid_keystream());

        let mut imbe = [0xAAu8; IMBE_CODEWORD_LEN];
        let orig = imbe;
        crypto.crypt_imbe(&mut imbe, 3);
        assert_ne!(imbe, orig);
        crypto.crypt_imbe(&mut imbe, 3);
        assert_eq!(imbe, orig);
    }

    #[test]
    fn arc4_keystream_applies_and_reverses() {
        let mut crypto = P25Crypto::new();
        crypto.set_tek_algo(TekAlgo::Arc4);
        crypto.set_key(&[0x33u8; 16]);
        crypto.set_mi([0x44u8; MI_LEN]);
        crypto.generate_keystream();

        let mut imbe = [0x55u8; IMBE_CODEWORD_LEN];
        let orig = imbe;
        crypto.crypt_imbe(&mut imbe, 17);
        assert_ne!(imbe, orig);
        crypto.crypt_imbe(&mut imbe, 17);
        assert_eq!(imbe, orig);
    }

    #[test]
    fn mi_advance_is_deterministic_and_changes_value() {
        let mi = [0x01u8; MI_LEN];
        let next1 = advance_mi(&mi);
        let next2 = advance_mi(&mi);
        assert_eq!(next1, next2);
        assert_ne!(next1, mi);
    }

    #[test]
    fn generate_next_mi_advances_exactly_once() {
        let mut crypto = P25Crypto::new();
        crypto.set_mi([0u8; MI_LEN]);
        let before = crypto.get_mi().unwrap();
        crypto.generate_next_mi();
        let after = crypto.get_mi().unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn clear_mi_and_keystream_reset_state() {
        let mut crypto = P25Crypto::new();
        crypto.set_tek_algo(TekAlgo::Aes256);
        crypto.set_key(&[0u8; 32]);
        crypto.generate_mi();
        crypto.generate_keystream();
        assert!(crypto.has_valid_mi());
        assert!(crypto.has_valid_keystream());
        crypto.clear_mi();
        crypto.reset_keystream();
        assert!(!crypto.has_valid_mi());
        assert!(!crypto.has_valid_keystream());
    }
}
