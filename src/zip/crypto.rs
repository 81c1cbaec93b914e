//! The legacy PKWARE "Traditional" stream cipher (ZipCrypto).
//!
//! Three 32-bit key words are folded over the password and then over every
//! plaintext byte; a keystream byte is derived from the third word and
//! XORed with the data. The update rule always folds the *plaintext* byte
//! back into the schedule, in both directions, which is what makes
//! encryption and decryption symmetric.
//!
//! The cipher state is modeled as an explicit `(state, byte) -> (output,
//! state')` transition rather than hidden mutable fields, so the schedule
//! can be tested on its own and applied as a fold over a byte sequence.
//!
//! **Security warning**: this cipher is cryptographically weak and exists
//! purely for interoperability with archives other ZIP tools produce. The
//! 12-byte entry header carries a CRC fragment that this implementation,
//! like the tools it interoperates with, never verifies on decryption: a
//! wrong password silently yields garbage, and the only observable symptom
//! is a downstream decompression failure.

use rand::RngCore;
use rand::rngs::OsRng;

/// Size of the encryption header prepended to every encrypted payload.
pub const CIPHER_HEADER_SIZE: usize = 12;

/// Initial key values, fixed by the format.
const INITIAL_K0: u32 = 0x1234_5678;
const INITIAL_K1: u32 = 0x2345_6789;
const INITIAL_K2: u32 = 0x3456_7890;

/// CRC-32 lookup table (polynomial 0xEDB88320, reflected).
///
/// The key schedule uses the raw single-byte register update, not the
/// whole-buffer CRC with pre/post conditioning.
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0usize;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB88320;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Single-byte CRC-32 register update.
#[inline]
fn crc32_step(acc: u32, byte: u8) -> u32 {
    (acc >> 8) ^ CRC32_TABLE[((acc ^ u32::from(byte)) & 0xFF) as usize]
}

/// The three-word key schedule of the cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherState {
    k0: u32,
    k1: u32,
    k2: u32,
}

impl CipherState {
    /// Derive the initial state by folding every password byte through
    /// the update rule in order.
    pub fn new(password: &[u8]) -> Self {
        let initial = Self {
            k0: INITIAL_K0,
            k1: INITIAL_K1,
            k2: INITIAL_K2,
        };
        password.iter().fold(initial, |state, &b| state.advance(b))
    }

    /// The keystream byte for the current state. Does not mutate.
    #[inline]
    pub fn stream_byte(&self) -> u8 {
        let t = (self.k2 | 2) as u16;
        (t.wrapping_mul(t ^ 1) >> 8) as u8
    }

    /// Fold one plaintext byte into the schedule, yielding the next state.
    ///
    /// `k2` is updated with the high byte of the *already updated* `k1`.
    #[inline]
    pub fn advance(self, byte: u8) -> Self {
        let k0 = crc32_step(self.k0, byte);
        let k1 = self
            .k1
            .wrapping_add(k0 & 0xFF)
            .wrapping_mul(134_775_813)
            .wrapping_add(1);
        let k2 = crc32_step(self.k2, (k1 >> 24) as u8);
        Self { k0, k1, k2 }
    }

    /// Encrypt one byte: XOR with the keystream, then advance with the
    /// plaintext byte.
    #[inline]
    pub fn encrypt_byte(self, plain: u8) -> (u8, Self) {
        let cipher = plain ^ self.stream_byte();
        (cipher, self.advance(plain))
    }

    /// Decrypt one byte: XOR with the keystream, then advance with the
    /// *recovered plaintext* byte. Identical update rule to encryption.
    #[inline]
    pub fn decrypt_byte(self, cipher: u8) -> (u8, Self) {
        let plain = cipher ^ self.stream_byte();
        (plain, self.advance(plain))
    }
}

/// Encrypt a payload under the entry-level envelope.
///
/// A 12-byte header is built first: 10 random filler bytes, then the two
/// most significant bytes of the plaintext's CRC-32 (bytes 2 and 3 of its
/// little-endian form). Header and payload are then encrypted as one
/// stream from a fresh state.
pub fn encrypt(password: &[u8], crc32: u32, plaintext: &[u8]) -> Vec<u8> {
    let mut header = [0u8; CIPHER_HEADER_SIZE];
    OsRng.fill_bytes(&mut header[..10]);
    header[10] = (crc32 >> 16) as u8;
    header[11] = (crc32 >> 24) as u8;

    let mut out = Vec::with_capacity(CIPHER_HEADER_SIZE + plaintext.len());
    let mut state = CipherState::new(password);
    for &b in header.iter().chain(plaintext) {
        let (c, next) = state.encrypt_byte(b);
        out.push(c);
        state = next;
    }
    out
}

/// Decrypt an encrypted payload and strip the 12-byte header.
///
/// No password verification is performed: the CRC fragment in the header
/// is decrypted and discarded unchecked, so a wrong password produces
/// garbage rather than an error.
pub fn decrypt(password: &[u8], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len().saturating_sub(CIPHER_HEADER_SIZE));
    let mut state = CipherState::new(password);
    for (i, &b) in data.iter().enumerate() {
        let (p, next) = state.decrypt_byte(b);
        if i >= CIPHER_HEADER_SIZE {
            out.push(p);
        }
        state = next;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_password_keeps_initial_keys() {
        let state = CipherState::new(b"");
        assert_eq!(
            state,
            CipherState {
                k0: INITIAL_K0,
                k1: INITIAL_K1,
                k2: INITIAL_K2,
            }
        );
    }

    #[test]
    fn key_schedule_is_deterministic() {
        assert_eq!(CipherState::new(b"secret"), CipherState::new(b"secret"));
        assert_ne!(CipherState::new(b"secret"), CipherState::new(b"Secret"));
        assert_ne!(CipherState::new(b"x"), CipherState::new(b""));
    }

    #[test]
    fn transition_is_deterministic() {
        let state = CipherState::new(b"pw");
        assert_eq!(state.stream_byte(), state.stream_byte());
        assert_eq!(state.advance(0x41), state.advance(0x41));
    }

    #[test]
    fn byte_level_symmetry() {
        let enc = CipherState::new(b"k");
        let dec = CipherState::new(b"k");
        let (c, enc_next) = enc.encrypt_byte(0x5A);
        let (p, dec_next) = dec.decrypt_byte(c);
        assert_eq!(p, 0x5A);
        assert_eq!(enc_next, dec_next);
    }

    #[test]
    fn envelope_round_trip() {
        for payload in [&b""[..], b"a", b"hello world", &[0u8; 300]] {
            let crc = crc32fast::hash(payload);
            let encrypted = encrypt(b"secret", crc, payload);
            assert_eq!(encrypted.len(), CIPHER_HEADER_SIZE + payload.len());
            assert_eq!(decrypt(b"secret", &encrypted), payload);
        }
    }

    #[test]
    fn envelope_header_is_random() {
        let crc = crc32fast::hash(b"data");
        let a = encrypt(b"pw", crc, b"data");
        let b = encrypt(b"pw", crc, b"data");
        // Same length, almost surely different bytes thanks to the filler.
        assert_eq!(a.len(), b.len());
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_password_yields_garbage() {
        let payload = b"the cipher has no verification step";
        let encrypted = encrypt(b"right", crc32fast::hash(payload), payload);
        let decrypted = decrypt(b"wrong", &encrypted);
        assert_eq!(decrypted.len(), payload.len());
        assert_ne!(decrypted, payload);
    }
}
