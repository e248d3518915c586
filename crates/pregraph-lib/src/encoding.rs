//! Nucleotide symbol encoding
//!
//! Every node descriptor stores its sequence as 2-bit symbols:
//! - A -> 00
//! - C -> 01
//! - G -> 11
//! - T -> 10
//!
//! With this layout the complement of a symbol is a single XOR with `0b10`.

use crate::constants::{words_for_symbols, Word, BITS_PER_SYMBOL, SYMBOLS_PER_WORD};
use thiserror::Error;

/// Error type for encoding operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// The input byte is not a nucleotide (A/C/G/T, any case)
    #[error("invalid nucleotide {symbol:?} at position {position}")]
    InvalidSymbol {
        /// Position of the offending byte in the input
        position: usize,
        /// The offending byte, as a character
        symbol: char,
    },
}

/// Encode a single nucleotide to its 2-bit symbol
#[inline]
pub const fn encode_base(base: u8) -> Option<u8> {
    match base {
        b'A' | b'a' => Some(0b00),
        b'C' | b'c' => Some(0b01),
        b'G' | b'g' => Some(0b11),
        b'T' | b't' => Some(0b10),
        _ => None,
    }
}

/// Decode a 2-bit symbol to an uppercase nucleotide
#[inline]
pub const fn decode_base(bits: u8) -> u8 {
    match bits & 0b11 {
        0b00 => b'A',
        0b01 => b'C',
        0b11 => b'G',
        _ => b'T',
    }
}

/// Complement of an encoded symbol (A <-> T, C <-> G)
#[inline]
pub const fn complement_base(bits: u8) -> u8 {
    bits ^ 0b10
}

/// Pack a nucleotide sequence into descriptor words
///
/// Symbol `i` is stored in word `i / SYMBOLS_PER_WORD` at bit offset
/// `BITS_PER_SYMBOL * (i % SYMBOLS_PER_WORD)`. Unused high bits of the last
/// word are zero.
///
/// # Errors
/// Returns an error naming the first byte that is not a nucleotide
pub fn pack_sequence(sequence: &[u8]) -> Result<Vec<Word>, EncodingError> {
    let mut words: Vec<Word> = vec![0; words_for_symbols(sequence.len())];

    for (position, &base) in sequence.iter().enumerate() {
        let symbol = encode_base(base).ok_or(EncodingError::InvalidSymbol {
            position,
            symbol: base as char,
        })?;
        let shift = (position % SYMBOLS_PER_WORD) * BITS_PER_SYMBOL;
        words[position / SYMBOLS_PER_WORD] |= symbol << shift;
    }

    Ok(words)
}

/// Unpack `length` symbols from descriptor words into a nucleotide string
pub fn unpack_sequence(words: &[Word], length: usize) -> String {
    (0..length)
        .map(|i| {
            let shift = (i % SYMBOLS_PER_WORD) * BITS_PER_SYMBOL;
            decode_base(words[i / SYMBOLS_PER_WORD] >> shift) as char
        })
        .collect()
}

/// Reverse complement of a nucleotide string
///
/// Bytes that are not nucleotides are kept in place but reversed.
pub fn reverse_complement(sequence: &str) -> String {
    sequence
        .bytes()
        .rev()
        .map(|base| match encode_base(base) {
            Some(symbol) => decode_base(complement_base(symbol)) as char,
            None => base as char,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_base() {
        assert_eq!(encode_base(b'A'), Some(0b00));
        assert_eq!(encode_base(b'c'), Some(0b01));
        assert_eq!(encode_base(b'G'), Some(0b11));
        assert_eq!(encode_base(b't'), Some(0b10));
        assert_eq!(encode_base(b'N'), None);
    }

    #[test]
    fn test_complement_base() {
        assert_eq!(decode_base(complement_base(0b00)), b'T');
        assert_eq!(decode_base(complement_base(0b10)), b'A');
        assert_eq!(decode_base(complement_base(0b01)), b'G');
        assert_eq!(decode_base(complement_base(0b11)), b'C');
    }

    #[test]
    fn test_pack_layout() {
        // A C G T -> 00 01 11 10, first symbol in the low bits
        let words = pack_sequence(b"ACGT").unwrap();
        assert_eq!(words, vec![0b10_11_01_00]);

        // Fifth symbol starts a new word, high bits stay clear
        let words = pack_sequence(b"ACGTC").unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[1], 0b01);
    }

    #[test]
    fn test_pack_unpack() {
        let words = pack_sequence(b"gattaca").unwrap();
        assert_eq!(unpack_sequence(&words, 7), "GATTACA");
    }

    #[test]
    fn test_pack_invalid() {
        let err = pack_sequence(b"ACGNT").unwrap_err();
        assert_eq!(err, EncodingError::InvalidSymbol { position: 3, symbol: 'N' });
    }

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement("AACG"), "CGTT");
        assert_eq!(reverse_complement(""), "");
    }
}
