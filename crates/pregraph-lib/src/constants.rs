//! Constants shared by the graph store and the simplification passes
//!
//! This module defines the descriptor packing layout, the valid word
//! lengths and the default simplification parameters.

/// Bits used by one nucleotide symbol in a descriptor
pub const BITS_PER_SYMBOL: usize = 2;

/// Descriptor word type
pub type Word = u8;

/// Number of symbols packed into one descriptor word
pub const SYMBOLS_PER_WORD: usize = Word::BITS as usize / BITS_PER_SYMBOL;

/// Minimum word length (k) supported
pub const MIN_WORD_LENGTH: usize = 3;

/// Maximum word length (k) supported
pub const MAX_WORD_LENGTH: usize = 63;

/// Tips shorter than this many word lengths are clipped
pub const DEFAULT_TIP_LENGTH_FACTOR: usize = 2;

/// Version number
pub const VERSION: (u8, u8, u8) = (0, 1, 0);

/// Check if a word length is valid (odd, between the bounds)
///
/// Odd word lengths guarantee that no k-mer is its own reverse complement.
#[inline]
pub const fn is_valid_word_length(k: usize) -> bool {
    k >= MIN_WORD_LENGTH && k <= MAX_WORD_LENGTH && k % 2 == 1
}

/// Number of words needed to hold `symbols` packed symbols
#[inline]
pub const fn words_for_symbols(symbols: usize) -> usize {
    symbols.div_ceil(SYMBOLS_PER_WORD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_per_word() {
        assert_eq!(SYMBOLS_PER_WORD, 4);
    }

    #[test]
    fn test_is_valid_word_length() {
        assert!(is_valid_word_length(3));
        assert!(is_valid_word_length(21));
        assert!(is_valid_word_length(31));
        assert!(is_valid_word_length(63));

        // Even
        assert!(!is_valid_word_length(4));
        assert!(!is_valid_word_length(32));

        // Out of range
        assert!(!is_valid_word_length(1));
        assert!(!is_valid_word_length(65));
    }

    #[test]
    fn test_words_for_symbols() {
        assert_eq!(words_for_symbols(0), 0);
        assert_eq!(words_for_symbols(1), 1);
        assert_eq!(words_for_symbols(4), 1);
        assert_eq!(words_for_symbols(5), 2);
        assert_eq!(words_for_symbols(70), 18);
    }
}
