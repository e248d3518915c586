//! Bit-packed node descriptors
//!
//! A descriptor holds the full nucleotide sequence of a node, 2 bits per
//! symbol, `SYMBOLS_PER_WORD` symbols per word. A node of length `L` (in
//! k-mers) carries `L + k - 1` symbols.
//!
//! [`DescriptorWriter`] concatenates descriptors of k-overlapping nodes: the
//! first node is copied whole, every later node skips the `k - 1` symbols
//! already written as the previous node's tail.

use crate::constants::{words_for_symbols, Word, BITS_PER_SYMBOL, SYMBOLS_PER_WORD};
use crate::encoding::{self, complement_base, EncodingError};

/// A packed nucleotide sequence
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Descriptor {
    /// Packed symbols, first symbol in the low bits of word 0
    words: Vec<Word>,
    /// Number of symbols stored
    len: usize,
}

impl Descriptor {
    /// Pack a nucleotide sequence
    ///
    /// # Errors
    /// Returns an error if the sequence contains a byte other than A/C/G/T
    pub fn from_sequence(sequence: &[u8]) -> Result<Self, EncodingError> {
        Ok(Self {
            words: encoding::pack_sequence(sequence)?,
            len: sequence.len(),
        })
    }

    /// Wrap already packed words holding `len` symbols
    ///
    /// Bits past the last symbol are cleared.
    pub fn from_words(mut words: Vec<Word>, len: usize) -> Self {
        assert_eq!(
            words.len(),
            words_for_symbols(len),
            "descriptor of {} symbols needs {} words",
            len,
            words_for_symbols(len)
        );
        clear_trailing_bits(&mut words, len);
        Self { words, len }
    }

    /// Number of symbols
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the descriptor holds no symbols
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The packed words
    #[inline]
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// Encoded symbol at position `i`
    #[inline]
    pub fn symbol(&self, i: usize) -> u8 {
        assert!(i < self.len, "symbol {} out of bounds ({} symbols)", i, self.len);
        let shift = (i % SYMBOLS_PER_WORD) * BITS_PER_SYMBOL;
        (self.words[i / SYMBOLS_PER_WORD] >> shift) & 0b11
    }

    /// Encoded symbol at position `i` of the forward or reverse strand
    #[inline]
    pub fn oriented_symbol(&self, i: usize, reverse: bool) -> u8 {
        if reverse {
            complement_base(self.symbol(self.len - 1 - i))
        } else {
            self.symbol(i)
        }
    }

    /// Decode to an uppercase nucleotide string
    pub fn to_sequence(&self) -> String {
        encoding::unpack_sequence(&self.words, self.len)
    }

    /// Reverse complement of this descriptor
    pub fn reverse_complement(&self) -> Self {
        let mut writer = DescriptorWriter::new(self.len, 1);
        writer.append(self, true, true);
        writer.finish()
    }

    /// Copy of `len` symbols starting at `start`
    pub fn slice(&self, start: usize, len: usize) -> Self {
        assert!(
            start + len <= self.len,
            "slice {}..{} out of bounds ({} symbols)",
            start,
            start + len,
            self.len
        );
        let mut writer = DescriptorWriter::new(len, 1);
        for i in start..start + len {
            writer.push(self.symbol(i));
        }
        writer.finish()
    }
}

/// Clear the bits past symbol `len` in the last word
fn clear_trailing_bits(words: &mut [Word], len: usize) {
    let used = len % SYMBOLS_PER_WORD;
    if used != 0 {
        if let Some(last) = words.last_mut() {
            *last &= ((1 as Word) << (used * BITS_PER_SYMBOL)) - 1;
        }
    }
}

/// Growing buffer for concatenating k-overlapping descriptors
///
/// The buffer is sized up front from the total symbol count; `finish`
/// checks that exactly that many symbols were written.
#[derive(Debug)]
pub struct DescriptorWriter {
    words: Vec<Word>,
    capacity: usize,
    write_offset: usize,
    word_length: usize,
}

impl DescriptorWriter {
    /// Create a writer for `total_symbols` symbols of nodes built with
    /// word length `word_length`
    pub fn new(total_symbols: usize, word_length: usize) -> Self {
        Self {
            words: vec![0; words_for_symbols(total_symbols)],
            capacity: total_symbols,
            write_offset: 0,
            word_length,
        }
    }

    /// Symbols written so far
    #[inline]
    pub fn write_offset(&self) -> usize {
        self.write_offset
    }

    #[inline]
    fn push(&mut self, symbol: u8) {
        assert!(
            self.write_offset < self.capacity,
            "descriptor overflow past {} symbols",
            self.capacity
        );
        let shift = (self.write_offset % SYMBOLS_PER_WORD) * BITS_PER_SYMBOL;
        self.words[self.write_offset / SYMBOLS_PER_WORD] |= symbol << shift;
        self.write_offset += 1;
    }

    /// Append `source` (read on its reverse strand if `reverse`) and return
    /// the updated write offset
    ///
    /// Unless `initial`, the first `word_length - 1` symbols are skipped:
    /// they duplicate the tail of the previously appended node.
    pub fn append(&mut self, source: &Descriptor, reverse: bool, initial: bool) -> usize {
        let skip = if initial { 0 } else { self.word_length - 1 };
        assert!(
            source.len() >= skip,
            "descriptor of {} symbols cannot overlap by {}",
            source.len(),
            skip
        );

        if !reverse && self.write_offset % SYMBOLS_PER_WORD == 0 && skip % SYMBOLS_PER_WORD == 0 {
            // Word-aligned on both sides: copy whole words
            let count = source.len() - skip;
            let src = &source.words[skip / SYMBOLS_PER_WORD..];
            let dst_start = self.write_offset / SYMBOLS_PER_WORD;
            assert!(
                self.write_offset + count <= self.capacity,
                "descriptor overflow past {} symbols",
                self.capacity
            );
            let n_words = words_for_symbols(count);
            self.words[dst_start..dst_start + n_words].copy_from_slice(&src[..n_words]);
            self.write_offset += count;
            return self.write_offset;
        }

        for i in skip..source.len() {
            self.push(source.oriented_symbol(i, reverse));
        }
        self.write_offset
    }

    /// Clear the unused trailing bits and return the finished descriptor
    pub fn finish(mut self) -> Descriptor {
        assert_eq!(
            self.write_offset, self.capacity,
            "descriptor sized for {} symbols but {} were written",
            self.capacity, self.write_offset
        );
        clear_trailing_bits(&mut self.words, self.write_offset);
        Descriptor {
            words: self.words,
            len: self.write_offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descr(s: &str) -> Descriptor {
        Descriptor::from_sequence(s.as_bytes()).unwrap()
    }

    #[test]
    fn test_symbol_access() {
        let d = descr("ACGTA");
        assert_eq!(d.len(), 5);
        assert_eq!(d.words().len(), 2);
        assert_eq!(d.symbol(0), 0b00);
        assert_eq!(d.symbol(2), 0b11);
        assert_eq!(d.symbol(4), 0b00);
        assert_eq!(d.to_sequence(), "ACGTA");
    }

    #[test]
    fn test_reverse_complement() {
        let d = descr("AACGTTG");
        assert_eq!(d.reverse_complement().to_sequence(), "CAACGTT");
        assert_eq!(d.reverse_complement().reverse_complement(), d);
    }

    #[test]
    fn test_slice() {
        let d = descr("GATTACAGATTACA");
        assert_eq!(d.slice(3, 6).to_sequence(), "TACAGA");
        assert_eq!(d.slice(0, 0).len(), 0);
    }

    #[test]
    fn test_from_words_clears_garbage() {
        let d = Descriptor::from_words(vec![0xFF, 0xFF], 5);
        assert_eq!(d.words()[1], 0b11);
        assert_eq!(d.to_sequence(), "GGGGG");
    }

    #[test]
    fn test_append_skips_overlap() {
        // k = 3: nodes overlap by 2 symbols
        let a = descr("ACGTA");
        let b = descr("TACCG");
        let mut writer = DescriptorWriter::new(8, 3);
        assert_eq!(writer.append(&a, false, true), 5);
        assert_eq!(writer.append(&b, false, false), 8);
        assert_eq!(writer.finish().to_sequence(), "ACGTACCG");
    }

    #[test]
    fn test_append_reverse_strand() {
        // Second node stored as the reverse complement of "TACCG"
        let a = descr("ACGTA");
        let b = descr("CGGTA");
        let mut writer = DescriptorWriter::new(8, 3);
        writer.append(&a, false, true);
        writer.append(&b, true, false);
        assert_eq!(writer.finish().to_sequence(), "ACGTACCG");
    }

    #[test]
    fn test_append_word_aligned_copy() {
        // k = 5: skip of 4 symbols lines up with whole words
        let a = descr("ACGTACGT");
        let b = descr("ACGTGGGGCC");
        let mut writer = DescriptorWriter::new(14, 5);
        writer.append(&a, false, true);
        writer.append(&b, false, false);
        let d = writer.finish();
        assert_eq!(d.to_sequence(), "ACGTACGTGGGGCC");
        // Two trailing symbols, high four bits of the last word clear
        assert_eq!(d.words()[3] >> 4, 0);
    }

    #[test]
    #[should_panic(expected = "sized for")]
    fn test_finish_checks_size() {
        let mut writer = DescriptorWriter::new(6, 3);
        writer.append(&descr("ACGT"), false, true);
        writer.finish();
    }
}
