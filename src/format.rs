//! On-disk encodings of 36-bit words.
//!
//! Every format maps a byte stream to a stream of words and back. Formats
//! whose word size is not a whole number of octets carry leftover bits
//! between calls, which is why readers and writers are stateful.

use std::{
    io::{self, BufRead as _, BufReader, Read, Seek, SeekFrom, Write},
    path::Path,
};

use thiserror::Error;

use crate::word::{strip_tags, Word, WORD_MASK};

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("word {0:#o} does not fit in 36 bits")]
    Overflow(u64),
    #[error("malformed octal word {0:?}")]
    BadOctal(String),
    #[error("input ends in the middle of a word")]
    Truncated,
    #[error("unknown word format {0:?}")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Two words packed into nine octets, most significant bits first.
    Bin,
    /// One word in five octets; the top four bits of the first are zero.
    Its,
    /// One word in a little-endian 64-bit container.
    Simh,
    /// Twelve octal digits per line.
    Octal,
}

impl Format {
    pub fn from_name(name: &str) -> Result<Self, FormatError> {
        match name.to_ascii_lowercase().as_str() {
            "bin" => Ok(Format::Bin),
            "its" => Ok(Format::Its),
            "simh" => Ok(Format::Simh),
            "octal" | "ascii" => Ok(Format::Octal),
            _ => Err(FormatError::UnknownFormat(name.to_string())),
        }
    }

    pub fn guess(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("bin") => Format::Bin,
            Some("simh" | "sim") => Format::Simh,
            Some("oct" | "txt") => Format::Octal,
            _ => Format::Its,
        }
    }
}

/// Fill `buf` completely, or report a clean end of stream if nothing at all
/// could be read.
fn read_full(r: &mut impl Read, buf: &mut [u8]) -> Result<bool, FormatError> {
    let mut n = 0;
    while n < buf.len() {
        match r.read(&mut buf[n..]) {
            Ok(0) if n == 0 => return Ok(false),
            Ok(0) => return Err(FormatError::Truncated),
            Ok(k) => n += k,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

pub struct WordReader<R> {
    inner: BufReader<R>,
    format: Format,
    // Low nibble of the fifth octet of a Bin pair.
    leftover: Option<u8>,
    line: String,
}

impl<R: Read> WordReader<R> {
    pub fn new(inner: R, format: Format) -> Self {
        Self {
            inner: BufReader::new(inner),
            format,
            leftover: None,
            line: String::new(),
        }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Next word, or `None` at end of input.
    pub fn get_word(&mut self) -> Result<Option<Word>, FormatError> {
        match self.format {
            Format::Bin => self.get_bin(),
            Format::Its => {
                let mut b = [0; 5];
                if !read_full(&mut self.inner, &mut b)? {
                    return Ok(None);
                }
                let word = b.iter().fold(0, |w, &b| (w << 8) | b as Word);
                check(word).map(Some)
            }
            Format::Simh => {
                let mut b = [0; 8];
                if !read_full(&mut self.inner, &mut b)? {
                    return Ok(None);
                }
                check(u64::from_le_bytes(b)).map(Some)
            }
            Format::Octal => self.get_octal(),
        }
    }

    fn get_bin(&mut self) -> Result<Option<Word>, FormatError> {
        match self.leftover.take() {
            None => {
                let mut b = [0; 5];
                if !read_full(&mut self.inner, &mut b)? {
                    return Ok(None);
                }
                self.leftover = Some(b[4] & 0xf);
                Ok(Some(
                    (b[0] as Word) << 28
                        | (b[1] as Word) << 20
                        | (b[2] as Word) << 12
                        | (b[3] as Word) << 4
                        | (b[4] as Word) >> 4,
                ))
            }
            Some(nibble) => {
                let mut b = [0; 4];
                // An odd word count leaves a padding nibble at the end.
                if !read_full(&mut self.inner, &mut b)? {
                    return Ok(None);
                }
                Ok(Some((nibble as Word) << 32 | u32::from_be_bytes(b) as Word))
            }
        }
    }

    fn get_octal(&mut self) -> Result<Option<Word>, FormatError> {
        loop {
            self.line.clear();
            if self.inner.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            let text = self.line.trim();
            if text.is_empty() {
                continue;
            }
            let word = u64::from_str_radix(text, 8)
                .map_err(|_| FormatError::BadOctal(text.to_string()))?;
            return check(word).map(Some);
        }
    }
}

impl<R: Read + Seek> WordReader<R> {
    pub fn rewind(&mut self) -> Result<(), FormatError> {
        self.inner.seek(SeekFrom::Start(0))?;
        self.leftover = None;
        Ok(())
    }

    /// Position the reader so that the next `get_word` returns word `index`.
    pub fn seek(&mut self, index: u64) -> Result<(), FormatError> {
        self.rewind()?;
        match self.format {
            Format::Bin => {
                self.inner.seek(SeekFrom::Start(index / 2 * 9))?;
                if index % 2 == 1 {
                    self.inner.seek_relative(4)?;
                    let mut b = [0; 1];
                    if !read_full(&mut self.inner, &mut b)? {
                        return Err(FormatError::Truncated);
                    }
                    self.leftover = Some(b[0] & 0xf);
                }
            }
            Format::Its => {
                self.inner.seek(SeekFrom::Start(index * 5))?;
            }
            Format::Simh => {
                self.inner.seek(SeekFrom::Start(index * 8))?;
            }
            Format::Octal => {
                for _ in 0..index {
                    if self.get_word()?.is_none() {
                        return Err(FormatError::Truncated);
                    }
                }
            }
        }
        Ok(())
    }
}

impl<R: Read> Iterator for WordReader<R> {
    type Item = Result<Word, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.get_word().transpose()
    }
}

fn check(word: u64) -> Result<Word, FormatError> {
    if word > WORD_MASK {
        Err(FormatError::Overflow(word))
    } else {
        Ok(word)
    }
}

pub struct WordWriter<W: Write> {
    inner: W,
    format: Format,
    // High nibble of the shared fifth octet of a Bin pair.
    leftover: Option<u8>,
}

impl<W: Write> WordWriter<W> {
    pub fn new(inner: W, format: Format) -> Self {
        Self {
            inner,
            format,
            leftover: None,
        }
    }

    pub fn write_word(&mut self, word: Word) -> Result<(), FormatError> {
        let word = check(strip_tags(word))?;

        match self.format {
            Format::Bin => match self.leftover.take() {
                None => {
                    self.inner.write_all(&(((word >> 4) as u32).to_be_bytes()))?;
                    self.leftover = Some(((word & 0xf) as u8) << 4);
                }
                Some(high) => {
                    self.inner.write_all(&[high | ((word >> 32) as u8 & 0xf)])?;
                    self.inner.write_all(&(word as u32).to_be_bytes())?;
                }
            },
            Format::Its => self.inner.write_all(&word.to_be_bytes()[3..])?,
            Format::Simh => self.inner.write_all(&word.to_le_bytes())?,
            Format::Octal => writeln!(self.inner, "{word:012o}")?,
        }
        Ok(())
    }

    /// Emit any half-filled octet and flush the underlying stream.
    pub fn flush(&mut self) -> Result<(), FormatError> {
        if let Some(high) = self.leftover.take() {
            self.inner.write_all(&[high])?;
        }
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(mut self) -> Result<W, FormatError> {
        self.flush()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const WORDS: [Word; 5] = [0o123456701234, 0o777777777777, 0, 0o400000000001, 0o17];

    fn encode(format: Format, words: &[Word]) -> Vec<u8> {
        let mut w = WordWriter::new(Vec::new(), format);
        for &word in words {
            w.write_word(word).unwrap();
        }
        w.into_inner().unwrap()
    }

    fn decode(format: Format, bytes: Vec<u8>) -> Vec<Word> {
        WordReader::new(Cursor::new(bytes), format)
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn bin_packs_two_words_in_nine_octets() {
        let bytes = encode(Format::Bin, &WORDS[..2]);
        assert_eq!(bytes.len(), 9);
        assert_eq!(bytes[4], 0xcf);

        // An odd count pads the last nibble.
        let bytes = encode(Format::Bin, &WORDS);
        assert_eq!(bytes.len(), 23);
        assert_eq!(decode(Format::Bin, bytes), WORDS);
    }

    #[test]
    fn every_format_reads_back() {
        for format in [Format::Bin, Format::Its, Format::Simh, Format::Octal] {
            assert_eq!(decode(format, encode(format, &WORDS)), WORDS, "{format:?}");
        }
    }

    #[test]
    fn its_rejects_wide_words() {
        let mut r = WordReader::new(Cursor::new(vec![0x10, 0, 0, 0, 0]), Format::Its);
        assert!(matches!(r.get_word(), Err(FormatError::Overflow(_))));
    }

    #[test]
    fn truncated_input_is_an_error() {
        let mut r = WordReader::new(Cursor::new(vec![0, 0, 0]), Format::Simh);
        assert!(matches!(r.get_word(), Err(FormatError::Truncated)));
    }

    #[test]
    fn octal_skips_blank_lines_and_rejects_garbage() {
        let text = "000000000001\n\n777777777777\n";
        let words = decode(Format::Octal, text.as_bytes().to_vec());
        assert_eq!(words, vec![1, WORD_MASK]);

        let mut r = WordReader::new(Cursor::new(b"12x\n".to_vec()), Format::Octal);
        assert!(matches!(r.get_word(), Err(FormatError::BadOctal(_))));
    }

    #[test]
    fn seek_lands_on_odd_bin_words() {
        let bytes = encode(Format::Bin, &WORDS);
        let mut r = WordReader::new(Cursor::new(bytes), Format::Bin);
        r.seek(3).unwrap();
        assert_eq!(r.get_word().unwrap(), Some(WORDS[3]));
        r.seek(2).unwrap();
        assert_eq!(r.get_word().unwrap(), Some(WORDS[2]));
        r.rewind().unwrap();
        assert_eq!(r.get_word().unwrap(), Some(WORDS[0]));
    }

    #[test]
    fn writer_strips_tape_tags() {
        let bytes = encode(Format::Its, &[crate::word::START_RECORD | 5]);
        assert_eq!(decode(Format::Its, bytes), vec![5]);
    }

    #[test]
    fn format_selection() {
        assert_eq!(Format::from_name("BIN").unwrap(), Format::Bin);
        assert!(Format::from_name("dart").is_err());
        assert_eq!(Format::guess(Path::new("ts.lisp.simh")), Format::Simh);
        assert_eq!(Format::guess(Path::new("@.midas")), Format::Its);
    }
}
