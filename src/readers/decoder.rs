//! Primitive value decoder for ASCII and binary GMV streams
//!
//! Reads scalars and arrays either as whitespace separated ASCII tokens or as
//! raw binary values in one of the IEEE layouts. Narrower binary values are
//! widened to `i64`/`f64`, and bytes are reversed when the file was written
//! on a machine of the opposite endianness.
//!
//! Binary reads that come up short are zero filled and only flag the short
//! read. The caller decides when to check, normally right after an array has
//! been read, via [Decoder::check].

// internal modules
use crate::error::{zeroed, GmvError, Result};
use crate::readers::parsers;
use crate::utils::{f, field_to_string};

// standard library
use std::io::{BufRead, ErrorKind, Read, Seek, SeekFrom};

// external crates
use log::trace;
use serde::Serialize;

/// Anything the decoder can read from
///
/// Seeking is required for the `fromfile` peek and the byte-swap probe.
pub trait Source: BufRead + Seek {}
impl<T: BufRead + Seek> Source for T {}

/// Numeric layout of a GMV file
///
/// The `iecx` file types map onto the same four binary layouts, see
/// [classify_file_type](crate::readers::parsers::classify_file_type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Encoding {
    /// Whitespace separated text
    Ascii,
    /// 32-bit integers, 32-bit reals
    IeeeI4R4,
    /// 32-bit integers, 64-bit reals
    IeeeI4R8,
    /// 64-bit integers, 32-bit reals
    IeeeI8R4,
    /// 64-bit integers, 64-bit reals
    IeeeI8R8,
}

impl Encoding {
    pub fn is_ascii(&self) -> bool {
        *self == Encoding::Ascii
    }

    /// Primitive used for counts, references and ids
    pub fn index_kind(&self) -> Primitive {
        match self {
            Encoding::IeeeI8R4 | Encoding::IeeeI8R8 => Primitive::LongLong,
            _ => Primitive::Int,
        }
    }

    /// Primitive used for coordinates and field values
    pub fn real_kind(&self) -> Primitive {
        match self {
            Encoding::IeeeI4R8 | Encoding::IeeeI8R8 => Primitive::Double,
            _ => Primitive::Float,
        }
    }

    /// Canonical file type string written in the header
    pub fn type_name(&self) -> &'static str {
        match self {
            Encoding::Ascii => "ascii",
            Encoding::IeeeI4R4 => "ieeei4r4",
            Encoding::IeeeI4R8 => "ieeei4r8",
            Encoding::IeeeI8R4 => "ieeei8r4",
            Encoding::IeeeI8R8 => "ieeei8r8",
        }
    }
}

/// Binary value kinds that appear in a GMV file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Char,
    Int,
    Float,
    Double,
    LongLong,
}

impl Primitive {
    /// Width in bytes of a single value
    pub fn size(&self) -> usize {
        match self {
            Primitive::Char => 1,
            Primitive::Int | Primitive::Float => 4,
            Primitive::Double | Primitive::LongLong => 8,
        }
    }
}

/// Reverse the bytes of every `width`-sized element of `buf` in place
///
/// ```rust
/// # use gmvread::readers::swap_bytes;
/// let mut buf = [1, 2, 3, 4, 5, 6, 7, 8];
/// swap_bytes(&mut buf, 4);
/// assert_eq!(buf, [4, 3, 2, 1, 8, 7, 6, 5]);
/// ```
pub fn swap_bytes(buf: &mut [u8], width: usize) {
    if width < 2 {
        return;
    }
    for chunk in buf.chunks_exact_mut(width) {
        chunk.reverse();
    }
}

/// Stateful reader of primitive values from a single stream
pub struct Decoder {
    source: Box<dyn Source>,
    encoding: Encoding,
    /// Reverse multi-byte values read in binary
    swap: bool,
    /// Width of binary names, 8 or 32 bytes
    name_width: usize,
    /// Set when a binary read returned fewer bytes than requested
    short_read: bool,
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("encoding", &self.encoding)
            .field("swap", &self.swap)
            .field("name_width", &self.name_width)
            .field("short_read", &self.short_read)
            .finish()
    }
}

/// Stream handling
impl Decoder {
    pub fn new(source: Box<dyn Source>, encoding: Encoding, name_width: usize) -> Self {
        Self {
            source,
            encoding,
            swap: false,
            name_width,
            short_read: false,
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn is_swapped(&self) -> bool {
        self.swap
    }

    pub fn set_swap(&mut self, swap: bool) {
        self.swap = swap;
    }

    pub fn name_width(&self) -> usize {
        self.name_width
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.source.stream_position()?)
    }

    /// Move to an absolute byte offset, forgetting any earlier short read
    pub fn seek(&mut self, position: u64) -> Result<()> {
        self.source.seek(SeekFrom::Start(position))?;
        self.short_read = false;
        Ok(())
    }

    /// Total length of the stream in bytes
    pub fn len(&mut self) -> Result<u64> {
        let current = self.source.stream_position()?;
        let end = self.source.seek(SeekFrom::End(0))?;
        self.source.seek(SeekFrom::Start(current))?;
        Ok(end)
    }

    /// True once nothing but whitespace (ASCII) or nothing at all remains
    pub fn at_eof(&mut self) -> Result<bool> {
        if self.encoding.is_ascii() {
            self.skip_whitespace()?;
        }
        Ok(self.source.fill_buf()?.is_empty())
    }

    /// Fail if a binary read since the last check came up short
    pub fn check(&mut self, what: &str) -> Result<()> {
        if std::mem::take(&mut self.short_read) {
            return Err(GmvError::Io(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                f!("end of file while reading {what}"),
            )));
        }
        Ok(())
    }
}

/// Raw binary access
impl Decoder {
    /// Read as many bytes as possible into `buf`, zero filling the rest
    pub fn read_fully(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.source.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if filled < buf.len() {
            buf[filled..].fill(0);
            self.short_read = true;
        }
        Ok(filled)
    }

    /// Read `count` binary values of `kind`, swapped to native order if needed
    pub fn read_raw(&mut self, kind: Primitive, count: usize) -> Result<Vec<u8>> {
        let n_bytes = count
            .checked_mul(kind.size())
            .ok_or_else(|| GmvError::Memory(f!("{count} values of {:?}", kind)))?;
        let mut buf: Vec<u8> = zeroed(n_bytes, "binary buffer")?;
        self.read_fully(&mut buf)?;
        if self.swap {
            swap_bytes(&mut buf, kind.size());
        }
        Ok(buf)
    }

    /// Binary integers of either width widened into `out`
    fn fill_binary_ints(&mut self, kind: Primitive, out: &mut [i64]) -> Result<()> {
        let raw = self.read_raw(kind, out.len())?;
        for (value, chunk) in out.iter_mut().zip(raw.chunks_exact(kind.size())) {
            *value = match kind {
                Primitive::LongLong => i64::from_ne_bytes(to_array(chunk)),
                _ => i32::from_ne_bytes(to_array(chunk)) as i64,
            };
        }
        Ok(())
    }

    /// Binary reals of either width widened into `out`
    fn fill_binary_reals(&mut self, kind: Primitive, out: &mut [f64]) -> Result<()> {
        let raw = self.read_raw(kind, out.len())?;
        for (value, chunk) in out.iter_mut().zip(raw.chunks_exact(kind.size())) {
            *value = match kind {
                Primitive::Double => f64::from_ne_bytes(to_array(chunk)),
                _ => f32::from_ne_bytes(to_array(chunk)) as f64,
            };
        }
        Ok(())
    }
}

/// ASCII access
impl Decoder {
    fn skip_whitespace(&mut self) -> Result<()> {
        loop {
            let buf = self.source.fill_buf()?;
            if buf.is_empty() {
                return Ok(());
            }
            let n = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
            let exhausted = n == buf.len();
            self.source.consume(n);
            if !exhausted {
                return Ok(());
            }
        }
    }

    /// Next whitespace separated token, `None` at the end of the stream
    pub fn next_token(&mut self) -> Result<Option<String>> {
        self.skip_whitespace()?;
        let mut token: Vec<u8> = Vec::new();
        loop {
            let buf = self.source.fill_buf()?;
            if buf.is_empty() {
                break;
            }
            let n = buf.iter().take_while(|b| !b.is_ascii_whitespace()).count();
            token.extend_from_slice(&buf[..n]);
            let complete = n < buf.len();
            self.source.consume(n);
            if complete {
                break;
            }
        }
        if token.is_empty() {
            Ok(None)
        } else {
            Ok(Some(String::from_utf8_lossy(&token).into_owned()))
        }
    }

    fn expect_token(&mut self, what: &str) -> Result<String> {
        self.next_token()?
            .ok_or_else(|| GmvError::format(f!("unexpected end of file reading {what}")))
    }

    /// Parse tokens into `out`, zero filling everything after a failure
    fn fill_ascii<T: Default + Copy>(
        &mut self,
        out: &mut [T],
        what: &str,
        parse: fn(&str) -> Option<T>,
    ) -> Result<()> {
        for i in 0..out.len() {
            let failure = match self.next_token()? {
                Some(token) => match parse(&token) {
                    Some(value) => {
                        out[i] = value;
                        continue;
                    }
                    None => f!("invalid value \"{token}\" in {what}"),
                },
                None => f!("unexpected end of file in {what}"),
            };
            out[i..].fill(T::default());
            return Err(GmvError::Format(failure));
        }
        Ok(())
    }
}

/// Typed reads used by the record stream
impl Decoder {
    /// Next keyword, `None` once the stream is exhausted
    pub fn read_keyword(&mut self) -> Result<Option<String>> {
        if self.encoding.is_ascii() {
            return Ok(self.next_token()?.map(|t| t.to_ascii_lowercase()));
        }
        let mut buf = [0u8; 8];
        let n = self.read_fully(&mut buf)?;
        if n < buf.len() {
            self.short_read = false;
            return Ok(None);
        }
        Ok(Some(field_to_string(&buf).to_ascii_lowercase()))
    }

    /// Variable-style name using the file's name width
    pub fn read_name(&mut self, what: &str) -> Result<String> {
        let width = self.name_width;
        self.read_text(width, what)
    }

    /// Fixed-width text field (binary), or a single token (ASCII)
    pub fn read_text(&mut self, width: usize, what: &str) -> Result<String> {
        if self.encoding.is_ascii() {
            return self.expect_token(what);
        }
        let raw = {
            let mut buf: Vec<u8> = zeroed(width, what)?;
            self.read_fully(&mut buf)?;
            buf
        };
        self.check(what)?;
        Ok(field_to_string(&raw))
    }

    /// Counts, references and ids, in the file's index width
    pub fn read_indices(&mut self, n: usize, what: &str) -> Result<Vec<i64>> {
        let mut out: Vec<i64> = zeroed(n, what)?;
        match self.encoding {
            Encoding::Ascii => self.fill_ascii(&mut out, what, parsers::parse_integer)?,
            e => self.fill_binary_ints(e.index_kind(), &mut out)?,
        }
        self.check(what)?;
        Ok(out)
    }

    pub fn read_index(&mut self, what: &str) -> Result<i64> {
        Ok(self.read_indices(1, what)?[0])
    }

    /// Datatype codes, material numbers, flags: always 32-bit in binary
    pub fn read_codes(&mut self, n: usize, what: &str) -> Result<Vec<i32>> {
        let mut wide: Vec<i64> = zeroed(n, what)?;
        match self.encoding {
            Encoding::Ascii => self.fill_ascii(&mut wide, what, parsers::parse_integer)?,
            _ => self.fill_binary_ints(Primitive::Int, &mut wide)?,
        }
        self.check(what)?;
        wide.into_iter()
            .map(|v| {
                i32::try_from(v).map_err(|_| GmvError::format(f!("{v} out of range in {what}")))
            })
            .collect()
    }

    pub fn read_code(&mut self, what: &str) -> Result<i32> {
        Ok(self.read_codes(1, what)?[0])
    }

    /// Coordinates and field values, in the file's real width
    pub fn read_reals(&mut self, n: usize, what: &str) -> Result<Vec<f64>> {
        let mut out: Vec<f64> = zeroed(n, what)?;
        match self.encoding {
            Encoding::Ascii => self.fill_ascii(&mut out, what, parsers::parse_real)?,
            e => self.fill_binary_reals(e.real_kind(), &mut out)?,
        }
        self.check(what)?;
        Ok(out)
    }

    /// Values that are always 64-bit in binary, e.g. `probtime`
    pub fn read_double(&mut self, what: &str) -> Result<f64> {
        let mut out = [0.0f64];
        match self.encoding {
            Encoding::Ascii => self.fill_ascii(&mut out, what, parsers::parse_real)?,
            _ => self.fill_binary_reals(Primitive::Double, &mut out)?,
        }
        self.check(what)?;
        Ok(out[0])
    }

    /// A double-quoted path, as found after `fromfile`
    pub fn read_quoted(&mut self) -> Result<String> {
        let mut text = String::new();
        if self.encoding.is_ascii() {
            // the path may contain whitespace, so rejoin tokens until closed
            let mut token = self.expect_token("fromfile path")?;
            text.push_str(&token);
            while !(text.len() > 1 && token.ends_with('"')) {
                token = self.expect_token("fromfile path")?;
                text.push(' ');
                text.push_str(&token);
            }
        } else {
            // everything up to and including the closing quote
            let mut quotes = 0;
            let mut byte = [0u8; 1];
            while quotes < 2 {
                if self.read_fully(&mut byte)? == 0 {
                    self.short_read = false;
                    return Err(GmvError::format("unterminated fromfile path"));
                }
                if byte[0] == b'"' {
                    quotes += 1;
                }
                if quotes > 0 {
                    text.push(byte[0] as char);
                }
            }
        }
        let (_, path) = parsers::quoted_path(&text)
            .map_err(|_| GmvError::format(f!("malformed fromfile path {text}")))?;
        Ok(path.to_string())
    }

    /// Consume a `comments` block up to and including its `endcomm`
    pub fn skip_comments(&mut self) -> Result<()> {
        if self.encoding.is_ascii() {
            let mut line = String::new();
            loop {
                line.clear();
                if self.source.read_line(&mut line)? == 0 {
                    return Err(GmvError::format("end of file inside comments"));
                }
                if parsers::is_end_of_comments(&line) {
                    trace!("[Comment] end");
                    return Ok(());
                }
                trace!("[Comment] {}", line.trim_end());
            }
        }

        // binary comments are free text, so slide along until the marker
        let marker = b"endcomm";
        let mut window: Vec<u8> = Vec::with_capacity(marker.len());
        let mut byte = [0u8; 1];
        loop {
            if self.read_fully(&mut byte)? == 0 {
                self.short_read = false;
                return Err(GmvError::format("end of file inside comments"));
            }
            window.push(byte[0]);
            if window.len() > marker.len() {
                window.remove(0);
            }
            if window.as_slice() == marker {
                // the marker occupies a full 8-byte keyword field
                self.read_fully(&mut byte)?;
                self.short_read = false;
                return Ok(());
            }
        }
    }

    /// Look for `fromfile "path"` without consuming anything else
    pub fn peek_fromfile(&mut self) -> Result<Option<String>> {
        let start = self.position()?;
        match self.read_keyword()? {
            Some(word) if word == "fromfile" => Ok(Some(self.read_quoted()?)),
            _ => {
                self.seek(start)?;
                Ok(None)
            }
        }
    }
}

/// Fixed-size copy out of an exact chunk
fn to_array<const N: usize>(chunk: &[u8]) -> [u8; N] {
    let mut a = [0u8; N];
    a.copy_from_slice(chunk);
    a
}
