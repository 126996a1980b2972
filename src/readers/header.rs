//! Encoding and byte-order detection
//!
//! Every GMV file starts with the magic `gmvinput` followed by a file type
//! string naming the encoding. ASCII files separate the two with whitespace,
//! binary files store the type in the next 8 bytes.
//!
//! The format has no byte-order mark. Whether binary values need swapping is
//! decided later, on the first node count, by [detect_swap]. That check is a
//! best-effort heuristic: it assumes the node block is directly followed by
//! `cells`, `faces`, `xfaces` or `endgmv`.

// internal modules
use crate::error::{GmvError, Result};
use crate::readers::decoder::{Decoder, Encoding, Primitive, Source};
use crate::readers::parsers;
use crate::utils::{f, field_to_string};

// standard library
use std::io::{Read, Seek, SeekFrom};

// external crates
use log::{debug, trace, warn};
use serde::Serialize;

/// Magic bytes at the start of every GMV file
pub const MAGIC: &[u8; 8] = b"gmvinput";

/// Number of trailing bytes searched for `endgmv`
pub const TRAILER_WINDOW: u64 = 20;

/// Node counts reserved for structured (-1), logically structured (-2) and
/// AMR (-3) grids
pub const NODE_SENTINELS: [i64; 3] = [-1, -2, -3];

/// Keywords expected straight after an unstructured node block
const PROBE_KEYWORDS: [&str; 4] = ["cells", "faces", "xfaces", "endgmv"];

/// Encoding and name width declared by the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileType {
    pub encoding: Encoding,
    /// `iecx` files use 32-character names
    pub wide_names: bool,
}

impl FileType {
    /// Width of a binary name field in bytes
    pub fn name_width(&self) -> usize {
        match self.wide_names {
            true => 32,
            false => 8,
        }
    }
}

/// Validate the header of `source` and return a decoder at the first keyword
pub fn open_stream(mut source: Box<dyn Source>, require_endgmv: bool) -> Result<Decoder> {
    source.seek(SeekFrom::Start(0))?;
    let mut head = Vec::with_capacity(64);
    source.by_ref().take(64).read_to_end(&mut head)?;

    let (file_type, data_start) = classify_header(&head)?;
    debug!(
        "File type {:?}{}",
        file_type.encoding,
        if file_type.wide_names {
            " with 32-character names"
        } else {
            ""
        }
    );

    if file_type.encoding.index_kind() == Primitive::LongLong && usize::BITS < 64 {
        return Err(GmvError::format(
            "64-bit integer files are not supported on this platform",
        ));
    }

    let mut decoder = Decoder::new(source, file_type.encoding, file_type.name_width());
    if !has_trailer(&mut decoder)? {
        if require_endgmv {
            return Err(GmvError::format("endgmv not found at the end of the file"));
        }
        warn!("endgmv not found at the end of the file");
    }
    decoder.seek(data_start)?;
    Ok(decoder)
}

/// Work out the file type from the first bytes of a file
///
/// Returns the type and the offset of the first keyword.
pub fn classify_header(head: &[u8]) -> Result<(FileType, u64)> {
    if head.len() < MAGIC.len() || &head[..MAGIC.len()] != MAGIC {
        return Err(GmvError::format("not a GMV file, gmvinput not found"));
    }

    // binary: the type occupies exactly the next 8 bytes
    if head.len() >= 16 {
        let field = field_to_string(&head[8..16]);
        if let Some((encoding, wide_names)) = parsers::classify_file_type(&field) {
            if !encoding.is_ascii() {
                return Ok((
                    FileType {
                        encoding,
                        wide_names,
                    },
                    16,
                ));
            }
        }
    }

    // ascii: whitespace then a token
    let rest = &head[8..];
    let skip = rest.iter().take_while(|b| b.is_ascii_whitespace()).count();
    let len = rest[skip..]
        .iter()
        .take_while(|b| !b.is_ascii_whitespace() && **b != 0)
        .count();
    let token = String::from_utf8_lossy(&rest[skip..skip + len]).into_owned();
    match parsers::classify_file_type(&token) {
        Some((Encoding::Ascii, _)) => Ok((
            FileType {
                encoding: Encoding::Ascii,
                wide_names: false,
            },
            (8 + skip + len) as u64,
        )),
        _ => Err(GmvError::format(f!("unrecognised GMV file type \"{token}\""))),
    }
}

/// Look for `endgmv` in the last few bytes, leaving the position untouched
pub fn has_trailer(decoder: &mut Decoder) -> Result<bool> {
    let position = decoder.position()?;
    let len = decoder.len()?;
    let start = len.saturating_sub(TRAILER_WINDOW);
    decoder.seek(start)?;
    let mut tail = vec![0u8; (len - start) as usize];
    decoder.read_fully(&mut tail)?;
    decoder.seek(position)?;
    Ok(tail.windows(6).any(|w| w == b"endgmv"))
}

/// Decide whether binary values must be byte swapped
///
/// Called with the decoder positioned just after the raw node count of an
/// unstructured `nodes` block. Sentinels, and counts below `threshold` whose
/// coordinates fit in the rest of the stream, are trusted as they are.
/// Anything else is suspicious, so the position where the next keyword would
/// land for that count is probed. If no expected keyword is there, the
/// integers are assumed to be swapped.
///
/// A swapped multiple of 256 reads as a count below the threshold, which is
/// why the remaining length is checked as well.
///
/// This can be fooled by files where another keyword follows the node block.
pub fn detect_swap(decoder: &mut Decoder, raw_count: i64, threshold: i64) -> Result<bool> {
    if decoder.encoding().is_ascii() || decoder.is_swapped() {
        return Ok(false);
    }
    if NODE_SENTINELS.contains(&raw_count) {
        return Ok(false);
    }
    if (0..threshold).contains(&raw_count) && nodes_fit(decoder, raw_count as u64)? {
        return Ok(false);
    }

    trace!("Probing suspicious node count {raw_count}");
    if raw_count >= 0 && keyword_follows(decoder, raw_count as u64)? {
        debug!("Large node count {raw_count} confirmed by the following keyword");
        return Ok(false);
    }
    debug!("Node count {raw_count} looks byte swapped");
    Ok(true)
}

/// Reinterpret a count read before swapping was switched on
pub fn swap_count(raw: i64, kind: Primitive) -> i64 {
    match kind {
        Primitive::LongLong => raw.swap_bytes(),
        _ => (raw as i32).swap_bytes() as i64,
    }
}

/// Do `count` nodes of x, y, z fit in what is left of the stream?
fn nodes_fit(decoder: &mut Decoder, count: u64) -> Result<bool> {
    let remaining = decoder.len()?.saturating_sub(decoder.position()?);
    let real_size = decoder.encoding().real_kind().size() as u64;
    Ok(count
        .checked_mul(3 * real_size)
        .is_some_and(|bytes| bytes <= remaining))
}

/// Is one of the expected keywords right after `count` nodes of x, y, z?
fn keyword_follows(decoder: &mut Decoder, count: u64) -> Result<bool> {
    let position = decoder.position()?;
    let real_size = decoder.encoding().real_kind().size() as u64;
    let target = count
        .checked_mul(3 * real_size)
        .and_then(|bytes| bytes.checked_add(position));
    let Some(target) = target else {
        return Ok(false);
    };
    if target.saturating_add(8) > decoder.len()? {
        return Ok(false);
    }

    decoder.seek(target)?;
    let mut word = [0u8; 8];
    decoder.read_fully(&mut word)?;
    decoder.seek(position)?;

    let word = field_to_string(&word).to_ascii_lowercase();
    Ok(PROBE_KEYWORDS.contains(&word.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    #[rstest]
    #[case(b"gmvinput ascii\nnodes".to_vec(), Encoding::Ascii, false, 14)]
    #[case(b"gmvinput\n\tASCII nodes".to_vec(), Encoding::Ascii, false, 15)]
    #[case(b"gmvinputieee    nodes   ".to_vec(), Encoding::IeeeI4R4, false, 16)]
    #[case(b"gmvinputieeei8r8nodes   ".to_vec(), Encoding::IeeeI8R8, false, 16)]
    #[case(b"gmvinputiecxi4r8nodes   ".to_vec(), Encoding::IeeeI4R8, true, 16)]
    fn headers(
        #[case] head: Vec<u8>,
        #[case] encoding: Encoding,
        #[case] wide: bool,
        #[case] start: u64,
    ) {
        let (ft, offset) = classify_header(&head).unwrap();
        assert_eq!(ft.encoding, encoding);
        assert_eq!(ft.wide_names, wide);
        assert_eq!(offset, start);
    }

    #[rstest]
    #[case(b"gmvoutput ascii".to_vec())]
    #[case(b"gmvinput ebcdic".to_vec())]
    #[case(b"gmvinputieeei4r2".to_vec())]
    #[case(b"gmv".to_vec())]
    fn bad_headers(#[case] head: Vec<u8>) {
        assert!(matches!(classify_header(&head), Err(GmvError::Format(_))));
    }

    #[test]
    fn trailer_required() {
        let source = Box::new(Cursor::new(b"gmvinput ascii\nnodes 0\n".to_vec()));
        assert!(open_stream(source, true).is_err());

        let source = Box::new(Cursor::new(b"gmvinput ascii\nnodes 0\n".to_vec()));
        assert!(open_stream(source, false).is_ok());

        let source = Box::new(Cursor::new(b"gmvinput ascii\nendgmv\n".to_vec()));
        let mut d = open_stream(source, true).unwrap();
        assert_eq!(d.read_keyword().unwrap().as_deref(), Some("endgmv"));
    }

    #[test]
    fn count_swapping() {
        assert_eq!(swap_count(0x0400_0000, Primitive::Int), 4);
        assert_eq!(swap_count(4i64.swap_bytes(), Primitive::LongLong), 4);
    }

    /// Binary stream positioned after a node count, followed by `n` nodes
    fn node_block(n: usize, keyword: &[u8; 8]) -> Decoder {
        let mut bytes = vec![0u8; n * 3 * 4];
        bytes.extend_from_slice(keyword);
        Decoder::new(Box::new(Cursor::new(bytes)), Encoding::IeeeI4R4, 8)
    }

    #[test]
    fn small_counts_are_trusted() {
        let mut d = node_block(3, b"cells   ");
        assert!(!detect_swap(&mut d, 3, 100).unwrap());
        assert!(!detect_swap(&mut d, -1, 100).unwrap());
    }

    #[test]
    fn large_count_confirmed_by_probe() {
        let mut d = node_block(12, b"cells   ");
        assert!(!detect_swap(&mut d, 12, 10).unwrap());
        assert_eq!(d.position().unwrap(), 0);
    }

    #[test]
    fn count_past_end_of_stream_is_swapped() {
        // 256 nodes swapped in 32 bits read as 65536
        let mut d = node_block(256, b"cells   ");
        assert!(!detect_swap(&mut d, 256, 1 << 24).unwrap());
        assert!(detect_swap(&mut d, 65536, 1 << 24).unwrap());
        assert_eq!(d.position().unwrap(), 0);
    }

    #[test]
    fn large_count_without_keyword_is_swapped() {
        let mut d = node_block(12, b"material");
        assert!(detect_swap(&mut d, 12, 10).unwrap());
        assert!(detect_swap(&mut d, -5, 10).unwrap());
    }
}
