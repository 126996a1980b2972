//! Redirection of a keyword's data to another file
//!
//! A keyword may be followed by `fromfile "path"` instead of its data. The
//! referenced file is a complete GMV file of its own. It is opened, scanned
//! forward to the same keyword, and the data is read from there as if it
//! were inline. Once the keyword's block is complete the included file is
//! closed and reading carries on in the original file.
//!
//! Open streams are kept in a [StreamStack]. Only one level of inclusion is
//! allowed, so the stack never grows beyond the top-level file plus one
//! included file.

// internal modules
use crate::error::{GmvError, Result};
use crate::readers::decoder::Decoder;
use crate::readers::header;
use crate::readers::keywords::Keyword;
use crate::utils::{f, field_to_string};

// standard library
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

// external crates
use log::{debug, trace};

/// Maximum number of included files open at once
pub const MAX_DEPTH: usize = 1;

/// An open stream and why it was opened
#[derive(Debug)]
struct StreamContext {
    decoder: Decoder,
    /// File the stream reads from, `None` for in-memory data
    path: Option<PathBuf>,
    /// Keyword whose data is read from this stream, `None` for the top level
    keyword: Option<Keyword>,
}

/// Stack of open streams, the last one is the active one
#[derive(Debug)]
pub struct StreamStack {
    frames: Vec<StreamContext>,
    /// Directory relative `fromfile` paths are resolved against
    base_dir: PathBuf,
}

impl StreamStack {
    /// Start a stack from the top-level stream
    pub fn new(root: Decoder, path: Option<PathBuf>, base_dir: PathBuf) -> Self {
        Self {
            frames: vec![StreamContext {
                decoder: root,
                path,
                keyword: None,
            }],
            base_dir,
        }
    }

    /// The stream currently being read
    pub fn current(&mut self) -> &mut Decoder {
        let last = self.frames.len() - 1;
        &mut self.frames[last].decoder
    }

    /// Number of included files currently open
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn is_redirected(&self) -> bool {
        self.depth() > 0
    }

    /// Keyword being read from the included file, if any
    pub fn redirected_keyword(&self) -> Option<Keyword> {
        self.frames.last().and_then(|frame| frame.keyword)
    }

    /// Path of the stream currently being read
    pub fn current_path(&self) -> Option<&Path> {
        self.frames.last().and_then(|frame| frame.path.as_deref())
    }

    /// Resolve a `fromfile` path against the top-level file's directory
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match path.has_root() {
            true => path.to_path_buf(),
            false => self.base_dir.join(path),
        }
    }

    /// Open `path` and position it at the data of `keyword`
    ///
    /// Returns the keyword actually found, which for `nodes`/`nodev` may be
    /// either spelling since they only differ in layout.
    pub fn push(&mut self, path: &str, keyword: Keyword, require_endgmv: bool) -> Result<Keyword> {
        if self.depth() >= MAX_DEPTH {
            return Err(GmvError::format(f!(
                "nested fromfile \"{path}\" inside an included file is not supported"
            )));
        }

        let resolved = self.resolve(path);
        debug!("Reading {keyword} from {}", resolved.display());
        let file = File::open(&resolved).map_err(|e| {
            GmvError::format(f!("cannot open fromfile \"{}\": {e}", resolved.display()))
        })?;

        let mut decoder = header::open_stream(Box::new(BufReader::new(file)), require_endgmv)?;
        decoder.set_swap(self.current().is_swapped());
        let found = scan_to(&mut decoder, keyword)?.ok_or_else(|| {
            GmvError::format(f!("{keyword} not found in \"{}\"", resolved.display()))
        })?;

        self.frames.push(StreamContext {
            decoder,
            path: Some(resolved),
            keyword: Some(keyword),
        });
        Ok(found)
    }

    /// Close the included file, returning the keyword it was opened for
    ///
    /// Byte order is file-global, so a swap decision made while reading the
    /// included file carries over to the parent.
    pub fn pop(&mut self) -> Option<Keyword> {
        if !self.is_redirected() {
            return None;
        }
        let frame = self.frames.pop()?;
        let swapped = frame.decoder.is_swapped();
        self.current().set_swap(swapped);
        trace!("Closed included file for {:?}", frame.keyword);
        frame.keyword
    }
}

/// Move `decoder` to just after the first occurrence of `keyword`
fn scan_to(decoder: &mut Decoder, keyword: Keyword) -> Result<Option<Keyword>> {
    let accept = |token: &str| -> Option<Keyword> {
        let found = Keyword::from_token(token)?;
        let same = found == keyword
            || matches!(
                (found, keyword),
                (Keyword::Nodes, Keyword::NodeV) | (Keyword::NodeV, Keyword::Nodes)
            );
        same.then_some(found)
    };

    if decoder.encoding().is_ascii() {
        while let Some(token) = decoder.next_token()? {
            if let Some(found) = accept(&token) {
                return Ok(Some(found));
            }
        }
        return Ok(None);
    }

    // binary keywords can sit at any byte offset after arbitrary data
    let mut window = [0u8; 8];
    let mut byte = [0u8; 1];
    let mut filled = 0;
    loop {
        if decoder.read_fully(&mut byte)? == 0 {
            return Ok(None);
        }
        window.rotate_left(1);
        window[7] = byte[0];
        filled += 1;
        // fields are left aligned, so a leading blank is the tail of something else
        if filled >= window.len() && !window[0].is_ascii_whitespace() {
            if let Some(found) = accept(&field_to_string(&window)) {
                return Ok(Some(found));
            }
        }
    }
}
