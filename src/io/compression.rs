//! Transparent decompression of compressed inputs.
//!
//! Inputs are often shipped as `data.csv.gz` or `data.tsv.zst`. The Row Source
//! opens every input through [`open_decompressed`], which picks a [`Codec`] from
//! the file extension first and falls back to the stream's magic bytes.
//!
//! Built-in codecs, each behind its own feature flag:
//! - **Gzip** (`.gz`, `.gzip`) via `flate2` (feature: `compression-gzip`)
//! - **Zstd** (`.zst`, `.zstd`) via `zstd` (feature: `compression-zstd`)
//! - **Bzip2** (`.bz2`, `.bzip2`) via `bzip2` (feature: `compression-bzip2`)
//! - **Xz** (`.xz`) via `xz2` (feature: `compression-xz`)
//!
//! A codec whose feature is disabled is never detected, so such a file is read
//! as-is (and will most likely fail as malformed text).

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// Supported input compression codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Gzip,
    Zstd,
    Bzip2,
    Xz,
}

impl Codec {
    /// Codecs compiled into this build, in detection order.
    pub fn enabled() -> impl Iterator<Item = Codec> {
        [Self::Gzip, Self::Zstd, Self::Bzip2, Self::Xz]
            .into_iter()
            .filter(|c| c.is_enabled())
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
        }
    }

    /// Lowercase extensions (with leading dot) associated with the codec.
    #[must_use]
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Gzip => &[".gz", ".gzip"],
            Self::Zstd => &[".zst", ".zstd"],
            Self::Bzip2 => &[".bz2", ".bzip2"],
            Self::Xz => &[".xz"],
        }
    }

    #[must_use]
    pub fn magic_bytes(self) -> &'static [u8] {
        match self {
            Self::Gzip => &[0x1f, 0x8b],
            Self::Zstd => &[0x28, 0xb5, 0x2f, 0xfd],
            Self::Bzip2 => b"BZh",
            Self::Xz => &[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00],
        }
    }

    #[must_use]
    pub fn is_enabled(self) -> bool {
        match self {
            Self::Gzip => cfg!(feature = "compression-gzip"),
            Self::Zstd => cfg!(feature = "compression-zstd"),
            Self::Bzip2 => cfg!(feature = "compression-bzip2"),
            Self::Xz => cfg!(feature = "compression-xz"),
        }
    }

    /// Detect a codec from the file name. Matching is case-insensitive.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let name = path.as_ref().to_string_lossy().to_lowercase();
        Self::enabled().find(|c| c.extensions().iter().any(|ext| name.ends_with(ext)))
    }

    /// Detect a codec by peeking at the start of a buffered stream.
    /// The reader is not advanced.
    pub fn from_magic<R: BufRead>(reader: &mut R) -> Option<Self> {
        let buf = reader.fill_buf().ok()?;
        Self::enabled().find(|c| buf.starts_with(c.magic_bytes()))
    }

    /// Wrap `reader` with the matching decoder.
    #[allow(unreachable_code, unused_variables)]
    pub fn wrap_reader(self, reader: Box<dyn Read + Send>) -> io::Result<Box<dyn Read + Send>> {
        match self {
            Self::Gzip => {
                #[cfg(feature = "compression-gzip")]
                return Ok(Box::new(flate2::read::MultiGzDecoder::new(reader)));
            }
            Self::Zstd => {
                #[cfg(feature = "compression-zstd")]
                return Ok(Box::new(zstd::stream::read::Decoder::new(reader)?));
            }
            Self::Bzip2 => {
                #[cfg(feature = "compression-bzip2")]
                return Ok(Box::new(bzip2::read::MultiBzDecoder::new(reader)));
            }
            Self::Xz => {
                #[cfg(feature = "compression-xz")]
                return Ok(Box::new(xz2::read::XzDecoder::new_multi_decoder(reader)));
            }
        }
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("{} support is not enabled in this build", self.name()),
        ))
    }
}

/// Strip a recognised compression suffix from a file name
/// (`data.csv.gz` → `data.csv`). Names without one are returned unchanged.
#[must_use]
pub fn strip_codec_extension(file_name: &str) -> &str {
    for codec in [Codec::Gzip, Codec::Zstd, Codec::Bzip2, Codec::Xz] {
        for ext in codec.extensions() {
            let Some(cut) = file_name.len().checked_sub(ext.len()) else {
                continue;
            };
            if cut > 0
                && file_name.is_char_boundary(cut)
                && file_name[cut..].eq_ignore_ascii_case(ext)
            {
                return &file_name[..cut];
            }
        }
    }
    file_name
}

/// Open `path` for reading, decompressing transparently when a codec is detected.
///
/// Detection strategy:
/// 1. Check the file extension (fast path)
/// 2. Fall back to magic bytes
/// 3. Return the buffered file as-is
///
/// # Errors
/// Returns the underlying I/O error if the file cannot be opened or the decoder
/// cannot be initialised.
pub fn open_decompressed(path: &Path) -> io::Result<Box<dyn Read + Send>> {
    let file = File::open(path)?;
    if let Some(codec) = Codec::from_path(path) {
        return codec.wrap_reader(Box::new(BufReader::new(file)));
    }
    let mut buffered = BufReader::new(file);
    if let Some(codec) = Codec::from_magic(&mut buffered) {
        return codec.wrap_reader(Box::new(buffered));
    }
    Ok(Box::new(buffered))
}
