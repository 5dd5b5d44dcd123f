//! Line-oriented access to VCF files regardless of compression.
//!
//! Inputs are read sequentially and may be plain text, gzip or BGZF (or
//! stdin). The database must be seekable: plain files are addressed by byte
//! offset and BGZF files by virtual position. A database compressed with
//! ordinary gzip cannot be seeked, so it is decompressed once into a
//! temporary file that is then treated as plain text.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use noodles::bgzf;
use thiserror::Error;
use tracing::{debug, info};

/// Buffer size for large VCF files
const READ_BUFFER_CAPACITY: usize = 256 * 1024;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to open '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("The database cannot be read from stdin; it must be a seekable file")]
    StdinDatabase,
}

/// How a file on disk is compressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compressed {
    None,
    Gzip,
    Bgzf,
}

impl Compressed {
    /// Detect compression from the first bytes of a file.
    ///
    /// BGZF is gzip with the FEXTRA flag set and a `BC` extra subfield.
    #[must_use]
    pub fn from_magic(bytes: &[u8]) -> Self {
        if bytes.len() < 2 || bytes[..2] != GZIP_MAGIC {
            return Self::None;
        }
        let has_extra = bytes.len() > 3 && bytes[3] & 0x04 != 0;
        if has_extra && bytes.len() >= 14 && &bytes[12..14] == b"BC" {
            Self::Bgzf
        } else {
            Self::Gzip
        }
    }

    /// Sniff a file's compression.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be opened or read.
    pub fn detect(path: &Path) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let mut magic = [0u8; 18];
        let mut filled = 0;
        while filled < magic.len() {
            let n = file.read(&mut magic[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(Self::from_magic(&magic[..filled]))
    }
}

/// A line reader that can report and restore its position.
///
/// Offsets are opaque to callers: byte offsets for plain text, BGZF virtual
/// positions for block-compressed files. An offset obtained from
/// [`LineSource::offset`] before a read can be passed to
/// [`LineSource::seek_to`] to read the same line again.
pub trait LineSource {
    /// Offset of the next line to be read
    fn offset(&self) -> u64;

    /// Append the next line's raw bytes (with its terminator) to `buf`.
    /// Returns the number of bytes read; 0 at end of input. Lines are not
    /// checked for UTF-8 here so a bad byte only affects its own line.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the underlying read fails.
    fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<usize>;

    /// Reposition so the next read starts at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the underlying seek fails.
    fn seek_to(&mut self, offset: u64) -> io::Result<()>;
}

/// Uncompressed, seekable text addressed by byte offset
pub struct PlainLines<R> {
    inner: BufReader<R>,
    offset: u64,
}

impl<R: Read> PlainLines<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::with_capacity(READ_BUFFER_CAPACITY, inner),
            offset: 0,
        }
    }
}

impl<R: Read + Seek> LineSource for PlainLines<R> {
    fn offset(&self) -> u64 {
        self.offset
    }

    fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        let n = self.inner.read_until(b'\n', buf)?;
        self.offset += n as u64;
        Ok(n)
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        if offset != self.offset {
            // Stays inside the current buffer when the target is close by
            match i64::try_from(offset).ok().zip(i64::try_from(self.offset).ok()) {
                Some((to, from)) => self.inner.seek_relative(to - from)?,
                None => {
                    self.inner.seek(SeekFrom::Start(offset))?;
                }
            }
            self.offset = offset;
        }
        Ok(())
    }
}

/// BGZF text addressed by virtual position
pub struct BgzfLines<R> {
    inner: bgzf::Reader<R>,
}

impl<R: Read> BgzfLines<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: bgzf::Reader::new(inner),
        }
    }
}

impl<R: Read + Seek> LineSource for BgzfLines<R> {
    fn offset(&self) -> u64 {
        u64::from(self.inner.virtual_position())
    }

    fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        self.inner.read_until(b'\n', buf)
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        if offset != self.offset() {
            self.inner.seek(bgzf::VirtualPosition::from(offset))?;
        }
        Ok(())
    }
}

/// An open database reader
pub enum DatabaseReader {
    Plain(PlainLines<File>),
    Bgzf(BgzfLines<File>),
}

impl LineSource for DatabaseReader {
    fn offset(&self) -> u64 {
        match self {
            Self::Plain(r) => r.offset(),
            Self::Bgzf(r) => r.offset(),
        }
    }

    fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        match self {
            Self::Plain(r) => r.read_line(buf),
            Self::Bgzf(r) => r.read_line(buf),
        }
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        match self {
            Self::Plain(r) => r.seek_to(offset),
            Self::Bgzf(r) => r.seek_to(offset),
        }
    }
}

/// A database file ready to be opened any number of times.
///
/// Every matching worker opens its own reader so that no file position is
/// shared between threads.
#[derive(Debug)]
pub struct DatabaseSource {
    /// The path the user supplied
    path: PathBuf,
    /// The file actually read (differs for decompressed gzip)
    readable: PathBuf,
    compression: Compressed,
    /// Keeps a decompressed copy alive for the lifetime of the source
    _spill: Option<tempfile::TempPath>,
}

impl DatabaseSource {
    /// Inspect a database file and prepare it for seekable access.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::StdinDatabase` for `-`, `SourceError::Open` if
    /// the file cannot be read, or `SourceError::Io` if decompressing a
    /// gzip database fails.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        if path.as_os_str() == "-" {
            return Err(SourceError::StdinDatabase);
        }

        let compression = Compressed::detect(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        match compression {
            Compressed::None | Compressed::Bgzf => {
                debug!(path = %path.display(), ?compression, "Database is seekable");
                Ok(Self {
                    path: path.to_path_buf(),
                    readable: path.to_path_buf(),
                    compression,
                    _spill: None,
                })
            }
            Compressed::Gzip => {
                info!(
                    path = %path.display(),
                    "Database is gzip but not BGZF; decompressing to a temporary file"
                );
                let spill = decompress_to_temp(path)?;
                Ok(Self {
                    path: path.to_path_buf(),
                    readable: spill.to_path_buf(),
                    compression: Compressed::None,
                    _spill: Some(spill),
                })
            }
        }
    }

    /// The path the database was opened from
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compression of the file actually read
    #[must_use]
    pub fn compression(&self) -> Compressed {
        self.compression
    }

    /// Open a fresh, independent reader positioned at the start.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Open` if the file cannot be opened.
    pub fn reader(&self) -> Result<DatabaseReader, SourceError> {
        let file = File::open(&self.readable).map_err(|source| SourceError::Open {
            path: self.path.clone(),
            source,
        })?;
        Ok(match self.compression {
            Compressed::Bgzf => DatabaseReader::Bgzf(BgzfLines::new(file)),
            Compressed::None | Compressed::Gzip => DatabaseReader::Plain(PlainLines::new(file)),
        })
    }
}

/// Anything that can hand out independent, seekable readers over the same
/// database content.
pub trait OpenLines: Sync {
    type Source: LineSource;

    /// Open a new reader positioned at the start of the content.
    ///
    /// # Errors
    ///
    /// Returns a `SourceError` if the content cannot be opened.
    fn open_lines(&self) -> Result<Self::Source, SourceError>;
}

impl OpenLines for DatabaseSource {
    type Source = DatabaseReader;

    fn open_lines(&self) -> Result<Self::Source, SourceError> {
        self.reader()
    }
}

/// In-memory database content, mainly for tests and small tables
impl OpenLines for Vec<u8> {
    type Source = PlainLines<io::Cursor<Vec<u8>>>;

    fn open_lines(&self) -> Result<Self::Source, SourceError> {
        Ok(PlainLines::new(io::Cursor::new(self.clone())))
    }
}

fn decompress_to_temp(path: &Path) -> Result<tempfile::TempPath, SourceError> {
    let file = File::open(path).map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut decoder = flate2::read::MultiGzDecoder::new(BufReader::new(file));
    let mut spill = tempfile::NamedTempFile::new()?;
    {
        let mut writer = BufWriter::new(spill.as_file_mut());
        io::copy(&mut decoder, &mut writer)?;
        writer.flush()?;
    }
    Ok(spill.into_temp_path())
}

/// Open an input VCF for sequential reading. `-` reads stdin.
///
/// Gzip and BGZF input are detected from their magic bytes.
///
/// # Errors
///
/// Returns `SourceError::Open` if the file cannot be opened or sniffed.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead + Send>, SourceError> {
    let raw: Box<dyn Read + Send> = if path.as_os_str() == "-" {
        Box::new(io::stdin())
    } else {
        Box::new(File::open(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?)
    };

    let mut reader = BufReader::with_capacity(READ_BUFFER_CAPACITY, raw);
    let head = reader.fill_buf().map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    if Compressed::from_magic(head) == Compressed::None {
        Ok(Box::new(reader))
    } else {
        Ok(Box::new(BufReader::with_capacity(
            READ_BUFFER_CAPACITY,
            flate2::bufread::MultiGzDecoder::new(reader),
        )))
    }
}

/// Destination for the annotation table
pub enum OutputSink {
    Plain(BufWriter<Box<dyn Write + Send>>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl OutputSink {
    /// Open the output. `-` writes to stdout; a `.gz` suffix compresses.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Open` if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self, SourceError> {
        if path.as_os_str() == "-" {
            return Ok(Self::Plain(BufWriter::new(Box::new(io::stdout()))));
        }

        let file = File::create(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        if path.extension().is_some_and(|ext| ext == "gz") {
            Ok(Self::Gzip(GzEncoder::new(
                BufWriter::new(file),
                Compression::default(),
            )))
        } else {
            Ok(Self::Plain(BufWriter::new(Box::new(file))))
        }
    }

    /// Flush everything and write the gzip trailer if needed.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the final write fails.
    pub fn finish(self) -> io::Result<()> {
        match self {
            Self::Plain(mut w) => w.flush(),
            Self::Gzip(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
        }
    }
}
