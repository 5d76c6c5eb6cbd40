use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use cairn_types::hash::HASH_LEN;
use cairn_types::Hash;
use header::FileHeader;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chunk::Chunk;
use crate::error::{ChunkError, ChunkResult};
use crate::traits::ChunkStore;
use crate::FORMAT_VERSION;

/// Configuration for a [`FileChunkStore`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStoreConfig {
    /// `fsync` the log at the end of every `flush`.
    pub sync_on_flush: bool,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            sync_on_flush: true,
        }
    }
}

/// Record prefix: 4 bytes payload length + 4 bytes CRC32 of hash and payload.
const RECORD_PREFIX: usize = 8;

/// Where a chunk's bytes live inside the log.
#[derive(Clone, Copy, Debug)]
struct Location {
    offset: u64,
    len: u32,
}

struct LogState {
    file: File,
    index: HashMap<Hash, Location>,
    /// Chunks put since the last flush, in put order.
    pending: Vec<Chunk>,
    pending_index: HashMap<Hash, usize>,
}

/// Chunk store backed by a single append-only log file.
///
/// On-disk format:
/// ```text
/// [8 bytes: magic "CAIRNLOG"]
/// [4 bytes: version length (little-endian u32)] [N bytes: version tag]
/// then, per chunk:
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of hash ++ payload (little-endian u32)]
/// [32 bytes: chunk hash]
/// [N bytes: payload]
/// ```
///
/// `put` only stages chunks in memory; `flush` appends them to the log.
/// Opening an existing log rebuilds the index by scanning it front to back.
/// A damaged record is skipped and scanning resumes at the next well-formed
/// one; only trailing bytes with no well-formed record after them are
/// truncated away. A failed append is rolled back to where it started.
pub struct FileChunkStore {
    path: PathBuf,
    version: String,
    config: FileStoreConfig,
    state: Mutex<LogState>,
}

impl FileChunkStore {
    /// Open (or create) the log at `path`.
    ///
    /// A new log is stamped with [`FORMAT_VERSION`]; an existing log keeps
    /// whatever version it was created with.
    pub fn open(path: &Path, config: FileStoreConfig) -> ChunkResult<Self> {
        Self::open_inner(path, config, FORMAT_VERSION)
    }

    /// Create a log stamped with an arbitrary version tag.
    ///
    /// Opening an existing log ignores `version`.
    pub fn open_with_version(
        path: &Path,
        config: FileStoreConfig,
        version: &str,
    ) -> ChunkResult<Self> {
        Self::open_inner(path, config, version)
    }

    fn open_inner(path: &Path, config: FileStoreConfig, new_version: &str) -> ChunkResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let file_len = file.metadata()?.len();
        let (version, end, index) = if file_len == 0 {
            let header = FileHeader::encode(new_version);
            file.write_all(&header)?;
            (new_version.to_string(), header.len() as u64, HashMap::new())
        } else {
            let (version, start) = FileHeader::read(&mut file)?;
            let (index, end) = replay(&mut file, start, file_len)?;
            (version, end, index)
        };

        // Replay only leaves bytes past `end` when no valid record follows
        // them, so dropping them loses nothing.
        if end < file.metadata()?.len() {
            warn!(path = %path.display(), end, "truncating torn chunk log tail");
            file.set_len(end)?;
        }

        debug!(path = %path.display(), chunks = index.len(), end, %version, "opened chunk log");

        Ok(Self {
            path: path.to_path_buf(),
            version,
            config,
            state: Mutex::new(LogState {
                file,
                index,
                pending: Vec::new(),
                pending_index: HashMap::new(),
            }),
        })
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of chunks durably in the log.
    pub fn durable_len(&self) -> usize {
        self.state.lock().expect("lock poisoned").index.len()
    }

    /// Number of chunks staged but not yet flushed.
    pub fn pending_len(&self) -> usize {
        self.state.lock().expect("lock poisoned").pending.len()
    }
}

impl ChunkStore for FileChunkStore {
    fn get(&self, hash: &Hash) -> ChunkResult<Option<Chunk>> {
        let mut state = self.state.lock().expect("lock poisoned");
        if let Some(&slot) = state.pending_index.get(hash) {
            return Ok(Some(state.pending[slot].clone()));
        }
        let Some(loc) = state.index.get(hash).copied() else {
            return Ok(None);
        };
        let mut data = vec![0u8; loc.len as usize];
        state.file.seek(SeekFrom::Start(loc.offset))?;
        state.file.read_exact(&mut data)?;
        let chunk = Chunk::from_parts(*hash, data);
        chunk.verify()?;
        Ok(Some(chunk))
    }

    fn has(&self, hash: &Hash) -> ChunkResult<bool> {
        let state = self.state.lock().expect("lock poisoned");
        Ok(state.pending_index.contains_key(hash) || state.index.contains_key(hash))
    }

    fn put(&self, chunk: Chunk) -> ChunkResult<()> {
        let mut state = self.state.lock().expect("lock poisoned");
        let hash = chunk.hash();
        if state.pending_index.contains_key(&hash) || state.index.contains_key(&hash) {
            return Ok(());
        }
        let slot = state.pending.len();
        state.pending.push(chunk);
        state.pending_index.insert(hash, slot);
        Ok(())
    }

    fn flush(&self) -> ChunkResult<()> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.pending.is_empty() {
            return Ok(());
        }

        // Records go wherever the file really ends, even if an earlier failed
        // flush left bytes behind.
        let start = state.file.seek(SeekFrom::End(0))?;
        let mut buf = Vec::new();
        let mut locations = Vec::with_capacity(state.pending.len());
        let mut offset = start;
        for chunk in &state.pending {
            let len = u32::try_from(chunk.len()).map_err(|_| ChunkError::CorruptLog {
                offset,
                reason: format!("chunk of {} bytes exceeds record limit", chunk.len()),
            })?;
            let mut crc = crc32fast::Hasher::new();
            crc.update(chunk.hash().as_bytes());
            crc.update(chunk.data());

            buf.extend_from_slice(&len.to_le_bytes());
            buf.extend_from_slice(&crc.finalize().to_le_bytes());
            buf.extend_from_slice(chunk.hash().as_bytes());
            buf.extend_from_slice(chunk.data());

            let data_offset = offset + (RECORD_PREFIX + HASH_LEN) as u64;
            locations.push((chunk.hash(), Location { offset: data_offset, len }));
            offset = data_offset + u64::from(len);
        }

        if let Err(e) = append(&mut state.file, &buf, self.config.sync_on_flush) {
            warn!(error = %e, start, "chunk log append failed; rolling back");
            if let Err(rollback) = state.file.set_len(start) {
                warn!(error = %rollback, start, "could not roll back partial chunk log append");
            }
            return Err(e.into());
        }

        let written = locations.len();
        state.index.extend(locations);
        state.pending.clear();
        state.pending_index.clear();

        debug!(chunks = written, bytes = buf.len(), end = offset, "flushed chunk log");
        Ok(())
    }

    fn version(&self) -> String {
        self.version.clone()
    }
}

impl std::fmt::Debug for FileChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileChunkStore")
            .field("path", &self.path)
            .field("version", &self.version)
            .finish()
    }
}

fn append(file: &mut File, buf: &[u8], sync: bool) -> io::Result<()> {
    file.write_all(buf)?;
    if sync {
        file.sync_data()?;
    }
    Ok(())
}

/// Scan records from `start`, returning the index and the offset one past
/// the last well-formed record.
///
/// A record that fails its checks is skipped by searching forward for the
/// next well-formed record, so damage in the middle of the log costs only
/// the damaged record. Bytes are left past the returned offset only when no
/// well-formed record follows them.
fn replay(file: &mut File, start: u64, file_len: u64) -> ChunkResult<(HashMap<Hash, Location>, u64)> {
    let mut index = HashMap::new();
    let mut offset = start;
    let mut end = start;

    while offset < file_len {
        if let Some((hash, loc)) = read_record(file, offset, file_len)? {
            index.insert(hash, loc);
            offset = loc.offset + u64::from(loc.len);
            end = offset;
            continue;
        }
        match resync(file, offset + 1, file_len)? {
            Some(next) => {
                warn!(offset, skipped = next - offset, "corrupt chunk record; skipping");
                offset = next;
            }
            None => {
                warn!(offset, file_len, "no readable chunk record after offset; stopping replay");
                break;
            }
        }
    }

    debug!(recovered = index.len(), end, "chunk log replay complete");
    Ok((index, end))
}

/// First offset at or after `from` holding a well-formed record.
fn resync(file: &mut File, from: u64, file_len: u64) -> ChunkResult<Option<u64>> {
    let last = file_len.saturating_sub((RECORD_PREFIX + HASH_LEN) as u64);
    for candidate in from..=last {
        if read_record(file, candidate, file_len)?.is_some() {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// Read the record at `offset` if it fits in the file and its CRC and
/// content hash both check out.
fn read_record(file: &mut File, offset: u64, file_len: u64) -> ChunkResult<Option<(Hash, Location)>> {
    let data_offset = offset + (RECORD_PREFIX + HASH_LEN) as u64;
    if data_offset > file_len {
        return Ok(None);
    }

    let mut prefix = [0u8; RECORD_PREFIX + HASH_LEN];
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(&mut prefix)?;

    let len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
    let expected_crc = u32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]);
    if data_offset + u64::from(len) > file_len {
        return Ok(None);
    }
    let hash = Hash::try_from(&prefix[RECORD_PREFIX..]).map_err(|e| ChunkError::CorruptLog {
        offset,
        reason: e.to_string(),
    })?;

    let mut data = vec![0u8; len as usize];
    file.read_exact(&mut data)?;

    let mut crc = crc32fast::Hasher::new();
    crc.update(hash.as_bytes());
    crc.update(&data);
    if crc.finalize() != expected_crc {
        return Ok(None);
    }
    if Chunk::from_parts(hash, data).verify().is_err() {
        return Ok(None);
    }
    Ok(Some((hash, Location { offset: data_offset, len })))
}

mod header {
    use std::fs::File;
    use std::io::{Read, Seek, SeekFrom};

    use crate::error::{ChunkError, ChunkResult};

    const MAGIC: &[u8; 8] = b"CAIRNLOG";

    /// Log header: magic, then a length-prefixed version tag.
    pub(super) struct FileHeader;

    impl FileHeader {
        pub(super) fn encode(version: &str) -> Vec<u8> {
            let mut buf = Vec::with_capacity(MAGIC.len() + 4 + version.len());
            buf.extend_from_slice(MAGIC);
            buf.extend_from_slice(&(version.len() as u32).to_le_bytes());
            buf.extend_from_slice(version.as_bytes());
            buf
        }

        /// Read the header, returning the version tag and the first record offset.
        pub(super) fn read(file: &mut File) -> ChunkResult<(String, u64)> {
            file.seek(SeekFrom::Start(0))?;
            let mut fixed = [0u8; 12];
            file.read_exact(&mut fixed).map_err(|_| ChunkError::CorruptLog {
                offset: 0,
                reason: "header too short".into(),
            })?;
            if &fixed[..8] != MAGIC {
                return Err(ChunkError::CorruptLog {
                    offset: 0,
                    reason: "bad magic".into(),
                });
            }
            let len = u32::from_le_bytes([fixed[8], fixed[9], fixed[10], fixed[11]]) as usize;
            let mut version = vec![0u8; len];
            file.read_exact(&mut version).map_err(|_| ChunkError::CorruptLog {
                offset: fixed.len() as u64,
                reason: "truncated version tag".into(),
            })?;
            let version = String::from_utf8(version).map_err(|e| ChunkError::CorruptLog {
                offset: fixed.len() as u64,
                reason: e.to_string(),
            })?;
            Ok((version, (fixed.len() + len) as u64))
        }
    }
}
