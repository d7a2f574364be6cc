use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{KvError, KvResult};
use crate::traits::{Version, WriteOp};

/// One committed unit of work.
///
/// On-disk format:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized CommitRecord)]
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub seq: Version,
    pub ops: Vec<WriteOp>,
}

/// Flush/sync strategy for the WAL.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every commit (safest, highest latency).
    EveryWrite,
    /// Rely on OS page-cache buffering (fastest, least durable).
    #[default]
    OsDefault,
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: u64 = 8;

struct WalWriter {
    file: File,
    /// Current end of the valid log.
    offset: u64,
}

/// Crash-recoverable commit log.
///
/// Each commit is framed and written with a single `write_all`. Recovery
/// reads front-to-back and stops at the first frame that is short or fails
/// its CRC: everything after a torn write is discarded, so a commit is
/// replayed entirely or not at all, and commits are never replayed out of
/// order.
pub struct WriteAheadLog {
    path: PathBuf,
    writer: Mutex<WalWriter>,
    sync_mode: SyncMode,
}

impl WriteAheadLog {
    /// Open (or create) the log file at the given path.
    pub fn open(path: &Path, sync_mode: SyncMode) -> KvResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let offset = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(WalWriter { file, offset }),
            sync_mode,
        })
    }

    fn lock(&self) -> KvResult<MutexGuard<'_, WalWriter>> {
        self.writer
            .lock()
            .map_err(|e| KvError::Poisoned(e.to_string()))
    }

    /// Append a commit record. Returns the byte offset of its frame.
    ///
    /// If the write fails the file is cut back to its previous length so a
    /// half-written frame never precedes later commits.
    pub fn append(&self, record: &CommitRecord) -> KvResult<u64> {
        let payload =
            bincode::serialize(record).map_err(|e| KvError::Serialization(e.to_string()))?;
        let frame = frame(&payload)?;

        let mut w = self.lock()?;
        let entry_offset = w.offset;

        let mut written = w.file.write_all(&frame);
        if written.is_ok() && self.sync_mode == SyncMode::EveryWrite {
            written = w.file.sync_data();
        }
        if let Err(e) = written {
            if let Err(rollback) = w.file.set_len(entry_offset) {
                warn!(offset = entry_offset, error = %rollback, "failed to roll back partial WAL frame");
            }
            return Err(e.into());
        }

        w.offset += frame.len() as u64;
        debug!(offset = entry_offset, seq = record.seq, len = payload.len(), "WAL append");
        Ok(entry_offset)
    }

    /// Read every intact record and cut off a torn tail.
    pub fn recover(&self) -> KvResult<Vec<CommitRecord>> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let file_len = reader.get_ref().metadata()?.len();
        let mut records = Vec::new();
        let mut offset: u64 = 0;

        while offset + HEADER_SIZE <= file_len {
            let mut header = [0u8; HEADER_SIZE as usize];
            match reader.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            if length == 0 || offset + HEADER_SIZE + u64::from(length) > file_len {
                warn!(offset, length, file_len, "invalid WAL frame length; stopping recovery");
                break;
            }

            let mut payload = vec![0u8; length as usize];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    warn!(offset, "truncated WAL frame; stopping recovery");
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            let actual_crc = crc32fast::hash(&payload);
            if actual_crc != expected_crc {
                warn!(
                    offset,
                    expected = expected_crc,
                    actual = actual_crc,
                    "CRC mismatch; stopping recovery"
                );
                break;
            }

            match bincode::deserialize::<CommitRecord>(&payload) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(offset, error = %e, "undecodable WAL frame; stopping recovery");
                    break;
                }
            }

            offset += HEADER_SIZE + u64::from(length);
        }

        if offset < file_len {
            let mut w = self.lock()?;
            w.file.set_len(offset)?;
            w.offset = offset;
            warn!(
                discarded = file_len - offset,
                "discarded torn WAL tail"
            );
        }

        debug!(recovered = records.len(), "WAL recovery complete");
        Ok(records)
    }

    /// Atomically replace the log with the given records.
    ///
    /// The new log is written to a sibling file, synced, and renamed over the
    /// old one.
    pub fn rewrite(&self, records: &[CommitRecord]) -> KvResult<()> {
        let mut w = self.lock()?;
        let tmp_path = self.path.with_extension("wal.tmp");

        let mut len = 0u64;
        {
            let mut tmp = File::create(&tmp_path)?;
            for record in records {
                let payload = bincode::serialize(record)
                    .map_err(|e| KvError::Serialization(e.to_string()))?;
                let frame = frame(&payload)?;
                tmp.write_all(&frame)?;
                len += frame.len() as u64;
            }
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        w.file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        w.offset = len;
        debug!(records = records.len(), bytes = len, "WAL rewritten");
        Ok(())
    }

    /// Remove all data from the log.
    pub fn truncate(&self) -> KvResult<()> {
        let mut w = self.lock()?;
        w.file.set_len(0)?;
        w.file.sync_all()?;
        w.offset = 0;
        debug!("WAL truncated");
        Ok(())
    }

    /// Flush file contents to stable storage.
    pub fn sync(&self) -> KvResult<()> {
        let w = self.lock()?;
        w.file.sync_all()?;
        Ok(())
    }

    /// Current end of the valid log.
    pub fn offset(&self) -> KvResult<u64> {
        Ok(self.lock()?.offset)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn frame(payload: &[u8]) -> KvResult<Vec<u8>> {
    let length = u32::try_from(payload.len())
        .map_err(|_| KvError::Serialization(format!("commit record too large: {} bytes", payload.len())))?;
    let crc = crc32fast::hash(payload);

    let mut frame = Vec::with_capacity(HEADER_SIZE as usize + payload.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

impl std::fmt::Debug for WriteAheadLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteAheadLog")
            .field("path", &self.path)
            .field("sync_mode", &self.sync_mode)
            .finish()
    }
}
