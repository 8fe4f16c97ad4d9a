//! In-memory [`ManifestFs`] with fault injection.
//!
//! Every mutation stamps the file with a logical clock, one second per tick,
//! so later writes always have strictly newer modification times. Faults are
//! keyed by operation and exact path.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::traits::ManifestFs;

/// Filesystem operation, for fault targeting and call logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    /// [`ManifestFs::read`]
    Read,
    /// [`ManifestFs::modified`]
    Modified,
    /// [`ManifestFs::write`]
    Write,
    /// [`ManifestFs::rename`] (keyed by source path)
    Rename,
    /// [`ManifestFs::copy`] (keyed by destination path)
    Copy,
    /// [`ManifestFs::remove_file`]
    Remove,
    /// [`ManifestFs::create_dir_all`]
    CreateDir,
}

#[derive(Clone, Copy, Debug)]
enum FaultError {
    Kind(io::ErrorKind),
    Os(i32),
}

impl FaultError {
    fn to_io(self) -> io::Error {
        match self {
            Self::Kind(kind) => io::Error::from(kind),
            Self::Os(code) => io::Error::from_raw_os_error(code),
        }
    }
}

#[derive(Debug)]
struct Fault {
    op: Op,
    path: PathBuf,
    error: FaultError,
    remaining: Option<usize>,
}

#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    modified: SystemTime,
}

#[derive(Debug, Default)]
struct State {
    files: HashMap<PathBuf, Entry>,
    faults: Vec<Fault>,
    calls: Vec<(Op, PathBuf)>,
    clock: u64,
}

impl State {
    fn tick(&mut self) -> SystemTime {
        self.clock += 1;
        SystemTime::UNIX_EPOCH + Duration::from_secs(self.clock)
    }

    fn check(&mut self, op: Op, path: &Path) -> Result<(), io::Error> {
        self.calls.push((op, path.to_path_buf()));
        let Some(idx) = self.faults.iter().position(|f| f.op == op && f.path == path) else {
            return Ok(());
        };
        let fault = &mut self.faults[idx];
        let err = fault.error.to_io();
        let spent = match fault.remaining.as_mut() {
            Some(n) => {
                *n -= 1;
                *n == 0
            }
            None => false,
        };
        if spent {
            let _ = self.faults.remove(idx);
        }
        Err(err)
    }
}

/// In-memory filesystem for tests.
#[derive(Debug, Default)]
pub struct MemFs {
    state: Mutex<State>,
}

impl MemFs {
    /// Empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` at `path`, stamped with the next clock tick.
    pub fn insert(&self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) {
        let mut state = self.state.lock();
        let modified = state.tick();
        let _ = state.files.insert(
            path.into(),
            Entry {
                data: data.into(),
                modified,
            },
        );
    }

    /// Store `value` as JSON at `path`.
    pub fn insert_json(&self, path: impl Into<PathBuf>, value: &Value) {
        self.insert(path, value.to_string());
    }

    /// Override the modification time of an existing file.
    pub fn set_modified(&self, path: &Path, modified: SystemTime) {
        if let Some(entry) = self.state.lock().files.get_mut(path) {
            entry.modified = modified;
        }
    }

    /// Current contents of `path`.
    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        self.state.lock().files.get(path).map(|e| e.data.clone())
    }

    /// Current contents of `path` parsed as JSON.
    pub fn json(&self, path: &Path) -> Option<Value> {
        serde_json::from_slice(&self.contents(path)?).ok()
    }

    /// Whether a file exists at `path`.
    pub fn exists(&self, path: &Path) -> bool {
        self.state.lock().files.contains_key(path)
    }

    /// All stored file paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.state.lock().files.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Fail every `op` on `path` with `kind`.
    pub fn fail(&self, op: Op, path: impl Into<PathBuf>, kind: io::ErrorKind) {
        self.push_fault(op, path.into(), FaultError::Kind(kind), None);
    }

    /// Fail the next `op` on `path` with `kind`, then succeed.
    pub fn fail_once(&self, op: Op, path: impl Into<PathBuf>, kind: io::ErrorKind) {
        self.push_fault(op, path.into(), FaultError::Kind(kind), Some(1));
    }

    /// Fail every `op` on `path` with a raw OS error code.
    pub fn fail_os(&self, op: Op, path: impl Into<PathBuf>, code: i32) {
        self.push_fault(op, path.into(), FaultError::Os(code), None);
    }

    /// Paths passed to `op`, in call order.
    pub fn calls(&self, op: Op) -> Vec<PathBuf> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|(o, _)| *o == op)
            .map(|(_, p)| p.clone())
            .collect()
    }

    fn push_fault(&self, op: Op, path: PathBuf, error: FaultError, remaining: Option<usize>) {
        self.state.lock().faults.push(Fault {
            op,
            path,
            error,
            remaining,
        });
    }
}

#[async_trait]
impl ManifestFs for MemFs {
    async fn read(&self, path: &Path) -> Result<Vec<u8>, io::Error> {
        let mut state = self.state.lock();
        state.check(Op::Read, path)?;
        state
            .files
            .get(path)
            .map(|e| e.data.clone())
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    async fn modified(&self, path: &Path) -> Result<SystemTime, io::Error> {
        let mut state = self.state.lock();
        state.check(Op::Modified, path)?;
        state
            .files
            .get(path)
            .map(|e| e.modified)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), io::Error> {
        let mut state = self.state.lock();
        state.check(Op::Write, path)?;
        let modified = state.tick();
        let _ = state.files.insert(
            path.to_path_buf(),
            Entry {
                data: contents.to_vec(),
                modified,
            },
        );
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), io::Error> {
        let mut state = self.state.lock();
        state.check(Op::Rename, from)?;
        let entry = state
            .files
            .remove(from)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        let _ = state.files.insert(to.to_path_buf(), entry);
        Ok(())
    }

    async fn copy(&self, from: &Path, to: &Path) -> Result<(), io::Error> {
        let mut state = self.state.lock();
        state.check(Op::Copy, to)?;
        let data = state
            .files
            .get(from)
            .map(|e| e.data.clone())
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        let modified = state.tick();
        let _ = state
            .files
            .insert(to.to_path_buf(), Entry { data, modified });
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> Result<(), io::Error> {
        let mut state = self.state.lock();
        state.check(Op::Remove, path)?;
        state
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), io::Error> {
        self.state.lock().check(Op::CreateDir, path)
    }
}
