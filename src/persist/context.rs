//! Save and load contexts.
//!
//! A model writes itself into a [`ModelSaveContext`]: a little-endian byte
//! stream stored under `"{dir}/model"` in a [`ModelRepository`]. Sub-models are
//! saved by name into their own directory `"{dir}/{name}"`, prefixed by the
//! loader signature the [`ComponentCatalog`](super::ComponentCatalog) uses to
//! find the right loader again.

use super::repository::ModelRepository;
use super::PersistError;
use crate::error::Result;

/// Name of the byte stream inside a model directory.
const STREAM: &str = "model";

/// Model signature and version written at the start of every model stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    pub signature: [u8; 8],
    pub version: u32,
    /// Oldest reader version able to read what this writer produces.
    pub min_reader_version: u32,
}

impl VersionInfo {
    pub const fn new(signature: [u8; 8], version: u32, min_reader_version: u32) -> Self {
        Self {
            signature,
            version,
            min_reader_version,
        }
    }

    fn signature_str(sig: &[u8; 8]) -> String {
        String::from_utf8_lossy(sig).into_owned()
    }
}

/// A model that can write itself into a save context.
pub trait SaveModel {
    /// Key under which the catalog registers this model's loader.
    fn loader_signature(&self) -> &'static str;

    fn save(&self, ctx: &mut ModelSaveContext<'_>) -> Result<()>;
}

// =============================================================================
// ModelSaveContext
// =============================================================================

/// Writer for one model directory.
pub struct ModelSaveContext<'r> {
    repo: &'r mut ModelRepository,
    dir: String,
    buf: Vec<u8>,
}

impl<'r> ModelSaveContext<'r> {
    pub fn new(repo: &'r mut ModelRepository, dir: impl Into<String>) -> Self {
        Self {
            repo,
            dir: dir.into(),
            buf: Vec::new(),
        }
    }

    /// Save `model` as the root model of `dir` and flush it to `repo`.
    pub fn save_root<M: SaveModel + ?Sized>(
        repo: &mut ModelRepository,
        dir: &str,
        model: &M,
    ) -> Result<()> {
        let mut ctx = ModelSaveContext::new(repo, dir);
        ctx.write_string(model.loader_signature());
        model.save(&mut ctx)?;
        ctx.finish();
        Ok(())
    }

    #[inline]
    pub fn dir(&self) -> &str {
        &self.dir
    }

    pub fn set_version_info(&mut self, info: &VersionInfo) {
        self.buf.extend_from_slice(&info.signature);
        self.write_u32(info.version);
        self.write_u32(info.min_reader_version);
    }

    #[inline]
    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    #[inline]
    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Boolean flag stored as an `i32` 0/1.
    pub fn write_bool_i32(&mut self, v: bool) {
        self.write_i32(i32::from(v));
    }

    pub fn write_i32_array(&mut self, values: &[i32]) {
        self.write_i32(values.len() as i32);
        for &v in values {
            self.write_i32(v);
        }
    }

    pub fn write_u32_array(&mut self, values: &[u32]) {
        self.write_i32(values.len() as i32);
        for &v in values {
            self.write_u32(v);
        }
    }

    pub fn write_f32_array(&mut self, values: &[f32]) {
        self.write_i32(values.len() as i32);
        for &v in values {
            self.write_f32(v);
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_i32(bytes.len() as i32);
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    /// Save a sub-model under `name`, relative to this context's directory.
    pub fn save_model<M: SaveModel + ?Sized>(&mut self, model: &M, name: &str) -> Result<()> {
        let dir = format!("{}/{}", self.dir, name);
        let mut sub = ModelSaveContext::new(&mut *self.repo, dir);
        sub.write_string(model.loader_signature());
        model.save(&mut sub)?;
        sub.finish();
        Ok(())
    }

    /// Store the written bytes in the repository.
    pub fn finish(self) {
        let name = format!("{}/{}", self.dir, STREAM);
        self.repo.insert(name, self.buf);
    }
}

// =============================================================================
// ModelLoadContext
// =============================================================================

/// Reader for one model directory.
pub struct ModelLoadContext<'r> {
    repo: &'r ModelRepository,
    dir: String,
    data: &'r [u8],
    pos: usize,
}

impl<'r> ModelLoadContext<'r> {
    /// Open the stream of `dir`.
    pub fn open(repo: &'r ModelRepository, dir: &str) -> std::result::Result<Self, PersistError> {
        let name = format!("{dir}/{STREAM}");
        let data = repo
            .get(&name)
            .ok_or_else(|| PersistError::MissingEntry(name.clone()))?;
        Ok(Self {
            repo,
            dir: dir.to_string(),
            data,
            pos: 0,
        })
    }

    #[inline]
    pub fn dir(&self) -> &str {
        &self.dir
    }

    #[inline]
    pub fn repository(&self) -> &'r ModelRepository {
        self.repo
    }

    /// Directory of sub-model `name`.
    pub fn sub_dir(&self, name: &str) -> String {
        format!("{}/{}", self.dir, name)
    }

    /// Returns true if sub-model `name` was saved.
    pub fn contains_model(&self, name: &str) -> bool {
        self.repo.contains(&format!("{}/{}", self.sub_dir(name), STREAM))
    }

    fn take(&mut self, n: usize) -> std::result::Result<&'r [u8], PersistError> {
        if self.data.len() - self.pos < n {
            return Err(PersistError::Truncated {
                expected: self.pos + n,
                actual: self.data.len(),
            });
        }
        let data = self.data;
        let out = &data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn take_array<const N: usize>(&mut self) -> std::result::Result<[u8; N], PersistError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Read and check the version header against `expected`.
    pub fn check_version_info(
        &mut self,
        expected: &VersionInfo,
    ) -> std::result::Result<u32, PersistError> {
        let signature: [u8; 8] = self.take_array()?;
        if signature != expected.signature {
            return Err(PersistError::SignatureMismatch {
                expected: VersionInfo::signature_str(&expected.signature),
                found: VersionInfo::signature_str(&signature),
            });
        }
        let version = self.read_u32()?;
        let min_reader = self.read_u32()?;
        if min_reader > expected.version {
            return Err(PersistError::UnsupportedVersion {
                found: version,
                supported: expected.version,
            });
        }
        Ok(version)
    }

    pub fn read_u8(&mut self) -> std::result::Result<u8, PersistError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_i32(&mut self) -> std::result::Result<i32, PersistError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> std::result::Result<u32, PersistError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> std::result::Result<u64, PersistError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub fn read_f32(&mut self) -> std::result::Result<f32, PersistError> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    pub fn read_bool_i32(&mut self) -> std::result::Result<bool, PersistError> {
        match self.read_i32()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(PersistError::CorruptPayload(format!(
                "expected a 0/1 flag, found {other}"
            ))),
        }
    }

    fn read_len(&mut self) -> std::result::Result<usize, PersistError> {
        let n = self.read_i32()?;
        usize::try_from(n)
            .map_err(|_| PersistError::CorruptPayload(format!("negative array length {n}")))
    }

    pub fn read_i32_array(&mut self) -> std::result::Result<Vec<i32>, PersistError> {
        let n = self.read_len()?;
        (0..n).map(|_| self.read_i32()).collect()
    }

    pub fn read_u32_array(&mut self) -> std::result::Result<Vec<u32>, PersistError> {
        let n = self.read_len()?;
        (0..n).map(|_| self.read_u32()).collect()
    }

    pub fn read_f32_array(&mut self) -> std::result::Result<Vec<f32>, PersistError> {
        let n = self.read_len()?;
        (0..n).map(|_| self.read_f32()).collect()
    }

    pub fn read_bytes(&mut self) -> std::result::Result<&'r [u8], PersistError> {
        let n = self.read_len()?;
        self.take(n)
    }

    pub fn read_string(&mut self) -> std::result::Result<String, PersistError> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| PersistError::CorruptPayload(format!("invalid utf-8 string: {e}")))
    }

    /// Bytes not consumed yet.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}
