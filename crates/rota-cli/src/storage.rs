//! [`LocalStorage`] persisted as a single JSON object on disk.

use std::{
  collections::BTreeMap,
  fs, io,
  path::PathBuf,
};

use rota_core::{Error, Result, local::LocalStorage};

/// Every write rewrites the whole file through a temporary sibling, so a
/// crash leaves either the old or the new contents.
#[derive(Debug)]
pub struct FileStorage {
  path:  PathBuf,
  blobs: BTreeMap<String, String>,
}

impl FileStorage {
  /// Open `path`, treating a missing file as empty.
  pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
    let path = path.into();
    let blobs = match fs::read_to_string(&path) {
      Ok(raw) => serde_json::from_str(&raw)?,
      Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
      Err(e) => return Err(io_error(e)),
    };
    Ok(Self { path, blobs })
  }

  fn flush(&self) -> Result<()> {
    let tmp = self.path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(&self.blobs)?).map_err(io_error)?;
    fs::rename(&tmp, &self.path).map_err(io_error)
  }
}

fn io_error(e: io::Error) -> Error { Error::LocalStorage(Box::new(e)) }

impl LocalStorage for FileStorage {
  fn get(&self, key: &str) -> Result<Option<String>> {
    Ok(self.blobs.get(key).cloned())
  }

  fn set(&mut self, key: &str, value: String) -> Result<()> {
    self.blobs.insert(key.to_owned(), value);
    self.flush()
  }

  fn remove(&mut self, key: &str) -> Result<()> {
    if self.blobs.remove(key).is_some() {
      self.flush()?;
    }
    Ok(())
  }
}
