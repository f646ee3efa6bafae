use std::fmt::Write as _;
use std::{fs, io, path};

use modstore_core_store::{Error, Key, Reader, Record, Writer};
use modstore_serde_store::JsonCodec;

/// Errors raised while opening a local store.
#[derive(Debug, thiserror::Error)]
pub enum LocalStoreError {
    #[error("store root path ({}) is invalid: {error}", .path.display())]
    RootPathInvalid {
        path: path::PathBuf,
        #[source]
        error: io::Error,
    },

    #[error("no platform data directory is available")]
    NoDataDir,
}

/// A backend that keeps each key in its own `<key>.json` file under a root
/// directory.
///
/// Keys may hold any character, so file names are escaped: identifier
/// characters pass through, as do `-` and `.` after the first character, and
/// every other byte is written as `%XX`. `"User Settings"` lives in
/// `User%20Settings.json`.
///
/// Reads hand back raw JSON records; decoding (and noticing corruption) is
/// left to the reader. Parsed records are encoded with `JsonCodec` on write.
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crashed write never leaves a half-written record behind.
pub struct JsonLocalStore {
    root: path::PathBuf,
}

impl JsonLocalStore {
    pub fn open(root: path::PathBuf) -> Result<JsonLocalStore, LocalStoreError> {
        let attr = fs::metadata(&root).map_err(|error| LocalStoreError::RootPathInvalid {
            path: root.clone(),
            error,
        })?;

        if !attr.is_dir() {
            return Err(LocalStoreError::RootPathInvalid {
                path: root,
                error: io::Error::other("Root path must be a directory."),
            });
        }

        if attr.permissions().readonly() {
            return Err(LocalStoreError::RootPathInvalid {
                path: root,
                error: io::Error::other("Root directory must be writable"),
            });
        }

        match root.canonicalize() {
            Ok(root) => Ok(JsonLocalStore { root }),
            Err(error) => Err(LocalStoreError::RootPathInvalid { path: root, error }),
        }
    }

    /// Open (creating if needed) `<platform data dir>/<app>` as the root.
    pub fn open_in_data_dir(app: &str) -> Result<JsonLocalStore, LocalStoreError> {
        let root = dirs::data_local_dir()
            .ok_or(LocalStoreError::NoDataDir)?
            .join(app);
        fs::create_dir_all(&root).map_err(|error| LocalStoreError::RootPathInvalid {
            path: root.clone(),
            error,
        })?;
        Self::open(root)
    }

    pub fn root(&self) -> &path::Path {
        &self.root
    }

    fn key_to_file_path(&self, key: &Key) -> path::PathBuf {
        self.root.join(format!("{}.json", file_stem(key)))
    }
}

/// Escape a key into a file stem that cannot leave the root or collide with
/// another key.
fn file_stem(key: &Key) -> String {
    let mut stem = String::with_capacity(key.as_str().len());
    for (i, c) in key.as_str().chars().enumerate() {
        let plain = match c {
            '-' | '.' => i > 0,
            _ => unicode_ident::is_xid_continue(c),
        };
        if plain {
            stem.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                let _ = write!(stem, "%{:02X}", byte);
            }
        }
    }
    stem
}

impl Reader for JsonLocalStore {
    fn read(&mut self, from: &Key) -> Result<Option<Record>, Error> {
        let file_path = self.key_to_file_path(from);
        log::debug!("Reading {}...", file_path.display());

        match fs::read(&file_path) {
            Ok(bytes) => Ok(Some(Record::raw(bytes))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::Io(err)),
        }
    }
}

impl Writer for JsonLocalStore {
    fn write(&mut self, to: &Key, data: Record) -> Result<Key, Error> {
        let file_path = self.key_to_file_path(to);
        log::debug!("Writing {}...", file_path.display());

        let bytes = data.into_bytes(&JsonCodec)?;

        let tmp_path = file_path.with_extension("json.tmp");
        fs::write(&tmp_path, &bytes)?;
        fs::rename(&tmp_path, &file_path)?;

        Ok(to.clone())
    }
}
