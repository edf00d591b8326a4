//! A credential store backed by a single JSON file

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::fs;

use super::{LoadError, PersistError, TokenStore};
use crate::StoredCredential;

/// A token store that keeps the record in a local file
///
/// Saves go to a uniquely named temporary file beside the target, which is
/// flushed and then renamed over it, so the file at `path` always holds either
/// the previous record or the new one in full.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Constructs a new file token store
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file holding the record
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_atomically(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // Removed on drop unless persisted
    let mut staged = tempfile::Builder::new()
        .prefix(".credentials")
        .suffix(".tmp")
        .tempfile_in(dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        staged
            .as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    staged.write_all(data)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<StoredCredential, LoadError> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(LoadError::NotFound),
            Err(err) => return Err(LoadError::Unreadable(err)),
        };

        serde_json::from_slice(&data).map_err(LoadError::Corrupt)
    }

    async fn save(&self, record: &StoredCredential) -> Result<(), PersistError> {
        let data = serde_json::to_vec(record).map_err(PersistError::Encode)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, &data))
            .await
            .map_err(|err| PersistError::Io(io::Error::new(io::ErrorKind::Other, err)))?
            .map_err(PersistError::Io)?;

        tracing::trace!(path = %self.path.display(), "persisted credential record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use stockgate_clock::{DurationSecs, UnixTime};

    use super::*;
    use crate::AccessToken;

    fn record(token: &'static str, expiry: u64) -> StoredCredential {
        StoredCredential::issue(AccessToken::from_static(token), UnixTime(expiry), DurationSecs(0))
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("zoho_tokens.json"));

        assert!(matches!(store.load().await, Err(LoadError::NotFound)));
    }

    #[tokio::test]
    async fn garbage_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zoho_tokens.json");
        std::fs::write(&path, b"{\"access_token\": \"T1\", \"expiry_ti").unwrap();

        let store = FileTokenStore::new(path);
        assert!(matches!(store.load().await, Err(LoadError::Corrupt(_))));
    }

    #[tokio::test]
    async fn record_missing_its_expiry_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zoho_tokens.json");
        std::fs::write(&path, br#"{"access_token": "T1"}"#).unwrap();

        let store = FileTokenStore::new(path);
        assert!(matches!(store.load().await, Err(LoadError::Corrupt(_))));
    }

    #[tokio::test]
    async fn directory_in_place_of_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path());

        assert!(matches!(store.load().await, Err(LoadError::Unreadable(_))));
    }

    #[tokio::test]
    async fn saved_record_loads_back_identically() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("zoho_tokens.json"));
        let saved = record("1000.a1b2c3", 1_700_003_600);

        store.save(&saved).await.unwrap();
        let loaded = store.load().await.unwrap();

        assert_eq!(loaded.access_token(), saved.access_token());
        assert_eq!(loaded.expiry_time(), saved.expiry_time());
    }

    #[tokio::test]
    async fn save_replaces_previous_record_and_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("zoho_tokens.json"));

        store.save(&record("T1", 100)).await.unwrap();
        store.save(&record("T2", 200)).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.access_token().as_str(), "T2");

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![OsString::from("zoho_tokens.json")]);
    }

    #[tokio::test]
    async fn failed_save_leaves_no_staging_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zoho_tokens.json");
        // a directory cannot be replaced by the staged file
        std::fs::create_dir(&path).unwrap();

        let result = FileTokenStore::new(&path).save(&record("T1", 100)).await;
        assert!(matches!(result, Err(PersistError::Io(_))));

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![OsString::from("zoho_tokens.json")]);
        assert!(path.is_dir());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn stores_sharing_a_path_save_concurrently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zoho_tokens.json");
        let first = FileTokenStore::new(&path);
        let second = FileTokenStore::new(&path);

        for round in 0..50 {
            let r1 = record("T1", round);
            let r2 = record("T2", round);
            let (a, b, loaded) = tokio::join!(
                first.save(&r1),
                second.save(&r2),
                first.load(),
            );
            a.unwrap();
            b.unwrap();
            match loaded {
                Ok(_) | Err(LoadError::NotFound) => {}
                Err(err) => panic!("read a damaged record: {err}"),
            }
        }

        let loaded = first.load().await.unwrap();
        assert!(["T1", "T2"].contains(&loaded.access_token().as_str()));

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![OsString::from("zoho_tokens.json")]);
    }

    #[tokio::test]
    async fn save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("absent").join("zoho_tokens.json"));

        let result = store.save(&record("T1", 100)).await;
        assert!(matches!(result, Err(PersistError::Io(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn saved_file_is_private_to_owner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zoho_tokens.json");
        FileTokenStore::new(&path)
            .save(&record("T1", 100))
            .await
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
