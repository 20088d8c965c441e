//! On-disk token store
//!
//! Persists the credential record as JSON under the user's KeyRelay
//! directory. The store reads the file once at construction and serves
//! lookups from memory; callers that need to observe writes made by
//! another process call [`TokenStore::reload`] or the free
//! [`read_record`] function.

use std::fs;
use std::path::{Path, PathBuf};

use keyrelay_domain::{RelayError, Result};
use tracing::{debug, warn};

use crate::auth::types::{TokenRecord, TokenResponse};

/// Read and parse a credential record directly from disk.
///
/// Returns `None` when the file is missing, unreadable, or malformed.
/// Malformed contents are logged and treated the same as no record, so a
/// corrupted file degrades to "not authenticated" rather than an error.
#[must_use]
pub fn read_record(path: &Path) -> Option<TokenRecord> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read token file");
            return None;
        }
    };

    match serde_json::from_str(&contents) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "token file is malformed, ignoring");
            None
        }
    }
}

/// Expiry-aware credential store backed by a single JSON file.
#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    record: Option<TokenRecord>,
}

impl TokenStore {
    /// Open a store over the given file, loading whatever record is
    /// already there. A missing or malformed file yields an empty store.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let record = read_record(&path);
        Self { path, record }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a token response from a full authorization-code exchange.
    ///
    /// Stamps `issued_at` with the current time and replaces the in-memory
    /// record. Write failures are returned to the caller; the in-memory
    /// record is only updated after the file hits disk.
    pub fn save(&mut self, response: TokenResponse) -> Result<()> {
        let record = TokenRecord::from_response(response);
        self.write_record(&record)?;
        self.record = Some(record);
        debug!(path = %self.path.display(), "saved token record");
        Ok(())
    }

    /// Persist a token response from a refresh grant.
    ///
    /// Providers commonly omit the refresh token on refresh responses; the
    /// previous refresh token is carried forward so the session stays
    /// renewable.
    pub fn save_refreshed(&mut self, response: TokenResponse) -> Result<()> {
        let mut record = TokenRecord::from_response(response);
        if record.refresh_token.is_none() {
            record.refresh_token = self.record.as_ref().and_then(|r| r.refresh_token.clone());
        }
        self.write_record(&record)?;
        self.record = Some(record);
        debug!(path = %self.path.display(), "saved refreshed token record");
        Ok(())
    }

    /// The stored access token, provided it still has at least the expiry
    /// buffer left on its lifetime. An expired or missing token yields
    /// `None`; callers that need the raw record use [`TokenStore::record`].
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.record
            .as_ref()
            .filter(|r| r.is_valid())
            .map(|r| r.access_token.as_str())
    }

    /// The stored refresh token, if any.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.record.as_ref().and_then(|r| r.refresh_token.as_deref())
    }

    /// The full stored record, if any.
    #[must_use]
    pub fn record(&self) -> Option<&TokenRecord> {
        self.record.as_ref()
    }

    /// Whether [`TokenStore::access_token`] would return a token.
    #[must_use]
    pub fn has_valid_tokens(&self) -> bool {
        self.access_token().is_some()
    }

    /// Delete the token file and drop the in-memory record.
    ///
    /// Idempotent: clearing an already-empty store succeeds.
    pub fn clear(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(RelayError::Storage(format!(
                    "failed to delete token file {}: {err}",
                    self.path.display()
                )));
            }
        }
        self.record = None;
        debug!(path = %self.path.display(), "cleared token record");
        Ok(())
    }

    /// Re-read the backing file, picking up writes made outside this
    /// store instance.
    pub fn reload(&mut self) {
        self.record = read_record(&self.path);
    }

    /// Write the record atomically: serialize to a sibling temp file, then
    /// rename over the target so readers never see a partial write.
    fn write_record(&self, record: &TokenRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                RelayError::Storage(format!(
                    "failed to create token directory {}: {err}",
                    parent.display()
                ))
            })?;
        }

        let json = serde_json::to_string_pretty(record)
            .map_err(|err| RelayError::Storage(format!("failed to serialize tokens: {err}")))?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(|err| {
            RelayError::Storage(format!(
                "failed to write token file {}: {err}",
                tmp_path.display()
            ))
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|err| {
            RelayError::Storage(format!(
                "failed to move token file into place at {}: {err}",
                self.path.display()
            ))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(access: &str, refresh: Option<&str>, expires_in: i64) -> TokenResponse {
        TokenResponse {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
            id_token: None,
            token_type: "Bearer".to_string(),
            expires_in,
            scope: Some("openid email".to_string()),
        }
    }

    #[test]
    fn save_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let mut store = TokenStore::new(&path);
        assert!(store.access_token().is_none());
        assert!(!store.has_valid_tokens());

        store.save(response("access123", Some("refresh456"), 3600)).unwrap();
        assert_eq!(store.access_token(), Some("access123"));
        assert_eq!(store.refresh_token(), Some("refresh456"));
        assert!(store.has_valid_tokens());

        // A fresh store over the same path sees the persisted record
        let reopened = TokenStore::new(&path);
        assert_eq!(reopened.access_token(), Some("access123"));
        assert!(reopened.has_valid_tokens());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("tokens.json");

        let mut store = TokenStore::new(&path);
        store.save(response("access", None, 3600)).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn token_within_buffer_is_not_served() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let mut store = TokenStore::new(&path);
        // 60s lifetime is inside the 5-minute buffer, so never valid
        store.save(response("access", Some("refresh"), 60)).unwrap();
        assert!(!store.has_valid_tokens());
        assert!(store.access_token().is_none());
        // The record is still there, and the refresh token still usable
        assert_eq!(store.record().map(|r| r.access_token.as_str()), Some("access"));
        assert_eq!(store.refresh_token(), Some("refresh"));
    }

    #[test]
    fn save_refreshed_retains_previous_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let mut store = TokenStore::new(&path);
        store.save(response("access1", Some("refresh1"), 3600)).unwrap();

        // Refresh response without a refresh token keeps the old one
        store.save_refreshed(response("access2", None, 3600)).unwrap();
        assert_eq!(store.access_token(), Some("access2"));
        assert_eq!(store.refresh_token(), Some("refresh1"));

        // Refresh response with a rotated refresh token replaces it
        store.save_refreshed(response("access3", Some("refresh2"), 3600)).unwrap();
        assert_eq!(store.refresh_token(), Some("refresh2"));

        // The retained token is persisted, not just in memory
        let reopened = TokenStore::new(&path);
        assert_eq!(reopened.refresh_token(), Some("refresh2"));
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let mut store = TokenStore::new(&path);
        store.clear().unwrap();

        store.save(response("access", None, 3600)).unwrap();
        store.clear().unwrap();
        assert!(store.access_token().is_none());
        assert!(!path.exists());

        store.clear().unwrap();
    }

    #[test]
    fn malformed_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "{not json at all").unwrap();

        let store = TokenStore::new(&path);
        assert!(store.record().is_none());
        assert!(!store.has_valid_tokens());
        assert!(read_record(&path).is_none());
    }

    #[test]
    fn store_is_stale_until_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let mut writer = TokenStore::new(&path);
        let mut reader = TokenStore::new(&path);

        writer.save(response("access", None, 3600)).unwrap();

        // The other instance loaded at construction and does not see it
        assert!(reader.access_token().is_none());
        reader.reload();
        assert_eq!(reader.access_token(), Some("access"));
    }

    #[test]
    fn read_record_sees_latest_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        assert!(read_record(&path).is_none());

        let mut store = TokenStore::new(&path);
        store.save(response("fresh", None, 3600)).unwrap();

        let record = read_record(&path).unwrap();
        assert_eq!(record.access_token, "fresh");
    }
}
