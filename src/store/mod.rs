//! Recording storage
//!
//! Uploaded files live under `<data_dir>/uploads`. Metadata is an
//! append-only JSON-lines index (`recordings.jsonl`), loaded into memory at
//! startup and appended once per successful upload.

pub mod record;

pub use record::{RecordingRecord, UploadResponse};

use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::config::StorageConfig;
use crate::error::StorageError;

/// Attempts at finding a free file name before giving up
const MAX_NAME_ATTEMPTS: u32 = 100;

/// Longest sanitised name kept from the client
const MAX_NAME_LEN: usize = 200;

struct StoreIndex {
    /// Insertion order
    records: Vec<RecordingRecord>,
    next_id: u64,
}

/// An upload being written under its final name. Dropped without
/// [`RecordingStore::commit`], the partial file is removed.
pub struct PendingUpload {
    file: Option<File>,
    path: PathBuf,
    filename: String,
    created_at: DateTime<Utc>,
    written: u64,
    finished: bool,
}

impl PendingUpload {
    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        let file = self.file.as_mut().ok_or_else(|| {
            StorageError::Io(std::io::Error::new(ErrorKind::Other, "upload already closed"))
        })?;
        file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close and delete the partial file
    pub async fn abort(mut self) {
        self.finished = true;
        self.file.take();
        if let Err(e) = fs::remove_file(&self.path).await {
            tracing::warn!("Failed to remove partial upload {:?}: {}", self.path, e);
        }
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        if !self.finished {
            self.file.take();
            tracing::warn!("Upload into {:?} abandoned, removing", self.path);
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Durable file storage plus metadata index
pub struct RecordingStore {
    uploads_dir: PathBuf,
    index_path: PathBuf,
    index: RwLock<StoreIndex>,
}

impl RecordingStore {
    /// Open (or create) the store described by `config`
    pub async fn open(config: &StorageConfig) -> Result<Self, StorageError> {
        let uploads_dir = config.uploads_dir();
        let index_path = config.index_path();

        fs::create_dir_all(&uploads_dir).await?;
        let index = load_index(&index_path).await?;

        tracing::info!(
            recordings = index.records.len(),
            next_id = index.next_id,
            "Recording store opened at {:?}",
            config.data_dir
        );

        Ok(Self {
            uploads_dir,
            index_path,
            index: RwLock::new(index),
        })
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Persist an in-memory upload and record its metadata.
    pub async fn save(&self, data: &[u8], original_name: &str) -> Result<RecordingRecord, StorageError> {
        if data.is_empty() {
            return Err(StorageError::EmptyUpload);
        }

        let mut upload = self.begin_upload(original_name).await?;
        if let Err(e) = upload.write(data).await {
            upload.abort().await;
            return Err(e);
        }
        self.commit(upload).await
    }

    /// Open a new file for an upload that arrives in pieces
    pub async fn begin_upload(&self, original_name: &str) -> Result<PendingUpload, StorageError> {
        let created_at = Utc::now();
        let wanted = stored_file_name(created_at, original_name);
        let (file, path, filename) = self.create_file(&wanted).await?;

        tracing::debug!("Receiving upload into {:?}", path);
        Ok(PendingUpload {
            file: Some(file),
            path,
            filename,
            created_at,
            written: 0,
            finished: false,
        })
    }

    /// Sync a finished upload and append its index row.
    ///
    /// The file is synced before the row is written. If the row cannot be
    /// written, or nothing was uploaded, the file is removed again.
    pub async fn commit(&self, mut upload: PendingUpload) -> Result<RecordingRecord, StorageError> {
        if upload.written == 0 {
            upload.abort().await;
            return Err(StorageError::EmptyUpload);
        }
        if let Some(file) = upload.file.take() {
            if let Err(e) = file.sync_all().await {
                upload.abort().await;
                return Err(e.into());
            }
        }

        let inserted = self
            .insert(upload.filename.clone(), &upload.path, upload.written, upload.created_at)
            .await;

        match inserted {
            Ok(record) => {
                upload.finished = true;
                tracing::info!(id = record.id, bytes = record.filesize, "Stored recording {}", record.filename);
                Ok(record)
            }
            Err(e) => {
                tracing::error!("Index write failed, removing {:?}: {}", upload.path, e);
                upload.abort().await;
                Err(e)
            }
        }
    }

    /// All records, newest first. Equal timestamps keep the later upload first.
    pub async fn list(&self) -> Vec<RecordingRecord> {
        let mut records = self.index.read().await.records.clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        records
    }

    pub async fn get(&self, id: u64) -> Result<RecordingRecord, StorageError> {
        self.index
            .read()
            .await
            .records
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(StorageError::NotFound(id))
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.records.len()
    }

    async fn create_file(&self, name: &str) -> Result<(File, PathBuf, String), StorageError> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = if attempt == 0 {
                name.to_string()
            } else {
                with_suffix(name, attempt)
            };
            let path = self.uploads_dir.join(&candidate);

            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => return Ok((file, path, candidate)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(StorageError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free file name for {}", name),
        )))
    }

    async fn insert(
        &self,
        filename: String,
        path: &Path,
        filesize: u64,
        created_at: DateTime<Utc>,
    ) -> Result<RecordingRecord, StorageError> {
        let mut index = self.index.write().await;

        let record = RecordingRecord {
            id: index.next_id,
            filename,
            filepath: path.to_string_lossy().into_owned(),
            filesize,
            created_at,
        };

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.index_path)
            .await?;
        let committed = file.metadata().await?.len();

        if let Err(e) = append_synced(&mut file, line.as_bytes()).await {
            tracing::error!("Index append failed, rolling back to {} bytes: {}", committed, e);
            if let Err(undo) = file.set_len(committed).await {
                tracing::error!("Index rollback failed: {}", undo);
            }
            return Err(e.into());
        }

        index.next_id += 1;
        index.records.push(record.clone());
        Ok(record)
    }
}

async fn append_synced(file: &mut File, line: &[u8]) -> std::io::Result<()> {
    file.write_all(line).await?;
    file.sync_data().await
}

async fn load_index(path: &Path) -> Result<StoreIndex, StorageError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    // A row without its newline was never acknowledged
    let complete = bytes.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
    if complete < bytes.len() {
        tracing::warn!(bytes = bytes.len() - complete, "Dropping unterminated tail of index {:?}", path);
        let file = OpenOptions::new().write(true).open(path).await?;
        file.set_len(complete as u64).await?;
        file.sync_all().await?;
    }
    let text = String::from_utf8_lossy(&bytes[..complete]);

    let mut records: Vec<RecordingRecord> = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match RecordingRecord::from_index_line(line) {
            Ok(record) if records.iter().any(|r| r.id == record.id) => {
                tracing::warn!("Duplicate recording id {} at index line {}, skipped", record.id, n + 1);
            }
            Ok(record) => records.push(record),
            Err(reason) => {
                let err = StorageError::CorruptIndex { line: n + 1, reason };
                tracing::warn!("{}, skipped", err);
            }
        }
    }

    let next_id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
    Ok(StoreIndex { records, next_id })
}

/// `<unix-millis>_<sanitised original name>`
pub fn stored_file_name(at: DateTime<Utc>, original_name: &str) -> String {
    format!("{}_{}", at.timestamp_millis(), sanitize_file_name(original_name))
}

/// Reduce a client-supplied name to a safe single path component.
///
/// Whitespace runs become one `_`, anything outside `[A-Za-z0-9._-]`
/// becomes `_`, and leading dots are dropped.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or("");

    let mut out = String::with_capacity(base.len());
    let mut in_space = false;
    for c in base.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            out.push(c);
        } else {
            out.push('_');
        }
    }

    let trimmed: String = out.trim_start_matches('.').chars().take(MAX_NAME_LEN).collect();
    if trimmed.is_empty() {
        "recording.webm".to_string()
    } else {
        trimmed
    }
}

fn with_suffix(name: &str, n: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}-{}.{}", stem, n, ext),
        _ => format!("{}-{}", name, n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_in(dir: &Path) -> RecordingStore {
        RecordingStore::open(&StorageConfig::in_dir(dir)).await.unwrap()
    }

    #[tokio::test]
    async fn test_save_get_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(dir.path()).await;

        let first = store.save(b"first", "screen one.webm").await.unwrap();
        let second = store.save(b"second!", "screen two.webm").await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(first.filename.ends_with("_screen_one.webm"));
        assert_eq!(second.filesize, 7);
        assert_eq!(std::fs::read(&second.filepath).unwrap(), b"second!");

        assert_eq!(store.get(1).await.unwrap(), first);
        assert!(matches!(store.get(99).await, Err(StorageError::NotFound(99))));

        let listed: Vec<u64> = store.list().await.iter().map(|r| r.id).collect();
        assert_eq!(listed, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_reopen_recovers_index() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open_in(dir.path()).await;
            store.save(b"a", "a.webm").await.unwrap();
            store.save(b"b", "b.webm").await.unwrap();
        }

        let store = open_in(dir.path()).await;
        assert_eq!(store.len().await, 2);
        let third = store.save(b"c", "c.webm").await.unwrap();
        assert_eq!(third.id, 3);
    }

    #[tokio::test]
    async fn test_corrupt_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::in_dir(dir.path());
        std::fs::write(
            config.index_path(),
            concat!(
                r#"{"id":4,"filename":"x.webm","filepath":"/tmp/x.webm","filesize":1,"createdAt":"2024-01-01T00:00:00Z"}"#,
                "\n",
                "{not json\n",
                r#"{"id":5,"filename":"","filepath":"/tmp/y.webm","filesize":1,"createdAt":"2024-01-01T00:00:00Z"}"#,
                "\n",
            ),
        )
        .unwrap();

        let store = RecordingStore::open(&config).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.save(b"z", "z.webm").await.unwrap().id, 5);
    }

    #[tokio::test]
    async fn test_unterminated_index_tail_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::in_dir(dir.path());
        let valid = r#"{"id":1,"filename":"a.webm","filepath":"/tmp/a.webm","filesize":1,"createdAt":"2024-01-01T00:00:00Z"}"#;
        std::fs::write(config.index_path(), format!("{}\n{}", valid, r#"{"id":2,"filena"#)).unwrap();

        let store = RecordingStore::open(&config).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(std::fs::read_to_string(config.index_path()).unwrap(), format!("{}\n", valid));

        let saved = store.save(b"b", "b.webm").await.unwrap();
        assert_eq!(saved.id, 2);
        drop(store);

        let reopened = RecordingStore::open(&config).await.unwrap();
        assert_eq!(reopened.len().await, 2);
        assert_eq!(reopened.get(2).await.unwrap().filepath, saved.filepath);
    }

    #[tokio::test]
    async fn test_upload_written_in_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(dir.path()).await;

        let mut upload = store.begin_upload("clip.webm").await.unwrap();
        for chunk in [&b"abc"[..], b"", b"defg"] {
            upload.write(chunk).await.unwrap();
        }
        assert_eq!(upload.written(), 7);

        let record = store.commit(upload).await.unwrap();
        assert_eq!(record.filesize, 7);
        assert_eq!(std::fs::read(&record.filepath).unwrap(), b"abcdefg");
        assert_eq!(store.get(record.id).await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_abandoned_upload_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(dir.path()).await;

        let mut upload = store.begin_upload("a.webm").await.unwrap();
        upload.write(b"partial").await.unwrap();
        let path = upload.path().to_path_buf();
        upload.abort().await;
        assert!(!path.exists());

        let mut dropped = store.begin_upload("b.webm").await.unwrap();
        dropped.write(b"partial").await.unwrap();
        let path = dropped.path().to_path_buf();
        drop(dropped);
        assert!(!path.exists());

        let empty = store.begin_upload("c.webm").await.unwrap();
        assert!(matches!(store.commit(empty).await, Err(StorageError::EmptyUpload)));

        assert_eq!(std::fs::read_dir(store.uploads_dir()).unwrap().count(), 0);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_equal_timestamps_list_latest_insert_first() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::in_dir(dir.path());
        let row = |id: u64| {
            format!(
                r#"{{"id":{id},"filename":"{id}.webm","filepath":"/tmp/{id}.webm","filesize":1,"createdAt":"2024-05-01T12:00:00Z"}}"#
            )
        };
        let older = r#"{"id":9,"filename":"9.webm","filepath":"/tmp/9.webm","filesize":1,"createdAt":"2024-04-01T12:00:00Z"}"#;
        std::fs::write(
            config.index_path(),
            format!("{}\n{}\n{}\n", row(1), older, row(2)),
        )
        .unwrap();

        let store = RecordingStore::open(&config).await.unwrap();
        let ids: Vec<u64> = store.list().await.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1, 9]);
    }

    #[tokio::test]
    async fn test_empty_upload_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(dir.path()).await;

        assert!(matches!(store.save(b"", "a.webm").await, Err(StorageError::EmptyUpload)));
        assert_eq!(store.len().await, 0);
        assert_eq!(std::fs::read_dir(store.uploads_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failed_write_inserts_no_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(dir.path()).await;
        std::fs::remove_dir_all(store.uploads_dir()).unwrap();

        assert!(matches!(store.save(b"data", "a.webm").await, Err(StorageError::Io(_))));
        assert_eq!(store.len().await, 0);
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_name_collision_gets_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(dir.path()).await;
        std::fs::write(store.uploads_dir().join("clip.webm"), b"taken").unwrap();

        let (_file, path, name) = store.create_file("clip.webm").await.unwrap();
        assert_eq!(name, "clip-1.webm");
        assert_eq!(std::fs::read(store.uploads_dir().join("clip.webm")).unwrap(), b"taken");
        assert!(path.ends_with("clip-1.webm"));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("my  screen\trecording.webm"), "my_screen_recording.webm");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\clip.webm"), "clip.webm");
        assert_eq!(sanitize_file_name("..hidden"), "hidden");
        assert_eq!(sanitize_file_name("été.webm"), "_t_.webm");
        assert_eq!(sanitize_file_name(""), "recording.webm");
    }

    #[test]
    fn test_stored_name_has_timestamp_prefix() {
        let at = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(stored_file_name(at, "a b.webm"), "1704067200000_a_b.webm");
    }
}
