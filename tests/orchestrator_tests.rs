use std::sync::Arc;
use std::time::Duration;

use async_compression::tokio::bufread::GzipDecoder;
use file_depot::cache::Cache;
use file_depot::folders::InMemoryFolderDirectory;
use file_depot::object_store::{BodyReader, LocalStore, ObjectStore};
use file_depot::store::models::{FileAction, FilePatch, Patch};
use file_depot::store::{CachedStore, Database};
use file_depot::{Error, FileOrchestrator, NewFileRequest};
use tokio::io::{AsyncReadExt, BufReader};

struct Harness {
    _dir: tempfile::TempDir,
    orchestrator: FileOrchestrator,
    objects: Arc<LocalStore>,
    folders: Arc<InMemoryFolderDirectory>,
}

fn harness() -> Harness {
    harness_with_threshold(5)
}

fn harness_with_threshold(flag_threshold: u32) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    let cache = Arc::new(Cache::new(Duration::from_secs(60)));
    let objects = Arc::new(LocalStore::new(dir.path().join("blobs")).unwrap());
    let folders = Arc::new(InMemoryFolderDirectory::new());

    let orchestrator = FileOrchestrator::new(
        CachedStore::new(db, cache),
        objects.clone(),
        folders.clone(),
        flag_threshold,
    );

    Harness {
        _dir: dir,
        orchestrator,
        objects,
        folders,
    }
}

fn body(data: &[u8]) -> BodyReader {
    Box::new(std::io::Cursor::new(data.to_vec()))
}

fn upload(name: &str, file_name: &str) -> NewFileRequest {
    NewFileRequest {
        name: name.to_string(),
        file_name: file_name.to_string(),
        folder_id: None,
        compress: false,
    }
}

async fn read_all(mut reader: BodyReader) -> Vec<u8> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await.unwrap();
    buf
}

#[tokio::test]
async fn test_create_and_get_file() {
    let h = harness();

    let file = h
        .orchestrator
        .create_file("owner-a", upload("vacation", "beach.png"), body(b"png"))
        .await
        .unwrap();

    assert_eq!(file.owner_id, "owner-a");
    assert_eq!(file.name, "vacation");
    assert!(file.storage_key.ends_with("-beach.png"));
    assert!(h.objects.exists(&file.storage_key).await.unwrap());

    let fetched = h.orchestrator.get_file(&file.id).await.unwrap();
    assert_eq!(fetched.id, file.id);
}

#[tokio::test]
async fn test_create_file_name_conflict_same_owner_only() {
    let h = harness();
    h.orchestrator
        .create_file("owner-a", upload("vacation", "a.png"), body(b"a"))
        .await
        .unwrap();

    let err = h
        .orchestrator
        .create_file("owner-a", upload("vacation", "b.png"), body(b"b"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // A different owner can reuse the name.
    h.orchestrator
        .create_file("owner-b", upload("vacation", "c.png"), body(b"c"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_file_unknown_folder() {
    let h = harness();

    let request = NewFileRequest {
        folder_id: Some("no-such-folder".to_string()),
        ..upload("vacation", "beach.png")
    };
    let err = h
        .orchestrator
        .create_file("owner-a", request, body(b"png"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_create_file_in_folder() {
    let h = harness();
    h.folders.insert("folder-1");

    let request = NewFileRequest {
        folder_id: Some("folder-1".to_string()),
        ..upload("vacation", "beach.png")
    };
    let file = h
        .orchestrator
        .create_file("owner-a", request, body(b"png"))
        .await
        .unwrap();
    assert_eq!(file.folder_id, Some("folder-1".to_string()));
}

#[tokio::test]
async fn test_create_file_compressed() {
    let h = harness();

    let request = NewFileRequest {
        compress: true,
        ..upload("notes", "notes.txt")
    };
    let payload = b"hello hello hello hello hello".repeat(100);
    let file = h
        .orchestrator
        .create_file("owner-a", request, body(&payload))
        .await
        .unwrap();

    assert!(file.storage_key.ends_with(".txt.gz"));

    // The stored blob is gzip and decodes back to the original bytes.
    let object = h.objects.get(&file.storage_key, None).await.unwrap();
    let stored = read_all(object.reader).await;
    assert_eq!(&stored[..2], &[0x1f, 0x8b]);

    let mut decoder = GzipDecoder::new(BufReader::new(std::io::Cursor::new(stored)));
    let mut decoded = Vec::new();
    decoder.read_to_end(&mut decoded).await.unwrap();
    assert_eq!(decoded, payload);
}

#[tokio::test]
async fn test_get_file_not_found() {
    let h = harness();
    let err = h.orchestrator.get_file("nonexistent").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_list_files() {
    let h = harness();
    h.orchestrator
        .create_file("owner-a", upload("one", "1.png"), body(b"1"))
        .await
        .unwrap();
    h.orchestrator
        .create_file("owner-a", upload("two", "2.png"), body(b"2"))
        .await
        .unwrap();
    h.orchestrator
        .create_file("owner-b", upload("three", "3.png"), body(b"3"))
        .await
        .unwrap();

    assert_eq!(
        h.orchestrator.list_files(Some("owner-a")).await.unwrap().len(),
        2
    );
    assert_eq!(h.orchestrator.list_files(None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_update_file_rename() {
    let h = harness();
    let file = h
        .orchestrator
        .create_file("owner-a", upload("old", "f.png"), body(b"f"))
        .await
        .unwrap();

    let patch = FilePatch {
        name: Some("new".to_string()),
        ..Default::default()
    };
    let updated = h
        .orchestrator
        .update_file(&file.id, patch, None)
        .await
        .unwrap();
    assert_eq!(updated.name, "new");

    // Visible through the cached read path too.
    let fetched = h.orchestrator.get_file(&file.id).await.unwrap();
    assert_eq!(fetched.name, "new");
}

#[tokio::test]
async fn test_update_file_rename_conflict() {
    let h = harness();
    h.orchestrator
        .create_file("owner-a", upload("one", "1.png"), body(b"1"))
        .await
        .unwrap();
    let file = h
        .orchestrator
        .create_file("owner-a", upload("two", "2.png"), body(b"2"))
        .await
        .unwrap();

    let patch = FilePatch {
        name: Some("one".to_string()),
        ..Default::default()
    };
    let err = h
        .orchestrator
        .update_file(&file.id, patch, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn test_update_file_move_to_unknown_folder() {
    let h = harness();
    let file = h
        .orchestrator
        .create_file("owner-a", upload("one", "1.png"), body(b"1"))
        .await
        .unwrap();

    let patch = FilePatch {
        name: None,
        folder_id: Patch::Value("no-such-folder".to_string()),
    };
    let err = h
        .orchestrator
        .update_file(&file.id, patch, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_update_file_replace_content() {
    let h = harness();
    let file = h
        .orchestrator
        .create_file("owner-a", upload("one", "1.png"), body(b"original"))
        .await
        .unwrap();

    h.orchestrator
        .update_file(&file.id, FilePatch::default(), Some(body(b"replaced")))
        .await
        .unwrap();

    // Same storage key, new bytes, and an UPDATE history entry.
    let object = h.objects.get(&file.storage_key, None).await.unwrap();
    assert_eq!(read_all(object.reader).await, b"replaced");

    let history = h.orchestrator.get_history(&file.id).await.unwrap();
    let actions: Vec<_> = history.iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![FileAction::Upload, FileAction::Update]);
}

#[tokio::test]
async fn test_update_file_empty_patch() {
    let h = harness();
    let file = h
        .orchestrator
        .create_file("owner-a", upload("one", "1.png"), body(b"1"))
        .await
        .unwrap();

    let err = h
        .orchestrator
        .update_file(&file.id, FilePatch::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));
}

#[tokio::test]
async fn test_delete_file_then_blob() {
    let h = harness();
    let file = h
        .orchestrator
        .create_file("owner-a", upload("one", "1.png"), body(b"1"))
        .await
        .unwrap();

    let key = h.orchestrator.delete_file(&file.id).await.unwrap();
    assert_eq!(key, file.storage_key);

    // Metadata is gone immediately; the blob goes in the sequenced step.
    let err = h.orchestrator.get_file(&file.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(h.objects.exists(&key).await.unwrap());

    h.orchestrator.delete_blob(&key).await;
    assert!(!h.objects.exists(&key).await.unwrap());
}

#[tokio::test]
async fn test_delete_file_not_found() {
    let h = harness();
    let err = h.orchestrator.delete_file("nonexistent").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_flag_file_idempotent() {
    let h = harness();
    let file = h
        .orchestrator
        .create_file("owner-a", upload("pic", "pic.png"), body(b"png"))
        .await
        .unwrap();

    let first = h
        .orchestrator
        .flag_file(&file.id, "flagger-1")
        .await
        .unwrap();
    let second = h
        .orchestrator
        .flag_file(&file.id, "flagger-1")
        .await
        .unwrap();
    assert_eq!(first.id, second.id);

    let fetched = h.orchestrator.get_file(&file.id).await.unwrap();
    assert_eq!(fetched.flag_count, 1);
}

#[tokio::test]
async fn test_flag_file_unsupported_extension() {
    let h = harness();
    let file = h
        .orchestrator
        .create_file("owner-a", upload("doc", "doc.pdf"), body(b"pdf"))
        .await
        .unwrap();

    let err = h
        .orchestrator
        .flag_file(&file.id, "flagger-1")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));
}

#[tokio::test]
async fn test_flag_threshold_takes_file_down() {
    let h = harness();
    let file = h
        .orchestrator
        .create_file("owner-a", upload("clip", "clip.mp4"), body(b"mp4"))
        .await
        .unwrap();

    for i in 0..5 {
        h.orchestrator
            .flag_file(&file.id, &format!("flagger-{i}"))
            .await
            .unwrap();
    }

    let err = h.orchestrator.get_file(&file.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    // A sixth flag sees the file as gone rather than double-deleting.
    let err = h
        .orchestrator
        .flag_file(&file.id, "flagger-9")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_flag_threshold_is_configurable() {
    let h = harness_with_threshold(2);
    let file = h
        .orchestrator
        .create_file("owner-a", upload("pic", "pic.jpg"), body(b"jpg"))
        .await
        .unwrap();

    h.orchestrator
        .flag_file(&file.id, "flagger-1")
        .await
        .unwrap();
    h.orchestrator
        .flag_file(&file.id, "flagger-2")
        .await
        .unwrap();

    assert!(matches!(
        h.orchestrator.get_file(&file.id).await.unwrap_err(),
        Error::NotFound(_)
    ));
}

#[tokio::test]
async fn test_unflag_file() {
    let h = harness();
    let file = h
        .orchestrator
        .create_file("owner-a", upload("pic", "pic.png"), body(b"png"))
        .await
        .unwrap();

    h.orchestrator
        .flag_file(&file.id, "flagger-1")
        .await
        .unwrap();
    h.orchestrator
        .unflag_file(&file.id, "flagger-1")
        .await
        .unwrap();

    let fetched = h.orchestrator.get_file(&file.id).await.unwrap();
    assert_eq!(fetched.flag_count, 0);
}

#[tokio::test]
async fn test_unflag_file_without_flag() {
    let h = harness();
    let file = h
        .orchestrator
        .create_file("owner-a", upload("pic", "pic.png"), body(b"png"))
        .await
        .unwrap();

    let err = h
        .orchestrator
        .unflag_file(&file.id, "flagger-1")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));
}

#[tokio::test]
async fn test_open_stream_first_chunk() {
    let h = harness();
    let payload = vec![7u8; 3 * 1024 * 1024];
    let file = h
        .orchestrator
        .create_file("owner-a", upload("clip", "clip.mp4"), body(&payload))
        .await
        .unwrap();

    let stream = h.orchestrator.open_stream(&file.id, None).await.unwrap();
    assert_eq!(stream.mime, "video/mp4");
    assert_eq!(stream.total_size, 3 * 1024 * 1024);
    assert_eq!(stream.window.start, 0);
    assert_eq!(stream.window.end, 1048575);
    assert_eq!(stream.content_range(), "bytes 0-1048575/3145728");
    assert_eq!(stream.declared_length(), 3145728);

    let bytes = read_all(stream.body).await;
    assert_eq!(bytes.len(), 1024 * 1024);
}

#[tokio::test]
async fn test_open_stream_tail_window() {
    let h = harness();
    let payload: Vec<u8> = (0..2_000_000u32).map(|i| (i % 251) as u8).collect();
    let file = h
        .orchestrator
        .create_file("owner-a", upload("clip", "clip.mp4"), body(&payload))
        .await
        .unwrap();

    let stream = h
        .orchestrator
        .open_stream(&file.id, Some("bytes=1500000-"))
        .await
        .unwrap();
    assert_eq!(stream.window.start, 1_500_000);
    assert_eq!(stream.window.end, 1_999_999);
    assert_eq!(stream.content_range(), "bytes 1500000-1999999/2000000");

    let bytes = read_all(stream.body).await;
    assert_eq!(bytes.len(), 500_000);
    assert_eq!(bytes[..], payload[1_500_000..]);
}

#[tokio::test]
async fn test_open_stream_rejects_non_media() {
    let h = harness();
    let file = h
        .orchestrator
        .create_file("owner-a", upload("pic", "pic.png"), body(b"png"))
        .await
        .unwrap();

    let err = h.orchestrator.open_stream(&file.id, None).await.unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));
}

#[tokio::test]
async fn test_open_stream_malformed_range() {
    let h = harness();
    let file = h
        .orchestrator
        .create_file("owner-a", upload("clip", "clip.mp4"), body(b"mp4"))
        .await
        .unwrap();

    let err = h
        .orchestrator
        .open_stream(&file.id, Some("bytes=-"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));
}

#[tokio::test]
async fn test_open_stream_start_beyond_size() {
    let h = harness();
    let file = h
        .orchestrator
        .create_file("owner-a", upload("clip", "clip.mp4"), body(b"tiny"))
        .await
        .unwrap();

    let err = h
        .orchestrator
        .open_stream(&file.id, Some("bytes=4096-"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));
}

#[tokio::test]
async fn test_open_stream_records_history() {
    let h = harness();
    let file = h
        .orchestrator
        .create_file("owner-a", upload("clip", "clip.mp4"), body(b"mp4-bytes"))
        .await
        .unwrap();

    h.orchestrator.open_stream(&file.id, None).await.unwrap();

    let history = h.orchestrator.get_history(&file.id).await.unwrap();
    let actions: Vec<_> = history.iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![FileAction::Upload, FileAction::Stream]);
}

#[tokio::test]
async fn test_download() {
    let h = harness();
    let file = h
        .orchestrator
        .create_file("owner-a", upload("vacation", "beach.png"), body(b"png-bytes"))
        .await
        .unwrap();

    let download = h.orchestrator.download(&file.id).await.unwrap();
    assert_eq!(download.file_name, "vacation.png");
    assert_eq!(download.mime, "image/png");
    assert_eq!(download.size, 9);
    assert_eq!(read_all(download.body).await, b"png-bytes");

    let history = h.orchestrator.get_history(&file.id).await.unwrap();
    let actions: Vec<_> = history.iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![FileAction::Upload, FileAction::Download]);
}
