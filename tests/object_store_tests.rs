use file_depot::object_store::{BodyReader, ByteRange, LocalStore, ObjectStore, ObjectStoreError};
use tokio::io::AsyncReadExt;

fn body(data: &[u8]) -> BodyReader {
    Box::new(std::io::Cursor::new(data.to_vec()))
}

async fn read_all(mut reader: BodyReader) -> Vec<u8> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await.unwrap();
    buf
}

#[tokio::test]
async fn test_local_store_put_get() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store.put("test-key", body(b"hello world")).await.unwrap();

    let object = store.get("test-key", None).await.unwrap();
    assert_eq!(object.total_size, 11);
    assert_eq!(read_all(object.reader).await, b"hello world");
}

#[tokio::test]
async fn test_local_store_ranged_get() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();
    store
        .put("ranged", body(b"0123456789abcdef"))
        .await
        .unwrap();

    let object = store
        .get("ranged", Some(ByteRange { start: 4, end: 9 }))
        .await
        .unwrap();
    assert_eq!(object.total_size, 16);
    assert_eq!(read_all(object.reader).await, b"456789");
}

#[tokio::test]
async fn test_local_store_range_clamped_to_object_end() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();
    store.put("short", body(b"0123456789")).await.unwrap();

    let object = store
        .get("short", Some(ByteRange { start: 6, end: 500 }))
        .await
        .unwrap();
    assert_eq!(object.total_size, 10);
    assert_eq!(read_all(object.reader).await, b"6789");
}

#[tokio::test]
async fn test_local_store_range_start_beyond_size() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();
    store.put("short", body(b"0123456789")).await.unwrap();

    let result = store
        .get("short", Some(ByteRange { start: 10, end: 20 }))
        .await;
    assert!(matches!(
        result.unwrap_err(),
        ObjectStoreError::RangeNotSatisfiable(_)
    ));
}

#[tokio::test]
async fn test_local_store_get_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    let result = store.get("missing", None).await;
    assert!(matches!(result.unwrap_err(), ObjectStoreError::NotFound(_)));
}

#[tokio::test]
async fn test_local_store_exists() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    assert!(!store.exists("missing").await.unwrap());

    store.put("present", body(b"data")).await.unwrap();
    assert!(store.exists("present").await.unwrap());
}

#[tokio::test]
async fn test_local_store_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store.put("to-delete", body(b"data")).await.unwrap();
    assert!(store.exists("to-delete").await.unwrap());

    store.delete("to-delete").await.unwrap();
    assert!(!store.exists("to-delete").await.unwrap());
}

#[tokio::test]
async fn test_local_store_delete_nonexistent() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    // Deleting a nonexistent key should not error
    store.delete("nonexistent").await.unwrap();
}

#[tokio::test]
async fn test_local_store_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store.put("key", body(b"first")).await.unwrap();
    store.put("key", body(b"second")).await.unwrap();

    let object = store.get("key", None).await.unwrap();
    assert_eq!(read_all(object.reader).await, b"second");
}
