//! Artifact upload integration tests

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use berth::builder::publish::LogSink;
use berth::builder::upload::upload_dir;
use berth::errors::BerthError;
use berth::models::events::BuildEvent;
use berth::object::{FsObjectStore, ObjectStore};
use berth::proxy::build_target;
use tokio::sync::Mutex;

/// Sink collecting everything the uploader reports
#[derive(Default)]
struct CollectingSink {
    lines: Mutex<Vec<String>>,
}

#[async_trait]
impl LogSink for CollectingSink {
    async fn line(&self, text: &str) {
        self.lines.lock().await.push(text.to_string());
    }

    async fn event(&self, event: BuildEvent) {
        self.lines.lock().await.push(event.sentinel());
    }
}

/// Store that refuses one specific key
struct FailOnKey {
    inner: FsObjectStore,
    poisoned: String,
}

#[async_trait]
impl ObjectStore for FailOnKey {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), BerthError> {
        if key == self.poisoned {
            return Err(BerthError::StorageError("simulated outage".to_string()));
        }
        self.inner.put(key, body, content_type).await
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), BerthError> {
        self.inner.delete_prefix(prefix).await
    }
}

fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let full = root.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }
}

#[tokio::test]
async fn test_upload_mirrors_tree_under_prefix() {
    let bucket = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_tree(
        output.path(),
        &[
            ("index.html", "<html>home</html>"),
            ("about.html", "<html>about</html>"),
            ("assets/app.js", "console.log('hi')"),
        ],
    );

    let store = FsObjectStore::new(bucket.path());
    let sink = CollectingSink::default();
    let uploaded = upload_dir(&store, &sink, "acme-site", output.path()).await.unwrap();

    assert_eq!(uploaded, 3);
    assert!(bucket.path().join("outputs/acme-site/index.html").is_file());
    assert!(bucket.path().join("outputs/acme-site/assets/app.js").is_file());
}

#[tokio::test]
async fn test_failed_file_is_skipped_not_fatal() {
    let bucket = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_tree(
        output.path(),
        &[("index.html", "<html>"), ("broken.bin", "xxxx")],
    );

    let store = FailOnKey {
        inner: FsObjectStore::new(bucket.path()),
        poisoned: "outputs/acme-site/broken.bin".to_string(),
    };
    let sink = CollectingSink::default();
    let uploaded = upload_dir(&store, &sink, "acme-site", output.path()).await.unwrap();

    assert_eq!(uploaded, 1);
    assert!(bucket.path().join("outputs/acme-site/index.html").is_file());

    let lines = sink.lines.lock().await;
    assert!(lines.iter().any(|l| l.contains("upload failed for outputs/acme-site/broken.bin")));
}

/// Regression guard for the documented non-goal: a rebuild does not clear
/// the prefix first, so files the new build no longer produces stay behind
/// and keep resolving through the edge router.
#[tokio::test]
async fn test_second_subset_build_leaves_orphans_served() {
    let bucket = tempfile::tempdir().unwrap();
    let store = FsObjectStore::new(bucket.path());
    let sink = CollectingSink::default();

    let first = tempfile::tempdir().unwrap();
    write_tree(
        first.path(),
        &[("index.html", "v1 home"), ("legacy.html", "v1 only")],
    );
    upload_dir(&store, &sink, "acme-site", first.path()).await.unwrap();

    let second = tempfile::tempdir().unwrap();
    write_tree(second.path(), &[("index.html", "v2 home")]);
    upload_dir(&store, &sink, "acme-site", second.path()).await.unwrap();

    // New content replaced the shared key...
    let index = std::fs::read_to_string(bucket.path().join("outputs/acme-site/index.html")).unwrap();
    assert_eq!(index, "v2 home");

    // ...but the file only the first build produced is still there, at the
    // exact location the edge router would fetch for it.
    let orphan = bucket.path().join("outputs/acme-site/legacy.html");
    assert!(orphan.is_file());

    let target = build_target("https://cdn.example.com/outputs/", "acme-site", "/legacy.html");
    assert_eq!(target, "https://cdn.example.com/outputs/acme-site/legacy.html");
}

#[tokio::test]
async fn test_uploaded_keys_get_extension_content_types() {
    // FsObjectStore ignores content types; capture them through a probe.
    struct Probe {
        seen: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl ObjectStore for Probe {
        async fn put(&self, key: &str, _body: Vec<u8>, content_type: &str) -> Result<(), BerthError> {
            self.seen.lock().await.push((key.to_string(), content_type.to_string()));
            Ok(())
        }

        async fn delete_prefix(&self, _prefix: &str) -> Result<(), BerthError> {
            Ok(())
        }
    }

    let output = tempfile::tempdir().unwrap();
    write_tree(
        output.path(),
        &[("index.html", "<html>"), ("data.bin", "1234")],
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let store = Probe { seen: seen.clone() };
    let sink = CollectingSink::default();
    upload_dir(&store, &sink, "acme-site", output.path()).await.unwrap();

    let seen = seen.lock().await;
    let html = seen.iter().find(|(k, _)| k.ends_with("index.html")).unwrap();
    assert_eq!(html.1, "text/html");
    let bin = seen.iter().find(|(k, _)| k.ends_with("data.bin")).unwrap();
    assert_eq!(bin.1, "application/octet-stream");
}
