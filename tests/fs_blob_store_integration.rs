//! The same pipeline against the filesystem blob store.

use std::sync::Arc;

use tempfile::TempDir;
use tmf_types::{Role, TmfMetadata};
use tmf_vault::{DocumentService, ListFilter, LogNotifier};
use tmf_workflow::{
    DocumentEngine, FsBlobStore, InMemoryDirectory, InMemoryDocumentStore,
    InMemorySequenceAllocator, RsaKeyVault,
};

#[tokio::test]
async fn documents_persist_payloads_on_disk() {
    let blob_dir = TempDir::new().unwrap();
    let store = Arc::new(InMemoryDocumentStore::new());
    let blobs = Arc::new(FsBlobStore::new(blob_dir.path()));
    let directory = Arc::new(InMemoryDirectory::new());
    let vault = Arc::new(RsaKeyVault::new());
    let sequences = Arc::new(InMemorySequenceAllocator::new());

    let author = directory
        .register(
            "u1",
            Role::Contributor,
            "unused",
            tmf_types::KeyHandle::generate(),
        )
        .await;
    let token = directory.issue_token(author.id).await.unwrap();

    let engine = DocumentEngine::new(store, blobs, directory.clone(), vault, sequences);
    let service = DocumentService::new(engine, directory, Arc::new(LogNotifier));

    let created = service
        .create_document(
            &token,
            b"on-disk payload",
            "proto.pdf",
            "application/pdf",
            TmfMetadata::default(),
            None,
        )
        .await
        .unwrap();

    // The payload round-trips through the filesystem
    let payload = service.preview_revision(&token, created.doc_id).await.unwrap();
    assert_eq!(payload.bytes, b"on-disk payload");

    // Something actually landed under the blob directory
    let entries: Vec<_> = std::fs::read_dir(blob_dir.path()).unwrap().collect();
    assert!(!entries.is_empty());

    let page = service.list_documents(&token, ListFilter::default()).await.unwrap();
    assert_eq!(page.items.len(), 1);

    // Deleting the draft clears the on-disk blob as well
    service.delete(&token, created.doc_id).await.unwrap();
    let err = service.preview_revision(&token, created.doc_id).await.unwrap_err();
    assert_eq!(err.code, "not_found");

    let mut remaining = Vec::new();
    for shard in std::fs::read_dir(blob_dir.path()).unwrap() {
        let shard = shard.unwrap();
        if shard.path().is_dir() {
            remaining.extend(std::fs::read_dir(shard.path()).unwrap());
        }
    }
    assert!(remaining.is_empty());
}
