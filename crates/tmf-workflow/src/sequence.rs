//! Sequence Allocator
//!
//! Monotonic find-and-increment counters keyed by sequence name. Used for
//! human-readable document numbers; one number is allocated per lineage at
//! creation and shared by every later version.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::store::StoreError;

/// Sequence backing the `REG-TMF-NNNNN` document numbers
pub const DOC_NUMBER_SEQUENCE: &str = "doc-number";

/// Format an allocated value as a document number
pub fn format_doc_number(value: u64) -> String {
    format!("REG-TMF-{:05}", value)
}

/// Named monotonic counters
#[async_trait]
pub trait SequenceAllocator: Send + Sync {
    /// Allocate the next value of the named sequence, starting at 1
    async fn next(&self, name: &str) -> Result<u64, StoreError>;
}

/// In-memory allocator
#[derive(Default)]
pub struct InMemorySequenceAllocator {
    counters: Arc<Mutex<HashMap<String, u64>>>,
}

impl InMemorySequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SequenceAllocator for InMemorySequenceAllocator {
    async fn next(&self, name: &str) -> Result<u64, StoreError> {
        let mut counters = self.counters.lock().await;
        let counter = counters.entry(name.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequences_are_independent() {
        let alloc = InMemorySequenceAllocator::new();
        assert_eq!(alloc.next("a").await.unwrap(), 1);
        assert_eq!(alloc.next("a").await.unwrap(), 2);
        assert_eq!(alloc.next("b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_doc_number_format() {
        assert_eq!(format_doc_number(1), "REG-TMF-00001");
        assert_eq!(format_doc_number(123), "REG-TMF-00123");
        assert_eq!(format_doc_number(99999), "REG-TMF-99999");
    }
}
