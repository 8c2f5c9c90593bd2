//! Storage that remembers nothing, used before hydration on the server path.

use async_trait::async_trait;

use crate::adapter::{AdapterKind, Namespace, SetOptions, StorageAdapter};
use crate::error::StorageError;

#[derive(Default)]
pub struct NoopAdapter {
    namespace: Namespace,
}

impl NoopAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageAdapter for NoopAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Noop
    }

    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    async fn set(&self, _key: &str, _value: &str, _options: SetOptions) -> Result<(), StorageError> {
        Ok(())
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    async fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(Vec::new())
    }
}
