//! In-memory storage implementation for testing

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::traits::*;
use crate::types::*;

/// (tenant, statement)
type StatementKey = (String, String);

fn key(tenant_id: &str, statement_id: &str) -> StatementKey {
    (tenant_id.to_string(), statement_id.to_string())
}

fn read<T>(lock: &RwLock<T>) -> ReconResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| ReconciliationError::Persistence("storage lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> ReconResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| ReconciliationError::Persistence("storage lock poisoned".to_string()))
}

/// In-memory storage implementation for testing and development
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    headers: Arc<RwLock<HashMap<StatementKey, StatementHeader>>>,
    items: Arc<RwLock<HashMap<StatementKey, BTreeMap<String, LineItem>>>>,
    artifacts: Arc<RwLock<HashMap<StatementKey, serde_json::Value>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a persistence error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> ReconResult<()> {
        write(&self.headers)?.clear();
        write(&self.items)?.clear();
        write(&self.artifacts)?.clear();
        Ok(())
    }

    fn check_writable(&self) -> ReconResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ReconciliationError::Persistence(
                "storage is not accepting writes".to_string(),
            ));
        }
        Ok(())
    }

    fn update_item<F>(&self, tenant_id: &str, statement_id: &str, item_id: &str, f: F) -> ReconResult<()>
    where
        F: FnOnce(&mut LineItem),
    {
        self.check_writable()?;
        let mut items = write(&self.items)?;
        let item = items
            .get_mut(&key(tenant_id, statement_id))
            .and_then(|by_id| by_id.get_mut(item_id))
            .ok_or_else(|| ReconciliationError::LineItemNotFound(item_id.to_string()))?;
        f(item);
        Ok(())
    }
}

#[async_trait]
impl StatementStorage for MemoryStorage {
    async fn get_header(
        &self,
        tenant_id: &str,
        statement_id: &str,
    ) -> ReconResult<Option<StatementHeader>> {
        Ok(read(&self.headers)?
            .get(&key(tenant_id, statement_id))
            .cloned())
    }

    async fn save_header(&mut self, header: &StatementHeader) -> ReconResult<()> {
        self.check_writable()?;
        write(&self.headers)?.insert(
            key(&header.tenant_id, &header.statement_id),
            header.clone(),
        );
        Ok(())
    }

    async fn list_line_items(
        &self,
        tenant_id: &str,
        statement_id: &str,
    ) -> ReconResult<Vec<LineItem>> {
        let items = read(&self.items)?;
        let mut listed: Vec<LineItem> = items
            .get(&key(tenant_id, statement_id))
            .map(|by_id| by_id.values().cloned().collect())
            .unwrap_or_default();
        listed.sort_by_key(|item| item.ordinal);
        Ok(listed)
    }

    async fn upsert_line_items(&mut self, tenant_id: &str, items: &[LineItem]) -> ReconResult<()> {
        self.check_writable()?;
        let mut stored = write(&self.items)?;
        for item in items {
            stored
                .entry(key(tenant_id, &item.statement_id))
                .or_default()
                .insert(item.item_id.clone(), item.clone());
        }
        Ok(())
    }

    async fn delete_line_items(
        &mut self,
        tenant_id: &str,
        statement_id: &str,
        item_ids: &[String],
    ) -> ReconResult<()> {
        self.check_writable()?;
        if let Some(by_id) = write(&self.items)?.get_mut(&key(tenant_id, statement_id)) {
            for item_id in item_ids {
                by_id.remove(item_id);
            }
        }
        Ok(())
    }

    async fn set_item_completed(
        &mut self,
        tenant_id: &str,
        statement_id: &str,
        item_id: &str,
        completed: bool,
    ) -> ReconResult<()> {
        self.update_item(tenant_id, statement_id, item_id, |item| {
            item.completed = completed;
        })
    }

    async fn set_item_document_type(
        &mut self,
        tenant_id: &str,
        statement_id: &str,
        item_id: &str,
        document_type: DocumentType,
    ) -> ReconResult<()> {
        self.update_item(tenant_id, statement_id, item_id, |item| {
            item.manual_document_type = Some(document_type);
            item.document_type = document_type;
        })
    }
}

#[async_trait]
impl ArtifactStorage for MemoryStorage {
    async fn put_statement_json(
        &mut self,
        tenant_id: &str,
        statement_id: &str,
        document: &serde_json::Value,
    ) -> ReconResult<()> {
        self.check_writable()?;
        write(&self.artifacts)?.insert(key(tenant_id, statement_id), document.clone());
        Ok(())
    }

    async fn get_statement_json(
        &self,
        tenant_id: &str,
        statement_id: &str,
    ) -> ReconResult<Option<serde_json::Value>> {
        Ok(read(&self.artifacts)?
            .get(&key(tenant_id, statement_id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(statement_id: &str, ordinal: usize) -> LineItem {
        LineItem::new(statement_id, ordinal)
    }

    #[tokio::test]
    async fn test_items_are_scoped_by_tenant() {
        let mut storage = MemoryStorage::new();
        storage
            .upsert_line_items("tenant-a", &[item("stmt", 1)])
            .await
            .unwrap();

        assert_eq!(storage.list_line_items("tenant-a", "stmt").await.unwrap().len(), 1);
        assert!(storage.list_line_items("tenant-b", "stmt").await.unwrap().is_empty());
        assert!(matches!(
            storage
                .set_item_completed("tenant-b", "stmt", "stmt#item-0001", true)
                .await,
            Err(ReconciliationError::LineItemNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_ordinal() {
        let mut storage = MemoryStorage::new();
        storage
            .upsert_line_items("t", &[item("s", 10), item("s", 2), item("s", 1)])
            .await
            .unwrap();

        let ordinals: Vec<usize> = storage
            .list_line_items("t", "s")
            .await
            .unwrap()
            .iter()
            .map(|i| i.ordinal)
            .collect();
        assert_eq!(ordinals, vec![1, 2, 10]);
    }

    #[tokio::test]
    async fn test_failed_writes_surface_as_persistence_errors() {
        let mut storage = MemoryStorage::new();
        storage.set_fail_writes(true);
        assert!(matches!(
            storage.upsert_line_items("t", &[item("s", 1)]).await,
            Err(ReconciliationError::Persistence(_))
        ));
    }

    #[tokio::test]
    async fn test_document_type_override_is_recorded() {
        let mut storage = MemoryStorage::new();
        storage.upsert_line_items("t", &[item("s", 1)]).await.unwrap();
        storage
            .set_item_document_type("t", "s", "s#item-0001", DocumentType::CreditNote)
            .await
            .unwrap();

        let items = storage.list_line_items("t", "s").await.unwrap();
        assert_eq!(items[0].manual_document_type, Some(DocumentType::CreditNote));
        assert_eq!(items[0].document_type, DocumentType::CreditNote);
    }
}
