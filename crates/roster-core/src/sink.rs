use std::sync::{Arc, Mutex};

use crate::error::AppError;
use crate::models::ExtractedContact;
use crate::traits::RecordSink;

/// Keeps records in memory for the duration of a run.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<ExtractedContact>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for MemorySink {
    async fn append(&self, contact: &ExtractedContact) -> Result<(), AppError> {
        self.records
            .lock()
            .map_err(|_| AppError::StoreError("record sink lock poisoned".into()))?
            .push(contact.clone());
        Ok(())
    }

    async fn records(&self) -> Result<Vec<ExtractedContact>, AppError> {
        let records = self
            .records
            .lock()
            .map_err(|_| AppError::StoreError("record sink lock poisoned".into()))?;
        Ok(records.clone())
    }
}
