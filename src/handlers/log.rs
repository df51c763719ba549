//! Handler that logs each change

use super::ChangeHandler;
use crate::domain::event::ChangeEvent;
use async_trait::async_trait;

/// Logs every change at info level and always succeeds
#[derive(Debug, Default, Clone)]
pub struct LogHandler;

impl LogHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChangeHandler for LogHandler {
    async fn handle(&self, event: &ChangeEvent) -> anyhow::Result<()> {
        tracing::info!(
            collection = %event.collection,
            event_id = %event.id,
            operation = %event.operation,
            document_key = ?event.document_key,
            payload = %event.payload,
            "Change received"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::OperationType;
    use crate::domain::ids::CollectionName;

    #[tokio::test]
    async fn test_log_handler_succeeds() {
        let event = ChangeEvent::builder()
            .id(1_i64)
            .collection(CollectionName::new("orders").unwrap())
            .operation(OperationType::Insert)
            .build()
            .unwrap();
        assert!(LogHandler::new().handle(&event).await.is_ok());
    }
}
