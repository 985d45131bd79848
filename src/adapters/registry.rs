//! Postgres attachment registry.
//!
//! The item authoring database keeps a table of registered attachment
//! files per item. The classifier consults it for Item and Tutorial
//! content before falling back to content-reference scanning.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls};

use super::{Attachment, AttachmentRegistry};

const ATTACHMENTS_QUERY: &str = "SELECT ia.file_name, ia.file_type \
     FROM item_attachment AS ia \
     LEFT JOIN item AS i ON i.key = ia.item_key \
     WHERE i.id = $1";

/// Registry backed by the authoring database. Connects lazily on first
/// use and keeps the connection for the rest of the run.
pub struct PostgresRegistry {
    connection_string: String,
    client: Mutex<Option<Client>>,
}

impl PostgresRegistry {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            client: Mutex::new(None),
        }
    }

    async fn connect(&self) -> Result<Client> {
        let (client, connection) = tokio_postgres::connect(&self.connection_string, NoTls)
            .await
            .context("failed to connect to the attachment registry")?;

        // The connection task owns the socket; it ends when the client drops.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "attachment registry connection error");
            }
        });

        Ok(client)
    }
}

#[async_trait]
impl AttachmentRegistry for PostgresRegistry {
    async fn attachments(&self, item_id: u32) -> Result<Vec<Attachment>> {
        let mut guard = self.client.lock().await;
        let client = match guard.take() {
            Some(client) => client,
            None => self.connect().await?,
        };

        let result = client.query(ATTACHMENTS_QUERY, &[&(item_id as i32)]).await;
        *guard = Some(client);
        let rows = result.context("attachment registry query failed")?;

        Ok(rows
            .into_iter()
            .map(|row| Attachment {
                file_name: row.get(0),
                file_type: row.try_get::<_, Option<String>>(1).ok().flatten().unwrap_or_default(),
            })
            .collect())
    }
}
