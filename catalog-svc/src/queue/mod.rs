//! In-process message queue
//!
//! One bounded `mpsc` channel per named queue. Every message is an
//! [`Envelope`] carrying an explicit [`MessageType`] tag; the
//! [`dispatcher::Dispatcher`] maps that tag to a handler.

pub mod dispatcher;

pub use dispatcher::{default_dispatcher, spawn_consumers, Dispatcher};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{CatalogError, CatalogResult};
use crate::models::EntityKind;

/// Named queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueName {
    CategoryUpload,
    ProductUpload,
    CatalogCommands,
}

impl QueueName {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::CategoryUpload => "category-upload",
            QueueName::ProductUpload => "product-upload",
            QueueName::CatalogCommands => "catalog-commands",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    CategoryUpload,
    ProductUpload,
    CreateCategory,
    UpdateCategory,
    DeleteCategory,
    CreateProduct,
    UpdateProduct,
    DeleteProduct,
}

impl MessageType {
    pub const ALL: [MessageType; 8] = [
        MessageType::CategoryUpload,
        MessageType::ProductUpload,
        MessageType::CreateCategory,
        MessageType::UpdateCategory,
        MessageType::DeleteCategory,
        MessageType::CreateProduct,
        MessageType::UpdateProduct,
        MessageType::DeleteProduct,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::CategoryUpload => "CategoryUpload",
            MessageType::ProductUpload => "ProductUpload",
            MessageType::CreateCategory => "CreateCategory",
            MessageType::UpdateCategory => "UpdateCategory",
            MessageType::DeleteCategory => "DeleteCategory",
            MessageType::CreateProduct => "CreateProduct",
            MessageType::UpdateProduct => "UpdateProduct",
            MessageType::DeleteProduct => "DeleteProduct",
        }
    }

    /// Upload message type for an entity kind
    pub fn upload_for(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Category => MessageType::CategoryUpload,
            EntityKind::Product => MessageType::ProductUpload,
        }
    }

    /// Queue this message type is routed to
    pub fn queue(&self) -> QueueName {
        match self {
            MessageType::CategoryUpload => QueueName::CategoryUpload,
            MessageType::ProductUpload => QueueName::ProductUpload,
            _ => QueueName::CatalogCommands,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub message_type: MessageType,
    pub body: Value,
}

impl Envelope {
    pub fn new(message_type: MessageType, body: Value) -> Self {
        Self { message_type, body }
    }

    /// Upload processing message for `job_id`
    pub fn upload(kind: EntityKind, job_id: Uuid) -> Self {
        Self::new(
            MessageType::upload_for(kind),
            serde_json::json!({ "job_id": job_id }),
        )
    }

    /// Envelope with a serialized body
    pub fn with_body<B: Serialize>(message_type: MessageType, body: &B) -> CatalogResult<Self> {
        Ok(Self::new(message_type, serde_json::to_value(body)?))
    }
}

/// Body of an upload message
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UploadMessage {
    pub job_id: Uuid,
}

/// Body of an update command: target id plus the update model's fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateCommand<M> {
    pub id: i64,
    #[serde(flatten)]
    pub model: M,
}

/// Body of a delete command
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeleteCommand {
    pub id: i64,
}

/// Sending half of every queue; cheap to clone
#[derive(Clone)]
pub struct MessageQueue {
    category_upload: mpsc::Sender<Envelope>,
    product_upload: mpsc::Sender<Envelope>,
    catalog_commands: mpsc::Sender<Envelope>,
}

/// Receiving half of every queue, handed to the consumers once
pub struct QueueReceivers {
    pub category_upload: mpsc::Receiver<Envelope>,
    pub product_upload: mpsc::Receiver<Envelope>,
    pub catalog_commands: mpsc::Receiver<Envelope>,
}

impl QueueReceivers {
    /// Receivers paired with their queue names
    pub fn into_named(self) -> Vec<(QueueName, mpsc::Receiver<Envelope>)> {
        vec![
            (QueueName::CategoryUpload, self.category_upload),
            (QueueName::ProductUpload, self.product_upload),
            (QueueName::CatalogCommands, self.catalog_commands),
        ]
    }
}

impl MessageQueue {
    /// Create all queues, each buffering up to `capacity` messages
    pub fn new(capacity: usize) -> (Self, QueueReceivers) {
        let capacity = capacity.max(1);
        let (category_upload, category_upload_rx) = mpsc::channel(capacity);
        let (product_upload, product_upload_rx) = mpsc::channel(capacity);
        let (catalog_commands, catalog_commands_rx) = mpsc::channel(capacity);

        (
            Self {
                category_upload,
                product_upload,
                catalog_commands,
            },
            QueueReceivers {
                category_upload: category_upload_rx,
                product_upload: product_upload_rx,
                catalog_commands: catalog_commands_rx,
            },
        )
    }

    fn sender(&self, queue: QueueName) -> &mpsc::Sender<Envelope> {
        match queue {
            QueueName::CategoryUpload => &self.category_upload,
            QueueName::ProductUpload => &self.product_upload,
            QueueName::CatalogCommands => &self.catalog_commands,
        }
    }

    /// Route an envelope to the queue for its message type.
    ///
    /// Waits while the queue is full; fails only if its consumer is gone.
    pub async fn publish(&self, envelope: Envelope) -> CatalogResult<()> {
        let queue = envelope.message_type.queue();
        let message_type = envelope.message_type;

        self.sender(queue).send(envelope).await.map_err(|_| {
            CatalogError::Common(catalog_common::Error::Internal(format!(
                "Queue {} is closed",
                queue
            )))
        })?;

        tracing::debug!(queue = %queue, message_type = %message_type, "Message published");
        Ok(())
    }
}
