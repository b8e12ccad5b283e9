//! Message dispatch table and queue consumers
//!
//! Handlers are registered per [`MessageType`] at startup. One consumer task
//! per queue handles its messages strictly one after another. A message
//! whose handler fails, or that has no handler, is dead-lettered and never
//! retried.

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{
    DeleteCommand, Envelope, MessageType, QueueName, QueueReceivers, UpdateCommand,
    UploadMessage,
};
use crate::db::dead_letters;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    CreateCategoryModel, CreateProductModel, UpdateCategoryModel, UpdateProductModel,
};
use crate::AppState;

/// Boxed message handler
pub type Handler =
    Arc<dyn Fn(AppState, Value) -> BoxFuture<'static, CatalogResult<()>> + Send + Sync>;

/// `MessageType -> handler` table
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: HashMap<MessageType, Handler>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for `message_type`, replacing any previous one
    pub fn register<F, Fut>(&mut self, message_type: MessageType, handler: F)
    where
        F: Fn(AppState, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CatalogResult<()>> + Send + 'static,
    {
        let handler: Handler = Arc::new(
            move |state: AppState, body: Value| -> BoxFuture<'static, CatalogResult<()>> {
                Box::pin(handler(state, body))
            },
        );
        self.handlers.insert(message_type, handler);
    }

    pub fn handles(&self, message_type: MessageType) -> bool {
        self.handlers.contains_key(&message_type)
    }

    /// Run the handler registered for the envelope's type
    pub async fn dispatch(&self, state: AppState, envelope: Envelope) -> CatalogResult<()> {
        let handler = self.handlers.get(&envelope.message_type).ok_or_else(|| {
            CatalogError::InvalidOperation(format!(
                "No handler registered for message type {}",
                envelope.message_type
            ))
        })?;
        handler(state, envelope.body).await
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> CatalogResult<T> {
    Ok(serde_json::from_value(body)?)
}

/// Dispatcher with a handler for every message type
pub fn default_dispatcher() -> Dispatcher {
    let mut dispatcher = Dispatcher::new();

    dispatcher.register(MessageType::CategoryUpload, |state, body| async move {
        let message: UploadMessage = decode(body)?;
        state.uploads().process(message.job_id).await
    });
    dispatcher.register(MessageType::ProductUpload, |state, body| async move {
        let message: UploadMessage = decode(body)?;
        state.uploads().process(message.job_id).await
    });

    dispatcher.register(MessageType::CreateCategory, |state, body| async move {
        let model: CreateCategoryModel = decode(body)?;
        state.commands().create_category(model).await.map(|_| ())
    });
    dispatcher.register(MessageType::UpdateCategory, |state, body| async move {
        let command: UpdateCommand<UpdateCategoryModel> = decode(body)?;
        state
            .commands()
            .update_category(command.id, command.model)
            .await
            .map(|_| ())
    });
    dispatcher.register(MessageType::DeleteCategory, |state, body| async move {
        let command: DeleteCommand = decode(body)?;
        state.commands().delete_category(command.id).await
    });

    dispatcher.register(MessageType::CreateProduct, |state, body| async move {
        let model: CreateProductModel = decode(body)?;
        state.commands().create_product(model).await.map(|_| ())
    });
    dispatcher.register(MessageType::UpdateProduct, |state, body| async move {
        let command: UpdateCommand<UpdateProductModel> = decode(body)?;
        state
            .commands()
            .update_product(command.id, command.model)
            .await
            .map(|_| ())
    });
    dispatcher.register(MessageType::DeleteProduct, |state, body| async move {
        let command: DeleteCommand = decode(body)?;
        state.commands().delete_product(command.id).await
    });

    dispatcher
}

/// Handle one message; failures go to the dead-letter store
pub async fn handle_envelope(
    state: &AppState,
    dispatcher: &Dispatcher,
    queue: QueueName,
    envelope: Envelope,
) {
    let message_type = envelope.message_type;
    let body = envelope.body.to_string();

    if let Err(err) = dispatcher.dispatch(state.clone(), envelope).await {
        tracing::warn!(
            queue = %queue,
            message_type = %message_type,
            error = %err,
            "Message handling failed, dead-lettering"
        );

        if let Err(store_err) = dead_letters::record_dead_letter(
            &state.db,
            queue.as_str(),
            message_type.as_str(),
            &body,
            &err.to_string(),
        )
        .await
        {
            tracing::error!(
                queue = %queue,
                message_type = %message_type,
                error = %store_err,
                "Failed to record dead letter"
            );
        }
    }
}

async fn consume(
    state: AppState,
    dispatcher: Arc<Dispatcher>,
    queue: QueueName,
    mut rx: mpsc::Receiver<Envelope>,
) {
    tracing::debug!(queue = %queue, "Queue consumer started");

    while let Some(envelope) = rx.recv().await {
        handle_envelope(&state, &dispatcher, queue, envelope).await;
    }

    tracing::debug!(queue = %queue, "Queue consumer stopped");
}

/// Spawn one consumer task per queue
pub fn spawn_consumers(
    state: AppState,
    dispatcher: Dispatcher,
    receivers: QueueReceivers,
) -> Vec<JoinHandle<()>> {
    let dispatcher = Arc::new(dispatcher);

    receivers
        .into_named()
        .into_iter()
        .map(|(queue, rx)| tokio::spawn(consume(state.clone(), dispatcher.clone(), queue, rx)))
        .collect()
}
