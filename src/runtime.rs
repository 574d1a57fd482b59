//! Runtime for executing conversation turns
//!
//! [`ConversationRouter`] runs one turn; [`RouterManager`] makes sure turns
//! on the same thread never overlap while different threads run freely.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{ConversationRouter, Invocation, InvocationOutput, RouterError};
pub use traits::*;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Type alias for the production manager with concrete implementations
pub type ProductionManager = RouterManager<DatabaseStorage, Arc<dyn LlmClient>>;

/// Serializes invocations per thread
pub struct RouterManager<S, L>
where
    S: StateStore,
    L: LlmClient,
{
    router: ConversationRouter<S, L>,
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S, L> RouterManager<S, L>
where
    S: StateStore,
    L: LlmClient,
{
    pub fn new(router: ConversationRouter<S, L>) -> Self {
        Self {
            router,
            locks: RwLock::new(HashMap::new()),
        }
    }

    async fn thread_lock(&self, thread_id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(thread_id) {
            return lock.clone();
        }
        self.locks
            .write()
            .await
            .entry(thread_id.to_string())
            .or_default()
            .clone()
    }

    /// Drop the thread's lock entry once nobody holds or waits on it
    async fn release(&self, thread_id: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        let mut locks = self.locks.write().await;
        if locks
            .get(thread_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(thread_id);
        }
    }

    /// Run one turn with exclusive ownership of the thread's state
    pub async fn invoke(
        &self,
        thread_id: &str,
        invocation: Invocation,
    ) -> Result<InvocationOutput, RouterError> {
        let lock = self.thread_lock(thread_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.router.invoke(thread_id, invocation).await
        };
        self.release(thread_id, lock).await;
        result
    }

    /// Run `delete` once no turn on the thread is in flight. Turns queued
    /// behind it see the thread as new.
    pub async fn delete<T, E>(
        &self,
        thread_id: &str,
        delete: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let lock = self.thread_lock(thread_id).await;
        let result = {
            let _guard = lock.lock().await;
            delete()
        };
        self.release(thread_id, lock).await;
        result
    }
}
