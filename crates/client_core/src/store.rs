use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use crate::{actions::Action, state::AdminState};

/// The dispatch capability thunks are handed.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, action: Action);
}

/// Central state container. Every dispatched action goes through
/// [`AdminState::apply`] and is then broadcast to subscribers.
pub struct Store {
    state: Mutex<AdminState>,
    actions: broadcast::Sender<Action>,
}

impl Store {
    pub fn new() -> Self {
        Self::with_state(AdminState::default())
    }

    pub fn with_state(state: AdminState) -> Self {
        let (actions, _) = broadcast::channel(1024);
        Self {
            state: Mutex::new(state),
            actions,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Action> {
        self.actions.subscribe()
    }

    pub async fn snapshot(&self) -> AdminState {
        self.state.lock().await.clone()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dispatcher for Store {
    async fn dispatch(&self, action: Action) {
        debug!(action = action.kind(), "dispatch");
        self.state.lock().await.apply(&action);
        // No subscribers is fine.
        let _ = self.actions.send(action);
    }
}
