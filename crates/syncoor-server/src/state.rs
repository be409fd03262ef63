use std::sync::Arc;

use syncoor_store::{SSEHub, TestStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TestStore>,
    pub hub: Arc<SSEHub>,
    pub auth_token: Option<Arc<String>>,
}
