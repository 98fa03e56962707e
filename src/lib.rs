pub mod domain;
pub mod gateway;
pub mod services;
pub mod store;
pub mod transport;

use std::sync::Arc;

use services::lifecycle::LifecycleEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<LifecycleEngine>,
}
