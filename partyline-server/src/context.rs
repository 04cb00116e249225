use std::sync::Arc;

use axum::extract::FromRef;
use partyline_collab::Collab;

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub collab: Arc<Collab>,
}
