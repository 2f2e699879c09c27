use std::sync::Arc;

use flatbase_auth::AuthManager;
use flatbase_engine::Catalog;

/// Shared process state handed to every handler. The catalog is
/// read-only after load; the auth manager owns its own interior
/// mutability (see `flatbase-auth`), so both are cheap to clone behind
/// an `Arc` per the teacher's `Arc<SessionContext>` pattern.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub auth: Arc<AuthManager>,
}
