/*
 * Responsibility
 * - shared context handed to every handler (Clone-cheap: Arcs inside)
 */
use std::sync::Arc;
use std::time::Duration;

use crate::codes::CodeStore;
use crate::keys::SigningKeys;

#[derive(Clone)]
pub struct AppState {
    pub issuer: String,
    pub keys: Arc<SigningKeys>,
    pub codes: Arc<dyn CodeStore>,
    pub code_ttl: Duration,
}

impl AppState {
    pub fn new(
        issuer: String,
        keys: Arc<SigningKeys>,
        codes: Arc<dyn CodeStore>,
        code_ttl: Duration,
    ) -> Self {
        Self {
            issuer,
            keys,
            codes,
            code_ttl,
        }
    }
}
