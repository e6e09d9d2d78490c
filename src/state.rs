/*
 * Responsibility
 * - shared application state handed to routers and middleware
 */
use std::sync::Arc;

use crate::config::Redirects;
use crate::repos::UserDirectory;
use crate::services::oidc::IdentityFlow;
use crate::services::session::SessionManager;

#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn UserDirectory>,
    pub sessions: Arc<SessionManager>,
    pub flow: Arc<dyn IdentityFlow>,
    pub redirects: Redirects,
}

impl AppState {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        sessions: Arc<SessionManager>,
        flow: Arc<dyn IdentityFlow>,
        redirects: Redirects,
    ) -> Self {
        Self {
            directory,
            sessions,
            flow,
            redirects,
        }
    }
}
