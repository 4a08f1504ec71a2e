use std::sync::Arc;

use storage::repository::{Storage, StorageError};

use crate::Clock;
use crate::attempt_controller::AttemptController;
use crate::error::ProgressError;
use crate::gateway::{ProgressGateway, QuizGateway};
use crate::http_gateway::{GatewayConfig, HttpGateway};
use crate::progress_cache::ProgressCache;
use crate::reconciler::ProgressReconciler;

/// Assembles the session-facing services over one storage backend and one
/// pair of remote gateways.
#[derive(Clone)]
pub struct CourseSessionServices {
    clock: Clock,
    storage: Storage,
    quiz_gateway: Arc<dyn QuizGateway>,
    progress_cache: Arc<ProgressCache>,
    reconciler: Arc<ProgressReconciler>,
}

impl CourseSessionServices {
    /// Wire services from explicit parts. Tests pass scripted gateways and
    /// in-memory storage here.
    #[must_use]
    pub fn new(
        clock: Clock,
        storage: Storage,
        quiz_gateway: Arc<dyn QuizGateway>,
        progress_gateway: Arc<dyn ProgressGateway>,
    ) -> Self {
        let progress_cache = Arc::new(ProgressCache::new(Arc::clone(&storage.progress), clock));
        let reconciler = Arc::new(ProgressReconciler::new(
            Arc::clone(&storage.progress),
            progress_gateway,
        ));
        Self {
            clock,
            storage,
            quiz_gateway,
            progress_cache,
            reconciler,
        }
    }

    /// Build services backed by `SQLite` storage and the HTTP gateways.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: GatewayConfig,
    ) -> Result<Self, ProgressError> {
        let storage = Storage::sqlite(db_url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let gateway = Arc::new(HttpGateway::new(config));
        Ok(Self::new(
            clock,
            storage,
            Arc::clone(&gateway) as Arc<dyn QuizGateway>,
            gateway,
        ))
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// A fresh controller for one quiz screen. Controllers hold the loaded
    /// session and are not shared; caches and reconcilers are.
    #[must_use]
    pub fn attempt_controller(&self) -> AttemptController {
        AttemptController::new(
            self.clock,
            Arc::clone(&self.quiz_gateway),
            Arc::clone(&self.storage.drafts),
        )
    }

    #[must_use]
    pub fn progress_cache(&self) -> Arc<ProgressCache> {
        Arc::clone(&self.progress_cache)
    }

    #[must_use]
    pub fn reconciler(&self) -> Arc<ProgressReconciler> {
        Arc::clone(&self.reconciler)
    }
}
