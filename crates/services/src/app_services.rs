use lesson_core::Clock;
use storage::repository::Storage;

use crate::catalog_service::CatalogService;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;
use crate::session::LessonSession;
use crate::unlock_service::UnlockService;

/// Bundle of all services wired over one storage backend.
///
/// Construct once at startup and hand out clones; the services share the
/// underlying key-value repository.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: CatalogService,
    pub progress: ProgressService,
    pub unlock: UnlockService,
    clock: Clock,
}

impl AppServices {
    #[must_use]
    pub fn new(storage: &Storage, catalog: CatalogService, clock: Clock) -> Self {
        Self {
            catalog,
            progress: ProgressService::new(storage.kv.clone()),
            unlock: UnlockService::new(storage.kv.clone()),
            clock,
        }
    }

    /// Wire services over a `SQLite` database, running migrations first.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Sqlite` if connection or migration fails.
    pub async fn new_sqlite(
        database_url: &str,
        catalog: CatalogService,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(database_url).await?;
        Ok(Self::new(&storage, catalog, Clock::default_clock()))
    }

    /// Wire services over an in-memory store. Nothing survives the process.
    #[must_use]
    pub fn in_memory(catalog: CatalogService) -> Self {
        Self::new(
            &Storage::in_memory(),
            catalog,
            Clock::default_clock(),
        )
    }

    /// Load the catalog and open an interactive session over it.
    ///
    /// Catalog load failures degrade to an empty catalog, so this cannot
    /// fail; persisted progress and unlock state are restored.
    pub async fn open_session(&self) -> LessonSession {
        let catalog = self.catalog.load().await;
        LessonSession::open(
            catalog,
            self.progress.clone(),
            self.unlock.clone(),
            self.clock,
        )
        .await
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
