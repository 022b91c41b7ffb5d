use std::path::PathBuf;

use lesson_core::model::{Catalog, CatalogDocument};

use crate::error::CatalogLoadError;

/// Loads the lesson catalog from the content source.
///
/// The source may be an HTTP endpoint returning `{ "lessons": [...] }` or a
/// local catalog file. Loading never fails outward: transport errors,
/// malformed documents, and invalid catalogs all degrade to an empty catalog
/// with a logged diagnostic, and the engine proceeds.
#[derive(Debug, Clone)]
pub struct CatalogService {
    source: CatalogSource,
}

#[derive(Debug, Clone)]
enum CatalogSource {
    Http { client: reqwest::Client, url: String },
    File(PathBuf),
}

impl CatalogService {
    /// Fetch the catalog from an HTTP content source.
    #[must_use]
    pub fn over_http(url: impl Into<String>) -> Self {
        Self {
            source: CatalogSource::Http {
                client: reqwest::Client::new(),
                url: url.into(),
            },
        }
    }

    /// Read the catalog from a local file.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: CatalogSource::File(path.into()),
        }
    }

    /// Load the catalog, substituting an empty catalog on any failure.
    pub async fn load(&self) -> Catalog {
        match self.try_load().await {
            Ok(catalog) => {
                tracing::debug!(lessons = catalog.len(), "catalog loaded");
                catalog
            }
            Err(err) => {
                tracing::warn!(error = %err, "catalog load failed, continuing with empty catalog");
                Catalog::empty()
            }
        }
    }

    async fn try_load(&self) -> Result<Catalog, CatalogLoadError> {
        let text = match &self.source {
            CatalogSource::Http { client, url } => {
                let response = client.get(url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(CatalogLoadError::HttpStatus(status));
                }
                response.text().await?
            }
            CatalogSource::File(path) => std::fs::read_to_string(path)?,
        };
        Self::parse(&text)
    }

    /// Parse and validate a catalog document.
    ///
    /// # Errors
    ///
    /// Returns `CatalogLoadError` for malformed JSON or duplicate/empty
    /// lesson ids.
    pub fn parse(text: &str) -> Result<Catalog, CatalogLoadError> {
        let document: CatalogDocument = serde_json::from_str(text)?;
        Ok(document.into_catalog()?)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
