//! Static vehicle and part catalog lookups

use std::path::PathBuf;

use axum::{
    body::Body,
    extract::{Path, Request, State},
    response::Response,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::{ApiError, AppState};

/// A section of the catalog
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogKind {
    /// Models and vehicles, keyed by manufacturer
    Vehicles,
    /// Parts, keyed by vehicle
    Parts,
}

impl CatalogKind {
    fn dir(self) -> &'static str {
        match self {
            Self::Vehicles => "vehicles",
            Self::Parts => "parts",
        }
    }
}

/// A directory of pre-generated JSON documents
#[derive(Clone, Debug)]
pub struct Catalog {
    root: PathBuf,
}

impl Catalog {
    /// Serves documents from beneath `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Locates the document for `id`
    ///
    /// Ids are restricted to ASCII letters, digits, `_` and `-`, so the
    /// result always stays inside the catalog directory.
    pub fn document(&self, kind: CatalogKind, id: &str) -> Result<PathBuf, ApiError> {
        if !is_valid_id(id) {
            return Err(ApiError::InvalidCatalogId);
        }

        Ok(self.root.join(kind.dir()).join(format!("{id}.json")))
    }

    async fn serve(
        &self,
        kind: CatalogKind,
        id: &str,
        request: Request,
    ) -> Result<Response, ApiError> {
        let path = self.document(kind, id)?;

        match ServeFile::new(path).oneshot(request).await {
            Ok(res) => Ok(res.map(Body::new)),
            Err(never) => match never {},
        }
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Serves the models and vehicles for a manufacturer
pub async fn vehicle(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    state.catalog.serve(CatalogKind::Vehicles, &id, request).await
}

/// Serves the parts for a vehicle
pub async fn part(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    state.catalog.serve(CatalogKind::Parts, &id, request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_are_json_files_by_kind() {
        let catalog = Catalog::new("/srv/json");

        assert_eq!(
            catalog.document(CatalogKind::Vehicles, "ford").unwrap(),
            PathBuf::from("/srv/json/vehicles/ford.json")
        );
        assert_eq!(
            catalog.document(CatalogKind::Parts, "mustang_1967-gt").unwrap(),
            PathBuf::from("/srv/json/parts/mustang_1967-gt.json")
        );
    }

    #[test]
    fn ids_that_could_leave_the_catalog_are_rejected() {
        let catalog = Catalog::new("/srv/json");

        for id in ["", "..", "../secrets", "a/b", "a\\b", "ford.json", "f%2e"] {
            assert!(
                matches!(
                    catalog.document(CatalogKind::Vehicles, id),
                    Err(ApiError::InvalidCatalogId)
                ),
                "accepted {id:?}"
            );
        }
    }
}
