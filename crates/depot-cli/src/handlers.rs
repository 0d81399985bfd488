//! HTTP handlers for package index documents and download redirects.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION},
        StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use depot_registry::{
    is_strict_version, is_valid_package_name, GetOptions, NameVersionFilter, Package, Redirect,
    RegistryError, ARCHIVE_EXTENSION,
};
use serde_json::json;
use tracing::{error, warn};

use crate::{server::AppState, utils::cache_control};

const NOT_FOUND_MESSAGE: &str = "package revision not found";

enum Artifact {
    Archive,
    Signature,
}

fn bad_request(message: &'static str) -> Response {
    (StatusCode::BAD_REQUEST, message).into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE).into_response()
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
}

fn validate_revision(name: &str, version: &str) -> Result<(), Response> {
    if !is_valid_package_name(name) {
        return Err(bad_request("invalid package name"));
    }
    if !is_strict_version(version) {
        return Err(bad_request("invalid package version"));
    }
    Ok(())
}

/// Looks up the single package matching `name` and `version`.
fn find_package(state: &AppState, name: &str, version: &str) -> Option<Arc<Package>> {
    let opts = GetOptions::with_filter(NameVersionFilter::new(name, version));
    let packages = state.indexer.get(Some(&opts));
    match packages.as_ref() {
        [package] => Some(Arc::clone(package)),
        [] => None,
        _ => {
            warn!(
                package.name = name,
                package.version = version,
                matches = packages.len(),
                "ambiguous package revision"
            );
            None
        }
    }
}

fn redirect(state: &AppState, package: &Package, result: depot_registry::Result<Redirect>) -> Response {
    match result {
        Ok(redirect) => {
            (
                StatusCode::MOVED_PERMANENTLY,
                [
                    (LOCATION, redirect.location.to_string()),
                    (CACHE_CONTROL, cache_control(state.cache_time_artifacts)),
                ],
            )
                .into_response()
        }
        Err(RegistryError::InvalidResourcePath(_)) => bad_request("invalid resource path"),
        Err(err) => {
            error!(
                base_path = %package.base_path,
                error = %err,
                "can't resolve package resource"
            );
            internal_error()
        }
    }
}

/// `GET /package/{name}/{version}/`
pub async fn package_index(
    State(state): State<AppState>,
    Path((name, version)): Path<(String, String)>,
) -> Response {
    if let Err(response) = validate_revision(&name, &version) {
        return response;
    }
    let Some(package) = find_package(&state, &name, &version) else {
        return not_found();
    };

    match serde_json::to_string_pretty(package.as_ref()) {
        Ok(body) => {
            (
                [
                    (CONTENT_TYPE, "application/json".to_string()),
                    (CACHE_CONTROL, cache_control(state.cache_time_index)),
                ],
                body,
            )
                .into_response()
        }
        Err(err) => {
            error!(
                base_path = %package.base_path,
                error = %err,
                "can't serialize package index"
            );
            internal_error()
        }
    }
}

/// `GET /package/{name}/{version}/{*resource}`
pub async fn static_resource(
    State(state): State<AppState>,
    Path((name, version, resource)): Path<(String, String, String)>,
) -> Response {
    if let Err(response) = validate_revision(&name, &version) {
        return response;
    }
    let Some(package) = find_package(&state, &name, &version) else {
        return not_found();
    };

    let result = package.resolver().redirect_static(&package, &resource);
    redirect(&state, &package, result)
}

/// Splits `<name>-<version>.zip[.sig]` into the version and the requested artifact.
fn parse_artifact_file<'a>(name: &str, file: &'a str) -> Option<(&'a str, Artifact)> {
    let (stem, artifact) = match file.strip_suffix(".sig") {
        Some(stem) => (stem, Artifact::Signature),
        None => (file, Artifact::Archive),
    };
    let version = stem
        .strip_suffix(ARCHIVE_EXTENSION)?
        .strip_suffix('.')?
        .strip_prefix(name)?
        .strip_prefix('-')?;
    Some((version, artifact))
}

/// `GET /epr/{name}/{name}-{version}.zip` and its `.sig` companion.
pub async fn artifact(
    State(state): State<AppState>,
    Path((name, file)): Path<(String, String)>,
) -> Response {
    if !is_valid_package_name(&name) {
        return bad_request("invalid package name");
    }
    let Some((version, artifact)) = parse_artifact_file(&name, &file) else {
        return not_found();
    };
    if !is_strict_version(version) {
        return bad_request("invalid package version");
    }
    let Some(package) = find_package(&state, &name, version) else {
        return not_found();
    };

    let result = match artifact {
        Artifact::Archive => package.resolver().redirect_artifact(&package),
        Artifact::Signature => package.resolver().redirect_signature(&package),
    };
    redirect(&state, &package, result)
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Response {
    let snapshot = state.indexer.snapshot();
    Json(json!({
        "status": "ok",
        "cursor": snapshot.cursor(),
        "packages": snapshot.len(),
    }))
    .into_response()
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Response {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.stats.render(),
    )
        .into_response()
}
