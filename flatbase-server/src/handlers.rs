use std::sync::Arc;

use axum::body::Body;
use bytes::Bytes;
use axum::extract::{Form, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use flatbase_auth::AuthError;
use flatbase_engine::{json_array_chunks, scan_table, split_query, validate};
use futures::TryStreamExt;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UserCreate {
    user_name: String,
    password: String,
}

/// `grant_type=password, username, password`, the OAuth2-password-grant
/// shape the original implementation borrowed for login and connect.
#[derive(Debug, Deserialize)]
pub struct PasswordGrant {
    #[allow(dead_code)]
    grant_type: String,
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    db_name: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    access_token: String,
    refresh_token: String,
    token_type: &'static str,
}

impl From<flatbase_auth::TokenPair> for TokenResponse {
    fn from(pair: flatbase_auth::TokenPair) -> Self {
        TokenResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "bearer",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    db_name: String,
    query: String,
}

pub async fn sigin(
    State(state): State<AppState>,
    Json(body): Json<UserCreate>,
) -> Result<StatusCode, ApiError> {
    state.auth.sign_up(&body.user_name, &body.password).await?;
    info!("created user '{}'", body.user_name);
    Ok(StatusCode::CREATED)
}

pub async fn login(
    State(state): State<AppState>,
    Form(grant): Form<PasswordGrant>,
) -> Result<Json<TokenResponse>, ApiError> {
    let pair = state.auth.sign_in(&grant.username, &grant.password).await?;
    Ok(Json(pair.into()))
}

pub async fn connect(
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
    Form(grant): Form<PasswordGrant>,
) -> Result<Json<TokenResponse>, ApiError> {
    let pair = state
        .auth
        .connect(&grant.username, &grant.password, &params.db_name, &state.catalog)
        .await?;
    info!("user '{}' connected to database '{}'", grant.username, params.db_name);
    Ok(Json(pair.into()))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let pair = state
        .auth
        .refresh(&body.access_token, &body.refresh_token)
        .await?;
    Ok(Json(pair.into()))
}

pub async fn disconnect(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let access_token = bearer_token(&headers)?;
    let user_name = state.auth.authenticate(access_token)?;
    state.auth.disconnect(&user_name).await?;
    info!("user '{user_name}' disconnected");
    Ok(StatusCode::OK)
}

pub async fn query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<QueryRequest>,
) -> Result<Response, ApiError> {
    let access_token = bearer_token(&headers)?;
    let user_name = state.auth.authenticate(access_token)?;

    let bound = state.auth.bound_database(&user_name).await;
    match &bound {
        Some(db) if *db == body.db_name => {}
        Some(_) => {
            return Err(AuthError::unauthorized(
                "access token is not bound to the requested database",
            )
            .into())
        }
        None => {
            return Err(AuthError::unauthorized("no active database binding").into())
        }
    }

    let raw = split_query(&body.query)?;
    let validated = validate(raw, &state.catalog, Some(body.db_name.as_str()))?;

    let database = state
        .catalog
        .database(&validated.database)
        .ok_or_else(|| flatbase_engine::EngineError::internal("validated database vanished from catalog"))?;
    let schema = Arc::new(
        database
            .table(&validated.table)
            .ok_or_else(|| flatbase_engine::EngineError::internal("validated table vanished from database"))?
            .clone(),
    );
    let row_file = database.row_file_path(&validated.table);

    let rows = scan_table(row_file, schema, validated.projection, validated.predicate).await?;
    let chunks = json_array_chunks(Box::pin(rows)).map_ok(Bytes::from);
    let body = Body::from_stream(chunks);

    Ok((
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AuthError::unauthorized("missing or malformed Authorization header").into())
}
