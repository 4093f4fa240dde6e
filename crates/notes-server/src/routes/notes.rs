//! Note routes: cursor-paginated listing and CRUD.
//!
//! Reads are public. Writes need role `user` or `admin`; deletes need `admin`.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use notes_core::{
    DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, Note, NoteId, NotePage, ROLE_ADMIN, ROLE_USER,
    normalize_note_msg,
};
use serde::Deserialize;

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::JsonBody;
use crate::state::AppState;

/// Roles allowed to create and edit notes.
const WRITER_ROLES: &[&str] = &[ROLE_USER, ROLE_ADMIN];

// ============================================================================
// Request Types
// ============================================================================

/// Query parameters for listing notes. Parsed by hand so that bad values
/// produce the API's own 400 body.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub cursor: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NoteBody {
    pub msg: String,
}

impl ListQuery {
    fn cursor(&self) -> ApiResult<Option<NoteId>> {
        match self.cursor.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => NoteId::parse_positive(raw)
                .map(Some)
                .ok_or_else(|| ApiError::BadRequest("cursor must be a positive integer".to_string())),
        }
    }

    fn limit(&self) -> ApiResult<u32> {
        match self.limit.as_deref().map(str::trim) {
            None | Some("") => Ok(DEFAULT_PAGE_LIMIT),
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|limit| (1..=MAX_PAGE_LIMIT).contains(limit))
                .ok_or_else(|| {
                    ApiError::BadRequest(format!("limit must be between 1 and {MAX_PAGE_LIMIT}"))
                }),
        }
    }
}

fn parse_id(raw: &str) -> ApiResult<NoteId> {
    NoteId::parse_positive(raw)
        .ok_or_else(|| ApiError::BadRequest("id must be a positive integer".to_string()))
}

fn parse_msg(body: &NoteBody) -> ApiResult<String> {
    normalize_note_msg(&body.msg).map_err(ApiError::BadRequest)
}

fn not_found(id: NoteId) -> ApiError {
    ApiError::NotFound(format!("note {id} not found"))
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /v1/notes?cursor=&limit=
async fn list_notes(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<NotePage>> {
    let cursor = query.cursor()?;
    let limit = query.limit()?;

    let items = state
        .bounded("list_notes_page", state.backend().list_notes_page(cursor, limit))
        .await?;
    Ok(Json(NotePage::from_items(items, limit)))
}

/// GET /v1/notes/{id}
async fn get_note(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Note>> {
    let id = parse_id(&id)?;
    let note = state
        .bounded("get_note", state.backend().get_note(id))
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(note))
}

/// POST /v1/notes
async fn create_note(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    JsonBody(body): JsonBody<NoteBody>,
) -> ApiResult<(StatusCode, Json<Note>)> {
    user.require_role(WRITER_ROLES)?;
    let msg = parse_msg(&body)?;

    let note = state
        .bounded("create_note", state.backend().create_note(&msg))
        .await?;
    state.metrics().note_created();
    tracing::info!(note_id = %note.id, user_id = %user.user_id, "Note created");

    Ok((StatusCode::CREATED, Json(note)))
}

/// PATCH /v1/notes/{id}
async fn update_note(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<NoteBody>,
) -> ApiResult<Json<Note>> {
    user.require_role(WRITER_ROLES)?;
    let id = parse_id(&id)?;
    let msg = parse_msg(&body)?;

    let note = state
        .bounded("update_note", state.backend().update_note(id, &msg))
        .await?
        .ok_or_else(|| not_found(id))?;
    tracing::info!(note_id = %id, user_id = %user.user_id, "Note updated");

    Ok(Json(note))
}

/// DELETE /v1/notes/{id}
async fn delete_note(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    user.require_role(&[ROLE_ADMIN])?;
    let id = parse_id(&id)?;

    if !state.bounded("delete_note", state.backend().delete_note(id)).await? {
        return Err(not_found(id));
    }
    tracing::info!(note_id = %id, user_id = %user.user_id, "Note deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Build note routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/notes", get(list_notes).post(create_note))
        .route(
            "/v1/notes/{id}",
            get(get_note).patch(update_note).delete(delete_note),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(cursor: Option<&str>, limit: Option<&str>) -> ListQuery {
        ListQuery {
            cursor: cursor.map(str::to_string),
            limit: limit.map(str::to_string),
        }
    }

    #[test]
    fn test_limit_bounds() {
        assert_eq!(query(None, None).limit().unwrap(), DEFAULT_PAGE_LIMIT);
        assert_eq!(query(None, Some("1")).limit().unwrap(), 1);
        assert_eq!(query(None, Some("100")).limit().unwrap(), 100);
        assert!(query(None, Some("0")).limit().is_err());
        assert!(query(None, Some("101")).limit().is_err());
        assert!(query(None, Some("ten")).limit().is_err());
    }

    #[test]
    fn test_cursor_parsing() {
        assert_eq!(query(None, None).cursor().unwrap(), None);
        assert_eq!(query(Some("42"), None).cursor().unwrap(), Some(NoteId(42)));
        assert!(query(Some("-1"), None).cursor().is_err());
        assert!(query(Some("abc"), None).cursor().is_err());
    }
}
