//! API service routes

use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde_json::json;
use social::{
    PairKey, PeopleQuery, Session,
    catalog::{INTEREST_CATEGORIES, SOCIETIES, all_interests},
    models::{ImageSlot, NewGroup, ProfileSignup, ProfileUpdate, UserProfile},
    profiles::{MAX_IMAGE_BYTES, username_suggestions},
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::auth_middleware,
    models::{
        AvailabilityResponse, DeletePostPayload, PersonResponse, RemovedResponse, RenamePayload,
        RenameResponse, RequestListResponse, SendRequestPayload, SuggestionsQuery, UploadResponse,
    },
};

/// Multipart overhead allowed on top of the image itself
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let uploads = Router::new()
        .route("/profiles/me/images/:slot", post(upload_profile_image))
        .route("/profiles/me/posts", post(add_post).delete(delete_post))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + UPLOAD_OVERHEAD_BYTES));

    let protected_routes = Router::new()
        .route("/profiles", post(create_profile))
        .route("/profiles/me", get(get_my_profile).patch(update_my_profile))
        .route("/profiles/me/username", put(rename_username))
        .merge(uploads)
        .route("/people", get(people_directory))
        .route("/people/:user", get(person_by_username))
        .route("/people/:user/connections", get(user_connections))
        .route("/connections", get(my_connections))
        .route("/connections/count", get(my_connections_count))
        .route("/connections/requests", post(send_request))
        .route("/connections/requests/received", get(received_requests))
        .route("/connections/requests/sent", get(sent_requests))
        .route("/connections/requests/:id", delete(cancel_request))
        .route("/connections/requests/:id/accept", post(accept_request))
        .route("/connections/requests/:id/decline", post(decline_request))
        .route("/connections/status/:uid", get(connection_status))
        .route("/connections/:uid", delete(remove_connection))
        .route("/groups", get(list_groups).post(create_group))
        .route("/groups/mine", get(my_groups))
        .route("/groups/recommended", get(recommended_groups))
        .route("/groups/:id", get(get_group))
        .route("/groups/:id/join", post(join_group))
        .route("/groups/:id/leave", post(leave_group))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/usernames/suggestions", get(suggest_usernames))
        .route("/usernames/:name/availability", get(username_availability))
        .route("/catalog/interests", get(interest_catalog))
        .route("/catalog/societies", get(society_catalog))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match &state.db_pool {
        Some(pool) => Some(common::database::health_check(pool).await.unwrap_or(false)),
        None => None,
    };
    let cache = match &state.cache {
        Some(cache) => Some(cache.health_check().await.unwrap_or(false)),
        None => None,
    };
    // Cache status is reported but never fails the check
    let healthy = database.unwrap_or(true);
    let (status, label) = if healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(json!({
            "status": label,
            "service": "linkup-api",
            "database": database,
            "cache": cache,
        })),
    )
}

pub async fn username_availability(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let available = state.profiles.check_username_availability(&name).await?;
    Ok(Json(AvailabilityResponse {
        username: name.trim().to_lowercase(),
        available,
    }))
}

pub async fn suggest_usernames(Query(query): Query<SuggestionsQuery>) -> impl IntoResponse {
    Json(username_suggestions(&query.name, &query.email))
}

pub async fn interest_catalog() -> impl IntoResponse {
    Json(json!({
        "categories": INTEREST_CATEGORIES,
        "all": all_interests(),
    }))
}

pub async fn society_catalog() -> impl IntoResponse {
    Json(SOCIETIES)
}

/// Create the caller's profile
pub async fn create_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<ProfileSignup>,
) -> ApiResult<impl IntoResponse> {
    let profile = state.profiles.create_profile(&session, payload).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn get_my_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let profile = state.profiles.get_profile(session.user_id()).await?;
    Ok(Json(profile))
}

pub async fn update_my_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<ProfileUpdate>,
) -> ApiResult<impl IntoResponse> {
    let profile = state.profiles.update_profile(&session, payload).await?;
    Ok(Json(profile))
}

pub async fn rename_username(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<RenamePayload>,
) -> ApiResult<impl IntoResponse> {
    let (previous, profile) = state
        .profiles
        .rename_username(&session, &payload.username)
        .await?;

    if let Some(cache) = &state.cache {
        let old_key = username_cache_key(&previous);
        let new_key = username_cache_key(&profile.username);
        if let Err(e) = cache.delete(&[old_key.as_str(), new_key.as_str()]).await {
            warn!("Failed to invalidate username cache: {}", e);
        }
    }

    Ok(Json(RenameResponse { previous, profile }))
}

pub async fn upload_profile_image(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(slot): Path<String>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let slot: ImageSlot = slot.parse()?;
    let (bytes, content_type) = read_file_field(multipart).await?;

    let url = state
        .profiles
        .upload_profile_image(&session, slot, bytes, &content_type)
        .await?;
    Ok(Json(UploadResponse { url }))
}

pub async fn add_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let (bytes, content_type) = read_file_field(multipart).await?;
    let profile = state
        .profiles
        .add_post(&session, bytes, &content_type)
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<DeletePostPayload>,
) -> ApiResult<impl IntoResponse> {
    state.profiles.delete_post(&session, &payload.url).await?;
    Ok(Json(json!({"message": "Post deleted successfully"})))
}

/// Read the `file` field of a multipart body
async fn read_file_field(mut multipart: Multipart) -> ApiResult<(Vec<u8>, String)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        return Ok((bytes.to_vec(), content_type));
    }
    Err(ApiError::BadRequest(
        "Missing multipart field: file".to_string(),
    ))
}

pub async fn people_directory(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<PeopleQuery>,
) -> ApiResult<impl IntoResponse> {
    let people = state.profiles.directory(session.user_id(), &query).await?;
    Ok(Json(people))
}

fn username_cache_key(username: &str) -> String {
    format!("username:{}", username.trim().to_lowercase())
}

/// Resolve a username, going through the Redis cache when one is configured
async fn resolve_username(state: &AppState, username: &str) -> ApiResult<Option<UserProfile>> {
    let username = username.trim().to_lowercase();
    let key = username_cache_key(&username);

    if let Some(cache) = &state.cache {
        match cache.get(&key).await {
            Ok(Some(uid)) => {
                if let Some(profile) = state
                    .profiles
                    .get_profile(&uid)
                    .await
                    .ok()
                    .filter(|p| p.username == username)
                {
                    return Ok(Some(profile));
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Username cache lookup failed: {}", e),
        }
    }

    let profile = state.profiles.find_by_username(&username).await?;
    if let (Some(cache), Some(profile)) = (&state.cache, &profile) {
        if let Err(e) = cache
            .set(&key, &profile.uid, Some(state.username_ttl_seconds))
            .await
        {
            warn!("Failed to cache username {}: {}", username, e);
        }
    }
    Ok(profile)
}

pub async fn person_by_username(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(username): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let profile = resolve_username(&state, &username)
        .await?
        .ok_or_else(|| social::SocialError::not_found("user", &username))?;
    let connection = state
        .connections
        .get_status(session.user_id(), &profile.uid)
        .await;

    Ok(Json(PersonResponse {
        profile,
        connection,
    }))
}

pub async fn user_connections(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let views = state.connections.connection_views(&uid).await?;
    Ok(Json(views))
}

pub async fn my_connections(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let views = state.connections.connection_views(session.user_id()).await?;
    Ok(Json(views))
}

pub async fn my_connections_count(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let count = state.connections.connections_count(session.user_id()).await?;
    Ok(Json(json!({ "count": count })))
}

pub async fn send_request(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<SendRequestPayload>,
) -> ApiResult<impl IntoResponse> {
    let request = state
        .connections
        .send_request(&session, &payload.to)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn received_requests(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let requests = state
        .connections
        .received_requests(session.user_id())
        .await?;
    Ok(Json(RequestListResponse::from(requests)))
}

pub async fn sent_requests(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let requests = state.connections.sent_requests(session.user_id()).await?;
    Ok(Json(RequestListResponse::from(requests)))
}

pub async fn accept_request(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let connection = state
        .connections
        .accept_request(&session, &PairKey::from_raw(id))
        .await?;
    Ok(Json(connection))
}

pub async fn decline_request(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = PairKey::from_raw(id);
    state.connections.decline_request(&session, &id).await?;
    Ok(Json(RemovedResponse {
        id,
        message: "Connection request declined",
    }))
}

pub async fn cancel_request(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = PairKey::from_raw(id);
    state.connections.cancel_request(&session, &id).await?;
    Ok(Json(RemovedResponse {
        id,
        message: "Connection request cancelled",
    }))
}

pub async fn connection_status(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(uid): Path<String>,
) -> impl IntoResponse {
    Json(state.connections.get_status(session.user_id(), &uid).await)
}

pub async fn remove_connection(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(uid): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.connections.remove_connection(&session, &uid).await?;
    Ok(Json(RemovedResponse {
        id: PairKey::new(session.user_id(), &uid),
        message: "Connection removed",
    }))
}

pub async fn list_groups(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.groups.list().await?))
}

pub async fn create_group(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<NewGroup>,
) -> ApiResult<impl IntoResponse> {
    let group = state.groups.create(&session, payload).await?;
    info!("Group {} created by {}", group.id, session.user_id());
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn my_groups(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.groups.my_groups(session.user_id()).await?))
}

/// Groups matching the caller's profile interests
pub async fn recommended_groups(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let profile = state.profiles.get_profile(session.user_id()).await?;
    let groups = state
        .groups
        .recommended(session.user_id(), &profile.interests)
        .await?;
    Ok(Json(groups))
}

pub async fn get_group(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.groups.get(id).await?))
}

pub async fn join_group(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.groups.join(&session, id).await?))
}

pub async fn leave_group(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.groups.leave(&session, id).await?))
}
