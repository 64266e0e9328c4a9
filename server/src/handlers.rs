// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::colors;
use crate::database;
use crate::events::StoreEvent;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::routes::AppState;
use axum::{
    Json,
    extract::{
        State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};
use tracker_common::{
    Category, CategoryPayload, CompletionIndex, CreateTrackerPayload, MAX_TRACKER_NAME_LEN,
    PINNED_SECTION_TITLE, PinPayload, RecordPayload, Schedule, Section, Statistics, Tracker,
    TrackerKind, TrackerQuery, TrackerRecord, TrackerView, UpdateTrackerPayload,
    compute_statistics, filter_trackers, group_into_sections,
};

// --- Trackers ---

/// Loads trackers and records and applies the query's filter for its day.
async fn filtered_views(state: &AppState, query: TrackerQuery) -> Result<Vec<TrackerView>, AppError> {
    let date = query.date.unwrap_or_else(|| state.clock.today());
    let mode = query.filter.unwrap_or_default();
    let search = query.search.unwrap_or_default();
    debug!("Filtering trackers: date={}, mode={:?}, search={:?}", date, mode, search);

    let trackers = state.store.list_trackers().await?;
    let records = state.store.list_records().await?;
    let index = CompletionIndex::new(&records);

    let views = filter_trackers(&trackers, mode, date, &search, |tracker, day| {
        index.is_completed(tracker.id, day)
    })
    .into_iter()
    .map(|tracker| TrackerView {
        completed: index.is_completed(tracker.id, date),
        completed_days: index.completed_days(tracker.id),
        tracker,
    })
    .collect();

    Ok(views)
}

/// Handler for listing the trackers matching a day, filter and search.
pub async fn list_trackers(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<TrackerQuery>,
) -> Result<Json<Vec<TrackerView>>, AppError> {
    let views = filtered_views(&state, query).await?;
    info!("Successfully retrieved {} trackers.", views.len());
    Ok(Json(views))
}

/// Handler for the same listing grouped into display sections.
pub async fn list_tracker_sections(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<TrackerQuery>,
) -> Result<Json<Vec<Section<TrackerView>>>, AppError> {
    let views = filtered_views(&state, query).await?;
    let categories = state.store.list_categories().await?;
    Ok(Json(group_into_sections(views, &categories)))
}

/// Checks the fields shared by tracker creation and edits.
fn validate_tracker(
    name: &str,
    emoji: &str,
    color: Option<&str>,
    kind: TrackerKind,
    schedule: &Schedule,
) -> Result<(), AppError> {
    if name.is_empty() || emoji.trim().is_empty() {
        error!("Validation failed: Tracker name or emoji is empty.");
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "Tracker name and emoji cannot be empty.",
        ));
    }
    if name.chars().count() > MAX_TRACKER_NAME_LEN {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            &format!("Tracker name cannot be longer than {MAX_TRACKER_NAME_LEN} characters."),
        ));
    }
    if let Some(color) = color {
        if !colors::is_valid_hex_color(color) {
            return Err(AppError::new(
                StatusCode::BAD_REQUEST,
                &format!("Color {color:?} is not a #RRGGBB hex color."),
            ));
        }
    }
    if kind == TrackerKind::Habit && schedule.is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "A habit needs at least one scheduled weekday.",
        ));
    }
    Ok(())
}

async fn ensure_category_exists(state: &AppState, category_id: Option<i64>) -> Result<(), AppError> {
    let Some(category_id) = category_id else {
        return Ok(());
    };
    if state.store.get_category(category_id).await?.is_none() {
        error!("Validation failed: Category {} does not exist.", category_id);
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            &format!("Category {category_id} does not exist."),
        ));
    }
    Ok(())
}

/// Handler for creating a new tracker.
pub async fn create_tracker(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<CreateTrackerPayload>,
) -> Result<(StatusCode, Json<Tracker>), AppError> {
    debug!("Received request to create tracker: {}", payload.name);
    payload.name = payload.name.trim().to_string();
    validate_tracker(
        &payload.name,
        &payload.emoji,
        payload.color.as_deref(),
        payload.kind,
        &payload.schedule,
    )?;
    ensure_category_exists(&state, payload.category_id).await?;

    let tracker = state.store.create_tracker(payload).await?;

    info!("Tracker created successfully with ID: {}", tracker.id);
    Ok((StatusCode::CREATED, Json(tracker)))
}

/// Handler for editing a tracker by ID.
pub async fn update_tracker(
    State(state): State<AppState>,
    AppPath(tracker_id): AppPath<i64>,
    AppJson(mut payload): AppJson<UpdateTrackerPayload>,
) -> Result<Json<Tracker>, AppError> {
    debug!("Received request to update tracker with ID: {}", tracker_id);
    let Some(existing) = state.store.get_tracker(tracker_id).await? else {
        return Err(AppError::not_found("Tracker", tracker_id));
    };
    payload.name = payload.name.trim().to_string();
    // The schedule rule depends on the kind the tracker ends up with.
    let kind = payload.kind.unwrap_or(existing.kind);
    validate_tracker(
        &payload.name,
        &payload.emoji,
        payload.color.as_deref(),
        kind,
        &payload.schedule,
    )?;
    ensure_category_exists(&state, payload.category_id).await?;

    match state.store.update_tracker(tracker_id, payload).await? {
        Some(tracker) => Ok(Json(tracker)),
        None => Err(AppError::not_found("Tracker", tracker_id)),
    }
}

/// Handler for pinning or unpinning a tracker.
pub async fn pin_tracker(
    State(state): State<AppState>,
    AppPath(tracker_id): AppPath<i64>,
    AppJson(payload): AppJson<PinPayload>,
) -> Result<Json<Tracker>, AppError> {
    match state.store.set_tracker_pinned(tracker_id, payload.pinned).await? {
        Some(tracker) => {
            info!("Tracker {} pinned={}.", tracker_id, payload.pinned);
            Ok(Json(tracker))
        }
        None => Err(AppError::not_found("Tracker", tracker_id)),
    }
}

/// Handler for deleting a tracker by ID, along with its records.
pub async fn delete_tracker(
    State(state): State<AppState>,
    AppPath(tracker_id): AppPath<i64>,
) -> Result<StatusCode, AppError> {
    debug!("Attempting to delete tracker with ID: {}", tracker_id);

    if state.store.delete_tracker(tracker_id).await? {
        info!("Tracker with ID {} deleted successfully.", tracker_id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("Tracker", tracker_id))
    }
}

// --- Categories ---

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.store.list_categories().await?))
}

/// Validates a category title and returns it trimmed. `renaming` is the ID
/// of the category being renamed, which may keep its own title.
async fn checked_title(
    state: &AppState,
    title: &str,
    renaming: Option<i64>,
) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "Category title cannot be empty.",
        ));
    }
    if title.eq_ignore_ascii_case(PINNED_SECTION_TITLE) {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            &format!("{PINNED_SECTION_TITLE:?} is a reserved category title."),
        ));
    }
    if let Some(existing) = state.store.find_category_by_title(title).await? {
        if Some(existing.id) != renaming {
            error!("Category title {:?} is already used by ID {}.", title, existing.id);
            return Err(AppError::new(
                StatusCode::CONFLICT,
                &format!("A category named {title:?} already exists."),
            ));
        }
    }
    Ok(title.to_string())
}

/// `checked_title` runs before the write, so a concurrent request can still
/// take the title first; the unique index then rejects ours.
fn title_conflict(err: anyhow::Error, title: &str) -> AppError {
    if database::is_unique_violation(&err) {
        error!("Category title {:?} was taken concurrently.", title);
        AppError::new(
            StatusCode::CONFLICT,
            &format!("A category named {title:?} already exists."),
        )
    } else {
        err.into()
    }
}

pub async fn create_category(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CategoryPayload>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let title = checked_title(&state, &payload.title, None).await?;
    let category = state
        .store
        .create_category(&title)
        .await
        .map_err(|err| title_conflict(err, &title))?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn rename_category(
    State(state): State<AppState>,
    AppPath(category_id): AppPath<i64>,
    AppJson(payload): AppJson<CategoryPayload>,
) -> Result<Json<Category>, AppError> {
    let title = checked_title(&state, &payload.title, Some(category_id)).await?;
    let renamed = state
        .store
        .rename_category(category_id, &title)
        .await
        .map_err(|err| title_conflict(err, &title))?;
    match renamed {
        Some(category) => Ok(Json(category)),
        None => Err(AppError::not_found("Category", category_id)),
    }
}

pub async fn delete_category(
    State(state): State<AppState>,
    AppPath(category_id): AppPath<i64>,
) -> Result<StatusCode, AppError> {
    if state.store.delete_category(category_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("Category", category_id))
    }
}

// --- Records ---

pub async fn list_records(
    State(state): State<AppState>,
) -> Result<Json<Vec<TrackerRecord>>, AppError> {
    Ok(Json(state.store.list_records().await?))
}

/// Handler for marking a tracker completed on a day. Repeating it, or naming
/// an unknown tracker, is accepted and changes nothing.
pub async fn add_record(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RecordPayload>,
) -> Result<StatusCode, AppError> {
    let day = payload.date.day();
    let today = state.clock.today();
    if day > today {
        error!(
            "Validation failed: Record date {} for tracker {} is after today ({}).",
            day, payload.tracker_id, today
        );
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            &format!("Cannot complete a tracker on a future date ({day})."),
        ));
    }

    state.store.add_record(payload.tracker_id, day).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for unmarking a tracker on a day. Missing records are accepted.
pub async fn remove_record(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RecordPayload>,
) -> Result<StatusCode, AppError> {
    state
        .store
        .remove_record(payload.tracker_id, payload.date.day())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Statistics and change notifications ---

pub async fn statistics(State(state): State<AppState>) -> Result<Json<Statistics>, AppError> {
    let records = state.store.list_records().await?;
    let tracker_count = state.store.count_trackers().await?;
    Ok(Json(compute_statistics(&records, tracker_count)))
}

/// Streams store changes as server-sent events. Clients refetch whatever the
/// event invalidates; a `resync` event means some events were missed.
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let receiver = state.store.events().subscribe();
    debug!("New change subscriber.");

    let stream = BroadcastStream::new(receiver).map(|message| {
        let event = match message {
            Ok(event) => event,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!("Change subscriber lagged, {} events skipped.", skipped);
                StoreEvent::Resync
            }
        };
        Event::default().event(event.name()).json_data(event)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// --- Custom Error Handling ---

/// Our custom error type for the application.
pub struct AppError {
    code: StatusCode,
    message: String,
}

impl AppError {
    fn new(code: StatusCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }

    fn not_found(entity: &str, id: i64) -> Self {
        error!("{} with ID {} not found.", entity, id);
        Self::new(
            StatusCode::NOT_FOUND,
            &format!("{entity} with ID {id} not found."),
        )
    }
}

/// Allows converting an `anyhow::Error` (coming from `database.rs`)
/// into our `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Log the internal error for debugging.
        tracing::error!("Internal server error: {:?}", err);
        Self {
            code: StatusCode::INTERNAL_SERVER_ERROR,
            message: "An internal error occurred.".to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        error!("Rejected request body: {}", rejection.body_text());
        Self::new(rejection.status(), &rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        error!("Rejected path parameters: {}", rejection.body_text());
        Self::new(rejection.status(), &rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        error!("Rejected query string: {}", rejection.body_text());
        Self::new(rejection.status(), &rejection.body_text())
    }
}

/// Allows Axum to convert our `AppError` into an HTTP `Response`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(
            "Responding with error: status_code={}, message={}",
            self.code.as_u16(),
            self.message
        );
        (
            self.code,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}
