use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::NaiveDate;
use http_body_util::BodyExt; // For `collect`
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt; // For `oneshot`
use tracker_common::{Category, Section, Statistics, Tracker, TrackerView};
use tracker_server::clock::FixedClock;
use tracker_server::database::{Store, connect_in_memory};
use tracker_server::events::{ChangeNotifier, StoreEvent};
use tracker_server::routes::{AppState, create_router};

// 2024-03-06 is a Wednesday
const TODAY: &str = "2024-03-06";

/// Helper function to set up a router over a fresh, in-memory database.
async fn setup_app() -> (Router, Store) {
    let pool = connect_in_memory()
        .await
        .expect("Failed to open in-memory SQLite");
    let store = Store::new(pool, ChangeNotifier::new(32));
    let state = AppState {
        store: store.clone(),
        clock: Arc::new(FixedClock(TODAY.parse::<NaiveDate>().unwrap())),
    };
    (create_router(state), store)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_habit(app: &Router, name: &str, schedule: Value) -> Tracker {
    let (status, body) = send(
        app,
        "POST",
        "/api/trackers",
        Some(json!({ "name": name, "emoji": "✅", "schedule": schedule, "category_id": null })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    serde_json::from_value(body).unwrap()
}

fn ids(views: &[TrackerView]) -> Vec<i64> {
    views.iter().map(|v| v.tracker.id).collect()
}

#[tokio::test]
async fn test_create_and_list_trackers() {
    let (app, _) = setup_app().await;

    let created = create_habit(&app, "Morning run", json!([1, 3])).await;
    assert_eq!(created.name, "Morning run");
    assert_eq!(created.schedule.encode(), "[1,3]");
    assert!(created.color.starts_with('#'));

    let (status, body) = send(&app, "GET", "/api/trackers", None).await;
    assert_eq!(status, StatusCode::OK);
    let views: Vec<TrackerView> = serde_json::from_value(body).unwrap();
    assert_eq!(ids(&views), vec![created.id]);
    assert!(!views[0].completed);
}

#[tokio::test]
async fn test_due_today_follows_weekday() {
    let (app, _) = setup_app().await;
    let run = create_habit(&app, "Run", json!([1, 3])).await;
    create_habit(&app, "Swim", json!([2])).await;

    // Monday 2024-03-04 and Tuesday 2024-03-05
    let (_, monday) = send(&app, "GET", "/api/trackers?date=2024-03-04&filter=due_today", None).await;
    let (_, tuesday) = send(&app, "GET", "/api/trackers?date=2024-03-05&filter=due_today", None).await;

    let monday: Vec<TrackerView> = serde_json::from_value(monday).unwrap();
    let tuesday: Vec<TrackerView> = serde_json::from_value(tuesday).unwrap();
    assert_eq!(ids(&monday), vec![run.id]);
    assert!(!ids(&tuesday).contains(&run.id));
}

#[tokio::test]
async fn test_toggle_completion_and_filters() {
    let (app, _) = setup_app().await;
    let run = create_habit(&app, "Run", json!([3])).await;
    let read = create_habit(&app, "Read", json!([3])).await;

    // Act: complete "Run" late in the evening, then look it up with a morning time
    let (status, _) = send(
        &app,
        "POST",
        "/api/records",
        Some(json!({ "tracker_id": run.id, "date": "2024-03-01T23:00:00+01:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(
        &app,
        "POST",
        "/api/records",
        Some(json!({ "tracker_id": run.id, "date": "2024-03-01T01:00:00+01:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, records) = send(&app, "GET", "/api/records", None).await;
    assert_eq!(records, json!([{ "tracker_id": run.id, "date": "2024-03-01" }]));

    let (_, completed) = send(&app, "GET", "/api/trackers?date=2024-03-01&filter=completed", None).await;
    let (_, pending) = send(&app, "GET", "/api/trackers?date=2024-03-01&filter=not_completed", None).await;
    let completed: Vec<TrackerView> = serde_json::from_value(completed).unwrap();
    let pending: Vec<TrackerView> = serde_json::from_value(pending).unwrap();
    assert_eq!(ids(&completed), vec![run.id]);
    assert_eq!(completed[0].completed_days, 1);
    assert_eq!(ids(&pending), vec![read.id]);

    // Act: toggle it back off
    let (status, _) = send(
        &app,
        "DELETE",
        "/api/records",
        Some(json!({ "tracker_id": run.id, "date": "2024-03-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, records) = send(&app, "GET", "/api/records", None).await;
    assert_eq!(records, json!([]));
}

#[tokio::test]
async fn test_future_completion_is_rejected() {
    let (app, _) = setup_app().await;
    let run = create_habit(&app, "Run", json!([4])).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/records",
        Some(json!({ "tracker_id": run.id, "date": "2024-03-07" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Cannot complete a tracker on a future date (2024-03-07)."
    );
}

#[tokio::test]
async fn test_statistics() {
    let (app, _) = setup_app().await;
    let (_, empty) = send(&app, "GET", "/api/statistics", None).await;
    assert_eq!(serde_json::from_value::<Statistics>(empty).unwrap(), Statistics::default());

    let run = create_habit(&app, "Run", json!([1, 2, 3, 4, 5, 6, 7])).await;
    let read = create_habit(&app, "Read", json!([1, 2, 3, 4, 5, 6, 7])).await;
    for (tracker, date) in [
        (run.id, "2024-02-28"),
        (read.id, "2024-02-28"),
        (run.id, "2024-02-29"),
        (run.id, "2024-03-01"),
        (run.id, "2024-03-04"),
    ] {
        send(
            &app,
            "POST",
            "/api/records",
            Some(json!({ "tracker_id": tracker, "date": date })),
        )
        .await;
    }

    let (status, body) = send(&app, "GET", "/api/statistics", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_value::<Statistics>(body).unwrap(),
        Statistics {
            best_streak: 3,
            ideal_days: 1,
            total_completed: 5,
            average_per_day: 1,
        }
    );
}

#[tokio::test]
async fn test_sections_put_pinned_first() {
    let (app, _) = setup_app().await;
    let (status, body) = send(&app, "POST", "/api/categories", Some(json!({ "title": "Sport" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let sport: Category = serde_json::from_value(body).unwrap();

    let (_, body) = send(
        &app,
        "POST",
        "/api/trackers",
        Some(json!({
            "name": "Run", "emoji": "🏃", "color": "#33CF69",
            "schedule": [1], "category_id": sport.id
        })),
    )
    .await;
    let run: Tracker = serde_json::from_value(body).unwrap();
    let stretch = create_habit(&app, "Stretch", json!([1])).await;

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/trackers/{}/pin", stretch.id),
        Some(json!({ "pinned": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pinned"], true);

    let (_, body) = send(&app, "GET", "/api/trackers/sections", None).await;
    let sections: Vec<Section<TrackerView>> = serde_json::from_value(body).unwrap();

    let layout: Vec<(String, Vec<i64>)> = sections
        .iter()
        .map(|s| (s.title.clone(), ids(&s.items)))
        .collect();
    assert_eq!(
        layout,
        vec![
            ("Pinned".to_string(), vec![stretch.id]),
            ("Sport".to_string(), vec![run.id]),
        ]
    );
}

#[tokio::test]
async fn test_update_and_delete_tracker() {
    let (app, _) = setup_app().await;
    let run = create_habit(&app, "Run", json!([1])).await;

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/trackers/{}", run.id),
        Some(json!({ "name": "Long run", "emoji": "🏃", "schedule": [6, 7], "category_id": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let updated: Tracker = serde_json::from_value(body).unwrap();
    assert_eq!(updated.name, "Long run");
    assert_eq!(updated.color, run.color);
    assert_eq!(updated.schedule.encode(), "[6,7]");

    let (status, _) = send(&app, "DELETE", &format!("/api/trackers/{}", run.id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "DELETE", &format!("/api/trackers/{}", run.id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], format!("Tracker with ID {} not found.", run.id));
}

#[tokio::test]
async fn test_create_tracker_empty_payload() {
    let (app, _) = setup_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/trackers",
        Some(json!({ "name": "", "emoji": "🙂", "schedule": [1], "category_id": null })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Tracker name and emoji cannot be empty.");
}

#[tokio::test]
async fn test_duplicate_category_conflicts() {
    let (app, _) = setup_app().await;
    send(&app, "POST", "/api/categories", Some(json!({ "title": "Home" }))).await;

    let (status, _) = send(&app, "POST", "/api/categories", Some(json!({ "title": "home" }))).await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_writes_through_the_api_notify_subscribers() {
    let (app, store) = setup_app().await;
    let mut events = store.events().subscribe();

    let run = create_habit(&app, "Run", json!([3])).await;
    send(
        &app,
        "POST",
        "/api/records",
        Some(json!({ "tracker_id": run.id, "date": TODAY })),
    )
    .await;

    assert_eq!(
        events.recv().await.unwrap(),
        StoreEvent::TrackersChanged { tracker_id: run.id }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        StoreEvent::RecordsChanged { tracker_id: run.id }
    );
}

#[tokio::test]
async fn test_update_without_kind_keeps_irregular_event() {
    let (app, _) = setup_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/trackers",
        Some(json!({ "name": "Dentist", "emoji": "🦷", "kind": "irregular_event", "category_id": null })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/trackers/{id}"),
        Some(json!({ "name": "Dentist", "emoji": "🪥", "category_id": null })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["kind"], "irregular_event");
    assert_eq!(body["schedule"], json!([1, 2, 3, 4, 5, 6, 7]));
    assert_eq!(body["emoji"], "🪥");
}

#[tokio::test]
async fn test_malformed_requests_get_json_errors() {
    let (app, _) = setup_app().await;

    let (status, body) = send(&app, "GET", "/api/trackers?filter=bogus", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "{body}");

    let (status, body) = send(&app, "GET", "/api/trackers/sections?date=yesterday", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "{body}");

    // Missing the required `emoji`
    let (status, body) = send(&app, "POST", "/api/trackers", Some(json!({ "name": "Run" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string(), "{body}");

    let (status, body) = send(
        &app,
        "PATCH",
        "/api/trackers/abc/pin",
        Some(json!({ "pinned": true })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "{body}");
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let (app, _) = setup_app().await;

    let (status, body) = send(
        &app,
        "PUT",
        "/api/categories/999",
        Some(json!({ "title": "Work" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Category with ID 999 not found.");

    let (status, body) = send(&app, "DELETE", "/api/categories/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Category with ID 999 not found.");

    let (status, body) = send(
        &app,
        "PATCH",
        "/api/trackers/999/pin",
        Some(json!({ "pinned": true })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Tracker with ID 999 not found.");

    let (status, body) = send(
        &app,
        "PUT",
        "/api/trackers/999",
        Some(json!({ "name": "Run", "emoji": "🏃", "schedule": [1], "category_id": null })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Tracker with ID 999 not found.");
}
