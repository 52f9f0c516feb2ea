//! Google Calendar client against a mock REST server

use std::collections::BTreeSet;
use std::time::Duration;

use cb_calendar::{CalendarClient, CalendarContext, CalendarError, GoogleCalendarClient, TimeInterval};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EVENTS_PATH: &str = "/calendars/primary/events";

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 3, 4, hour, minute, 0).unwrap()
}

fn slot(from: u32, to: u32) -> TimeInterval {
    TimeInterval::new(at(from, 0), at(to, 0)).unwrap()
}

fn client(server: &MockServer) -> GoogleCalendarClient {
    let context =
        CalendarContext::new(&server.uri(), "primary", "test-token", Duration::from_secs(5)).unwrap();
    GoogleCalendarClient::new(context)
}

fn timed(id: &str, start: &str, end: &str) -> serde_json::Value {
    json!({
        "id": id,
        "status": "confirmed",
        "start": {"dateTime": start},
        "end": {"dateTime": end}
    })
}

#[tokio::test]
async fn test_list_busy_follows_pages_and_skips_free_events() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .and(header("authorization", "Bearer test-token"))
        .and(query_param("singleEvents", "true"))
        .and(query_param("orderBy", "startTime"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                timed("a", "2030-03-04T09:00:00Z", "2030-03-04T10:00:00Z"),
                {
                    "id": "cancelled",
                    "status": "cancelled",
                    "start": {"dateTime": "2030-03-04T12:00:00Z"},
                    "end": {"dateTime": "2030-03-04T13:00:00Z"}
                },
                {
                    "id": "ooo",
                    "status": "confirmed",
                    "transparency": "transparent",
                    "start": {"dateTime": "2030-03-04T14:00:00Z"},
                    "end": {"dateTime": "2030-03-04T15:00:00Z"}
                }
            ],
            "nextPageToken": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                timed("b", "2030-03-04T09:30:00Z", "2030-03-04T10:30:00Z"),
                timed("c", "2030-03-04T16:00:00+01:00", "2030-03-04T17:00:00+01:00")
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let busy = client(&server).list_busy(slot(0, 23)).await.unwrap();
    let morning = TimeInterval::new(at(9, 0), at(10, 30)).unwrap();
    assert_eq!(busy.as_slice(), &[morning, slot(15, 16)]);
}

#[tokio::test]
async fn test_list_busy_all_day_event() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "id": "holiday",
                "start": {"date": "2030-03-04"},
                "end": {"date": "2030-03-05"}
            }]
        })))
        .mount(&server)
        .await;

    let busy = client(&server).list_busy(slot(8, 18)).await.unwrap();
    assert_eq!(busy.len(), 1);
    assert_eq!(busy.as_slice()[0].duration(), chrono::Duration::days(1));
}

#[tokio::test]
async fn test_list_busy_empty_calendar() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kind": "calendar#events"})))
        .mount(&server)
        .await;

    let busy = client(&server).list_busy(slot(8, 18)).await.unwrap();
    assert!(busy.is_empty());
}

#[tokio::test]
async fn test_endless_paging_is_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [timed("evt", "2030-03-04T09:00:00Z", "2030-03-04T10:00:00Z")],
            "nextPageToken": "again",
        })))
        .expect(50)
        .mount(&server)
        .await;

    let err = client(&server).list_busy(slot(8, 18)).await.unwrap_err();
    match err {
        CalendarError::Upstream(msg) => assert!(msg.contains("did not finish"), "{}", msg),
        other => panic!("expected Upstream, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unauthorized_is_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid credentials"))
        .mount(&server)
        .await;

    let err = client(&server).list_busy(slot(8, 18)).await.unwrap_err();
    match err {
        CalendarError::Upstream(msg) => assert!(msg.contains("authentication")),
        other => panic!("expected Upstream, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client(&server).list_busy(slot(8, 18)).await.unwrap_err();
    assert!(matches!(err, CalendarError::Parse(_)));
}

#[tokio::test]
async fn test_create_event_posts_utc_times_and_attendees() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(EVENTS_PATH))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "summary": "Dentist",
            "start": {"dateTime": "2030-03-04T10:00:00Z", "timeZone": "UTC"},
            "end": {"dateTime": "2030-03-04T11:00:00Z", "timeZone": "UTC"},
            "attendees": [{"email": "pat@example.com"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "evt-1",
            "status": "confirmed",
            "summary": "Dentist",
            "htmlLink": "https://calendar.google.com/event?eid=evt-1",
            "start": {"dateTime": "2030-03-04T10:00:00Z", "timeZone": "UTC"},
            "end": {"dateTime": "2030-03-04T11:00:00Z", "timeZone": "UTC"},
            "attendees": [{"email": "pat@example.com"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let attendees: BTreeSet<String> = ["pat@example.com".to_string()].into_iter().collect();
    let client = client(&server);
    let event = client.create_event(slot(10, 11), "Dentist", &attendees).await.unwrap();

    assert_eq!(event.id, "evt-1");
    assert_eq!(event.interval, slot(10, 11));
    assert_eq!(event.attendees, vec!["pat@example.com".to_string()]);
    assert_eq!(
        event.html_link.as_deref(),
        Some("https://calendar.google.com/event?eid=evt-1")
    );
    assert_eq!(client.context().open_sessions(), 0);
}

#[tokio::test]
async fn test_create_event_recheck_finds_slot_taken() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [timed("x", "2030-03-04T10:30:00Z", "2030-03-04T11:30:00Z")]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server)
        .create_event(slot(10, 11), "Dentist", &BTreeSet::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CalendarError::Conflict(_)));
}

#[tokio::test]
async fn test_create_event_409_is_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(409).set_body_string("duplicate"))
        .mount(&server)
        .await;

    let err = client(&server)
        .create_event(slot(10, 11), "Dentist", &BTreeSet::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CalendarError::Conflict(_)));
}

#[tokio::test]
async fn test_server_error_is_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client(&server)
        .create_event(slot(10, 11), "Dentist", &BTreeSet::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CalendarError::Upstream(_)));
}
