// tests/scenarios.rs
//
// Booking flows against a real PostgreSQL. Run with
//   DATABASE_URL=postgres://... cargo test -- --ignored

use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use chrono::{Duration as Span, Utc};
use serde_json::{json, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::sync::{Mutex, MutexGuard};
use tower::ServiceExt;
use uuid::Uuid;

use hotel_booking_api::{
    app,
    auth::{Actor, JwtKeys, Role},
    config::{JwtConfig, StripeConfig},
    db,
    error::ApiError,
    models::{BookingStatus, CancellationStatus, PaymentStatus, TicketStatus},
    notify::{channels::Channels, realtime::RealtimeHub, Notifier},
    routes::{bookings, payments, support},
    stripe::StripeClient,
    AppState,
};

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for database scenarios");
    let pool = PgPoolOptions::new().max_connections(5).connect(&url).await.unwrap();
    db::migrate(&pool).await.unwrap();
    pool
}

fn jwt() -> JwtKeys {
    JwtKeys::new(&JwtConfig { secret: "scenario-secret".into(), issuer: "hotel-booking-api".into() })
}

fn state(pool: PgPool) -> AppState {
    let stripe = StripeClient::new(
        &StripeConfig { secret_key: None, webhook_secret: None, api_base: "http://127.0.0.1:1".into() },
        Duration::from_secs(1),
    )
    .unwrap();
    AppState {
        notifier: Notifier::new(pool.clone(), RealtimeHub::default(), Channels::disabled()),
        pool,
        jwt: Arc::new(jwt()),
        stripe: Arc::new(stripe),
    }
}

async fn super_admin(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, name, email, role) VALUES ($1, 'Root', $2, 'superAdmin')")
        .bind(id)
        .bind(format!("root-{id}@hotel.test"))
        .execute(pool)
        .await
        .unwrap();
    id
}

async fn manager(pool: &PgPool, hotel_ids: &[Uuid]) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, name, email, role, hotel_ids) VALUES ($1, 'Desk', $2, 'manager', $3)")
        .bind(id)
        .bind(format!("desk-{id}@hotel.test"))
        .bind(hotel_ids)
        .execute(pool)
        .await
        .unwrap();
    id
}

/// Agent availability is database-wide, so tests that pick agents take turns.
async fn agent_desk() -> MutexGuard<'static, ()> {
    static DESK: OnceLock<Mutex<()>> = OnceLock::new();
    DESK.get_or_init(|| Mutex::new(())).lock().await
}

async fn take_agents_offline(pool: &PgPool) {
    sqlx::query(
        r#"
        UPDATE users SET support_agent_status = 'offline'
        WHERE role = 'supportAgent' AND support_agent_status = 'available'
        "#,
    )
    .execute(pool)
    .await
    .unwrap();
}

async fn agent_status(pool: &PgPool, id: Uuid) -> String {
    sqlx::query_scalar("SELECT support_agent_status::text FROM users WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn send(pool: &PgPool, token: &str, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let res = app(state(pool.clone()))
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn support_agent(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, role, support_agent_status, agent_status_changed_at)
        VALUES ($1, 'Agent', $2, 'supportAgent', 'available', '1970-01-01T00:00:00Z')
        "#,
    )
    .bind(id)
    .bind(format!("agent-{id}@hotel.test"))
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn customer(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO customers (id, name, email) VALUES ($1, 'Guest', $2)")
        .bind(id)
        .bind(format!("guest-{id}@hotel.test"))
        .execute(pool)
        .await
        .unwrap();
    id
}

async fn hotel(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO hotels (id, name, address, city, country, pincode, contact_number, email)
        VALUES ($1, $2, '1 Shore Rd', 'Goa', 'India', '403001', '+910000000000', 'desk@hotel.test')
        "#,
    )
    .bind(id)
    .bind(format!("Seaside {id}"))
    .execute(pool)
    .await
    .unwrap();
    id
}

/// A sub room with one default window; returns the window id.
async fn window(pool: &PgPool, hotel_id: Uuid) -> Uuid {
    let (master, sub, window) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    sqlx::query("INSERT INTO master_rooms (id, hotel_id, name, full_day_price) VALUES ($1, $2, 'Deluxe', 1000)")
        .bind(master)
        .bind(hotel_id)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO sub_rooms (id, hotel_id, master_room_id, name, slot_duration) VALUES ($1, $2, $3, 'D1', 6)",
    )
    .bind(sub)
    .bind(hotel_id)
    .bind(master)
    .execute(pool)
    .await
    .unwrap();
    let start = Utc::now() + Span::days(1);
    sqlx::query(
        r#"
        INSERT INTO slot_windows (id, sub_room_id, position, start_time, end_time, price)
        VALUES ($1, $2, 0, $3, $4, 500)
        "#,
    )
    .bind(window)
    .bind(sub)
    .bind(start)
    .bind(start + Span::hours(6))
    .execute(pool)
    .await
    .unwrap();
    window
}

async fn booking(pool: &PgPool, customer_id: Uuid, hotel_id: Uuid) -> Uuid {
    let id = Uuid::new_v4();
    let start = Utc::now() + Span::days(1);
    sqlx::query(
        r#"
        INSERT INTO bookings (id, customer_id, hotel_id, start_time, end_time, slot_price, slot_duration,
                              booking_date, check_in_date, guests, total_price)
        VALUES ($1, $2, $3, $4, $5, 500, 6, NOW(), $4, 2, 500)
        "#,
    )
    .bind(id)
    .bind(customer_id)
    .bind(hotel_id)
    .bind(start)
    .bind(start + Span::hours(6))
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn window_available(pool: &PgPool, id: Uuid) -> bool {
    sqlx::query_scalar("SELECT is_available FROM slot_windows WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn nested_master_room_prices_default_windows() {
    let pool = pool().await;
    let admin = super_admin(&pool).await;
    let hotel_id = hotel(&pool).await;
    let token = jwt().issue(admin, Role::SuperAdmin, 600).unwrap();

    let body = json!({
        "hotelId": hotel_id,
        "masterRoomName": "Deluxe",
        "fullDayPrice": 1000,
        "subRooms": [{
            "subRoomName": "D1",
            "slotDuration": 6,
            "defaultSlots": [{ "startTime": "2030-01-01T06:00:00Z", "endTime": "2030-01-01T12:00:00Z" }]
        }]
    });
    let (status, v) = send(&pool, &token, "POST", "/api/v1/masterRoom/create", body).await;
    assert_eq!(status, StatusCode::OK);

    let slot = &v["data"]["subRooms"][0]["defaultSlots"][0];
    assert_eq!(slot["price"].as_f64(), Some(500.0));
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn confirming_a_paid_booking_takes_the_window() {
    let pool = pool().await;
    let (customer_id, hotel_id) = (customer(&pool).await, hotel(&pool).await);
    let window_id = window(&pool, hotel_id).await;
    let booking_id = booking(&pool, customer_id, hotel_id).await;

    let err = bookings::confirm_booking(&pool, booking_id, Some(window_id), BookingStatus::Booked)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    payments::mark_paid(&pool, booking_id, "pi_scenario_b").await.unwrap();
    let booked = bookings::confirm_booking(&pool, booking_id, Some(window_id), BookingStatus::Booked)
        .await
        .unwrap();
    assert_eq!(booked.booking_status, BookingStatus::Booked);
    assert_eq!(booked.slot_window_id, Some(window_id));
    assert!(!window_available(&pool, window_id).await);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn approved_cancellation_frees_the_window() {
    let pool = pool().await;
    let (customer_id, hotel_id) = (customer(&pool).await, hotel(&pool).await);
    let window_id = window(&pool, hotel_id).await;
    let booking_id = booking(&pool, customer_id, hotel_id).await;
    payments::mark_paid(&pool, booking_id, "pi_scenario_c").await.unwrap();
    bookings::confirm_booking(&pool, booking_id, Some(window_id), BookingStatus::Booked)
        .await
        .unwrap();

    let me = Actor { id: customer_id, role: Role::Customer, is_chain_admin: false, hotel_ids: vec![] };
    let requested = bookings::request_cancellation(&pool, &me, booking_id, "change of plans").await.unwrap();
    assert!(requested.cancellation_request.requested);

    let again = bookings::request_cancellation(&pool, &me, booking_id, "still changing").await;
    assert!(again.is_err());

    let done = bookings::respond_to_cancellation(&pool, booking_id, CancellationStatus::Approved, "")
        .await
        .unwrap();
    assert_eq!(done.booking_status, BookingStatus::Cancelled);
    assert_eq!(done.payment_status, PaymentStatus::Cancelled);
    assert!(window_available(&pool, window_id).await);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn concurrent_confirmations_book_once() {
    let pool = pool().await;
    let (customer_id, hotel_id) = (customer(&pool).await, hotel(&pool).await);
    let window_id = window(&pool, hotel_id).await;
    let booking_id = booking(&pool, customer_id, hotel_id).await;
    payments::mark_paid(&pool, booking_id, "pi_scenario_d").await.unwrap();

    let (a, b) = tokio::join!(
        bookings::confirm_booking(&pool, booking_id, Some(window_id), BookingStatus::Booked),
        bookings::confirm_booking(&pool, booking_id, Some(window_id), BookingStatus::Booked),
    );
    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes.iter().filter(|r| matches!(r, Err(ApiError::Conflict(_)))).count(),
        1
    );
    assert!(!window_available(&pool, window_id).await);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn replayed_payment_is_recorded_once() {
    let pool = pool().await;
    let (customer_id, hotel_id) = (customer(&pool).await, hotel(&pool).await);
    let booking_id = booking(&pool, customer_id, hotel_id).await;

    let first = payments::mark_paid(&pool, booking_id, "pi_replay").await.unwrap();
    assert_eq!(first.map(|b| b.payment_status), Some(PaymentStatus::Paid));
    assert!(payments::mark_paid(&pool, booking_id, "pi_replay").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn resolving_a_ticket_frees_its_agent() {
    let _desk = agent_desk().await;
    let pool = pool().await;
    let customer_id = customer(&pool).await;
    let agent = support_agent(&pool).await;
    let ticket_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO support_tickets (id, customer_id, category, description) VALUES ($1, $2, 'Payment', 'Charged twice')",
    )
    .bind(ticket_id)
    .bind(customer_id)
    .execute(&pool)
    .await
    .unwrap();

    let assigned = support::assign_to(&pool, ticket_id, agent).await.unwrap();
    assert_eq!(assigned.assigned_to, Some(agent));
    assert_eq!(assigned.status, TicketStatus::InProgress);

    let resolved = support::update_status(&pool, ticket_id, TicketStatus::Resolved).await.unwrap();
    assert!(resolved.resolved_at.is_some());
    assert_eq!(agent_status(&pool, agent).await, "available");
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn master_room_price_change_reprices_windows() {
    let pool = pool().await;
    let admin = super_admin(&pool).await;
    let hotel_id = hotel(&pool).await;
    let token = jwt().issue(admin, Role::SuperAdmin, 600).unwrap();

    let body = json!({
        "hotelId": hotel_id,
        "masterRoomName": "Suite",
        "fullDayPrice": 1000,
        "subRooms": [{
            "subRoomName": "S1",
            "slotDuration": 3,
            "defaultSlots": [{ "startTime": "2030-01-01T06:00:00Z", "endTime": "2030-01-01T09:00:00Z" }]
        }]
    });
    let (status, v) = send(&pool, &token, "POST", "/api/v1/masterRoom/create", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["data"]["subRooms"][0]["defaultSlots"][0]["price"].as_f64(), Some(300.0));
    let master_id = v["data"]["id"].as_str().unwrap().to_string();

    let uri = format!("/api/v1/masterRoom/update/{master_id}");
    let (status, _) = send(&pool, &token, "PUT", &uri, json!({ "fullDayPrice": 2000 })).await;
    assert_eq!(status, StatusCode::OK);

    let prices: Vec<f64> = sqlx::query_scalar(
        r#"
        SELECT w.price FROM slot_windows w JOIN sub_rooms s ON s.id = w.sub_room_id
        WHERE s.master_room_id = $1
        "#,
    )
    .bind(Uuid::parse_str(&master_id).unwrap())
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(prices, vec![600.0]);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn room_names_are_unique_regardless_of_case() {
    let pool = pool().await;
    let admin = super_admin(&pool).await;
    let hotel_id = hotel(&pool).await;
    let token = jwt().issue(admin, Role::SuperAdmin, 600).unwrap();

    let room = |name: &str| json!({ "hotelId": hotel_id, "masterRoomName": name, "fullDayPrice": 1000 });
    let (status, v) = send(&pool, &token, "POST", "/api/v1/masterRoom/create", room("Deluxe")).await;
    assert_eq!(status, StatusCode::OK);
    let master_id: Uuid = v["data"]["id"].as_str().unwrap().parse().unwrap();

    let (status, _) = send(&pool, &token, "POST", "/api/v1/masterRoom/create", room("deluxe")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let masters: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM master_rooms WHERE hotel_id = $1")
        .bind(hotel_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(masters, 1);

    let sub = |name: &str| {
        json!({ "hotelId": hotel_id, "masterRoomId": master_id, "subRoomName": name, "slotDuration": 6 })
    };
    let (status, _) = send(&pool, &token, "POST", "/api/v1/subRoom/create", sub("D1")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&pool, &token, "POST", "/api/v1/subRoom/create", sub("d1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let subs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sub_rooms WHERE master_room_id = $1")
        .bind(master_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(subs, 1);

    // Nested duplicates fail before anything is written.
    let nested = json!({
        "hotelId": hotel_id,
        "masterRoomName": "Garden",
        "fullDayPrice": 800,
        "subRooms": [
            { "subRoomName": "G1", "slotDuration": 6 },
            { "subRoomName": "g1", "slotDuration": 12 }
        ]
    });
    let (status, _) = send(&pool, &token, "POST", "/api/v1/masterRoom/create", nested).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let gardens: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM master_rooms WHERE hotel_id = $1 AND name = 'Garden'")
            .bind(hotel_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(gardens, 0);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn new_ticket_waits_when_no_agent_is_free() {
    let _desk = agent_desk().await;
    let pool = pool().await;
    take_agents_offline(&pool).await;
    let admin = super_admin(&pool).await;
    let customer_id = customer(&pool).await;
    let token = jwt().issue(admin, Role::SuperAdmin, 600).unwrap();

    let body = json!({ "customerId": customer_id, "category": "Payment", "description": "Charged twice" });
    let (status, v) = send(&pool, &token, "POST", "/api/v1/support/create", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["data"]["status"], "open");
    assert_eq!(v["data"]["assignedTo"], Value::Null);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn new_ticket_goes_to_a_free_agent() {
    let _desk = agent_desk().await;
    let pool = pool().await;
    take_agents_offline(&pool).await;
    let agent = support_agent(&pool).await;
    let admin = super_admin(&pool).await;
    let customer_id = customer(&pool).await;
    let token = jwt().issue(admin, Role::SuperAdmin, 600).unwrap();

    let body = json!({ "customerId": customer_id, "category": "Booking", "description": "Wrong dates" });
    let (status, v) = send(&pool, &token, "POST", "/api/v1/support/create", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["data"]["status"], "in_progress");
    assert_eq!(v["data"]["assignedTo"], json!(agent));
    assert_eq!(agent_status(&pool, agent).await, "busy");
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn deleting_an_open_ticket_frees_its_agent() {
    let _desk = agent_desk().await;
    let pool = pool().await;
    take_agents_offline(&pool).await;
    let agent = support_agent(&pool).await;
    let admin = super_admin(&pool).await;
    let customer_id = customer(&pool).await;
    let token = jwt().issue(admin, Role::SuperAdmin, 600).unwrap();

    let body = json!({ "customerId": customer_id, "category": "Technical", "description": "App crashes" });
    let (_, v) = send(&pool, &token, "POST", "/api/v1/support/create", body).await;
    assert_eq!(v["data"]["assignedTo"], json!(agent));
    let ticket_id = v["data"]["id"].as_str().unwrap().to_string();

    let uri = format!("/api/v1/support/delete/{ticket_id}");
    let (status, _) = send(&pool, &token, "DELETE", &uri, Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(agent_status(&pool, agent).await, "available");
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn managers_cannot_confirm_other_hotels_bookings() {
    let pool = pool().await;
    let (customer_id, hotel_id) = (customer(&pool).await, hotel(&pool).await);
    let other_hotel = hotel(&pool).await;
    let window_id = window(&pool, hotel_id).await;
    let booking_id = booking(&pool, customer_id, hotel_id).await;
    payments::mark_paid(&pool, booking_id, "pi_other_hotel").await.unwrap();

    let outsider = manager(&pool, &[other_hotel]).await;
    let token = jwt().issue(outsider, Role::Manager, 600).unwrap();
    let uri = format!("/api/v1/booking/bookingConfirmation/{booking_id}");
    let body = json!({ "slotId": window_id, "status": "booked" });
    let (status, _) = send(&pool, &token, "PUT", &uri, body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(window_available(&pool, window_id).await);

    let insider = manager(&pool, &[hotel_id]).await;
    let token = jwt().issue(insider, Role::Manager, 600).unwrap();
    let (status, v) = send(&pool, &token, "PUT", &uri, body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["data"]["bookingStatus"], "booked");
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn hotels_reference_amenities_and_filter_by_them() {
    let pool = pool().await;
    let admin = super_admin(&pool).await;
    let token = jwt().issue(admin, Role::SuperAdmin, 600).unwrap();

    let name = format!("Pool {}", Uuid::new_v4());
    let create = "/api/v1/hotelAmenities/create";
    let (status, v) = send(&pool, &token, "POST", create, json!({ "name": name })).await;
    assert_eq!(status, StatusCode::OK);
    let amenity: Uuid = v["data"]["id"].as_str().unwrap().parse().unwrap();
    let upper = json!({ "name": name.to_uppercase() });
    let (status, v) = send(&pool, &token, "POST", create, upper).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"], "Hotel amenity already exists");

    let (near, far) = (hotel(&pool).await, hotel(&pool).await);
    for (id, lat, lng) in [(near, 15.4989, 73.8278), (far, 28.6139, 77.2090)] {
        sqlx::query("UPDATE hotels SET latitude = $2, longitude = $3 WHERE id = $1")
            .bind(id)
            .bind(lat)
            .bind(lng)
            .execute(&pool)
            .await
            .unwrap();
    }
    let uri = format!("/api/v1/hotel/update/{near}");
    let (status, v) = send(&pool, &token, "PUT", &uri, json!({ "amenitiesId": [amenity] })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["data"]["amenitiesId"], json!([amenity]));

    let ghost = json!({ "amenitiesId": [Uuid::new_v4()] });
    let (status, _) = send(&pool, &token, "PUT", &uri, ghost).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let listed = |v: &Value| -> Vec<String> {
        v["data"].as_array().unwrap().iter().filter_map(|h| h["id"].as_str().map(String::from)).collect()
    };
    let uri = format!("/api/v1/hotel/getAll?amenitiesId={amenity}");
    let (_, v) = send(&pool, &token, "GET", &uri, Value::Null).await;
    assert_eq!(listed(&v), vec![near.to_string()]);

    let uri = "/api/v1/hotel/getAll?lat=15.4909&lng=73.8278&distance=2000&limit=500";
    let (_, v) = send(&pool, &token, "GET", uri, Value::Null).await;
    assert!(listed(&v).contains(&near.to_string()));
    assert!(!listed(&v).contains(&far.to_string()));
    assert_eq!(v["filters"]["applied"]["distance"].as_f64(), Some(2000.0));

    let customer_id = customer(&pool).await;
    booking(&pool, customer_id, far).await;
    let uri = format!("/api/v1/hotel/getAll?customerId={customer_id}");
    let (_, v) = send(&pool, &token, "GET", &uri, Value::Null).await;
    assert_eq!(listed(&v), vec![far.to_string()]);
}
