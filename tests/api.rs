use actix_web::{test, web, App};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;

use peluqbook::{
    booking::Booking,
    db, routes,
    models::{BookingStatus, Modality},
    state::{AppState, PricingConfig, TokenConfig},
};

async fn test_state() -> AppState {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect to in-memory sqlite");
    db::run_migrations(&pool).await.expect("run migrations");
    AppState {
        db: pool,
        tokens: TokenConfig {
            secret: "test-secret".to_string(),
            ttl_hours: 1,
        },
        pricing: PricingConfig { home_surcharge: 500 },
    }
}

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(routes::public::configure)
                .configure(routes::client::configure)
                .configure(routes::stylist::configure),
        )
        .await
    };
}

fn stylist_registration() -> Value {
    json!({
        "email": "x@salon.test",
        "display_name": "Stylist X",
        "phone": "600000001",
        "password": "trim-and-go",
        "role": "stylist",
        "specialty": "Color",
        "zone": "Centro",
        "services": [{ "name": "Haircut", "price": 1000 }]
    })
}

fn client_registration() -> Value {
    json!({
        "email": "ana@example.test",
        "display_name": "Ana",
        "phone": "600000002",
        "password": "hunter-two",
        "role": "client"
    })
}

#[actix_rt::test]
async fn booking_flow_with_conflicts_and_pricing() {
    let state = test_state().await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/register")
        .set_json(stylist_registration())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let stylist: Value = test::read_body_json(resp).await;
    let stylist_id = stylist["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/register")
        .set_json(client_registration())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    // Duplicate email is a conflict, not a validation failure.
    let req = test::TestRequest::post()
        .uri("/register")
        .set_json(client_registration())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);

    let req = test::TestRequest::post()
        .uri("/login")
        .set_json(json!({ "email": "ana@example.test", "password": "hunter-two" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let login: Value = test::read_body_json(resp).await;
    let token = login["token"].as_str().unwrap().to_string();

    let book = |date: &str, time: &str, modality: &str, address: Option<&str>| {
        let mut body = json!({
            "stylist_id": stylist_id,
            "service": "Haircut",
            "date": date,
            "time": time,
            "modality": modality,
        });
        if let Some(address) = address {
            body["address"] = json!(address);
        }
        test::TestRequest::post()
            .uri("/bookings")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(body)
            .to_request()
    };

    // Unauthenticated booking attempts never reach the engine.
    let req = test::TestRequest::post()
        .uri("/bookings")
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let resp = test::call_service(&app, book("2024-06-01", "10:00", "in_salon", None)).await;
    assert_eq!(resp.status(), 201);
    let booking: Value = test::read_body_json(resp).await;
    assert_eq!(booking["total"], 1000);
    assert_eq!(booking["status"], "pending");

    let resp = test::call_service(&app, book("2024-06-01", "10:00", "in_salon", None)).await;
    assert_eq!(resp.status(), 409);

    let resp = test::call_service(&app, book("2024-06-01", "11:00", "in_salon", None)).await;
    assert_eq!(resp.status(), 201);

    let resp = test::call_service(&app, book("2024-06-02", "10:00", "at_home", None)).await;
    assert_eq!(resp.status(), 400);

    let resp =
        test::call_service(&app, book("2024-06-02", "10:00", "at_home", Some("Main St 123"))).await;
    assert_eq!(resp.status(), 201);
    let booking: Value = test::read_body_json(resp).await;
    assert_eq!(booking["total"], 1500);
    assert_eq!(booking["address"], "Main St 123");

    let req = test::TestRequest::post()
        .uri("/bookings")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({
            "stylist_id": stylist_id,
            "service": "Perm",
            "date": "2024-06-03",
            "time": "10:00",
            "modality": "in_salon",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::get()
        .uri("/bookings")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let bookings: Value = test::read_body_json(resp).await;
    assert_eq!(bookings.as_array().unwrap().len(), 3);
}

#[actix_rt::test]
async fn cancelled_booking_frees_its_slot() {
    let state = test_state().await;
    let app = test_app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/register")
            .set_json(stylist_registration())
            .to_request(),
    )
    .await;
    let stylist: Value = test::read_body_json(resp).await;
    let stylist_id = stylist["id"].as_str().unwrap().to_string();

    test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/register")
            .set_json(client_registration())
            .to_request(),
    )
    .await;

    let login = |email: &str, password: &str| {
        test::TestRequest::post()
            .uri("/login")
            .set_json(json!({ "email": email, "password": password }))
            .to_request()
    };
    let resp = test::call_service(&app, login("ana@example.test", "hunter-two")).await;
    let body: Value = test::read_body_json(resp).await;
    let client_token = body["token"].as_str().unwrap().to_string();
    let resp = test::call_service(&app, login("x@salon.test", "trim-and-go")).await;
    let body: Value = test::read_body_json(resp).await;
    let stylist_token = body["token"].as_str().unwrap().to_string();

    // A client token is not accepted on the stylist surface.
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/stylist/bookings")
            .insert_header(("Authorization", format!("Bearer {client_token}")))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 401);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/bookings")
            .insert_header(("Authorization", format!("Bearer {client_token}")))
            .set_json(json!({
                "stylist_id": stylist_id,
                "service": "Haircut",
                "date": "2024-06-01",
                "time": "10:00",
                "modality": "in_salon",
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 201);
    let booking: Value = test::read_body_json(resp).await;
    let booking_id = booking["id"].as_str().unwrap().to_string();

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/stylist/bookings/{booking_id}/status"))
            .insert_header(("Authorization", format!("Bearer {stylist_token}")))
            .set_json(json!({ "status": "cancelled" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let updated: Value = test::read_body_json(resp).await;
    assert_eq!(updated["status"], "cancelled");

    // The slot is free again once the previous booking is terminal.
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/bookings")
            .insert_header(("Authorization", format!("Bearer {client_token}")))
            .set_json(json!({
                "stylist_id": stylist_id,
                "service": "Haircut",
                "date": "2024-06-01",
                "time": "10:00",
                "modality": "in_salon",
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 201);

    // A closed booking cannot change status again.
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/stylist/bookings/{booking_id}/status"))
            .insert_header(("Authorization", format!("Bearer {stylist_token}")))
            .set_json(json!({ "status": "confirmed" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 409);
}

#[actix_rt::test]
async fn slot_index_stops_the_second_writer() {
    // Simulates the read-then-write race: both writers passed the engine's
    // conflict check; the database index must fail the second insert and the
    // failure must map to a conflict.
    let state = test_state().await;

    for (id, email, role) in [
        ("client-1", "c1@example.test", "client"),
        ("client-2", "c2@example.test", "client"),
        ("stylist-1", "s1@example.test", "stylist"),
    ] {
        sqlx::query(
            r#"INSERT INTO users (id, email, display_name, phone, role, password_hash, created_at)
               VALUES (?, ?, ?, ?, ?, '', '2024-05-30T12:00:00Z')"#,
        )
        .bind(id)
        .bind(email)
        .bind(id)
        .bind("600000000")
        .bind(role)
        .execute(&state.db)
        .await
        .expect("seed user");
    }
    sqlx::query("INSERT INTO stylists (user_id, specialty, zone) VALUES ('stylist-1', 'General', 'Unknown')")
        .execute(&state.db)
        .await
        .expect("seed stylist");

    let make_booking = |id: &str, client: &str| Booking {
        id: id.to_string(),
        client_id: client.to_string(),
        stylist_id: "stylist-1".to_string(),
        service: "Haircut".to_string(),
        date: "2024-06-01".to_string(),
        time: "10:00".to_string(),
        modality: Modality::InSalon,
        address: None,
        total: 1000,
        status: BookingStatus::Pending,
        requested_at: "2024-05-30T12:00:00Z".to_string(),
    };

    db::insert_booking(&state.db, &make_booking("b1", "client-1"))
        .await
        .expect("first writer wins");

    let err = db::insert_booking(&state.db, &make_booking("b2", "client-2"))
        .await
        .expect_err("second writer must fail");
    assert!(matches!(
        err,
        peluqbook::errors::ApiError::Conflict("slot already taken")
    ));
}
