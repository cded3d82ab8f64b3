//! Checkout and order lifecycle: atomic placement, cancellation and the
//! guarded status machine.

mod common;

use axum::http::Method;
use common::{response_json, TestApp};
use serde_json::{json, Value};

async fn seed_product(app: &TestApp, name: &str, price: u32, stock: i32) -> String {
    let admin = app.admin_token().await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": name,
                "description": format!("{name} description"),
                "category": "Men",
                "brand": "Nike",
                "price": price.to_string(),
                "stock": stock,
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 201);
    response_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn product_stock(app: &TestApp, id: &str) -> i64 {
    let response = app
        .request(Method::GET, &format!("/api/v1/products/{}", id), None, None)
        .await;
    assert_eq!(response.status(), 200);
    response_json(response).await["data"]["stock"]
        .as_i64()
        .unwrap()
}

fn shipping_address() -> Value {
    json!({
        "full_name": "Asha Rao",
        "phone": "9876543210",
        "address_line_1": "12 Hill Road",
        "city": "Mumbai",
        "state": "MH",
        "pincode": "400050",
    })
}

fn order_payload(product_id: &str, quantity: i32) -> Value {
    json!({
        "items": [{ "product_id": product_id, "size": "UK 9", "quantity": quantity }],
        "shipping_address": shipping_address(),
        "payment_method": "COD",
    })
}

async fn place_order(app: &TestApp, token: &str, product_id: &str, quantity: i32) -> Value {
    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(order_payload(product_id, quantity)),
            Some(token),
        )
        .await;
    assert_eq!(response.status(), 201, "order placement should succeed");
    response_json(response).await["data"].clone()
}

#[tokio::test]
async fn placing_an_order_decrements_stock_and_clears_the_cart() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Runner", 2000, 10).await;
    let token = app.customer_token("buyer@example.com").await;

    // Fill the cart first so clearing is observable
    app.request(
        Method::POST,
        "/api/v1/cart/items",
        Some(json!({ "product_id": product_id, "size": "UK 9", "quantity": 3 })),
        Some(&token),
    )
    .await;

    let order = place_order(&app, &token, &product_id, 3).await;
    assert!(order["order_number"].as_str().unwrap().starts_with("ORD-"));
    assert_eq!(order["order_status"], json!("Confirmed"));
    assert_eq!(order["payment_status"], json!("Pending"));
    assert_eq!(order["total_amount"], json!("6000"));
    assert_eq!(order["final_amount"], json!("6000"));
    let items = order["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_name"], json!("Runner"));

    assert_eq!(product_stock(&app, &product_id).await, 7);

    let response = app.request(Method::GET, "/api/v1/cart", None, Some(&token)).await;
    let body = response_json(response).await;
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn insufficient_stock_fails_without_side_effects() {
    let app = TestApp::new().await;
    let scarce = seed_product(&app, "Scarce", 1000, 2).await;
    let plenty = seed_product(&app, "Plenty", 1000, 50).await;
    let token = app.customer_token("greedy@example.com").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "items": [
                    { "product_id": plenty, "size": "UK 8", "quantity": 5 },
                    { "product_id": scarce, "size": "UK 8", "quantity": 3 },
                ],
                "shipping_address": shipping_address(),
                "payment_method": "COD",
            })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("Scarce"));

    // The earlier line's decrement must have rolled back too
    assert_eq!(product_stock(&app, &plenty).await, 50);
    assert_eq!(product_stock(&app, &scarce).await, 2);

    let response = app
        .request(Method::GET, "/api/v1/orders/my-orders", None, Some(&token))
        .await;
    let body = response_json(response).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn an_empty_item_list_is_rejected() {
    let app = TestApp::new().await;
    let token = app.customer_token("emptyhanded@example.com").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "items": [],
                "shipping_address": shipping_address(),
                "payment_method": "COD",
            })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn unknown_product_in_order_is_not_found() {
    let app = TestApp::new().await;
    let token = app.customer_token("ghost@example.com").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(order_payload("00000000-0000-0000-0000-000000000000", 1)),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn orders_are_visible_to_owner_and_admin_only() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Private", 1000, 10).await;
    let owner = app.customer_token("owner@example.com").await;
    let other = app.customer_token("other@example.com").await;
    let admin = app.admin_token().await;

    let order = place_order(&app, &owner, &product_id, 1).await;
    let order_id = order["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/orders/{}", order_id);

    let response = app.request(Method::GET, &uri, None, Some(&owner)).await;
    assert_eq!(response.status(), 200);

    let response = app.request(Method::GET, &uri, None, Some(&other)).await;
    assert_eq!(response.status(), 403);

    let response = app.request(Method::GET, &uri, None, Some(&admin)).await;
    assert_eq!(response.status(), 200);

    // The admin listing is closed to customers
    let response = app.request(Method::GET, "/api/v1/orders", None, Some(&other)).await;
    assert_eq!(response.status(), 403);
    let response = app.request(Method::GET, "/api/v1/orders", None, Some(&admin)).await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn cancelling_restores_stock() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Returnable", 1500, 8).await;
    let token = app.customer_token("fickle@example.com").await;

    let order = place_order(&app, &token, &product_id, 3).await;
    let order_id = order["id"].as_str().unwrap().to_string();
    assert_eq!(product_stock(&app, &product_id).await, 5);

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{}/cancel", order_id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["order_status"], json!("Cancelled"));
    assert_eq!(product_stock(&app, &product_id).await, 8);
}

#[tokio::test]
async fn only_the_owner_may_cancel() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Guarded", 1000, 5).await;
    let owner = app.customer_token("owner2@example.com").await;
    let other = app.customer_token("other2@example.com").await;

    let order = place_order(&app, &owner, &product_id, 1).await;
    let order_id = order["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{}/cancel", order_id),
            None,
            Some(&other),
        )
        .await;
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn shipped_orders_cannot_be_cancelled() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "EnRoute", 1000, 5).await;
    let token = app.customer_token("tracking@example.com").await;
    let admin = app.admin_token().await;

    let order = place_order(&app, &token, &product_id, 1).await;
    let order_id = order["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{}/status", order_id),
            Some(json!({ "order_status": "Shipped" })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{}/cancel", order_id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(product_stock(&app, &product_id).await, 4);
}

#[tokio::test]
async fn out_for_delivery_orders_can_still_be_cancelled() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Doorstep", 1000, 6).await;
    let token = app.customer_token("refuser@example.com").await;
    let admin = app.admin_token().await;

    let order = place_order(&app, &token, &product_id, 2).await;
    let order_id = order["id"].as_str().unwrap().to_string();
    assert_eq!(product_stock(&app, &product_id).await, 4);

    for status in ["Shipped", "Out for Delivery"] {
        let response = app
            .request(
                Method::PUT,
                &format!("/api/v1/orders/{}/status", order_id),
                Some(json!({ "order_status": status })),
                Some(&admin),
            )
            .await;
        assert_eq!(response.status(), 200, "transition to {status}");
    }

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{}/cancel", order_id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["order_status"], json!("Cancelled"));
    assert_eq!(product_stock(&app, &product_id).await, 6);
}

#[tokio::test]
async fn status_machine_blocks_illegal_transitions() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Strict", 1000, 5).await;
    let token = app.customer_token("fsm@example.com").await;
    let admin = app.admin_token().await;

    let order = place_order(&app, &token, &product_id, 1).await;
    let order_id = order["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/orders/{}/status", order_id);

    // Confirmed cannot jump straight to Delivered
    let response = app
        .request(
            Method::PUT,
            &uri,
            Some(json!({ "order_status": "Delivered" })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 400);

    // Walk the legal path
    for status in ["Shipped", "Out for Delivery", "Delivered"] {
        let response = app
            .request(
                Method::PUT,
                &uri,
                Some(json!({ "order_status": status })),
                Some(&admin),
            )
            .await;
        assert_eq!(response.status(), 200, "transition to {status}");
    }

    // Delivered is terminal
    let response = app
        .request(
            Method::PUT,
            &uri,
            Some(json!({ "order_status": "Pending" })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 400);

    // Repeating the current status is a no-op, not an error
    let response = app
        .request(
            Method::PUT,
            &uri,
            Some(json!({ "order_status": "Delivered" })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn status_updates_are_admin_only() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Locked", 1000, 5).await;
    let token = app.customer_token("sneaky@example.com").await;

    let order = place_order(&app, &token, &product_id, 1).await;
    let order_id = order["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{}/status", order_id),
            Some(json!({ "order_status": "Delivered" })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn my_orders_lists_newest_first() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Serial", 500, 20).await;
    let token = app.customer_token("repeat@example.com").await;

    let first = place_order(&app, &token, &product_id, 1).await;
    let second = place_order(&app, &token, &product_id, 2).await;

    let response = app
        .request(Method::GET, "/api/v1/orders/my-orders", None, Some(&token))
        .await;
    let body = response_json(response).await;
    let orders = body["data"].as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["id"], second["id"]);
    assert_eq!(orders[1]["id"], first["id"]);
}
