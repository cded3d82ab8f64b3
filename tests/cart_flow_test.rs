//! Cart lifecycle: lazy creation, merging, totals and clearing.

mod common;

use axum::http::Method;
use common::{response_json, TestApp};
use serde_json::{json, Value};

async fn seed_product(app: &TestApp, name: &str, price: u32, discount: u32, stock: i32) -> String {
    let admin = app.admin_token().await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": name,
                "description": format!("{name} description"),
                "category": "Sports",
                "brand": "Nike",
                "price": price.to_string(),
                "discount": discount.to_string(),
                "stock": stock,
                "images": ["https://cdn.stepout.test/a.jpg"],
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

fn assert_totals_consistent(cart: &Value) {
    let items = cart["items"].as_array().unwrap();
    let total_items: i64 = items.iter().map(|i| i["quantity"].as_i64().unwrap()).sum();
    assert_eq!(cart["total_items"].as_i64().unwrap(), total_items);
}

#[tokio::test]
async fn first_access_creates_an_empty_cart() {
    let app = TestApp::new().await;
    let token = app.customer_token("cart1@example.com").await;

    let response = app.request(Method::GET, "/api/v1/cart", None, Some(&token)).await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
    assert_eq!(body["data"]["total_items"], json!(0));
    assert_eq!(body["data"]["total_price"], json!("0"));
}

#[tokio::test]
async fn adding_the_same_line_twice_merges_quantities() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Court Ace", 2000, 10, 20).await;
    let token = app.customer_token("cart2@example.com").await;

    for _ in 0..2 {
        let response = app
            .request(
                Method::POST,
                "/api/v1/cart/items",
                Some(json!({ "product_id": product_id, "size": "UK 8", "quantity": 2 })),
                Some(&token),
            )
            .await;
        assert_eq!(response.status(), 200);
    }

    // Same product in a different size is a separate line
    let response = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product_id, "size": "UK 10", "quantity": 1 })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    let cart = &body["data"];
    let items = cart["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);

    let merged = items.iter().find(|i| i["size"] == json!("UK 8")).unwrap();
    assert_eq!(merged["quantity"], json!(4));
    // Lines snapshot the discounted price at add time
    assert_eq!(merged["unit_price"], json!("1800"));

    assert_eq!(cart["total_items"], json!(5));
    assert_eq!(cart["total_price"], json!("9000"));
    assert_totals_consistent(cart);
}

#[tokio::test]
async fn quantity_update_of_zero_removes_the_line() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Slip On", 1500, 0, 10).await;
    let token = app.customer_token("cart3@example.com").await;

    app.request(
        Method::POST,
        "/api/v1/cart/items",
        Some(json!({ "product_id": product_id, "size": "UK 7", "quantity": 3 })),
        Some(&token),
    )
    .await;

    let response = app
        .request(
            Method::PUT,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product_id, "size": "UK 7", "quantity": 0 })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
    assert_eq!(body["data"]["total_price"], json!("0"));
}

#[tokio::test]
async fn removing_one_line_leaves_the_rest() {
    let app = TestApp::new().await;
    let first = seed_product(&app, "Keeper", 1000, 0, 10).await;
    let second = seed_product(&app, "Goner", 2000, 0, 10).await;
    let token = app.customer_token("cart4@example.com").await;

    for (id, size) in [(&first, "UK 8"), (&second, "UK 9")] {
        app.request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": id, "size": size, "quantity": 1 })),
            Some(&token),
        )
        .await;
    }

    let response = app
        .request(
            Method::DELETE,
            "/api/v1/cart/items",
            Some(json!({ "product_id": second, "size": "UK 9" })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(body["data"]["total_price"], json!("1000"));
    assert_totals_consistent(&body["data"]);
}

#[tokio::test]
async fn clear_empties_the_cart() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Everything", 999, 0, 10).await;
    let token = app.customer_token("cart5@example.com").await;

    app.request(
        Method::POST,
        "/api/v1/cart/items",
        Some(json!({ "product_id": product_id, "size": "UK 6", "quantity": 5 })),
        Some(&token),
    )
    .await;

    let response = app
        .request(Method::POST, "/api/v1/cart/clear", None, Some(&token))
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
    assert_eq!(body["data"]["total_items"], json!(0));
}

#[tokio::test]
async fn inactive_products_cannot_be_added() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Withdrawn", 1200, 0, 10).await;
    let admin = app.admin_token().await;
    let token = app.customer_token("cart6@example.com").await;

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/products/{}", product_id),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product_id, "size": "UK 8", "quantity": 1 })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 404);
}
