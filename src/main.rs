use std::sync::Arc;

use actix_web::http::Method;
use actix_web::{web, App, HttpMessage, HttpRequest, HttpResponse, HttpServer};
use log::{error, info};
use serde::Deserialize;
use serde_json::json;

mod auth;
mod config;
mod error;
mod middleware;
mod models;
mod store;

use auth::SessionAuthority;
use config::AppConfig;
use error::AppError;
use models::{Claims, LoginInput, LoginResponse, NewProduct, ProductId, ProductList, UpdateRequest};
use store::ProductStore;

#[derive(Debug, Deserialize)]
struct ProductQuery {
    id: Option<String>,
    category: Option<String>,
}

async fn login(
    authority: web::Data<SessionAuthority>,
    credentials: web::Json<LoginInput>,
) -> Result<HttpResponse, AppError> {
    let token = authority.authenticate(&credentials.username, &credentials.password)?;
    info!("admin {} logged in", credentials.username);
    Ok(HttpResponse::Ok().json(LoginResponse {
        success: true,
        token,
        username: credentials.username.clone(),
        message: "Login successful".to_string(),
    }))
}

async fn verify_session(authority: web::Data<SessionAuthority>, req: HttpRequest) -> HttpResponse {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));
    match token {
        Some(token) if authority.is_valid(token) => {
            HttpResponse::Ok().json(json!({ "valid": true, "message": "Token is valid" }))
        }
        Some(_) => {
            HttpResponse::Unauthorized().json(json!({ "valid": false, "message": "Invalid token" }))
        }
        None => HttpResponse::Unauthorized()
            .json(json!({ "valid": false, "message": "No token provided" })),
    }
}

async fn get_products(
    store: web::Data<ProductStore>,
    query: web::Query<ProductQuery>,
) -> Result<HttpResponse, AppError> {
    if let Some(id) = &query.id {
        let product = store.get(&ProductId::Text(id.clone()))?;
        return Ok(HttpResponse::Ok().json(product));
    }
    let products = store.list(query.category.as_deref())?;
    Ok(HttpResponse::Ok().json(ProductList {
        total: products.len(),
        products,
    }))
}

async fn create_product(
    store: web::Data<ProductStore>,
    input: web::Json<NewProduct>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let product = store.create(input.into_inner())?;
    if let Some(claims) = req.extensions().get::<Claims>() {
        info!("admin {} created product {}", claims.sub, product.id);
    }
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "product": product,
        "message": "Product created successfully"
    })))
}

async fn update_product(
    store: web::Data<ProductStore>,
    request: web::Json<UpdateRequest>,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();
    let id = request
        .id
        .ok_or_else(|| AppError::Validation("Product ID is required".to_string()))?;
    let product = store.update(&id, request.patch)?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "product": product,
        "message": "Product updated successfully"
    })))
}

async fn delete_product(
    store: web::Data<ProductStore>,
    query: web::Query<ProductQuery>,
) -> Result<HttpResponse, AppError> {
    let id = query
        .into_inner()
        .id
        .ok_or_else(|| AppError::Validation("Product ID is required".to_string()))?;
    let removed = store.delete(&ProductId::Text(id))?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Product deleted successfully",
        "deletedProduct": removed
    })))
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

// Browser preflights get an empty success on any path; everything else
// falling through the route table is a plain not-found.
async fn preflight_or_not_found(req: HttpRequest) -> HttpResponse {
    if req.method() == Method::OPTIONS {
        HttpResponse::Ok().finish()
    } else {
        HttpResponse::NotFound().json(json!({ "error": "Not found" }))
    }
}

fn configure_api(
    store: web::Data<ProductStore>,
    authority: Arc<SessionAuthority>,
) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(store)
            .app_data(web::Data::from(authority.clone()))
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                AppError::Validation(err.to_string()).into()
            }))
            .route("/health", web::get().to(health))
            .route("/auth/login", web::post().to(login))
            .route("/auth/verify", web::get().to(verify_session))
            .route("/products", web::get().to(get_products))
            .service(
                web::scope("/admin")
                    .wrap(middleware::RequireSession::new(authority))
                    .route("/products", web::post().to(create_product))
                    .route("/products", web::put().to(update_product))
                    .route("/products", web::delete().to(delete_product))
                    .default_service(web::route().to(preflight_or_not_found)),
            )
            .default_service(web::route().to(preflight_or_not_found));
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok(); // Load environment variables from .env file
    env_logger::init();

    // One-off provisioning helper: prints the value for ADMIN_PASSWORD_HASH.
    let mut args = std::env::args().skip(1);
    if args.next().as_deref() == Some("hash-password") {
        match args.next() {
            Some(password) => match auth::hash_password(&password) {
                Ok(hash) => {
                    println!("{}", hash);
                    return Ok(());
                }
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
            },
            None => {
                eprintln!("usage: catalog-admin hash-password <password>");
                std::process::exit(2);
            }
        }
    }

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let store = match ProductStore::open(&config.products_file) {
        Ok(store) => web::Data::new(store),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let authority = Arc::new(SessionAuthority::new(
        config.admin_username.clone(),
        config.admin_password_hash.clone(),
        &config.jwt_secret,
        config.token_ttl_hours,
    ));

    let bind_addr = format!("{}:{}", config.host, config.port);
    info!("catalog admin listening on {}", bind_addr);

    HttpServer::new(move || App::new().configure(configure_api(store.clone(), authority.clone())))
        .bind(&bind_addr)?
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::Value;
    use tempfile::TempDir;

    macro_rules! test_app {
        ($dir:expr) => {{
            let store =
                web::Data::new(ProductStore::open($dir.path().join("products-store.json")).unwrap());
            let authority = Arc::new(SessionAuthority::new(
                "admin".to_string(),
                auth::hash_password("admin123").unwrap(),
                "test-secret",
                24,
            ));
            test::init_service(App::new().configure(configure_api(store, authority))).await
        }};
    }

    macro_rules! login_token {
        ($app:expr) => {{
            let req = test::TestRequest::post()
                .uri("/auth/login")
                .set_json(json!({ "username": "admin", "password": "admin123" }))
                .to_request();
            let body: Value = test::call_and_read_body_json(&$app, req).await;
            assert_eq!(body["success"], json!(true));
            body["token"].as_str().unwrap().to_string()
        }};
    }

    #[actix_web::test]
    async fn health_is_public() {
        let dir = TempDir::new().unwrap();
        let app = test_app!(dir);
        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request())
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn login_and_verify_flow() {
        let dir = TempDir::new().unwrap();
        let app = test_app!(dir);
        let token = login_token!(app);

        let req = test::TestRequest::get()
            .uri("/auth/verify")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["valid"], json!(true));

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/auth/verify").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn login_rejects_bad_credentials() {
        let dir = TempDir::new().unwrap();
        let app = test_app!(dir);
        let req = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({ "username": "admin", "password": "wrong" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn mutating_routes_require_a_valid_token() {
        let dir = TempDir::new().unwrap();
        let app = test_app!(dir);

        let bare = test::TestRequest::post()
            .uri("/admin/products")
            .set_json(json!({ "name": "Air Max", "category": "Sneakers", "price": 4500 }))
            .to_request();
        let resp = test::call_service(&app, bare).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let forged = test::TestRequest::post()
            .uri("/admin/products")
            .insert_header(("Authorization", format!("Bearer {}", "a".repeat(64))))
            .set_json(json!({ "name": "Air Max", "category": "Sneakers", "price": 4500 }))
            .to_request();
        let resp = test::call_service(&app, forged).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/products").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn create_then_fetch_update_delete() {
        let dir = TempDir::new().unwrap();
        let app = test_app!(dir);
        let token = login_token!(app);
        let bearer = ("Authorization", format!("Bearer {}", token));

        let req = test::TestRequest::post()
            .uri("/admin/products")
            .insert_header(bearer.clone())
            .set_json(json!({ "name": "Air Max", "category": "Sneakers", "price": 4500 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], json!(true));
        let product = &body["product"];
        assert_eq!(product["sizes"], json!("40-45"));
        assert_eq!(product["image"], json!("images/default.jpg"));
        assert!(product["created"].is_string());
        assert!(product.get("updated").is_none());
        let id = product["id"].as_i64().unwrap();

        let req = test::TestRequest::get()
            .uri(&format!("/products?id={}", id))
            .to_request();
        let fetched: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(fetched["name"], json!("Air Max"));

        let req = test::TestRequest::put()
            .uri("/admin/products")
            .insert_header(bearer.clone())
            .set_json(json!({ "id": id, "price": 4200 }))
            .to_request();
        let updated: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(updated["product"]["price"], json!(4200));
        assert_eq!(updated["product"]["name"], json!("Air Max"));
        assert_eq!(updated["product"]["created"], fetched["created"]);
        assert!(updated["product"]["updated"].is_string());

        let req = test::TestRequest::delete()
            .uri(&format!("/admin/products?id={}", id))
            .insert_header(bearer)
            .to_request();
        let deleted: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(deleted["success"], json!(true));
        assert_eq!(deleted["deletedProduct"]["id"], json!(id));

        let req = test::TestRequest::get()
            .uri(&format!("/products?id={}", id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn create_with_missing_fields_is_rejected() {
        let dir = TempDir::new().unwrap();
        let app = test_app!(dir);
        let token = login_token!(app);

        let req = test::TestRequest::post()
            .uri("/admin/products")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .set_json(json!({ "name": "X" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let list: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/products").to_request(),
        )
        .await;
        assert_eq!(list["total"], json!(0));
    }

    #[actix_web::test]
    async fn update_and_delete_require_an_id() {
        let dir = TempDir::new().unwrap();
        let app = test_app!(dir);
        let token = login_token!(app);
        let bearer = ("Authorization", format!("Bearer {}", token));

        let req = test::TestRequest::put()
            .uri("/admin/products")
            .insert_header(bearer.clone())
            .set_json(json!({ "price": 4200 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::delete()
            .uri("/admin/products")
            .insert_header(bearer)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn list_filters_by_category() {
        let dir = TempDir::new().unwrap();
        let app = test_app!(dir);
        let token = login_token!(app);

        for (name, category) in [("A", "Sneakers"), ("B", "Official"), ("C", "Sneakers")] {
            let req = test::TestRequest::post()
                .uri("/admin/products")
                .insert_header(("Authorization", format!("Bearer {}", token)))
                .set_json(json!({ "name": name, "category": category, "price": 1000 }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::CREATED);
        }

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/products?category=Sneakers")
                .to_request(),
        )
        .await;
        assert_eq!(body["total"], json!(2));
        let names: Vec<_> = body["products"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["A", "C"]);
    }

    #[actix_web::test]
    async fn preflight_is_answered_without_credentials() {
        let dir = TempDir::new().unwrap();
        let app = test_app!(dir);

        for uri in ["/products", "/admin/products", "/auth/login"] {
            let req = test::TestRequest::with_uri(uri)
                .method(Method::OPTIONS)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK, "preflight failed for {}", uri);
            let body = test::read_body(resp).await;
            assert!(body.is_empty());
        }
    }

    #[actix_web::test]
    async fn unknown_paths_are_not_found() {
        let dir = TempDir::new().unwrap();
        let app = test_app!(dir);
        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/nope").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], json!("Not found"));
    }
}
