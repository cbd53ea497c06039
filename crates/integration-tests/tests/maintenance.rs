//! Maintenance mode against the full router.
//!
//! Maintenance is a single site-wide flag, so these checks live in their own
//! test binary and switch it back off when done.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::body::Body;
use axum::http::{
    Request, StatusCode,
    header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
};
use axum::response::Response;
use sqlx::PgPool;
use tower::ServiceExt;

use mandir_core::Role;
use mandir_integration_tests::{router, test_pool, unique_email};
use mandir_storefront::db::{RoleRepository, SettingsRepository};
use mandir_storefront::services::AuthService;
use mandir_storefront::services::auth::SignUp;

const PASSWORD: &str = "correct-horse-battery";

/// A browser: one session cookie carried across requests.
struct Browser {
    pool: PgPool,
    cookie: Option<String>,
}

impl Browser {
    const fn new(pool: PgPool) -> Self {
        Self { pool, cookie: None }
    }

    async fn send(&mut self, request: axum::http::request::Builder, body: Body) -> Response {
        let mut request = request.header("x-forwarded-for", "203.0.113.9");
        if let Some(cookie) = &self.cookie {
            request = request.header(COOKIE, cookie);
        }
        let response = router(self.pool.clone())
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        if let Some(set) = response.headers().get(SET_COOKIE) {
            let pair = set.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_owned());
        }
        response
    }

    async fn get(&mut self, path: &str) -> Response {
        self.send(Request::get(path), Body::empty()).await
    }

    async fn post_form(&mut self, path: &str, form: &str) -> Response {
        self.send(
            Request::post(path).header(CONTENT_TYPE, "application/x-www-form-urlencoded"),
            Body::from(form.to_owned()),
        )
        .await
    }
}

fn location(response: &Response) -> &str {
    response.headers()[LOCATION].to_str().unwrap()
}

#[tokio::test]
#[ignore = "Requires MANDIR_TEST_DATABASE_URL"]
async fn admin_wearing_vendor_role_is_not_locked_out() {
    let pool = test_pool().await;
    let settings = SettingsRepository::new(&pool);
    settings.set_maintenance(false).await.unwrap();

    let email = unique_email("maint");
    let user = AuthService::new(&pool)
        .sign_up(SignUp {
            email: &email,
            password: PASSWORD,
            full_name: "Mahant Test",
            country: "IN",
        })
        .await
        .unwrap();
    let roles = RoleRepository::new(&pool);
    roles.grant(user.id, Role::Admin).await.unwrap();
    roles.grant(user.id, Role::Vendor).await.unwrap();

    let mut admin = Browser::new(pool.clone());
    let login = admin
        .post_form("/auth/login", &format!("email={email}&password={PASSWORD}"))
        .await;
    assert_eq!(login.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&login), "/admin");

    let switched = admin.post_form("/account/role", "role=vendor").await;
    assert_eq!(location(&switched), "/vendor");

    settings.set_maintenance(true).await.unwrap();

    let mut visitor = Browser::new(pool.clone());
    assert_eq!(
        visitor.get("/vendor").await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );

    let login_page = admin.get("/auth/login").await;
    assert_eq!(location(&login_page), "/vendor");
    assert_eq!(admin.get("/vendor").await.status(), StatusCode::OK);

    let back = admin.post_form("/account/role", "role=admin").await;
    assert_eq!(location(&back), "/admin");
    assert_eq!(admin.get("/admin").await.status(), StatusCode::OK);

    settings.set_maintenance(false).await.unwrap();
}
