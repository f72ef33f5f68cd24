// crates/server/src/routes/categories.rs

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use gitscout_core::models::Category;
use gitscout_core::store::CategoryStore;

use crate::error::ApiResult;
use crate::middleware::AuthUser;
use crate::state::AppState;

/// GET /api/categories — the curated taxonomy.
async fn list_categories(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.categories.list().await?))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/categories", get(list_categories))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::create_app;
    use crate::testutil::{bearer, create_user, test_state};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_categories_require_auth() {
        let (state, _store) = test_state();
        let app = create_app(state);

        let response = app
            .oneshot(Request::builder().uri("/api/categories").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_categories_listed_sorted() {
        let (state, store) = test_state();
        let user = create_user(&store, 1, "alice").await;
        store.push_category(Category {
            id: Uuid::new_v4(),
            name: "Web".into(),
            slug: "web".into(),
            description: String::new(),
            icon: "globe".into(),
        });
        store.push_category(Category {
            id: Uuid::new_v4(),
            name: "CLI".into(),
            slug: "cli".into(),
            description: String::new(),
            icon: "terminal".into(),
        });

        let token = bearer(&state, &user);
        let app = create_app(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/categories")
                    .header(header::AUTHORIZATION, token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let categories: Vec<Category> = serde_json::from_slice(&body).unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].name, "CLI");
    }
}
