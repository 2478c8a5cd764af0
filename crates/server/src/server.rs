use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Basic},
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use std::sync::Arc;

use crate::{accounts, events, expenses, membership, transactions, user};
use engine::{Engine, Identity, Role};

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub db: DatabaseConnection,
}

/// Resolves the caller's engine identity: club role plus the capability
/// grants of every shop they staff.
async fn resolve_identity(
    db: &DatabaseConnection,
    user: &user::Model,
) -> Result<Identity, sea_orm::DbErr> {
    let role = match user.role.as_str() {
        "admin" => Role::Admin,
        _ => Role::Member,
    };
    let mut identity = match role {
        Role::Admin => Identity::admin(user.username.clone()),
        Role::Member => Identity::member(user.username.clone()),
    };

    let memberships = membership::Entity::find()
        .filter(membership::Column::UserId.eq(user.username.clone()))
        .all(db)
        .await?;
    for entry in memberships {
        let capabilities = membership::capabilities_for_role(&entry.role);
        if !capabilities.is_empty() {
            identity = identity.with_grant(entry.shop_id, capabilities);
        }
    }
    Ok(identity)
}

async fn auth(
    auth_header: TypedHeader<Authorization<Basic>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth_header.username().is_empty() || auth_header.password().is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let user: Option<user::Model> = user::Entity::find()
        .filter(user::Column::Username.eq(auth_header.username()))
        .filter(user::Column::Password.eq(auth_header.password()))
        .one(&state.db)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let Some(user) = user else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    let identity = resolve_identity(&state.db, &user)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

fn router(state: ServerState) -> Router {
    Router::new()
        .route("/accounts", post(accounts::new))
        .route("/accounts/{id}", get(accounts::get))
        .route("/accounts/{id}/transactions", get(accounts::history))
        .route("/accounts/{id}/freeze", post(accounts::freeze))
        .route("/accounts/{id}/topUp", post(accounts::top_up))
        .route("/wallet", get(accounts::own_wallet))
        .route("/purchase", post(transactions::purchase_new))
        .route("/transfer", post(transactions::transfer_new))
        .route("/adjustments", post(transactions::adjustment_new))
        .route(
            "/transactions/{id}/cancel",
            post(transactions::cancel),
        )
        .route("/groups/{id}/cancel", post(transactions::cancel_group))
        .route("/events", post(events::new))
        .route("/events/{id}", get(events::get))
        .route("/events/{id}/join", post(events::join))
        .route("/events/{id}/leave", post(events::leave))
        .route("/events/{id}/activate", post(events::activate))
        .route(
            "/events/{id}/settlement",
            get(events::settlement_preview).post(events::settle),
        )
        .route("/events/{id}/close", post(events::close))
        .route("/events/{id}/archive", post(events::archive))
        .route("/events/{id}/revenue", get(events::revenue))
        .route("/expenses", post(expenses::new))
        .route("/expenses/{id}/split", post(expenses::split))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth))
        .with_state(state)
}

pub async fn run(engine: Engine, db: DatabaseConnection) {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:3000").await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, db, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Engine,
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState {
        engine: Arc::new(engine),
        db,
    };

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    engine: Engine,
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, db, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{self, header};
    use base64::Engine as _;
    use engine::AccountOwner;
    use http_body_util::BodyExt;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::ActiveValue;
    use tower::ServiceExt;

    async fn test_state() -> ServerState {
        let db = sea_orm::Database::connect("sqlite::memory:")
            .await
            .unwrap();
        Migrator::up(&db, None).await.unwrap();
        let engine = Engine::builder().database(db.clone()).build().await.unwrap();
        ServerState {
            engine: Arc::new(engine),
            db,
        }
    }

    async fn seed_user(db: &DatabaseConnection, username: &str, password: &str, role: &str) {
        user::Entity::insert(user::ActiveModel {
            username: ActiveValue::Set(username.to_string()),
            password: ActiveValue::Set(password.to_string()),
            role: ActiveValue::Set(role.to_string()),
        })
        .exec(db)
        .await
        .unwrap();
    }

    fn basic(username: &str, password: &str) -> String {
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
        format!("Basic {encoded}")
    }

    fn get(path: &str, credentials: &str) -> http::Request<Body> {
        http::Request::builder()
            .uri(path)
            .header(header::AUTHORIZATION, credentials)
            .body(Body::empty())
            .unwrap()
    }

    fn post_json(path: &str, credentials: &str, body: serde_json::Value) -> http::Request<Body> {
        http::Request::builder()
            .method(http::Method::POST)
            .uri(path)
            .header(header::AUTHORIZATION, credentials)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn requests_without_valid_credentials_are_rejected() {
        let state = test_state().await;
        seed_user(&state.db, "alice", "sesame", "member").await;
        let app = router(state);

        let response = app
            .clone()
            .oneshot(
                http::Request::builder()
                    .uri("/wallet")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());

        let response = app
            .oneshot(get("/wallet", &basic("alice", "wrong")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wallet_endpoint_returns_the_callers_account() {
        let state = test_state().await;
        seed_user(&state.db, "root", "toor", "admin").await;
        seed_user(&state.db, "alice", "sesame", "member").await;
        let admin = Identity::admin("root");
        state
            .engine
            .new_account(AccountOwner::Personal("alice".to_string()), &admin)
            .await
            .unwrap();
        let app = router(state);

        let response = app
            .oneshot(get("/wallet", &basic("alice", "sesame")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["owner_id"], "alice");
        assert_eq!(body["balance_minor"], 0);
    }

    #[tokio::test]
    async fn admins_can_top_up_over_http() {
        let state = test_state().await;
        seed_user(&state.db, "root", "toor", "admin").await;
        seed_user(&state.db, "alice", "sesame", "member").await;
        let admin = Identity::admin("root");
        let account = state
            .engine
            .new_account(AccountOwner::Personal("alice".to_string()), &admin)
            .await
            .unwrap();
        let app = router(state);

        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/accounts/{}/topUp", account.id),
                &basic("root", "toor"),
                serde_json::json!({ "amount_minor": 500 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(get("/wallet", &basic("alice", "sesame")))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["balance_minor"], 500);
    }

    #[tokio::test]
    async fn members_without_grants_cannot_top_up() {
        let state = test_state().await;
        seed_user(&state.db, "root", "toor", "admin").await;
        seed_user(&state.db, "alice", "sesame", "member").await;
        seed_user(&state.db, "bob", "hunter2", "member").await;
        let admin = Identity::admin("root");
        let account = state
            .engine
            .new_account(AccountOwner::Personal("alice".to_string()), &admin)
            .await
            .unwrap();
        let app = router(state);

        let response = app
            .oneshot(post_json(
                &format!("/accounts/{}/topUp", account.id),
                &basic("bob", "hunter2"),
                serde_json::json!({ "amount_minor": 500 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn staff_roles_grant_event_management() {
        let state = test_state().await;
        seed_user(&state.db, "alice", "sesame", "member").await;
        seed_user(&state.db, "olga", "organ", "member").await;
        membership::Entity::insert(membership::ActiveModel {
            shop_id: ActiveValue::Set("bar".to_string()),
            user_id: ActiveValue::Set("olga".to_string()),
            role: ActiveValue::Set("organizer".to_string()),
        })
        .exec(&state.db)
        .await
        .unwrap();
        let app = router(state);

        let payload = serde_json::json!({
            "shop_id": "bar",
            "name": "spring trip",
            "kind": "shared_cost",
        });
        let response = app
            .clone()
            .oneshot(post_json("/events", &basic("alice", "sesame"), payload.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(post_json("/events", &basic("olga", "organ"), payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["status"], "draft");
        assert_eq!(body["created_by"], "olga");
    }
}
