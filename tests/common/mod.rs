//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use tower::ServiceExt;

use tasking_manager::application::services::Services;
use tasking_manager::config::{
    CorsSettings, DatabaseSettings, JwtSettings, RedisSettings, ServerSettings, Settings,
    TaskSettings,
};
use tasking_manager::domain::{
    MapperLevel, Project, ProjectStatus, Task, TaskStatus, User, UserRole,
};
use tasking_manager::infrastructure::cache::NoPermissionCache;
use tasking_manager::infrastructure::database;
use tasking_manager::infrastructure::repositories::{
    InMemoryPartnerRepository, InMemoryProjectRepository, InMemoryTaskRepository,
    InMemoryUserRepository,
};
use tasking_manager::presentation::middleware::Claims;
use tasking_manager::shared::tiles::Tile;
use tasking_manager::startup::{build_router, AppState};

pub const JWT_SECRET: &str = "integration-test-secret-at-least-32-characters";

pub const PROJECT: i64 = 1;
pub const ADMIN: i64 = 1;
pub const AUTHOR: i64 = 2;
pub const MAPPER: i64 = 3;
pub const OTHER_MAPPER: i64 = 4;

/// Test application over in-memory stores
pub struct TestApp {
    pub router: Router,
    pub tasks: Arc<InMemoryTaskRepository>,
    pub partners: Arc<InMemoryPartnerRepository>,
}

fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        database: DatabaseSettings {
            url: "postgres://tm:tm@localhost:5432/tasking_manager_test".into(),
            max_connections: 1,
            min_connections: 0,
            acquire_timeout: 1,
            run_migrations: false,
        },
        redis: RedisSettings {
            url: None,
            permission_ttl_secs: 60,
        },
        jwt: JwtSettings {
            secret: JWT_SECRET.into(),
        },
        cors: CorsSettings {
            allowed_origins: vec![],
        },
        tasks: TaskSettings::default(),
        log_format: "pretty".into(),
        environment: "test".into(),
    }
}

impl TestApp {
    /// A published project with four READY tasks, one admin, the project
    /// author and two plain mappers.
    pub fn new() -> Self {
        let tasks = Arc::new(InMemoryTaskRepository::default());
        for id in 1..=4 {
            let tile = Tile::new(100 + id, 200, 12);
            tasks.insert(Task {
                id,
                project_id: PROJECT,
                x: Some(tile.x),
                y: Some(tile.y),
                zoom: Some(tile.zoom),
                is_square: true,
                geometry: tile.to_geojson(),
                ..Task::default()
            });
        }

        let projects = Arc::new(InMemoryProjectRepository::default());
        projects.insert(Project {
            id: PROJECT,
            status: ProjectStatus::Published,
            author_id: AUTHOR,
            ..Project::default()
        });

        let users = Arc::new(InMemoryUserRepository::default());
        for (id, role) in [
            (ADMIN, UserRole::Admin),
            (AUTHOR, UserRole::Mapper),
            (MAPPER, UserRole::Mapper),
            (OTHER_MAPPER, UserRole::Mapper),
        ] {
            users.insert(User {
                id,
                username: format!("user{id}"),
                role,
                mapping_level: MapperLevel::Beginner,
                accepted_licenses: vec![],
            });
        }

        let partners = Arc::new(InMemoryPartnerRepository::default());
        let settings = test_settings();

        let services = Services::new(
            tasks.clone(),
            projects,
            users,
            partners.clone(),
            Arc::new(NoPermissionCache),
            &settings.tasks,
        );

        // Never connected; only the readiness probe would touch it
        let db = database::create_lazy_pool(&settings.database)
            .expect("lazy pool from a valid url");

        let state = AppState {
            db,
            redis: None,
            services,
            settings: Arc::new(settings),
        };

        Self {
            router: build_router(state),
            tasks,
            partners,
        }
    }

    /// Status of a stored task
    pub fn status_of(&self, task_id: i64) -> TaskStatus {
        self.tasks
            .get(PROJECT, task_id)
            .expect("task exists")
            .status
    }

    /// Overwrite the status of a stored task
    pub fn set_status(&self, task_id: i64, status: TaskStatus) {
        let mut task = self.tasks.get(PROJECT, task_id).expect("task exists");
        task.status = status;
        self.tasks.insert(task);
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Make a GET request to the application
    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Make an authenticated request with an optional JSON body
    pub async fn request_auth(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        user_id: i64,
    ) -> Response {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", format!("Bearer {}", token_for(user_id)));
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        };
        self.send(request.unwrap()).await
    }

    /// Make an authenticated POST request
    pub async fn post_auth(&self, uri: &str, body: Option<Value>, user_id: i64) -> Response {
        self.request_auth("POST", uri, body, user_id).await
    }

    /// Make an unauthenticated POST request with a JSON body
    pub async fn post_json(&self, uri: &str, body: Value) -> Response {
        self.send(
            Request::post(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

/// Signed session token for a user id
pub fn token_for(user_id: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        name: format!("user{user_id}"),
        exp: now + 3600,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

/// Read a response body as JSON
pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Assert the status and `SubCode` of an error response
pub async fn assert_error(response: Response, status: StatusCode, sub_code: &str) -> Value {
    assert_eq!(response.status(), status);
    let body = json_body(response).await;
    assert_eq!(body["SubCode"], sub_code);
    body
}
