use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::auth::{AuthSettings, IdentityClient};
use crate::config::{AppConfig, SecurityConfig, StoreBackend, TenantSource};
use crate::database::{DatabaseManager, PgStore, RestStore, TableStore};
use crate::handlers::{protected, public};
use crate::middleware::{jwt_auth_middleware, resolve_tenant_middleware};
use crate::services::{AssignmentService, CourseService, ForumService, GradeService, UserService};
use crate::tenant::{StaticTenants, StoredTenants, TenantResolver};

/// Shared, immutable per-process state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TableStore>,
    pub tenants: Arc<dyn TenantResolver>,
    pub auth: AuthSettings,
    pub identity: IdentityClient,
    pub users: UserService,
    pub courses: CourseService,
    pub assignments: AssignmentService,
    pub grades: GradeService,
    pub forum: ForumService,
}

impl AppState {
    pub fn new(
        store: Arc<dyn TableStore>,
        tenants: Arc<dyn TenantResolver>,
        auth: AuthSettings,
        identity: IdentityClient,
    ) -> Self {
        Self {
            users: UserService::new(store.clone()),
            courses: CourseService::new(store.clone()),
            assignments: AssignmentService::new(store.clone()),
            grades: GradeService::new(store.clone()),
            forum: ForumService::new(store.clone()),
            store,
            tenants,
            auth,
            identity,
        }
    }

    /// Builds the store and tenant resolver selected by configuration.
    /// Postgres pools are created lazily, so this does not touch the database.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.backend.http_timeout_secs);
        let store = build_store(config, timeout)?;

        let tenants: Arc<dyn TenantResolver> = match config.backend.tenant_source {
            TenantSource::Static => Arc::new(
                StaticTenants::new(config.backend.load_tenants()?).context("invalid tenant definitions")?,
            ),
            TenantSource::Store => Arc::new(StoredTenants::new(store.clone())),
        };
        info!(
            "Using {:?} store with {:?} tenant source",
            config.backend.store, config.backend.tenant_source
        );

        let identity = IdentityClient::new(&config.identity, timeout).context("failed to build HTTP client")?;
        Ok(Self::new(store, tenants, AuthSettings::from_config(&config.identity), identity))
    }
}

pub fn build_store(config: &AppConfig, timeout: Duration) -> anyhow::Result<Arc<dyn TableStore>> {
    Ok(match config.backend.store {
        StoreBackend::Postgres => Arc::new(PgStore::new(DatabaseManager::new(&config.database))),
        StoreBackend::Rest => {
            let url = config
                .identity
                .url
                .as_deref()
                .context("STORE_BACKEND=rest requires SUPABASE_URL")?;
            let key = config
                .identity
                .service_role_key
                .as_deref()
                .context("STORE_BACKEND=rest requires SUPABASE_SERVICE_ROLE_KEY")?;
            Arc::new(RestStore::new(url, key, timeout)?)
        }
    })
}

pub fn router(state: AppState, security: &SecurityConfig) -> Router {
    let app = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(public_routes())
        // JWT only
        .merge(identity_routes(state.clone()))
        // JWT + tenant
        .merge(tenant_routes(state.clone()))
        .with_state(state);

    let app = if security.enable_cors {
        app.layer(cors_layer(&security.cors_origins))
    } else {
        app
    };
    app.layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::permissive().allow_origin(origins)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(public::login))
        .route("/api/tenants", get(public::tenants_list))
        .route("/api/roles", get(public::roles_list))
}

fn identity_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(protected::auth::me))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn tenant_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Users
        .route("/api/auth/sync-user", post(protected::auth::sync_user))
        .route("/api/auth/user-profile", get(protected::auth::user_profile))
        .route("/api/usuarios/:tenant", get(protected::usuarios::list))
        .route(
            "/api/usuarios/:tenant/:id/rol",
            put(protected::usuarios::update_role).patch(protected::usuarios::update_role),
        )
        // Courses
        .route("/api/courses", get(protected::courses::list).post(protected::courses::create))
        .route("/api/courses/my-courses", get(protected::courses::mine))
        .route("/api/courses/enroll", post(protected::courses::enroll))
        .route("/api/courses/enroll/:id", delete(protected::courses::unenroll))
        .route(
            "/api/courses/:id",
            put(protected::courses::update).delete(protected::courses::delete),
        )
        .route("/api/courses/:id/enrollments", get(protected::courses::enrollments))
        .route("/api/courses/:id/students", get(protected::courses::students))
        .route("/api/courses/:id/assign-teacher", post(protected::courses::assign_teacher))
        // Assignments
        .route(
            "/api/courses/:id/assignments",
            get(protected::assignments::list).post(protected::assignments::create),
        )
        .route("/api/assignments/:id", get(protected::assignments::show))
        .route("/api/assignments/:id/complete", post(protected::assignments::complete))
        // Grades
        .route("/api/grades", get(protected::grades::list).post(protected::grades::create))
        .route("/api/grades/course/:id", get(protected::grades::by_course))
        .route(
            "/api/grades/:id",
            put(protected::grades::update).delete(protected::grades::delete),
        )
        // Forum
        .route(
            "/api/forum/threads",
            get(protected::forum::threads_list).post(protected::forum::thread_create),
        )
        .route(
            "/api/forum/threads/:id",
            get(protected::forum::thread_show).delete(protected::forum::thread_delete),
        )
        .route("/api/forum/replies", post(protected::forum::reply_create))
        .route("/api/forum/replies/:id", delete(protected::forum::reply_delete))
        .route("/api/forum/categories", get(protected::forum::categories_list))
        // Layers run bottom-up: JWT first, then tenant resolution
        .route_layer(from_fn_with_state(state.clone(), resolve_tenant_middleware))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}
