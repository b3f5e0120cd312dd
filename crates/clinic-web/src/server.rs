//! Web服务器

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use clinic_core::Result;
use clinic_identity::UserRegistry;
use clinic_records::{EncounterStore, MedicalCardManager, PrescriptionManager};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::handlers;

/// 共享应用状态
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RwLock<UserRegistry>>,
    pub encounters: Arc<RwLock<EncounterStore>>,
    pub prescriptions: Arc<RwLock<PrescriptionManager>>,
    pub cards: Arc<RwLock<MedicalCardManager>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(RwLock::new(UserRegistry::new())),
            encounters: Arc::new(RwLock::new(EncounterStore::new())),
            prescriptions: Arc::new(RwLock::new(PrescriptionManager::new())),
            cards: Arc::new(RwLock::new(MedicalCardManager::new())),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        let app = Self::create_app(state);

        Self { addr, app }
    }

    fn create_app(state: AppState) -> Router {
        Router::new()
            // 根路径
            .route("/", get(handlers::api_root))

            // 健康检查
            .route("/health", get(handlers::health))

            // API路由
            .nest("/api/v1", api_routes())
            .with_state(state)

            // 全局中间件
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(
                        CorsLayer::new()
                            .allow_origin(Any)
                            .allow_methods(Any)
                            .allow_headers(Any),
                    ),
            )
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| clinic_core::ClinicError::Internal(format!("bind failed: {}", e)))?;
        axum::serve(listener, self.app)
            .await
            .map_err(|e| clinic_core::ClinicError::Internal(format!("server error: {}", e)))?;

        Ok(())
    }
}

/// API v1 路由
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::api_root))
        // 用户与身份
        .route("/auth/register", post(handlers::register_user))
        .route("/users/:user_id", get(handlers::get_user))
        .route("/users/:user_id", delete(handlers::delete_user))
        .route("/users/:user_id/status", put(handlers::set_user_status))
        .route("/users/:user_id/verify-email", post(handlers::verify_email))
        .route(
            "/users/:user_id/permissions",
            post(handlers::grant_permission),
        )
        .route(
            "/users/:user_id/permissions",
            delete(handlers::revoke_permission),
        )
        // 医患指派
        .route("/assignments", post(handlers::assign_doctor))
        .route("/assignments", delete(handlers::unassign_doctor))
        .route("/doctors/:doctor_id/patients", get(handlers::doctor_patients))
        // 预约
        .route("/appointments", post(handlers::create_appointment))
        .route("/appointments/:appointment_id", get(handlers::get_appointment))
        .route("/appointments/:appointment_id", put(handlers::update_appointment))
        .route(
            "/appointments/:appointment_id/reschedule",
            post(handlers::reschedule_appointment),
        )
        .route(
            "/patients/:patient_id/appointments",
            get(handlers::patient_appointments),
        )
        // 病历记录
        .route("/records", post(handlers::create_record))
        .route("/records/:record_id", get(handlers::get_record))
        .route("/records/:record_id/complete", post(handlers::complete_task))
        .route("/patients/:patient_id/records", get(handlers::patient_records))
        // 处方
        .route("/prescriptions", post(handlers::create_prescription))
        .route(
            "/prescriptions/:prescription_id/status",
            put(handlers::update_prescription_status),
        )
        .route(
            "/patients/:patient_id/prescriptions",
            get(handlers::patient_prescriptions),
        )
        // 就诊卡
        .route(
            "/patients/:patient_id/medical-card",
            put(handlers::upsert_medical_card),
        )
        .route(
            "/patients/:patient_id/medical-card",
            get(handlers::get_medical_card),
        )
}
