//! HTTP处理器

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{NaiveDate, NaiveTime, Utc};
use clinic_core::{ClinicError, PrescriptionStatus, UserStatus};
use clinic_identity::RegisterRequest;
use clinic_records::{
    AppointmentUpdate, MedicalCardInput, NewAppointment, NewPrescription, NewRecord,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::server::AppState;

/// HTTP层错误包装
///
/// 领域错误定义在核心库，这里包一层以便映射为HTTP响应。
pub struct ApiError(pub ClinicError);

impl From<ClinicError> for ApiError {
    fn from(err: ClinicError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, field, message) = match &self.0 {
            ClinicError::Validation { field, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Some(field.clone()),
                message.clone(),
            ),
            ClinicError::MissingRequiredField(field) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Some(field.clone()),
                self.0.to_string(),
            ),
            ClinicError::DomainNotAllowed(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Some("email".to_string()),
                self.0.to_string(),
            ),
            ClinicError::DuplicateKey { field, .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Some(field.clone()),
                self.0.to_string(),
            ),
            ClinicError::InvalidRole(_) | ClinicError::InvalidStateTransition { .. } => {
                (StatusCode::BAD_REQUEST, None, self.0.to_string())
            }
            ClinicError::ForbiddenFieldChange(field) => (
                StatusCode::FORBIDDEN,
                Some(field.clone()),
                self.0.to_string(),
            ),
            ClinicError::NotFound(_) => (StatusCode::NOT_FOUND, None, self.0.to_string()),
            ClinicError::PrecedingReassignmentRequired(_) => {
                (StatusCode::CONFLICT, None, self.0.to_string())
            }
            ClinicError::Database(_) | ClinicError::Serialization(_) | ClinicError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, None, self.0.to_string())
            }
        };

        let body = Json(json!({
            "error": true,
            "field": field,
            "message": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// 从 X-Actor-Id 请求头解析操作者
async fn resolve_actor(state: &AppState, headers: &HeaderMap) -> ApiResult<clinic_core::User> {
    let raw = headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ApiError(ClinicError::validation(
                "x-actor-id",
                "missing actor header",
            ))
        })?;
    let actor_id = Uuid::parse_str(raw)
        .map_err(|_| ApiError(ClinicError::validation("x-actor-id", "invalid uuid")))?;

    let registry = state.registry.read().await;
    Ok(registry.get(actor_id)?.clone())
}

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "Clinic Web API",
        "version": "1.0.0",
        "status": "running",
        "endpoints": {
            "health": "/health",
            "api": "/api/v1"
        }
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": "1.0.0"
    }))
}

// ========== 用户与身份 ==========

/// 用户注册处理器
pub async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut registry = state.registry.write().await;
    let user = registry.register(request)?;

    info!("Registered user {} as {}", user.id, user.role().as_str());
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "user_id": user.id,
            "role": user.role().as_str(),
            "status": user.status.as_str()
        })),
    ))
}

/// 用户详情处理器：角色视图投影 + 解析后的权限集合
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let registry = state.registry.read().await;
    let user = registry.get(user_id)?;
    let projection = registry.project(user)?;
    let permissions = registry.resolve_permissions(user);

    Ok(Json(json!({
        "user": projection,
        "display_identifier": registry.display_identifier(user),
        "permissions": permissions
    })))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: UserStatus,
}

/// 用户状态变更处理器（管理员操作）
pub async fn set_user_status(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<StatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut registry = state.registry.write().await;
    registry.set_status(user_id, request.status)?;

    Ok(Json(json!({
        "user_id": user_id,
        "status": request.status.as_str()
    })))
}

/// 邮箱验证处理器
pub async fn verify_email(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let mut registry = state.registry.write().await;
    registry.verify_email(user_id)?;

    Ok(Json(json!({ "user_id": user_id, "verified": true })))
}

#[derive(Debug, Deserialize)]
pub struct PermissionRequest {
    pub permission: String,
}

/// 授予自定义权限
pub async fn grant_permission(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<PermissionRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut registry = state.registry.write().await;
    registry.grant_permission(user_id, &request.permission)?;
    let user = registry.get(user_id)?;

    Ok(Json(json!({
        "user_id": user_id,
        "permissions": registry.resolve_permissions(user)
    })))
}

/// 撤销自定义权限
pub async fn revoke_permission(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<PermissionRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut registry = state.registry.write().await;
    registry.revoke_permission(user_id, &request.permission)?;
    let user = registry.get(user_id)?;

    Ok(Json(json!({
        "user_id": user_id,
        "permissions": registry.resolve_permissions(user)
    })))
}

/// 删除用户
///
/// 删除医生会先解除其名下所有患者的指派，响应中带解除数量。
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let mut registry = state.registry.write().await;
    let unassigned = registry.delete_user(user_id)?;
    drop(registry);

    let mut cards = state.cards.write().await;
    cards.remove_for_patient(user_id);

    Ok(Json(json!({
        "user_id": user_id,
        "deleted": true,
        "unassigned_patients": unassigned
    })))
}

// ========== 医患指派 ==========

#[derive(Debug, Deserialize)]
pub struct AssignmentRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
}

/// 指派医生处理器
pub async fn assign_doctor(
    State(state): State<AppState>,
    Json(request): Json<AssignmentRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut registry = state.registry.write().await;
    registry.assign_doctor(request.doctor_id, request.patient_id)?;
    let patient = registry.get(request.patient_id)?;
    let projection = registry.project(patient)?;

    Ok(Json(json!({ "patient": projection })))
}

/// 解除指派处理器
pub async fn unassign_doctor(
    State(state): State<AppState>,
    Json(request): Json<AssignmentRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut registry = state.registry.write().await;
    registry.unassign_doctor(request.doctor_id, request.patient_id)?;

    Ok(Json(json!({
        "doctor_id": request.doctor_id,
        "patient_id": request.patient_id,
        "unassigned": true
    })))
}

/// 医生名下患者列表
pub async fn doctor_patients(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let registry = state.registry.read().await;
    registry.get(doctor_id)?;

    let patients = registry
        .assigned_patients(doctor_id)
        .into_iter()
        .map(|p| registry.project(p))
        .collect::<clinic_core::Result<Vec<_>>>()?;
    let total = patients.len();

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "patients": patients,
        "total": total
    })))
}

// ========== 预约 ==========

/// 创建预约处理器
pub async fn create_appointment(
    State(state): State<AppState>,
    Json(request): Json<NewAppointment>,
) -> ApiResult<impl IntoResponse> {
    {
        let registry = state.registry.read().await;
        registry.get(request.patient_id)?;
        registry.get(request.doctor_id)?;
    }

    let mut encounters = state.encounters.write().await;
    let appointment = encounters.create_appointment(request)?;

    Ok((StatusCode::CREATED, Json(json!({ "appointment": appointment }))))
}

/// 预约详情处理器
pub async fn get_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let encounters = state.encounters.read().await;
    let appointment = encounters.get_appointment(appointment_id)?.clone();

    Ok(Json(json!({ "appointment": appointment })))
}

/// 更新预约处理器
///
/// 操作者角色决定允许修改的字段：临床职员不得改派医生或患者。
pub async fn update_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    headers: HeaderMap,
    Json(update): Json<AppointmentUpdate>,
) -> ApiResult<impl IntoResponse> {
    let actor = resolve_actor(&state, &headers).await?;

    let mut encounters = state.encounters.write().await;
    let appointment = encounters.update_appointment(actor.role(), appointment_id, update)?;

    Ok(Json(json!({ "appointment": appointment })))
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

/// 预约改期处理器
pub async fn reschedule_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut encounters = state.encounters.write().await;
    let appointment =
        encounters.reschedule_appointment(appointment_id, request.date, request.time)?;

    Ok(Json(json!({ "appointment": appointment })))
}

/// 患者预约列表处理器
pub async fn patient_appointments(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let encounters = state.encounters.read().await;
    let appointments: Vec<_> = encounters
        .patient_appointments(patient_id)
        .into_iter()
        .cloned()
        .collect();
    let total = appointments.len();

    Ok(Json(json!({
        "patient_id": patient_id,
        "appointments": appointments,
        "total": total
    })))
}

// ========== 病历记录 ==========

/// 创建病历记录处理器
///
/// 生命体征记录在创建响应中附带触发的告警列表。
pub async fn create_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<NewRecord>,
) -> ApiResult<impl IntoResponse> {
    let actor = resolve_actor(&state, &headers).await?;
    {
        let registry = state.registry.read().await;
        registry.get(request.patient_id)?;
    }

    let today = Utc::now().date_naive();
    let mut encounters = state.encounters.write().await;
    let (record, alerts) = encounters.create_record(request, actor.id, today)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "record": record, "alerts": alerts })),
    ))
}

/// 病历记录详情处理器
pub async fn get_record(
    State(state): State<AppState>,
    Path(record_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let encounters = state.encounters.read().await;
    let record = encounters.get_record(record_id)?.clone();

    Ok(Json(json!({ "record": record })))
}

/// 患者病历列表处理器
pub async fn patient_records(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let encounters = state.encounters.read().await;
    let records: Vec<_> = encounters
        .patient_records(patient_id)
        .into_iter()
        .cloned()
        .collect();
    let total = records.len();

    Ok(Json(json!({
        "patient_id": patient_id,
        "records": records,
        "total": total
    })))
}

#[derive(Debug, Deserialize)]
pub struct CompleteTaskRequest {
    pub completion_notes: String,
    #[serde(default)]
    pub actual_duration_minutes: Option<i32>,
}

/// 完成任务记录处理器
pub async fn complete_task(
    State(state): State<AppState>,
    Path(record_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<CompleteTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    let actor = resolve_actor(&state, &headers).await?;

    let mut encounters = state.encounters.write().await;
    let record = encounters.complete_task(
        record_id,
        actor.id,
        request.completion_notes,
        request.actual_duration_minutes,
    )?;

    Ok(Json(json!({ "record": record })))
}

// ========== 处方 ==========

/// 开具处方处理器
pub async fn create_prescription(
    State(state): State<AppState>,
    Json(request): Json<NewPrescription>,
) -> ApiResult<impl IntoResponse> {
    {
        let registry = state.registry.read().await;
        registry.get(request.patient_id)?;
    }

    let mut prescriptions = state.prescriptions.write().await;
    let prescription = prescriptions.create(request)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "prescription": prescription })),
    ))
}

/// 患者处方列表处理器
pub async fn patient_prescriptions(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let prescriptions = state.prescriptions.read().await;
    let list: Vec<_> = prescriptions
        .for_patient(patient_id)
        .into_iter()
        .cloned()
        .collect();
    let total = list.len();

    Ok(Json(json!({
        "patient_id": patient_id,
        "prescriptions": list,
        "total": total
    })))
}

#[derive(Debug, Deserialize)]
pub struct PrescriptionStatusRequest {
    pub status: PrescriptionStatus,
}

/// 处方状态变更处理器
pub async fn update_prescription_status(
    State(state): State<AppState>,
    Path(prescription_id): Path<Uuid>,
    Json(request): Json<PrescriptionStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut prescriptions = state.prescriptions.write().await;
    let prescription = prescriptions.update_status(prescription_id, request.status)?;

    Ok(Json(json!({ "prescription": prescription })))
}

// ========== 就诊卡 ==========

/// 创建或更新就诊卡处理器
pub async fn upsert_medical_card(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    Json(input): Json<MedicalCardInput>,
) -> ApiResult<impl IntoResponse> {
    {
        let registry = state.registry.read().await;
        registry.get(patient_id)?;
    }

    let mut cards = state.cards.write().await;
    let card = cards.upsert(patient_id, input)?;

    Ok(Json(json!({ "medical_card": card })))
}

/// 就诊卡详情处理器
pub async fn get_medical_card(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let cards = state.cards.read().await;
    let card = cards.get(patient_id)?.clone();

    Ok(Json(json!({ "medical_card": card })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ClinicError) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn test_error_status_mapping() {
        // 验证类错误映射到422
        assert_eq!(
            status_of(ClinicError::validation("email", "invalid email format")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(ClinicError::MissingRequiredField("student_id".to_string())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(ClinicError::duplicate("email", "a@university.edu")),
            StatusCode::UNPROCESSABLE_ENTITY
        );

        // 权限与状态类错误
        assert_eq!(
            status_of(ClinicError::ForbiddenFieldChange("doctor_id".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(ClinicError::InvalidStateTransition {
                from: "completed".to_string(),
                event: "cancel".to_string(),
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ClinicError::NotFound("user".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ClinicError::Database("connection lost".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
