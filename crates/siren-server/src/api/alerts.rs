use crate::api::pagination::PaginationParams;
use crate::api::{error_response, success_paginated_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use siren_common::types::{Alert, AlertStats, CreateAlertRequest};
use siren_engine::error::AlertError;
use siren_storage::AlertFilter;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

fn engine_error_response(trace_id: &str, err: AlertError) -> Response {
    match err {
        AlertError::NotFound { id } => error_response(
            StatusCode::NOT_FOUND,
            trace_id,
            "not_found",
            &format!("Alert '{id}' not found"),
        ),
        AlertError::InvalidTransition {
            status, operation, ..
        } => error_response(
            StatusCode::CONFLICT,
            trace_id,
            "invalid_transition",
            &format!("Cannot {operation} alert in status '{status}'"),
        ),
        AlertError::DuplicateConflict { .. } => error_response(
            StatusCode::CONFLICT,
            trace_id,
            "duplicate_write_conflict",
            "Concurrent submissions kept conflicting, retry the request",
        ),
        AlertError::Store(e) => {
            tracing::error!(error = %e, "Storage failure in alert operation");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// 提交告警创建信号（去重入口）。
///
/// 指纹相同且处于活跃状态的告警会被合并：`occurrence_count` 递增，
/// 描述与指标值被覆盖，不产生新记录。
#[utoipa::path(
    post,
    path = "/v1/alerts",
    tag = "Alerts",
    request_body = CreateAlertRequest,
    responses(
        (status = 201, description = "告警已创建或合并", body = Alert),
        (status = 409, description = "并发写入冲突", body = crate::api::ApiError)
    )
)]
async fn submit_alert(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(request): Json<CreateAlertRequest>,
) -> impl IntoResponse {
    match state.service.submit(request).await {
        Ok(alert) => success_response(StatusCode::CREATED, &trace_id, alert),
        Err(e) => engine_error_response(&trace_id, e),
    }
}

/// 告警列表查询参数
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct ListAlertsParams {
    /// 状态精确匹配（open / acknowledged / resolved / suppressed / expired）
    #[param(required = false, rename = "status__eq")]
    #[serde(rename = "status__eq")]
    status_eq: Option<String>,
    /// 告警级别精确匹配（low / medium / high / critical）
    #[param(required = false, rename = "severity__eq")]
    #[serde(rename = "severity__eq")]
    severity_eq: Option<String>,
    /// 分类精确匹配（system / application / network / security / performance / availability）
    #[param(required = false, rename = "category__eq")]
    #[serde(rename = "category__eq")]
    category_eq: Option<String>,
    /// 资源引用精确匹配
    #[param(required = false, rename = "resource_ref__eq")]
    #[serde(rename = "resource_ref__eq")]
    resource_ref_eq: Option<String>,
    /// 规则 ID 精确匹配
    #[param(required = false, rename = "rule_id__eq")]
    #[serde(rename = "rule_id__eq")]
    rule_id_eq: Option<String>,
    /// 仅返回活跃告警（open / acknowledged）
    #[param(required = false)]
    #[serde(default)]
    active: Option<bool>,
    /// 每页条数（默认 20）
    #[param(required = false)]
    #[serde(
        default,
        deserialize_with = "crate::api::pagination::deserialize_optional_u64"
    )]
    limit: Option<u64>,
    /// 偏移量（默认 0）
    #[param(required = false)]
    #[serde(
        default,
        deserialize_with = "crate::api::pagination::deserialize_optional_u64"
    )]
    offset: Option<u64>,
}

fn parse_filter(params: &ListAlertsParams) -> Result<AlertFilter, String> {
    let mut filter = AlertFilter {
        active_only: params.active.unwrap_or(false),
        resource_ref_eq: params.resource_ref_eq.clone(),
        rule_id_eq: params.rule_id_eq.clone(),
        ..Default::default()
    };
    if let Some(status) = &params.status_eq {
        filter.status_eq = Some(status.parse()?);
    }
    if let Some(severity) = &params.severity_eq {
        filter.severity_eq = Some(severity.parse()?);
    }
    if let Some(category) = &params.category_eq {
        filter.category_eq = Some(category.parse()?);
    }
    Ok(filter)
}

/// 分页查询告警列表（支持状态、级别、分类、资源、规则过滤）。
/// 默认排序：`created_at` 倒序；默认分页：`limit=20&offset=0`。
#[utoipa::path(
    get,
    path = "/v1/alerts",
    tag = "Alerts",
    params(ListAlertsParams),
    responses(
        (status = 200, description = "告警分页列表", body = Vec<Alert>),
        (status = 400, description = "过滤参数非法", body = crate::api::ApiError)
    )
)]
async fn list_alerts(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<ListAlertsParams>,
) -> impl IntoResponse {
    let filter = match parse_filter(&params) {
        Ok(filter) => filter,
        Err(msg) => {
            return error_response(StatusCode::BAD_REQUEST, &trace_id, "bad_request", &msg)
        }
    };
    let limit = PaginationParams::resolve_limit(params.limit);
    let offset = PaginationParams::resolve_offset(params.offset);

    let total = match state.service.count(&filter) {
        Ok(c) => c,
        Err(e) => return engine_error_response(&trace_id, e),
    };
    match state.service.list(&filter, limit, offset) {
        Ok(alerts) => {
            success_paginated_response(StatusCode::OK, &trace_id, alerts, total, limit, offset)
        }
        Err(e) => engine_error_response(&trace_id, e),
    }
}

/// 告警统计摘要（状态/级别计数、今日已解决数量）。
#[utoipa::path(
    get,
    path = "/v1/alerts/stats",
    tag = "Alerts",
    responses(
        (status = 200, description = "告警统计摘要", body = AlertStats)
    )
)]
async fn alert_stats(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.service.stats() {
        Ok(stats) => success_response(StatusCode::OK, &trace_id, stats),
        Err(e) => engine_error_response(&trace_id, e),
    }
}

/// 获取单条告警详情。
#[utoipa::path(
    get,
    path = "/v1/alerts/{id}",
    tag = "Alerts",
    params(("id" = String, Path, description = "告警 ID")),
    responses(
        (status = 200, description = "告警详情", body = Alert),
        (status = 404, description = "告警不存在", body = crate::api::ApiError)
    )
)]
async fn get_alert(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.service.get(&id) {
        Ok(alert) => success_response(StatusCode::OK, &trace_id, alert),
        Err(e) => engine_error_response(&trace_id, e),
    }
}

#[derive(Deserialize, ToSchema)]
struct AcknowledgeRequest {
    /// 操作人
    actor: String,
    /// 备注（写入 metadata）
    #[serde(default)]
    notes: Option<String>,
}

/// 确认告警。仅允许 OPEN 状态。
#[utoipa::path(
    post,
    path = "/v1/alerts/{id}/acknowledge",
    tag = "Alerts",
    params(("id" = String, Path, description = "告警 ID")),
    request_body = AcknowledgeRequest,
    responses(
        (status = 200, description = "告警已确认", body = Alert),
        (status = 404, description = "告警不存在", body = crate::api::ApiError),
        (status = 409, description = "非法状态迁移", body = crate::api::ApiError)
    )
)]
async fn acknowledge_alert(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AcknowledgeRequest>,
) -> impl IntoResponse {
    match state
        .service
        .acknowledge(&id, &req.actor, req.notes.as_deref())
    {
        Ok(alert) => success_response(StatusCode::OK, &trace_id, alert),
        Err(e) => engine_error_response(&trace_id, e),
    }
}

#[derive(Deserialize, ToSchema)]
struct ResolveRequest {
    /// 操作人
    actor: String,
    /// 解决说明
    #[serde(default)]
    notes: Option<String>,
}

/// 解决告警。允许 OPEN / ACKNOWLEDGED 状态；会清除升级截止时间。
#[utoipa::path(
    post,
    path = "/v1/alerts/{id}/resolve",
    tag = "Alerts",
    params(("id" = String, Path, description = "告警 ID")),
    request_body = ResolveRequest,
    responses(
        (status = 200, description = "告警已解决", body = Alert),
        (status = 404, description = "告警不存在", body = crate::api::ApiError),
        (status = 409, description = "非法状态迁移", body = crate::api::ApiError)
    )
)]
async fn resolve_alert(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ResolveRequest>,
) -> impl IntoResponse {
    match state.service.resolve(&id, &req.actor, req.notes.as_deref()) {
        Ok(alert) => success_response(StatusCode::OK, &trace_id, alert),
        Err(e) => engine_error_response(&trace_id, e),
    }
}

#[derive(Deserialize, ToSchema)]
struct BulkAcknowledgeRequest {
    /// 待确认告警 ID 列表
    ids: Vec<String>,
    /// 操作人
    actor: String,
    /// 备注（写入 metadata）
    #[serde(default)]
    notes: Option<String>,
}

/// 批量确认告警。
///
/// 非 OPEN 状态与不存在的 ID 会被跳过，不返回错误；已确认的项不会因
/// 后续项失败而回滚。
#[utoipa::path(
    post,
    path = "/v1/alerts/bulk-acknowledge",
    tag = "Alerts",
    request_body = BulkAcknowledgeRequest,
    responses(
        (status = 200, description = "已确认的告警列表", body = Vec<Alert>)
    )
)]
async fn bulk_acknowledge(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<BulkAcknowledgeRequest>,
) -> impl IntoResponse {
    let acknowledged = state
        .service
        .bulk_acknowledge(&req.ids, &req.actor, req.notes.as_deref());
    success_response(StatusCode::OK, &trace_id, acknowledged)
}

#[derive(Deserialize, ToSchema)]
struct SuppressRequest {
    /// 规则 ID
    rule_id: String,
    /// 抑制时长（分钟）
    duration_minutes: u32,
}

/// 按规则抑制告警。
///
/// 该规则下所有 OPEN 告警转为 SUPPRESSED，抑制窗口内新到达的同规则
/// 告警直接以 SUPPRESSED 状态入库。被抑制的告警不会自动恢复；窗口
/// 过期仅停止影响新告警。
#[utoipa::path(
    post,
    path = "/v1/alerts/suppress",
    tag = "Alerts",
    request_body = SuppressRequest,
    responses(
        (status = 200, description = "被抑制的告警列表", body = Vec<Alert>)
    )
)]
async fn suppress_alerts(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<SuppressRequest>,
) -> impl IntoResponse {
    match state.service.suppress(&req.rule_id, req.duration_minutes) {
        Ok(alerts) => success_response(StatusCode::OK, &trace_id, alerts),
        Err(e) => engine_error_response(&trace_id, e),
    }
}

/// 查询同一相关性分组下的所有告警。
#[utoipa::path(
    get,
    path = "/v1/alerts/correlated/{correlation_id}",
    tag = "Alerts",
    params(("correlation_id" = String, Path, description = "相关性分组 ID")),
    responses(
        (status = 200, description = "分组内告警列表", body = Vec<Alert>)
    )
)]
async fn correlated_alerts(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(correlation_id): Path<String>,
) -> impl IntoResponse {
    match state.service.correlated(&correlation_id) {
        Ok(alerts) => success_response(StatusCode::OK, &trace_id, alerts),
        Err(e) => engine_error_response(&trace_id, e),
    }
}

pub fn alert_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(submit_alert, list_alerts))
        .routes(routes!(alert_stats))
        .routes(routes!(get_alert))
        .routes(routes!(acknowledge_alert))
        .routes(routes!(resolve_alert))
        .routes(routes!(bulk_acknowledge))
        .routes(routes!(suppress_alerts))
        .routes(routes!(correlated_alerts))
}
