use crate::api::{error_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use siren_common::types::{AlertCategory, Severity};
use siren_storage::RuleRow;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// 告警规则信息
#[derive(Serialize, ToSchema)]
struct RuleResponse {
    /// 规则唯一标识
    id: String,
    /// 规则名称
    name: String,
    /// 分类
    category: AlertCategory,
    /// 告警级别
    severity: Severity,
    /// 是否启用
    enabled: bool,
    /// 抑制窗口截止时间（无活跃窗口时为空）
    suppressed_until: Option<DateTime<Utc>>,
    /// 创建时间
    created_at: DateTime<Utc>,
    /// 更新时间
    updated_at: DateTime<Utc>,
}

impl From<RuleRow> for RuleResponse {
    fn from(r: RuleRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            category: r.category,
            severity: r.severity,
            enabled: r.enabled,
            suppressed_until: r.suppressed_until,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// 规则列表查询参数
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct ListRulesParams {
    /// 仅返回启用的规则
    #[param(required = false)]
    #[serde(default)]
    enabled_only: Option<bool>,
}

/// 查询告警规则列表。
#[utoipa::path(
    get,
    path = "/v1/rules",
    tag = "Rules",
    params(ListRulesParams),
    responses(
        (status = 200, description = "规则列表", body = Vec<RuleResponse>)
    )
)]
async fn list_rules(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<ListRulesParams>,
) -> impl IntoResponse {
    match state.store.list_rules(params.enabled_only.unwrap_or(false)) {
        Ok(rules) => {
            let items: Vec<RuleResponse> = rules.into_iter().map(RuleResponse::from).collect();
            success_response(StatusCode::OK, &trace_id, items)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list rules");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

#[derive(Deserialize, ToSchema)]
struct CreateRuleRequest {
    /// 规则名称（全局唯一）
    name: String,
    /// 分类
    category: AlertCategory,
    /// 告警级别
    severity: Severity,
    /// 是否启用（默认 true）
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// 创建告警规则。
#[utoipa::path(
    post,
    path = "/v1/rules",
    tag = "Rules",
    request_body = CreateRuleRequest,
    responses(
        (status = 201, description = "规则已创建", body = RuleResponse),
        (status = 409, description = "规则名称已存在", body = crate::api::ApiError)
    )
)]
async fn create_rule(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<CreateRuleRequest>,
) -> impl IntoResponse {
    let now = Utc::now();
    let rule = RuleRow {
        id: siren_common::id::next_id(),
        name: req.name,
        category: req.category,
        severity: req.severity,
        enabled: req.enabled,
        suppressed_until: None,
        created_at: now,
        updated_at: now,
    };
    match state.store.insert_rule(&rule) {
        Ok(rule) => {
            if let Err(e) = state.rules.refresh() {
                tracing::error!(error = %e, "Failed to refresh rule cache after creation");
            }
            success_response(StatusCode::CREATED, &trace_id, RuleResponse::from(rule))
        }
        Err(e) => {
            let msg = e.to_string();
            if msg.contains("UNIQUE constraint") {
                error_response(
                    StatusCode::CONFLICT,
                    &trace_id,
                    "conflict",
                    "Rule name already exists",
                )
            } else {
                tracing::error!(error = %e, "Failed to create rule");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &trace_id,
                    "storage_error",
                    "Database error",
                )
            }
        }
    }
}

pub fn rule_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(list_rules, create_rule))
}
