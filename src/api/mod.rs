use std::sync::Arc;

use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::error;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::WorkshopError;
use crate::identity::IdentitySource;
use crate::service::RatingService;

/// API请求处理结果
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

/// 评分提交请求体
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitRatingRequest {
    pub rating: Option<u8>,
    pub comment: Option<String>,
}

/// HTTP层共享状态
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<RatingService>,
    pub app: AppConfig,
}

/// 配置API路由
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/status", web::get().to(server_status))
        .route("/api/plugins", web::get().to(list_plugins))
        .route("/api/plugins/{plugin_id}", web::get().to(plugin_detail))
        .route(
            "/api/plugins/{plugin_id}/rating",
            web::post().to(submit_rating),
        );
}

/// 从请求中采集客户端来源信息
fn identity_source(req: &HttpRequest) -> IdentitySource {
    IdentitySource {
        peer_addr: req.peer_addr().map(|addr| addr.ip().to_string()),
        forwarded_for: req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string()),
        user_agent: req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string()),
    }
}

/// 将引擎错误映射为HTTP响应
fn error_response(err: &WorkshopError) -> HttpResponse {
    let body = ApiResponse::<()> {
        success: false,
        message: Some(err.to_string()),
        data: None,
    };

    match err {
        WorkshopError::InvalidInput(_) => HttpResponse::BadRequest().json(body),
        WorkshopError::NotFound(_) => HttpResponse::NotFound().json(body),
        WorkshopError::Storage(_) => {
            error!("Storage failure surfaced to API: {}", err);
            HttpResponse::InternalServerError().json(body)
        }
    }
}

/// 服务器状态检查
async fn server_status(state: web::Data<ApiState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse {
        success: true,
        message: None,
        data: Some(serde_json::json!({
            "status": "running",
            "name": state.app.name,
            "version": state.app.version,
            "timestamp": Utc::now().to_rfc3339(),
        })),
    })
}

/// 插件排行列表（带统计）
async fn list_plugins(state: web::Data<ApiState>) -> HttpResponse {
    let plugins = state.service.plugins_with_statistics().await;

    HttpResponse::Ok().json(ApiResponse {
        success: true,
        message: None,
        data: Some(plugins),
    })
}

/// 单个插件详情：统计加最近评分
async fn plugin_detail(state: web::Data<ApiState>, path: web::Path<String>) -> HttpResponse {
    let plugin_id = path.into_inner();

    match state.service.plugin_detail(&plugin_id, 10).await {
        Ok(detail) => HttpResponse::Ok().json(ApiResponse {
            success: true,
            message: None,
            data: Some(detail),
        }),
        Err(e) => error_response(&e),
    }
}

/// 提交评分
async fn submit_rating(
    state: web::Data<ApiState>,
    path: web::Path<String>,
    json: web::Json<SubmitRatingRequest>,
    req: HttpRequest,
) -> HttpResponse {
    let plugin_id = path.into_inner();
    let source = identity_source(&req);
    let body = json.into_inner();

    match state
        .service
        .submit_rating(&plugin_id, &source, body.rating, body.comment)
        .await
    {
        Ok(outcome) => {
            let message = if outcome.is_update {
                "Rating updated successfully"
            } else {
                "Rating submitted successfully"
            };
            HttpResponse::Ok().json(ApiResponse {
                success: true,
                message: Some(message.to_string()),
                data: Some(outcome),
            })
        }
        Err(e) => error_response(&e),
    }
}
