use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use base64::prelude::*;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::error::TicketError;
use crate::http::HttpState;
use crate::service::FolderOutcome;

pub fn router() -> Router<HttpState> {
    Router::new()
        .route("/health", get(health))
        .route("/openapi.json", get(openapi_json))
        .route("/folders", post(folders_create).get(folders_list))
        .route("/websocket", post(websocket_ticket))
}

#[derive(OpenApi)]
#[openapi(
    info(title = "rvlab", description = "RV32I build and relay API"),
    paths(health, folders_create, folders_list, websocket_ticket),
    components(schemas(
        ErrorBody,
        HealthBody,
        CreateFolderRequest,
        CreateFolderResponse,
        FolderEntry,
        ListFoldersResponse,
        TicketRequest,
        TicketResponse
    ))
)]
struct ApiDoc;

pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(Debug)]
enum ApiError {
    Invalid(String),
    NotFound(String),
    Internal { message: String, error: String },
}

impl ApiError {
    fn internal(message: &str, error: impl ToString) -> Self {
        ApiError::Internal {
            message: message.into(),
            error: error.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Invalid(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<TicketError> for ApiError {
    fn from(err: TicketError) -> Self {
        match err {
            TicketError::MissingName | TicketError::InvalidName(_) => {
                ApiError::Invalid(err.to_string())
            }
            TicketError::NotFound(_) | TicketError::NoArtifact(_) => {
                ApiError::NotFound(err.to_string())
            }
            TicketError::Read(source) => ApiError::internal("Failed to read ELF file", source),
            other => ApiError::internal("Failed to process WebSocket request", other),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, error) = match self {
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, message, None),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message, None),
            ApiError::Internal { message, error } => {
                (StatusCode::INTERNAL_SERVER_ERROR, message, Some(error))
            }
        };
        let body = ErrorBody {
            success: false,
            message,
            error,
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize, ToSchema)]
struct HealthBody {
    ok: bool,
    version: String,
}

#[utoipa::path(get, path = "/api/health", responses((status = 200, body = HealthBody)))]
async fn health() -> Json<HealthBody> {
    Json(HealthBody {
        ok: true,
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi())
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct CreateFolderRequest {
    #[serde(default)]
    program_code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct CreateFolderResponse {
    success: bool,
    message: String,
    folder_name: String,
    total_folders: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    evicted_folder: Option<String>,
    files_copied: bool,
    files_copy_message: String,
    copied_files: Vec<String>,
    program_file: bool,
    program_file_message: String,
    make_command: bool,
    make_command_message: String,
    make_output: String,
}

impl From<FolderOutcome> for CreateFolderResponse {
    fn from(outcome: FolderOutcome) -> Self {
        let make_output = outcome.build.output().to_string();
        Self {
            success: true,
            message: "Folder created successfully".into(),
            folder_name: outcome.workspace.name().to_string(),
            total_folders: outcome.live,
            evicted_folder: outcome.evicted.map(|w| w.name().to_string()),
            files_copied: outcome.copy.success,
            files_copy_message: outcome.copy.message,
            copied_files: outcome.copy.copied,
            program_file: outcome.source.success,
            program_file_message: outcome.source.message,
            make_command: outcome.build.success,
            make_command_message: outcome.build.message,
            make_output,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/folders",
    request_body = CreateFolderRequest,
    responses(
        (status = 200, description = "Folder admitted and built", body = CreateFolderResponse),
        (status = 400, body = ErrorBody),
        (status = 500, body = ErrorBody)
    )
)]
async fn folders_create(
    State(state): State<HttpState>,
    body: Result<Json<CreateFolderRequest>, JsonRejection>,
) -> Result<Json<CreateFolderResponse>, ApiError> {
    let Json(request) = body?;
    let outcome = state
        .folders
        .create_folder(request.program_code)
        .await
        .map_err(|err| {
            tracing::error!("error creating folder: {err}");
            ApiError::internal("Failed to create folder", err)
        })?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct FolderEntry {
    name: String,
    /// ISO-8601, millisecond precision, UTC.
    created_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct ListFoldersResponse {
    success: bool,
    folders: Vec<FolderEntry>,
    total_folders: usize,
}

#[utoipa::path(
    get,
    path = "/api/folders",
    responses(
        (status = 200, description = "Live folders, newest first", body = ListFoldersResponse),
        (status = 500, body = ErrorBody)
    )
)]
async fn folders_list(
    State(state): State<HttpState>,
) -> Result<Json<ListFoldersResponse>, ApiError> {
    let folders = state.folders.list_folders().await.map_err(|err| {
        tracing::error!("error listing folders: {err}");
        ApiError::internal("Failed to list folders", err)
    })?;
    let folders: Vec<FolderEntry> = folders
        .iter()
        .map(|w| FolderEntry {
            name: w.name().to_string(),
            created_at: w.created_at().to_rfc3339_opts(SecondsFormat::Millis, true),
        })
        .collect();
    Ok(Json(ListFoldersResponse {
        success: true,
        total_folders: folders.len(),
        folders,
    }))
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct TicketRequest {
    #[serde(default)]
    folder_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct TicketResponse {
    success: bool,
    message: String,
    elf_file_name: String,
    folder_name: String,
    ws_url: String,
    /// Standard base64 of the artifact bytes.
    elf_data: String,
}

#[utoipa::path(
    post,
    path = "/api/websocket",
    request_body = TicketRequest,
    responses(
        (status = 200, description = "Artifact ready for relay", body = TicketResponse),
        (status = 400, description = "Missing or invalid folder name", body = ErrorBody),
        (status = 404, description = "Folder or artifact absent", body = ErrorBody),
        (status = 500, description = "Artifact unreadable", body = ErrorBody)
    )
)]
async fn websocket_ticket(
    State(state): State<HttpState>,
    body: Result<Json<TicketRequest>, JsonRejection>,
) -> Result<Json<TicketResponse>, ApiError> {
    let Json(request) = body?;
    let ticket = state
        .folders
        .relay_ticket(request.folder_name.as_deref())
        .await
        .inspect_err(|err| tracing::debug!("relay ticket refused: {err}"))?;
    Ok(Json(TicketResponse {
        success: true,
        message: "ELF file found and ready for WebSocket transmission".into(),
        elf_file_name: ticket.artifact.file_name.clone(),
        folder_name: ticket.workspace,
        ws_url: ticket.url,
        elf_data: BASE64_STANDARD.encode(&ticket.artifact.bytes),
    }))
}
