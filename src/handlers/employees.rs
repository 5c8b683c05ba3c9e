use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Response,
};

use super::{CsvUpload, csv_attachment, read_upload, record_activity, users::ListQuery};
use crate::{
    AppState,
    auth::AuthUser,
    csv_import::{self, EMPLOYEE_HEADER},
    error::{AppError, AppResult, is_unique_violation},
    extract::ValidatedJson,
    models::{
        BulkUploadSummary, CreateEmployeeRequest, Employee, NewActivity, RowFailure,
        UpdateEmployeeRequest,
    },
    repository::EmployeeRepository,
};

const DUPLICATE_EMPLOYEE: &str = "employee_code or email already exists";

fn employee_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Employee {id}"))
}

fn map_unique(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict(DUPLICATE_EMPLOYEE.to_string())
    } else {
        err.into()
    }
}

#[utoipa::path(
    get,
    path = "/api/user_management/employees",
    params(ListQuery),
    responses((status = 200, description = "Employees", body = [Employee]))
)]
pub async fn list_employees(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Employee>>> {
    user.require("employees:read")?;
    Ok(Json(state.repo.list_employees(query.include_inactive).await?))
}

#[utoipa::path(
    get,
    path = "/api/user_management/employees/{id}",
    params(("id" = i64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee", body = Employee),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_employee(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Employee>> {
    user.require("employees:read")?;
    state
        .repo
        .get_employee(id)
        .await?
        .map(Json)
        .ok_or_else(|| employee_not_found(id))
}

#[utoipa::path(
    post,
    path = "/api/user_management/employees",
    request_body = CreateEmployeeRequest,
    responses(
        (status = 201, description = "Created", body = Employee),
        (status = 409, description = "Duplicate employee code or email")
    )
)]
pub async fn create_employee(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateEmployeeRequest>,
) -> AppResult<(StatusCode, Json<Employee>)> {
    user.require("employees:write")?;
    let employee = state
        .repo
        .create_employee(&payload)
        .await
        .map_err(map_unique)?;

    record_activity(
        &state.repo,
        NewActivity::new(user.id, "create", "employee", Some(employee.id))
            .details(format!("employee_code={}", employee.employee_code)),
    )
    .await;
    Ok((StatusCode::CREATED, Json(employee)))
}

#[utoipa::path(
    put,
    path = "/api/user_management/employees/{id}",
    params(("id" = i64, Path, description = "Employee ID")),
    request_body = UpdateEmployeeRequest,
    responses(
        (status = 200, description = "Updated", body = Employee),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_employee(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<UpdateEmployeeRequest>,
) -> AppResult<Json<Employee>> {
    user.require("employees:write")?;
    let employee = state
        .repo
        .update_employee(id, &payload)
        .await
        .map_err(map_unique)?
        .ok_or_else(|| employee_not_found(id))?;

    record_activity(
        &state.repo,
        NewActivity::new(user.id, "update", "employee", Some(id)),
    )
    .await;
    Ok(Json(employee))
}

#[utoipa::path(
    delete,
    path = "/api/user_management/employees/{id}",
    params(("id" = i64, Path, description = "Employee ID")),
    responses(
        (status = 204, description = "Deactivated"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_employee(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    user.require("employees:delete")?;
    if !state.repo.deactivate_employee(id).await? {
        return Err(employee_not_found(id));
    }
    record_activity(
        &state.repo,
        NewActivity::new(user.id, "delete", "employee", Some(id)),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

/// employee_template
///
/// [employees:read] The CSV header the bulk upload expects.
#[utoipa::path(
    get,
    path = "/api/user_management/employees/template",
    responses((status = 200, description = "CSV template", content_type = "text/csv", body = String))
)]
pub async fn employee_template(user: AuthUser) -> AppResult<Response> {
    user.require("employees:read")?;
    Ok(csv_attachment(
        "employees_template.csv",
        csv_import::template(&EMPLOYEE_HEADER),
    ))
}

/// bulk_upload_employees
///
/// [employees:write] Imports a CSV built from the template (multipart field `file`).
/// Rows are inserted one by one; invalid or duplicate rows are reported with their
/// line number and the rest still go in.
#[utoipa::path(
    post,
    path = "/api/user_management/employees/bulk_upload",
    request_body(content = CsvUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Import summary", body = BulkUploadSummary),
        (status = 400, description = "Missing file or wrong header")
    )
)]
pub async fn bulk_upload_employees(
    user: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<BulkUploadSummary>> {
    user.require("employees:write")?;
    let data = read_upload(multipart).await?;
    let rows = csv_import::parse_csv(&data, &EMPLOYEE_HEADER)?;

    let mut summary = BulkUploadSummary {
        total: rows.len(),
        ..Default::default()
    };

    for row in &rows {
        let req = match csv_import::employee_from_row(row) {
            Ok(req) => req,
            Err(error) => {
                summary.failed.push(RowFailure { line: row.line, error });
                continue;
            }
        };
        match state.repo.create_employee(&req).await {
            Ok(_) => summary.inserted += 1,
            Err(e) if is_unique_violation(&e) => summary.failed.push(RowFailure {
                line: row.line,
                error: DUPLICATE_EMPLOYEE.to_string(),
            }),
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(
        total = summary.total,
        inserted = summary.inserted,
        failed = summary.failed.len(),
        "Employee bulk upload finished"
    );
    record_activity(
        &state.repo,
        NewActivity::new(user.id, "bulk_upload", "employee", None).details(format!(
            "total={} inserted={} failed={}",
            summary.total,
            summary.inserted,
            summary.failed.len()
        )),
    )
    .await;
    Ok(Json(summary))
}
