use async_trait::async_trait;
use chrono::Utc;

use super::{DbResult, SqliteRepository};
use crate::models::{CreateEmployeeRequest, Employee, UpdateEmployeeRequest};

const EMPLOYEE_COLUMNS: &str = "id, employee_code, first_name, last_name, email, department, \
     designation, date_of_joining, is_active, created_at, updated_at";

#[async_trait]
pub trait EmployeeRepository: Send + Sync {
    async fn list_employees(&self, include_inactive: bool) -> DbResult<Vec<Employee>>;
    async fn get_employee(&self, id: i64) -> DbResult<Option<Employee>>;
    async fn create_employee(&self, req: &CreateEmployeeRequest) -> DbResult<Employee>;
    async fn update_employee(
        &self,
        id: i64,
        req: &UpdateEmployeeRequest,
    ) -> DbResult<Option<Employee>>;
    // Soft delete.
    async fn deactivate_employee(&self, id: i64) -> DbResult<bool>;
}

#[async_trait]
impl EmployeeRepository for SqliteRepository {
    async fn list_employees(&self, include_inactive: bool) -> DbResult<Vec<Employee>> {
        let filter = if include_inactive { "" } else { "WHERE is_active = 1" };
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees {filter} ORDER BY employee_code");
        sqlx::query_as::<_, Employee>(&sql)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_employee(&self, id: i64) -> DbResult<Option<Employee>> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");
        sqlx::query_as::<_, Employee>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create_employee(&self, req: &CreateEmployeeRequest) -> DbResult<Employee> {
        let now = Utc::now();
        let sql = format!(
            r#"
            INSERT INTO employees
                (employee_code, first_name, last_name, email, department, designation,
                 date_of_joining, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            RETURNING {EMPLOYEE_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Employee>(&sql)
            .bind(req.employee_code.trim())
            .bind(req.first_name.trim())
            .bind(req.last_name.trim())
            .bind(req.email.trim())
            .bind(&req.department)
            .bind(&req.designation)
            .bind(req.date_of_joining)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
    }

    async fn update_employee(
        &self,
        id: i64,
        req: &UpdateEmployeeRequest,
    ) -> DbResult<Option<Employee>> {
        let sql = format!(
            r#"
            UPDATE employees
            SET first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                email = COALESCE(?, email),
                department = COALESCE(?, department),
                designation = COALESCE(?, designation),
                date_of_joining = COALESCE(?, date_of_joining),
                is_active = COALESCE(?, is_active),
                updated_at = ?
            WHERE id = ?
            RETURNING {EMPLOYEE_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Employee>(&sql)
            .bind(&req.first_name)
            .bind(&req.last_name)
            .bind(&req.email)
            .bind(&req.department)
            .bind(&req.designation)
            .bind(req.date_of_joining)
            .bind(req.is_active)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn deactivate_employee(&self, id: i64) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE employees SET is_active = 0, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
