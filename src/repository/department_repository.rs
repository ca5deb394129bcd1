use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::{
    domain::{Department, MembershipKind, MembershipPlan},
    error::{AppError, Result},
    repository::{is_unique_violation, parse_uuid, parse_uuid_list, to_utc, DepartmentRepository},
};

#[derive(FromRow)]
struct DepartmentRow {
    id: String,
    name: String,
    manager_ids: Option<String>,
    member_ids: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const DEPARTMENT_SELECT: &str = r#"
    SELECT d.id, d.name, d.created_at, d.updated_at,
        (SELECT GROUP_CONCAT(user_id) FROM department_managers WHERE department_id = d.id) AS manager_ids,
        (SELECT GROUP_CONCAT(user_id) FROM department_members WHERE department_id = d.id) AS member_ids
    FROM departments d
"#;

pub struct SqliteDepartmentRepository {
    pool: SqlitePool,
}

impl SqliteDepartmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_department(row: DepartmentRow) -> Result<Department> {
        Ok(Department {
            id: parse_uuid(&row.id)?,
            name: row.name,
            manager_ids: parse_uuid_list(row.manager_ids.as_deref())?,
            member_ids: parse_uuid_list(row.member_ids.as_deref())?,
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    fn name_conflict(e: sqlx::Error) -> AppError {
        if is_unique_violation(&e) {
            AppError::Conflict("A department with this name already exists.".to_string())
        } else {
            AppError::Database(e.to_string())
        }
    }

    async fn apply_members(
        tx: &mut Transaction<'_, Sqlite>,
        plan: &MembershipPlan,
    ) -> Result<()> {
        let department_id = plan.department_id.to_string();

        for user_id in &plan.to_remove {
            sqlx::query("DELETE FROM department_members WHERE department_id = ? AND user_id = ?")
                .bind(&department_id)
                .bind(user_id.to_string())
                .execute(&mut **tx)
                .await?;

            sqlx::query("UPDATE users SET department_id = NULL, updated_at = ? WHERE id = ? AND department_id = ?")
                .bind(Utc::now().naive_utc())
                .bind(user_id.to_string())
                .bind(&department_id)
                .execute(&mut **tx)
                .await?;
        }

        for user_id in &plan.to_add {
            // A user belongs to one department; moving drops the old membership.
            sqlx::query("DELETE FROM department_members WHERE user_id = ?")
                .bind(user_id.to_string())
                .execute(&mut **tx)
                .await?;

            sqlx::query("INSERT INTO department_members (department_id, user_id) VALUES (?, ?)")
                .bind(&department_id)
                .bind(user_id.to_string())
                .execute(&mut **tx)
                .await?;

            let result = sqlx::query("UPDATE users SET department_id = ?, updated_at = ? WHERE id = ?")
                .bind(&department_id)
                .bind(Utc::now().naive_utc())
                .bind(user_id.to_string())
                .execute(&mut **tx)
                .await?;

            if result.rows_affected() == 0 {
                return Err(AppError::NotFound(format!("User {} not found", user_id)));
            }
        }

        Ok(())
    }

    async fn apply_managers(
        tx: &mut Transaction<'_, Sqlite>,
        plan: &MembershipPlan,
    ) -> Result<()> {
        let department_id = plan.department_id.to_string();

        for user_id in &plan.to_remove {
            sqlx::query("DELETE FROM department_managers WHERE department_id = ? AND user_id = ?")
                .bind(&department_id)
                .bind(user_id.to_string())
                .execute(&mut **tx)
                .await?;
        }

        for user_id in &plan.to_add {
            sqlx::query(
                "INSERT INTO department_managers (department_id, user_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
            )
            .bind(&department_id)
            .bind(user_id.to_string())
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Department> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Department not found".to_string()))
    }
}

#[async_trait]
impl DepartmentRepository for SqliteDepartmentRepository {
    async fn create(&self, name: &str) -> Result<Department> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query("INSERT INTO departments (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind(id.to_string())
            .bind(name)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(Self::name_conflict)?;

        self.fetch(id).await
    }

    async fn rename(&self, id: Uuid, name: &str) -> Result<Department> {
        let result = sqlx::query("UPDATE departments SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(Self::name_conflict)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Department not found".to_string()));
        }

        self.fetch(id).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Department>> {
        let sql = format!("{} WHERE d.id = ?", DEPARTMENT_SELECT);
        let row = sqlx::query_as::<_, DepartmentRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_department).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Department>> {
        let sql = format!("{} WHERE d.name = ?", DEPARTMENT_SELECT);
        let row = sqlx::query_as::<_, DepartmentRow>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_department).transpose()
    }

    async fn list(&self) -> Result<Vec<Department>> {
        let sql = format!("{} ORDER BY d.name ASC", DEPARTMENT_SELECT);
        let rows = sqlx::query_as::<_, DepartmentRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_department).collect()
    }

    async fn list_managed_by(&self, user_id: Uuid) -> Result<Vec<Department>> {
        let sql = format!(
            "{} WHERE d.id IN (SELECT department_id FROM department_managers WHERE user_id = ?) ORDER BY d.name ASC",
            DEPARTMENT_SELECT
        );
        let rows = sqlx::query_as::<_, DepartmentRow>(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_department).collect()
    }

    async fn managed_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT department_id FROM department_managers WHERE user_id = ?",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        ids.iter().map(|id| parse_uuid(id)).collect()
    }

    async fn affiliated_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT department_id FROM department_members WHERE user_id = ?1
            UNION
            SELECT department_id FROM department_managers WHERE user_id = ?1
            UNION
            SELECT department_id FROM users WHERE id = ?1 AND department_id IS NOT NULL
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        ids.iter().map(|id| parse_uuid(id)).collect()
    }

    async fn apply_plan(&self, plan: &MembershipPlan) -> Result<Department> {
        if plan.is_empty() {
            return self.fetch(plan.department_id).await;
        }

        let mut tx = self.pool.begin().await?;

        match plan.kind {
            MembershipKind::Members => Self::apply_members(&mut tx, plan).await?,
            MembershipKind::Managers => Self::apply_managers(&mut tx, plan).await?,
        }

        sqlx::query("UPDATE departments SET updated_at = ? WHERE id = ?")
            .bind(Utc::now().naive_utc())
            .bind(plan.department_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.fetch(plan.department_id).await
    }
}
