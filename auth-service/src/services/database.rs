//! PostgreSQL store for branches, allow-lists and the role/permission graph.
//!
//! Uniqueness and referential guards live in the schema (see `migrations/`);
//! constraint violations are translated into the service error taxonomy.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use super::store::{BranchRepository, RoleRepository};
use super::ServiceError;
use crate::models::{AllowedEmailEntry, Branch, Permission, Role};

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct RoleRow {
    role_id: Uuid,
    name: String,
    description: Option<String>,
    created_utc: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct RolePermissionRow {
    role_id: Uuid,
    code: String,
    description: String,
}

/// Translate constraint violations; everything else stays a database fault.
fn map_constraint_error(
    err: sqlx::Error,
    on_violation: impl FnOnce(Option<&str>, bool) -> ServiceError,
) -> ServiceError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return on_violation(db_err.constraint(), true);
        }
        if db_err.is_foreign_key_violation() {
            return on_violation(db_err.constraint(), false);
        }
    }
    ServiceError::Database(err)
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn attach_permissions(&self, rows: Vec<RoleRow>) -> Result<Vec<Role>, ServiceError> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.role_id).collect();
        let grants = sqlx::query_as::<_, RolePermissionRow>(
            r#"
            SELECT rp.role_id, p.code, p.description
            FROM role_permissions rp
            JOIN permissions p ON p.code = rp.permission_code
            WHERE rp.role_id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_role: HashMap<Uuid, BTreeSet<Permission>> = HashMap::new();
        for grant in grants {
            by_role
                .entry(grant.role_id)
                .or_default()
                .insert(Permission::new(grant.code, grant.description));
        }

        Ok(rows
            .into_iter()
            .map(|row| Role {
                permissions: by_role.remove(&row.role_id).unwrap_or_default(),
                role_id: row.role_id,
                name: row.name,
                description: row.description,
                created_utc: row.created_utc,
            })
            .collect())
    }

    async fn find_role_where(
        &self,
        clause: &str,
        bind: RoleKey<'_>,
    ) -> Result<Option<Role>, ServiceError> {
        let sql = format!(
            "SELECT role_id, name, description, created_utc FROM roles WHERE {} ",
            clause
        );
        let query = sqlx::query_as::<_, RoleRow>(&sql);
        let row = match bind {
            RoleKey::Id(id) => query.bind(id).fetch_optional(&self.pool).await?,
            RoleKey::Name(name) => query.bind(name).fetch_optional(&self.pool).await?,
        };
        match row {
            Some(row) => Ok(self.attach_permissions(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

enum RoleKey<'a> {
    Id(Uuid),
    Name(&'a str),
}

#[async_trait]
impl BranchRepository for Database {
    async fn list_active_branches(&self) -> Result<Vec<Branch>, ServiceError> {
        Ok(sqlx::query_as::<_, Branch>(
            "SELECT * FROM branches WHERE active = TRUE ORDER BY created_utc, branch_id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_branch_by_id(&self, branch_id: Uuid) -> Result<Option<Branch>, ServiceError> {
        Ok(
            sqlx::query_as::<_, Branch>("SELECT * FROM branches WHERE branch_id = $1")
                .bind(branch_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_branch_by_code(&self, code: &str) -> Result<Option<Branch>, ServiceError> {
        Ok(
            sqlx::query_as::<_, Branch>("SELECT * FROM branches WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_branch_by_name(&self, name: &str) -> Result<Option<Branch>, ServiceError> {
        Ok(
            sqlx::query_as::<_, Branch>("SELECT * FROM branches WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn insert_branch(&self, branch: &Branch) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO branches (branch_id, name, code, address, active, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(branch.branch_id)
        .bind(&branch.name)
        .bind(&branch.code)
        .bind(&branch.address)
        .bind(branch.active)
        .bind(branch.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_constraint_error(e, |constraint, _| match constraint {
                Some("uq_branches_name") => {
                    ServiceError::conflict(format!("Branch name already exists: {}", branch.name))
                }
                _ => ServiceError::conflict(format!("Branch code already exists: {}", branch.code)),
            })
        })?;
        Ok(())
    }

    async fn update_branch(&self, branch: &Branch) -> Result<(), ServiceError> {
        let result = sqlx::query(
            "UPDATE branches SET name = $1, address = $2, active = $3 WHERE branch_id = $4",
        )
        .bind(&branch.name)
        .bind(&branch.address)
        .bind(branch.active)
        .bind(branch.branch_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_constraint_error(e, |_, _| {
                ServiceError::conflict(format!("Branch name already exists: {}", branch.name))
            })
        })?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found(format!(
                "Branch not found with id: {}",
                branch.branch_id
            )));
        }
        Ok(())
    }

    async fn find_allowed_email(
        &self,
        branch_id: Uuid,
        email: &str,
    ) -> Result<Option<AllowedEmailEntry>, ServiceError> {
        Ok(sqlx::query_as::<_, AllowedEmailEntry>(
            "SELECT * FROM branch_allowed_emails WHERE branch_id = $1 AND email = $2",
        )
        .bind(branch_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_allowed_email(&self, entry: &AllowedEmailEntry) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO branch_allowed_emails (entry_id, branch_id, email, description, active, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.entry_id)
        .bind(entry.branch_id)
        .bind(&entry.email)
        .bind(&entry.description)
        .bind(entry.active)
        .bind(entry.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_constraint_error(e, |_, unique| {
                if unique {
                    ServiceError::conflict(format!(
                        "Email already exists for this branch: {}",
                        entry.email
                    ))
                } else {
                    ServiceError::not_found(format!(
                        "Branch not found with id: {}",
                        entry.branch_id
                    ))
                }
            })
        })?;
        Ok(())
    }

    async fn set_allowed_email_active(
        &self,
        entry_id: Uuid,
        active: bool,
    ) -> Result<(), ServiceError> {
        let result =
            sqlx::query("UPDATE branch_allowed_emails SET active = $1 WHERE entry_id = $2")
                .bind(active)
                .bind(entry_id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("Allowed email not found"));
        }
        Ok(())
    }

    async fn list_allowed_emails(
        &self,
        branch_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<AllowedEmailEntry>, ServiceError> {
        Ok(sqlx::query_as::<_, AllowedEmailEntry>(
            r#"
            SELECT * FROM branch_allowed_emails
            WHERE branch_id = $1 AND (active = TRUE OR $2 = FALSE)
            ORDER BY created_utc, entry_id
            "#,
        )
        .bind(branch_id)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_branches_allowing_email(&self, email: &str) -> Result<Vec<Branch>, ServiceError> {
        Ok(sqlx::query_as::<_, Branch>(
            r#"
            SELECT b.* FROM branches b
            JOIN branch_allowed_emails e ON e.branch_id = b.branch_id
            WHERE e.email = $1 AND e.active = TRUE AND b.active = TRUE
            ORDER BY b.created_utc, b.branch_id
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl RoleRepository for Database {
    async fn list_roles(&self) -> Result<Vec<Role>, ServiceError> {
        let rows = sqlx::query_as::<_, RoleRow>(
            "SELECT role_id, name, description, created_utc FROM roles ORDER BY created_utc, name",
        )
        .fetch_all(&self.pool)
        .await?;
        self.attach_permissions(rows).await
    }

    async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, ServiceError> {
        self.find_role_where("role_id = $1", RoleKey::Id(role_id))
            .await
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, ServiceError> {
        self.find_role_where("name = $1", RoleKey::Name(name)).await
    }

    async fn insert_role(&self, role: &Role) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO roles (role_id, name, description, created_utc) VALUES ($1, $2, $3, $4)",
        )
        .bind(role.role_id)
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.created_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_constraint_error(e, |_, _| ServiceError::conflict("Role name already exists")))?;

        for permission in &role.permissions {
            sqlx::query("INSERT INTO role_permissions (role_id, permission_code) VALUES ($1, $2)")
                .bind(role.role_id)
                .bind(&permission.code)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    map_constraint_error(e, |_, _| {
                        ServiceError::bad_request(format!(
                            "Unknown permission code: {}",
                            permission.code
                        ))
                    })
                })?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_role(&self, role: &Role) -> Result<(), ServiceError> {
        let result = sqlx::query("UPDATE roles SET name = $1, description = $2 WHERE role_id = $3")
            .bind(&role.name)
            .bind(&role.description)
            .bind(role.role_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                map_constraint_error(e, |_, _| ServiceError::conflict("Role name already exists"))
            })?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found(format!(
                "Role with id {} not found",
                role.role_id
            )));
        }
        Ok(())
    }

    async fn delete_role(&self, role_id: Uuid) -> Result<(), ServiceError> {
        sqlx::query("DELETE FROM roles WHERE role_id = $1")
            .bind(role_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                map_constraint_error(e, |_, _| {
                    ServiceError::conflict("Role is assigned to users. Cannot delete.")
                })
            })?;
        Ok(())
    }

    async fn replace_role_permissions(
        &self,
        role_id: Uuid,
        codes: &BTreeSet<String>,
    ) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<(Uuid,)> =
            sqlx::query_as("SELECT role_id FROM roles WHERE role_id = $1 FOR UPDATE")
                .bind(role_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(ServiceError::not_found(format!(
                "Role with id {} not found",
                role_id
            )));
        }

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        let codes: Vec<String> = codes.iter().cloned().collect();
        let inserted = sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_code)
            SELECT $1, code FROM permissions WHERE code = ANY($2)
            "#,
        )
        .bind(role_id)
        .bind(&codes)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        // Dropping the transaction rolls back the delete above.
        if inserted != codes.len() as u64 {
            return Err(ServiceError::bad_request(
                "One or more permission codes are unknown",
            ));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, ServiceError> {
        Ok(
            sqlx::query_as::<_, Permission>("SELECT code, description FROM permissions ORDER BY code")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn find_permissions_by_codes(
        &self,
        codes: &BTreeSet<String>,
    ) -> Result<Vec<Permission>, ServiceError> {
        let codes: Vec<String> = codes.iter().cloned().collect();
        Ok(sqlx::query_as::<_, Permission>(
            "SELECT code, description FROM permissions WHERE code = ANY($1) ORDER BY code",
        )
        .bind(&codes)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_permission(&self, permission: &Permission) -> Result<(), ServiceError> {
        sqlx::query("INSERT INTO permissions (code, description) VALUES ($1, $2)")
            .bind(&permission.code)
            .bind(&permission.description)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                map_constraint_error(e, |_, _| {
                    ServiceError::conflict(format!(
                        "Permission code already exists: {}",
                        permission.code
                    ))
                })
            })?;
        Ok(())
    }

    async fn count_principals_with_role(&self, role_id: Uuid) -> Result<u64, ServiceError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM principal_roles WHERE role_id = $1")
                .bind(role_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.max(0) as u64)
    }

    async fn roles_for_principal(&self, subject: &str) -> Result<Vec<Role>, ServiceError> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT r.role_id, r.name, r.description, r.created_utc
            FROM roles r
            JOIN principal_roles pr ON pr.role_id = r.role_id
            WHERE pr.subject = $1
            ORDER BY r.created_utc, r.name
            "#,
        )
        .bind(subject)
        .fetch_all(&self.pool)
        .await?;
        self.attach_permissions(rows).await
    }

    async fn assign_role(&self, subject: &str, role_id: Uuid) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO principal_roles (subject, role_id) VALUES ($1, $2)
            ON CONFLICT (subject, role_id) DO NOTHING
            "#,
        )
        .bind(subject)
        .bind(role_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_constraint_error(e, |_, _| {
                ServiceError::not_found(format!("Role with id {} not found", role_id))
            })
        })?;
        Ok(())
    }

    async fn revoke_role(&self, subject: &str, role_id: Uuid) -> Result<bool, ServiceError> {
        let result = sqlx::query("DELETE FROM principal_roles WHERE subject = $1 AND role_id = $2")
            .bind(subject)
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
