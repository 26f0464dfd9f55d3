// ABOUTME: PostgreSQL deployment store built on sqlx.
// ABOUTME: The build lock is a session-level advisory lock on a dedicated connection.

use super::{
    BuildLock, DeploymentStore, StoreError, StoreResult, check_transition,
    normalize_error_message,
};
use crate::model::{App, AppStatus, Deployment, DeploymentStatus, NewApp, resolve_branch};
use crate::types::{AppId, DeploymentId};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row};
use std::time::Duration;

/// Advisory lock key guarding the build queue (`"dockyard"` in ASCII).
pub const BUILD_LOCK_KEY: i64 = 0x646f_636b_7961_7264;

const DEPLOYMENT_COLUMNS: &str = "id, app_id, status, image_name, container_id, subdomain, \
     build_log, error_message, created_at, updated_at";

const APP_COLUMNS: &str = "id, user_id, name, repo_url, branch, url, status, created_at, updated_at";

/// PostgreSQL-backed deployment store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a pool to the given database URL.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `apps` and `deployments` tables if they are missing.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS apps (
                id BIGSERIAL PRIMARY KEY,
                user_id BIGINT NOT NULL,
                name TEXT NOT NULL,
                repo_url TEXT NOT NULL,
                branch TEXT NOT NULL DEFAULT 'main',
                url TEXT,
                status TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS deployments (
                id BIGSERIAL PRIMARY KEY,
                app_id BIGINT NOT NULL REFERENCES apps(id) ON DELETE CASCADE,
                status TEXT NOT NULL DEFAULT 'pending',
                image_name TEXT,
                container_id TEXT,
                subdomain TEXT,
                build_log TEXT,
                error_message TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
            r#"CREATE INDEX IF NOT EXISTS deployments_queue ON deployments(status, created_at, id);"#,
            r#"CREATE INDEX IF NOT EXISTS deployments_app_id ON deployments(app_id);"#,
        ];

        for stmt in statements {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(query_error)?;
        }

        Ok(())
    }

    async fn current_status(&self, id: DeploymentId) -> StoreResult<DeploymentStatus> {
        let row = sqlx::query("SELECT status FROM deployments WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?
            .ok_or_else(|| StoreError::NotFound(format!("deployment {}", id)))?;

        parse_status(&row)
    }

    /// Run a single-row `UPDATE deployments ... WHERE id = $1`.
    async fn update_deployment_field(
        &self,
        id: DeploymentId,
        assignment: &str,
        value: &str,
    ) -> StoreResult<()> {
        let sql = format!(
            "UPDATE deployments SET {} = $2, updated_at = NOW() WHERE id = $1",
            assignment
        );
        let result = sqlx::query(&sql)
            .bind(id.get())
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("deployment {}", id)));
        }
        Ok(())
    }
}

fn query_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Connection(e.to_string())
        }
        _ => StoreError::Query(e.to_string()),
    }
}

fn parse_status(row: &PgRow) -> StoreResult<DeploymentStatus> {
    let status: String = row.try_get("status").map_err(query_error)?;
    status
        .parse()
        .map_err(|e: crate::model::UnknownStatus| StoreError::InvalidData(e.to_string()))
}

fn deployment_from_row(row: &PgRow) -> StoreResult<Deployment> {
    Ok(Deployment {
        id: DeploymentId::new(row.try_get("id").map_err(query_error)?),
        app_id: AppId::new(row.try_get("app_id").map_err(query_error)?),
        status: parse_status(row)?,
        image_name: row.try_get("image_name").map_err(query_error)?,
        container_id: row.try_get("container_id").map_err(query_error)?,
        subdomain: row.try_get("subdomain").map_err(query_error)?,
        build_log: row.try_get("build_log").map_err(query_error)?,
        error_message: row.try_get("error_message").map_err(query_error)?,
        created_at: row.try_get("created_at").map_err(query_error)?,
        updated_at: row.try_get("updated_at").map_err(query_error)?,
    })
}

fn app_from_row(row: &PgRow) -> StoreResult<App> {
    Ok(App {
        id: AppId::new(row.try_get("id").map_err(query_error)?),
        user_id: row.try_get("user_id").map_err(query_error)?,
        name: row.try_get("name").map_err(query_error)?,
        repo_url: row.try_get("repo_url").map_err(query_error)?,
        branch: row.try_get("branch").map_err(query_error)?,
        url: row.try_get("url").map_err(query_error)?,
        status: row.try_get("status").map_err(query_error)?,
        created_at: row.try_get("created_at").map_err(query_error)?,
        updated_at: row.try_get("updated_at").map_err(query_error)?,
    })
}

/// Advisory lock held on a connection taken out of the pool.
///
/// PostgreSQL ties advisory locks to the session, so the connection stays
/// checked out for as long as the lock is held. If the guard is dropped
/// without [`release`](BuildLock::release), the connection is detached and
/// closed, which ends the session and frees the lock server-side.
#[derive(Debug)]
pub struct PgBuildLock {
    conn: Option<PoolConnection<Postgres>>,
}

impl Drop for PgBuildLock {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::debug!("build lock dropped without release; closing its session");
            drop(conn.detach());
        }
    }
}

#[async_trait]
impl BuildLock for PgBuildLock {
    async fn release(mut self) -> StoreResult<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };

        let unlocked = sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
            .bind(BUILD_LOCK_KEY)
            .fetch_one(&mut *conn)
            .await;

        match unlocked {
            Ok(true) => Ok(()),
            Ok(false) => {
                tracing::warn!("build lock was not held by this session at release");
                Ok(())
            }
            Err(e) => {
                // Never hand a possibly-locked session back to the pool.
                drop(conn.detach());
                Err(query_error(e))
            }
        }
    }
}

#[async_trait]
impl DeploymentStore for PgStore {
    type Lock = PgBuildLock;

    async fn try_lock_builds(&self) -> StoreResult<Option<Self::Lock>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let acquired = sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1)")
            .bind(BUILD_LOCK_KEY)
            .fetch_one(&mut *conn)
            .await;

        match acquired {
            Ok(true) => Ok(Some(PgBuildLock { conn: Some(conn) })),
            Ok(false) => Ok(None),
            Err(e) => {
                drop(conn.detach());
                Err(query_error(e))
            }
        }
    }

    async fn dequeue_next_pending(&self) -> StoreResult<Option<Deployment>> {
        let sql = format!(
            r#"
            UPDATE deployments
            SET status = 'building', updated_at = NOW()
            WHERE id = (
                SELECT id FROM deployments
                WHERE status = 'pending'
                ORDER BY created_at ASC, id ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            AND status = 'pending'
            RETURNING {}
            "#,
            DEPLOYMENT_COLUMNS
        );

        let row = sqlx::query(&sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?;

        row.as_ref().map(deployment_from_row).transpose()
    }

    async fn create_deployment(&self, app_id: AppId) -> StoreResult<Deployment> {
        let sql = format!(
            "INSERT INTO deployments (app_id, status) VALUES ($1, 'pending') RETURNING {}",
            DEPLOYMENT_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(app_id.get())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                let missing_app =
                    matches!(&e, sqlx::Error::Database(db) if db.is_foreign_key_violation());
                if missing_app {
                    StoreError::NotFound(format!("app {}", app_id))
                } else {
                    query_error(e)
                }
            })?;

        deployment_from_row(&row)
    }

    async fn list_pending(&self) -> StoreResult<Vec<Deployment>> {
        let sql = format!(
            "SELECT {} FROM deployments WHERE status = 'pending' ORDER BY created_at ASC, id ASC",
            DEPLOYMENT_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;

        rows.iter().map(deployment_from_row).collect()
    }

    async fn get_deployment(&self, id: DeploymentId) -> StoreResult<Deployment> {
        let sql = format!("SELECT {} FROM deployments WHERE id = $1", DEPLOYMENT_COLUMNS);

        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?
            .ok_or_else(|| StoreError::NotFound(format!("deployment {}", id)))?;

        deployment_from_row(&row)
    }

    async fn list_deployments(&self, app_id: AppId) -> StoreResult<Vec<Deployment>> {
        let sql = format!(
            "SELECT {} FROM deployments WHERE app_id = $1 ORDER BY created_at DESC, id DESC",
            DEPLOYMENT_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .bind(app_id.get())
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;

        rows.iter().map(deployment_from_row).collect()
    }

    async fn update_status(&self, id: DeploymentId, status: DeploymentStatus) -> StoreResult<()> {
        if status == DeploymentStatus::Failed {
            return Err(StoreError::MessageRequired(id));
        }

        let allowed: Vec<String> = DeploymentStatus::predecessors(status)
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let result = sqlx::query(
            "UPDATE deployments SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND status = ANY($3)",
        )
        .bind(id.get())
        .bind(status.as_str())
        .bind(allowed)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            let from = self.current_status(id).await?;
            check_transition(id, from, status)?;
            // The row moved between our update and the re-read.
            return Err(StoreError::InvalidTransition {
                id,
                from,
                to: status,
            });
        }
        Ok(())
    }

    async fn update_error(&self, id: DeploymentId, message: &str) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE deployments SET status = 'failed', error_message = $2, updated_at = NOW() \
             WHERE id = $1 AND status = 'building'",
        )
        .bind(id.get())
        .bind(normalize_error_message(message))
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            let from = self.current_status(id).await?;
            return Err(StoreError::InvalidTransition {
                id,
                from,
                to: DeploymentStatus::Failed,
            });
        }
        Ok(())
    }

    async fn update_image(&self, id: DeploymentId, image_name: &str) -> StoreResult<()> {
        self.update_deployment_field(id, "image_name", image_name)
            .await
    }

    async fn update_container(
        &self,
        id: DeploymentId,
        container_id: &str,
        subdomain: &str,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE deployments SET container_id = $2, subdomain = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id.get())
        .bind(container_id)
        .bind(subdomain)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("deployment {}", id)));
        }
        Ok(())
    }

    async fn update_build_log(&self, id: DeploymentId, build_log: &str) -> StoreResult<()> {
        self.update_deployment_field(id, "build_log", build_log)
            .await
    }

    async fn create_app(&self, app: NewApp) -> StoreResult<App> {
        let sql = format!(
            "INSERT INTO apps (user_id, name, repo_url, branch) VALUES ($1, $2, $3, $4) \
             RETURNING {}",
            APP_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(app.user_id)
            .bind(&app.name)
            .bind(&app.repo_url)
            .bind(resolve_branch(&app.branch))
            .fetch_one(&self.pool)
            .await
            .map_err(query_error)?;

        app_from_row(&row)
    }

    async fn get_app(&self, id: AppId) -> StoreResult<App> {
        let sql = format!("SELECT {} FROM apps WHERE id = $1", APP_COLUMNS);

        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?
            .ok_or_else(|| StoreError::NotFound(format!("app {}", id)))?;

        app_from_row(&row)
    }

    async fn update_app_status(
        &self,
        id: AppId,
        status: AppStatus,
        url: Option<&str>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE apps SET status = $2, url = COALESCE($3, url), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id.get())
        .bind(status.as_str())
        .bind(url)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("app {}", id)));
        }
        Ok(())
    }
}
