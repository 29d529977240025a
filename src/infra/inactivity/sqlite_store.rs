use crate::core::inactivity::{ActivityStore, GuildRecord, StoreError, UserRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::time::Duration;

pub struct SqliteActivityStore {
    pool: Pool<Sqlite>,
}

impl SqliteActivityStore {
    /// Open (creating if needed) the database and run migrations.
    ///
    /// Gives up with `StoreError::ConnectTimeout` if the pool is not ready
    /// within `connect_timeout`.
    pub async fn new(database_url: &str, connect_timeout: Duration) -> Result<Self, StoreError> {
        // Ensure the file exists if it's a file path
        let path_str = database_url.trim_start_matches("sqlite://");
        if !database_url.contains(":memory:") && !Path::new(path_str).exists() {
            if let Some(parent) = Path::new(path_str).parent() {
                std::fs::create_dir_all(parent).map_err(storage)?;
            }
            std::fs::File::create(path_str).map_err(storage)?;
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        let connect = SqlitePoolOptions::new()
            .acquire_timeout(connect_timeout)
            .connect(&conn_str);
        let pool = tokio::time::timeout(connect_timeout, connect)
            .await
            .map_err(|_| StoreError::ConnectTimeout(connect_timeout.as_secs()))?
            .map_err(storage)?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS guilds (
                guild_id INTEGER PRIMARY KEY,
                max_inactivity_days INTEGER NOT NULL,
                first_warn_offset_days INTEGER NOT NULL,
                kick_message TEXT NOT NULL,
                warning_message TEXT NOT NULL,
                last_sweep_day INTEGER
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                guild_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                last_activity_at TEXT NOT NULL,
                immune BOOLEAN NOT NULL DEFAULT 0,
                PRIMARY KEY (guild_id, user_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }
}

#[async_trait]
impl ActivityStore for SqliteActivityStore {
    async fn get_guild(&self, guild_id: u64) -> Result<Option<GuildRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM guilds WHERE guild_id = ?")
            .bind(guild_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        Ok(row.as_ref().map(row_to_guild))
    }

    async fn upsert_guild(&self, guild: &GuildRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO guilds (
                guild_id, max_inactivity_days, first_warn_offset_days,
                kick_message, warning_message, last_sweep_day
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET
                max_inactivity_days = excluded.max_inactivity_days,
                first_warn_offset_days = excluded.first_warn_offset_days,
                kick_message = excluded.kick_message,
                warning_message = excluded.warning_message
            "#,
        )
        .bind(guild.guild_id as i64)
        .bind(guild.max_inactivity_days)
        .bind(guild.first_warn_offset_days)
        .bind(guild.kick_message_template.as_str())
        .bind(guild.warning_message_template.as_str())
        .bind(guild.last_sweep_day)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn set_last_sweep_day(&self, guild_id: u64, day: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE guilds SET last_sweep_day = ? WHERE guild_id = ?")
            .bind(day)
            .bind(guild_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        Ok(())
    }

    async fn delete_guild(&self, guild_id: u64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        sqlx::query("DELETE FROM users WHERE guild_id = ?")
            .bind(guild_id as i64)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        sqlx::query("DELETE FROM guilds WHERE guild_id = ?")
            .bind(guild_id as i64)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        tx.commit().await.map_err(storage)
    }

    async fn list_guilds(&self) -> Result<Vec<GuildRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM guilds")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        Ok(rows.iter().map(row_to_guild).collect())
    }

    async fn count_guilds(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) FROM guilds")
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;

        Ok(row.get::<i64, _>(0) as u64)
    }

    async fn get_user(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE guild_id = ? AND user_id = ?")
            .bind(guild_id as i64)
            .bind(user_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        Ok(row.as_ref().map(row_to_user))
    }

    async fn create_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO users (guild_id, user_id, last_activity_at, immune) VALUES (?, ?, ?, ?)",
        )
        .bind(user.guild_id as i64)
        .bind(user.user_id as i64)
        .bind(user.last_activity_at)
        .bind(user.immune)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::Conflict {
                    guild_id: user.guild_id,
                    user_id: user.user_id,
                })
            }
            Err(e) => Err(storage(e)),
        }
    }

    async fn update_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (guild_id, user_id, last_activity_at, immune)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(guild_id, user_id) DO UPDATE SET
                last_activity_at = excluded.last_activity_at,
                immune = excluded.immune
            "#,
        )
        .bind(user.guild_id as i64)
        .bind(user.user_id as i64)
        .bind(user.last_activity_at)
        .bind(user.immune)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn touch_user(
        &self,
        guild_id: u64,
        user_id: u64,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE users SET last_activity_at = ? WHERE guild_id = ? AND user_id = ?")
                .bind(at)
                .bind(guild_id as i64)
                .bind(user_id as i64)
                .execute(&self.pool)
                .await
                .map_err(storage)?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_user_immunity(
        &self,
        guild_id: u64,
        user_id: u64,
        immune: bool,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE users SET immune = ? WHERE guild_id = ? AND user_id = ?")
            .bind(immune)
            .bind(guild_id as i64)
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, guild_id: u64, user_id: u64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM users WHERE guild_id = ? AND user_id = ?")
            .bind(guild_id as i64)
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        Ok(())
    }

    async fn delete_all_users(&self, guild_id: u64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM users WHERE guild_id = ?")
            .bind(guild_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        Ok(())
    }

    async fn list_users(&self, guild_id: u64) -> Result<Vec<UserRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM users WHERE guild_id = ?")
            .bind(guild_id as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        Ok(rows.iter().map(row_to_user).collect())
    }
}

fn storage(e: impl std::fmt::Display) -> StoreError {
    StoreError::StorageError(e.to_string())
}

fn row_to_guild(row: &SqliteRow) -> GuildRecord {
    GuildRecord {
        guild_id: row.get::<i64, _>("guild_id") as u64,
        max_inactivity_days: row.get("max_inactivity_days"),
        first_warn_offset_days: row.get("first_warn_offset_days"),
        kick_message_template: row.get("kick_message"),
        warning_message_template: row.get("warning_message"),
        last_sweep_day: row.get("last_sweep_day"),
    }
}

fn row_to_user(row: &SqliteRow) -> UserRecord {
    UserRecord {
        guild_id: row.get::<i64, _>("guild_id") as u64,
        user_id: row.get::<i64, _>("user_id") as u64,
        last_activity_at: row.get::<DateTime<Utc>, _>("last_activity_at"),
        immune: row.get("immune"),
    }
}
