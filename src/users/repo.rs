use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::{PgStore, StoreError},
    users::repo_types::{NewUser, ProfileChanges, User, UserStore},
};

const USER_COLUMNS: &str = "user_id, name, email, password_hash, is_active, is_admin, \
                            login_count, feedback_count, last_login, created_at, updated_at";

#[async_trait]
impl UserStore for PgStore {
    /// Create a new user with an already hashed password.
    async fn insert(&self, new: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (user_id, name, email, password_hash, is_admin)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.is_admin)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn record_login(&self, user_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
               SET login_count = login_count + 1,
                   last_login = now(),
                   updated_at = now()
             WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        changes: &ProfileChanges,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   email = COALESCE($3, email),
                   updated_at = now()
             WHERE user_id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(changes.name.as_deref())
        .bind(changes.email.as_deref())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn deactivate(&self, user_id: Uuid) -> Result<bool, StoreError> {
        let res = sqlx::query(
            "UPDATE users SET is_active = FALSE, updated_at = now() WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }
}
