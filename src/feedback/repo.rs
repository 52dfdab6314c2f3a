use async_trait::async_trait;
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    repo_types::{
        Category, Feedback, FeedbackPatch, FeedbackQuery, FeedbackRow, FeedbackStore, NewFeedback,
        SortField, SortOrder, Status, StatusAdvance,
    },
    stats::{CategoryStats, UserStats},
};
use crate::db::{PgStore, StoreError};

const FEEDBACK_COLUMNS: &str = "feedback_id, user_id, user_name, user_email, title, feedback_text, \
                                category, priority, status, rating, rating_comment, admin_response, \
                                admin_id, completed_at, closed_at, tags, is_archived, created_at, updated_at";

fn decode(row: FeedbackRow) -> Result<Feedback, StoreError> {
    Feedback::try_from(row).map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))
}

fn decode_all(rows: Vec<FeedbackRow>) -> Result<Vec<Feedback>, StoreError> {
    rows.into_iter().map(decode).collect()
}

/// Escape LIKE metacharacters so search terms match literally.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, q: &FeedbackQuery) {
    qb.push(" WHERE TRUE");
    if let Some(owner) = q.owner {
        qb.push(" AND user_id = ").push_bind(owner);
    }
    if let Some(status) = q.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(category) = q.category {
        qb.push(" AND category = ").push_bind(category.as_str());
    }
    if let Some(priority) = q.priority {
        qb.push(" AND priority = ").push_bind(priority.as_str());
    }
    if let Some(term) = &q.search {
        let pattern = format!("%{}%", escape_like(term));
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR feedback_text ILIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

fn order_clause(sort: SortField, order: SortOrder) -> String {
    let key = match sort {
        SortField::CreatedAt => "created_at",
        SortField::UpdatedAt => "updated_at",
        SortField::Title => "title COLLATE \"C\"",
        SortField::Priority => "CASE priority WHEN 'low' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END",
        SortField::Status => {
            "CASE status WHEN 'open' THEN 0 WHEN 'in-progress' THEN 1 WHEN 'completed' THEN 2 ELSE 3 END"
        }
    };
    let dir = match order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    format!(" ORDER BY {key} {dir}, created_at DESC, id DESC")
}

#[derive(Debug, FromRow)]
struct CategoryStatsRow {
    category: String,
    count: i64,
    avg_rating: Option<f64>,
    open_count: i64,
    completed_count: i64,
}

#[async_trait]
impl FeedbackStore for PgStore {
    async fn insert(&self, new: NewFeedback) -> Result<Feedback, StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, FeedbackRow>(&format!(
            r#"
            INSERT INTO feedback (feedback_id, user_id, user_name, user_email, title,
                                  feedback_text, category, priority, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {FEEDBACK_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.owner_id)
        .bind(&new.owner_name)
        .bind(&new.owner_email)
        .bind(&new.title)
        .bind(&new.feedback_text)
        .bind(new.category.as_str())
        .bind(new.priority.as_str())
        .bind(&new.tags)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE users SET feedback_count = feedback_count + 1, updated_at = now() WHERE user_id = $1",
        )
        .bind(new.owner_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        decode(row)
    }

    async fn list(&self, query: &FeedbackQuery) -> Result<(Vec<Feedback>, i64), StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM feedback");
        push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut page = QueryBuilder::<Postgres>::new(format!("SELECT {FEEDBACK_COLUMNS} FROM feedback"));
        push_filters(&mut page, query);
        page.push(order_clause(query.sort, query.order));
        page.push(" LIMIT ")
            .push_bind(query.page.limit as i64)
            .push(" OFFSET ")
            .push_bind(query.page.offset());
        let rows = page
            .build_query_as::<FeedbackRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok((decode_all(rows)?, total))
    }

    async fn find_owned(&self, owner: Uuid, feedback_id: Uuid) -> Result<Option<Feedback>, StoreError> {
        let row = sqlx::query_as::<_, FeedbackRow>(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE feedback_id = $1 AND user_id = $2"
        ))
        .bind(feedback_id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;
        row.map(decode).transpose()
    }

    async fn find(&self, feedback_id: Uuid) -> Result<Option<Feedback>, StoreError> {
        let row = sqlx::query_as::<_, FeedbackRow>(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE feedback_id = $1"
        ))
        .bind(feedback_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(decode).transpose()
    }

    async fn update_if_open(
        &self,
        owner: Uuid,
        feedback_id: Uuid,
        patch: &FeedbackPatch,
    ) -> Result<Option<Feedback>, StoreError> {
        let row = sqlx::query_as::<_, FeedbackRow>(&format!(
            r#"
            UPDATE feedback
               SET title = COALESCE($3, title),
                   feedback_text = COALESCE($4, feedback_text),
                   category = COALESCE($5, category),
                   priority = COALESCE($6, priority),
                   updated_at = now()
             WHERE feedback_id = $1 AND user_id = $2 AND status = 'open'
            RETURNING {FEEDBACK_COLUMNS}
            "#
        ))
        .bind(feedback_id)
        .bind(owner)
        .bind(patch.title.as_deref())
        .bind(patch.feedback_text.as_deref())
        .bind(patch.category.map(Category::as_str))
        .bind(patch.priority.map(|p| p.as_str()))
        .fetch_optional(&self.pool)
        .await?;
        row.map(decode).transpose()
    }

    async fn delete_if_open(&self, owner: Uuid, feedback_id: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let deleted: Option<Uuid> = sqlx::query_scalar(
            "DELETE FROM feedback WHERE feedback_id = $1 AND user_id = $2 AND status = 'open' RETURNING user_id",
        )
        .bind(feedback_id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await?;

        if deleted.is_some() {
            sqlx::query(
                r#"
                UPDATE users
                   SET feedback_count = GREATEST(feedback_count - 1, 0),
                       updated_at = now()
                 WHERE user_id = $1
                "#,
            )
            .bind(owner)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(deleted.is_some())
    }

    async fn rate_if_completed(
        &self,
        owner: Uuid,
        feedback_id: Uuid,
        rating: i16,
        comment: Option<String>,
    ) -> Result<Option<Feedback>, StoreError> {
        let row = sqlx::query_as::<_, FeedbackRow>(&format!(
            r#"
            UPDATE feedback
               SET rating = $3,
                   rating_comment = $4,
                   status = 'closed',
                   completed_at = COALESCE(completed_at, now()),
                   closed_at = COALESCE(closed_at, now()),
                   updated_at = now()
             WHERE feedback_id = $1 AND user_id = $2
               AND status = 'completed' AND rating IS NULL
            RETURNING {FEEDBACK_COLUMNS}
            "#
        ))
        .bind(feedback_id)
        .bind(owner)
        .bind(rating)
        .bind(comment)
        .fetch_optional(&self.pool)
        .await?;
        row.map(decode).transpose()
    }

    async fn advance_status(
        &self,
        feedback_id: Uuid,
        from: &[Status],
        advance: &StatusAdvance,
    ) -> Result<Option<Feedback>, StoreError> {
        let sources: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();
        let row = sqlx::query_as::<_, FeedbackRow>(&format!(
            r#"
            UPDATE feedback
               SET status = $2,
                   admin_id = $3,
                   admin_response = COALESCE($4, admin_response),
                   completed_at = CASE WHEN $2 = 'completed'
                                       THEN COALESCE(completed_at, now()) ELSE completed_at END,
                   closed_at = CASE WHEN $2 = 'closed'
                                    THEN COALESCE(closed_at, now()) ELSE closed_at END,
                   updated_at = now()
             WHERE feedback_id = $1 AND status = ANY($5)
            RETURNING {FEEDBACK_COLUMNS}
            "#
        ))
        .bind(feedback_id)
        .bind(advance.to.as_str())
        .bind(advance.admin_id)
        .bind(advance.admin_response.as_deref())
        .bind(sources)
        .fetch_optional(&self.pool)
        .await?;
        row.map(decode).transpose()
    }

    async fn user_stats(&self, owner: Uuid) -> Result<UserStats, StoreError> {
        let stats = sqlx::query_as::<_, UserStats>(
            r#"
            SELECT COUNT(*)                                           AS total,
                   COUNT(*) FILTER (WHERE status = 'open')            AS open,
                   COUNT(*) FILTER (WHERE status = 'in-progress')     AS in_progress,
                   COUNT(*) FILTER (WHERE status = 'completed')       AS completed,
                   COUNT(*) FILTER (WHERE status = 'closed')          AS closed,
                   AVG(rating)::float8                                AS avg_rating,
                   COUNT(*) FILTER (WHERE priority = 'high')          AS high_priority,
                   COUNT(*) FILTER (WHERE priority = 'medium')        AS medium_priority,
                   COUNT(*) FILTER (WHERE priority = 'low')           AS low_priority
              FROM feedback
             WHERE user_id = $1
            "#,
        )
        .bind(owner)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    async fn category_stats(&self, owner: Uuid) -> Result<Vec<CategoryStats>, StoreError> {
        let rows = sqlx::query_as::<_, CategoryStatsRow>(
            r#"
            SELECT category,
                   COUNT(*)                                       AS count,
                   ROUND(AVG(rating)::numeric, 1)::float8         AS avg_rating,
                   COUNT(*) FILTER (WHERE status = 'open')        AS open_count,
                   COUNT(*) FILTER (WHERE status = 'completed')   AS completed_count
              FROM feedback
             WHERE user_id = $1
             GROUP BY category
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = rows
            .into_iter()
            .map(|r| {
                let category = r
                    .category
                    .parse::<Category>()
                    .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))?;
                Ok(CategoryStats {
                    category,
                    count: r.count,
                    avg_rating: r.avg_rating,
                    open_count: r.open_count,
                    completed_count: r.completed_count,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        stats.sort_by_key(|s| s.category);
        Ok(stats)
    }

    async fn pending_ratings(&self, owner: Uuid) -> Result<Vec<Feedback>, StoreError> {
        let rows = sqlx::query_as::<_, FeedbackRow>(&format!(
            r#"
            SELECT {FEEDBACK_COLUMNS}
              FROM feedback
             WHERE user_id = $1 AND status = 'completed' AND rating IS NULL
             ORDER BY completed_at DESC
            "#
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        decode_all(rows)
    }
}
