//! Message service
//!
//! Creates messages, resolves reply references, and aggregates read receipts.
//! The WebSocket hub and the REST history endpoint both go through this module
//! so clients see identical payloads on either surface.

use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use parley_shared::{MessageView, ReplyView};

use crate::error::{ApiError, ApiResult};

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct InsertedRow {
    id: Uuid,
    read_by: Vec<Uuid>,
    created_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    id: Uuid,
    content: String,
    user_id: Uuid,
    read_by: Vec<Uuid>,
    created_at: OffsetDateTime,
    username: String,
    reply_id: Option<Uuid>,
    reply_content: Option<String>,
    reply_user_id: Option<Uuid>,
    reply_username: Option<String>,
}

// =============================================================================
// Operations
// =============================================================================

/// Validate message content: empty or whitespace-only content is rejected
pub fn validate_content(content: &str) -> ApiResult<()> {
    if content.trim().is_empty() {
        return Err(ApiError::Validation(
            "Message content cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Persist a new message and return its fully resolved broadcast view
///
/// The reply target, if given, is resolved best-effort: a missing target
/// yields `reply_to: None` while the stored `reply_to_id` is retained.
pub async fn create(
    pool: &PgPool,
    user_id: Uuid,
    username: &str,
    content: &str,
    reply_to_id: Option<Uuid>,
) -> ApiResult<MessageView> {
    validate_content(content)?;

    let row = sqlx::query_as::<_, InsertedRow>(
        r#"
        INSERT INTO messages (user_id, content, reply_to_id)
        VALUES ($1, $2, $3)
        RETURNING id, read_by, created_at
        "#,
    )
    .bind(user_id)
    .bind(content)
    .bind(reply_to_id)
    .fetch_one(pool)
    .await?;

    let reply_to = match reply_to_id {
        Some(target_id) => resolve_reply(pool, target_id).await?,
        None => None,
    };

    Ok(MessageView {
        id: row.id,
        content: content.to_string(),
        username: username.to_string(),
        user_id,
        created_at: row.created_at,
        read_by: row.read_by,
        reply_to,
    })
}

/// Resolve the denormalized summary of a reply target
///
/// Returns `None` when the target does not exist (soft-fail, not an error).
async fn resolve_reply(pool: &PgPool, target_id: Uuid) -> Result<Option<ReplyView>, sqlx::Error> {
    #[derive(FromRow)]
    struct ReplyRow {
        id: Uuid,
        content: String,
        user_id: Uuid,
        username: String,
    }

    let row = sqlx::query_as::<_, ReplyRow>(
        r#"
        SELECT m.id, m.content, m.user_id, u.username
        FROM messages m
        JOIN users u ON u.id = m.user_id
        WHERE m.id = $1
        "#,
    )
    .bind(target_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| ReplyView {
        id: r.id,
        content: r.content,
        username: r.username,
        user_id: r.user_id,
    }))
}

/// Fetch the most recent `limit` messages in chronological order
///
/// Author usernames and reply summaries are resolved in a single query;
/// dangling reply references come back as `reply_to: None`.
pub async fn list_recent(pool: &PgPool, limit: i64) -> ApiResult<Vec<MessageView>> {
    let rows = sqlx::query_as::<_, HistoryRow>(
        r#"
        SELECT m.id, m.content, m.user_id, m.read_by, m.created_at,
               u.username,
               r.id AS reply_id,
               r.content AS reply_content,
               r.user_id AS reply_user_id,
               ru.username AS reply_username
        FROM messages m
        JOIN users u ON u.id = m.user_id
        LEFT JOIN messages r ON r.id = m.reply_to_id
        LEFT JOIN users ru ON ru.id = r.user_id
        ORDER BY m.seq DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    // Newest-first from the store, reversed for display order
    let mut messages: Vec<MessageView> = rows
        .into_iter()
        .map(|row| {
            let reply_to = match (row.reply_id, row.reply_content, row.reply_user_id) {
                (Some(id), Some(content), Some(user_id)) => Some(ReplyView {
                    id,
                    content,
                    username: row.reply_username.unwrap_or_default(),
                    user_id,
                }),
                _ => None,
            };
            MessageView {
                id: row.id,
                content: row.content,
                username: row.username,
                user_id: row.user_id,
                created_at: row.created_at,
                read_by: row.read_by,
                reply_to,
            }
        })
        .collect();
    messages.reverse();

    Ok(messages)
}

/// Idempotently add a reader to a message's read-by set
///
/// Returns `None` when the message does not exist, otherwise the current
/// read-by set. The guarded UPDATE is a single atomic check-then-set, so
/// concurrent callers cannot append the same reader twice.
pub async fn mark_read(
    pool: &PgPool,
    message_id: Uuid,
    user_id: Uuid,
) -> ApiResult<Option<Vec<Uuid>>> {
    let read_by = sqlx::query_scalar::<_, Vec<Uuid>>(
        r#"
        UPDATE messages
        SET read_by = CASE
            WHEN read_by @> ARRAY[$2]::uuid[] THEN read_by
            ELSE array_append(read_by, $2)
        END
        WHERE id = $1
        RETURNING read_by
        "#,
    )
    .bind(message_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(read_by)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_validation() {
        assert!(validate_content("hi").is_ok());
        assert!(validate_content("  spaced  ").is_ok());
        assert!(matches!(
            validate_content(""),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            validate_content("   \t\n"),
            Err(ApiError::Validation(_))
        ));
    }

    // Database-backed tests live below; run with a configured DATABASE_URL.

    async fn test_pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = parley_shared::create_pool(&url, 2).await.expect("pool");
        parley_shared::run_migrations(&pool).await.expect("migrations");
        pool
    }

    async fn test_user(pool: &PgPool, username: &str) -> Uuid {
        sqlx::query_scalar(
            "INSERT INTO users (username, password_hash) VALUES ($1, 'x') RETURNING id",
        )
        .bind(username)
        .fetch_one(pool)
        .await
        .expect("insert user")
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_mark_read_idempotent() {
        let pool = test_pool().await;
        let author = test_user(&pool, &format!("author-{}", Uuid::new_v4())).await;
        let reader = test_user(&pool, &format!("reader-{}", Uuid::new_v4())).await;

        let message = create(&pool, author, "author", "hi", None).await.unwrap();
        assert!(message.read_by.is_empty());

        let first = mark_read(&pool, message.id, reader).await.unwrap().unwrap();
        assert_eq!(first, vec![reader]);

        // Second call is a no-op on the set
        let second = mark_read(&pool, message.id, reader).await.unwrap().unwrap();
        assert_eq!(second, vec![reader]);

        // Unknown message id
        let missing = mark_read(&pool, Uuid::new_v4(), reader).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_list_recent_chronological() {
        let pool = test_pool().await;
        let name = format!("author-{}", Uuid::new_v4());
        let author = test_user(&pool, &name).await;

        // Back-to-back inserts can share a created_at microsecond; the
        // insertion sequence still orders them.
        let mut ids = Vec::new();
        for i in 0..5 {
            let message = create(&pool, author, &name, &format!("msg {i}"), None)
                .await
                .unwrap();
            ids.push(message.id);
        }

        let history = list_recent(&pool, 1000).await.unwrap();
        let mine: Vec<Uuid> = history
            .iter()
            .filter(|m| m.user_id == author)
            .map(|m| m.id)
            .collect();
        assert_eq!(mine, ids, "messages come back in creation order");

        // Usernames are resolved from the store, not echoed from the caller
        assert!(history
            .iter()
            .filter(|m| m.user_id == author)
            .all(|m| m.username == name));

        // Limit truncates to the newest messages, still oldest-first
        let truncated = list_recent(&pool, 3).await.unwrap();
        assert_eq!(truncated.len(), 3);
        for pair in truncated.windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
        }
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_reply_resolution_soft_fail() {
        let pool = test_pool().await;
        let author = test_user(&pool, &format!("author-{}", Uuid::new_v4())).await;

        // Reply to a message that does not exist: stored, but unresolved
        let dangling = Uuid::new_v4();
        let message = create(&pool, author, "author", "orphan reply", Some(dangling))
            .await
            .unwrap();
        assert!(message.reply_to.is_none());

        // Reply to a real message carries the denormalized summary
        let original = create(&pool, author, "author", "hi", None).await.unwrap();
        let reply = create(&pool, author, "author", "hello", Some(original.id))
            .await
            .unwrap();
        let summary = reply.reply_to.expect("reply summary");
        assert_eq!(summary.id, original.id);
        assert_eq!(summary.content, "hi");
    }
}
