use {
    crate::domain::{error::PipelineError, user::User},
    sqlx::PgPool,
};

pub async fn get_user(pool: &PgPool, id: i64) -> Result<Option<User>, PipelineError> {
    let row: Option<(i64, String)> = sqlx::query_as("SELECT id, email FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(id, email)| User { id, email }))
}
