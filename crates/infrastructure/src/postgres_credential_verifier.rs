//! PostgreSQL-backed credential verifier.

use async_trait::async_trait;
use sqlx::PgPool;
use timebank_application::CredentialVerifier;
use timebank_core::{AppError, AppResult, UserIdentity};

use crate::Argon2PasswordVerifier;

/// Verifies email/password pairs against `users.password_hash`.
#[derive(Clone)]
pub struct PostgresCredentialVerifier {
    pool: PgPool,
    passwords: Argon2PasswordVerifier,
}

impl PostgresCredentialVerifier {
    /// Creates a verifier with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            passwords: Argon2PasswordVerifier::new(),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    id: uuid::Uuid,
    display_name: String,
    password_hash: Option<String>,
}

#[async_trait]
impl CredentialVerifier for PostgresCredentialVerifier {
    async fn verify(&self, identifier: &str, secret: &str) -> AppResult<Option<UserIdentity>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT id, display_name, password_hash
            FROM users
            WHERE LOWER(email) = LOWER($1)
            LIMIT 1
            "#,
        )
        .bind(identifier.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load credentials: {error}")))?;

        let Some(row) = row else {
            self.passwords.burn_equivalent_work(secret);
            return Ok(None);
        };

        let Some(stored_hash) = row.password_hash.as_deref() else {
            self.passwords.burn_equivalent_work(secret);
            return Ok(None);
        };

        if !self.passwords.verify_password(secret, stored_hash)? {
            return Ok(None);
        }

        Ok(Some(UserIdentity::new(row.id.to_string(), row.display_name)))
    }
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;
    use sqlx::migrate::Migrator;
    use sqlx::postgres::PgPoolOptions;
    use timebank_application::CredentialVerifier;

    use super::PostgresCredentialVerifier;
    use crate::Argon2PasswordVerifier;

    static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

    async fn test_pool() -> Option<PgPool> {
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            return None;
        };

        let pool = match PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url.as_str())
            .await
        {
            Ok(pool) => pool,
            Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
        };

        if let Err(error) = MIGRATOR.run(&pool).await {
            panic!("failed to run migrations for credential verifier tests: {error}");
        }

        Some(pool)
    }

    #[tokio::test]
    async fn verifies_stored_password_case_insensitively() {
        let Some(pool) = test_pool().await else {
            return;
        };

        let user_id = uuid::Uuid::new_v4();
        let email = format!("{}@Example.org", user_id.simple());
        let hash = Argon2PasswordVerifier::new()
            .hash_password("correct horse battery")
            .unwrap_or_else(|_| unreachable!());

        let insert = sqlx::query(
            r#"
            INSERT INTO users (id, email, display_name, password_hash)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user_id)
        .bind(email.as_str())
        .bind("Grace Hopper")
        .bind(hash.as_str())
        .execute(&pool)
        .await;
        assert!(insert.is_ok());

        let verifier = PostgresCredentialVerifier::new(pool.clone());

        let identity = verifier
            .verify(email.to_lowercase().as_str(), "correct horse battery")
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(
            identity.as_ref().map(|identity| identity.subject().to_owned()),
            Some(user_id.to_string())
        );

        let wrong = verifier
            .verify(email.as_str(), "incorrect")
            .await
            .unwrap_or_else(|_| unreachable!());
        assert!(wrong.is_none());

        let unknown = verifier
            .verify("nobody@example.org", "correct horse battery")
            .await
            .unwrap_or_else(|_| unreachable!());
        assert!(unknown.is_none());
    }
}
