use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database. The email column carries a UNIQUE
/// constraint; emails are stored lowercased.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub age: Option<i32>,
    pub fitness_goal: Option<String>,
    pub experience: Option<String>,
    pub workout_time: Option<String>,
    pub dietary_preference: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

/// Insert parameters for a new user.
pub struct NewUser<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub age: Option<i32>,
    pub fitness_goal: Option<&'a str>,
    pub experience: Option<&'a str>,
    pub workout_time: Option<&'a str>,
    pub dietary_preference: Option<&'a str>,
    pub password_hash: &'a str,
}

impl User {
    /// Find a user by (already normalized) email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, age, fitness_goal, experience,
                   workout_time, dietary_preference, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
    }

    /// Find a user by id.
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, age, fitness_goal, experience,
                   workout_time, dietary_preference, password_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Insert a new user. A duplicate email surfaces as a database unique
    /// violation for the caller to map.
    pub async fn create(db: &PgPool, new: &NewUser<'_>) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users
                (email, name, age, fitness_goal, experience,
                 workout_time, dietary_preference, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, email, name, age, fitness_goal, experience,
                      workout_time, dietary_preference, password_hash, created_at
            "#,
        )
        .bind(new.email)
        .bind(new.name)
        .bind(new.age)
        .bind(new.fitness_goal)
        .bind(new.experience)
        .bind(new.workout_time)
        .bind(new.dietary_preference)
        .bind(new.password_hash)
        .fetch_one(db)
        .await
    }
}

/// True when the error is a database unique-constraint violation, i.e. a
/// duplicate email that raced past the pre-insert check.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_row_never_serializes_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "ann@example.com".into(),
            name: "Ann".into(),
            age: None,
            fitness_goal: None,
            experience: None,
            workout_time: None,
            dietary_preference: None,
            password_hash: "$argon2id$secret".into(),
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("argon2id"));
    }

    #[test]
    fn pool_timeout_is_not_a_unique_violation() {
        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut));
    }
}
