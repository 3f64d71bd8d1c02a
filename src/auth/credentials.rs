use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::ToSchema;

use crate::model::role::Role;
use crate::models::UserSql;
use crate::utils::korean_keyboard::student_login_id;

/// Resolves credentials per kind of account: which role a login must carry,
/// how a typed username becomes the stored login id, and how the account
/// comes into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Admin,
    Parent,
    Student,
}

impl AccountKind {
    pub fn role(self) -> Role {
        match self {
            AccountKind::Admin => Role::Admin,
            AccountKind::Parent => Role::Parent,
            AccountKind::Student => Role::Student,
        }
    }

    /// Students log in with their (often Hangul) name; it is stored as an
    /// ASCII address under the student domain. Other kinds use the username
    /// as typed, case-folded.
    pub fn login_id(self, username: &str) -> String {
        match self {
            AccountKind::Student => student_login_id(username),
            AccountKind::Admin | AccountKind::Parent => username.trim().to_lowercase(),
        }
    }

    /// Admins and parents sign themselves up and must prove their phone.
    /// Students are created by an admin.
    pub fn self_registration(self) -> bool {
        !matches!(self, AccountKind::Student)
    }

    pub async fn find(self, pool: &MySqlPool, username: &str) -> Result<Option<UserSql>, sqlx::Error> {
        sqlx::query_as::<_, UserSql>(
            r#"
            SELECT id, login_id, password, name, role_id, linked_user_id
            FROM users
            WHERE login_id = ?
            AND role_id = ?
            "#,
        )
        .bind(self.login_id(username))
        .bind(self.role().id())
        .fetch_optional(pool)
        .await
    }
}
