use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::auth::credentials::AccountKind;

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "홍길동")]
    pub username: String,
    pub password: String,
    pub kind: AccountKind,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterReq {
    #[schema(example = "admin01")]
    pub username: String,
    pub password: String,
    #[schema(example = "Kim Minji")]
    pub name: String,
    #[schema(example = "010-1234-5678")]
    pub phone: String,
    /// Parent registrations may link the student found via `/auth/verify-child`.
    pub student_user_id: Option<u64>,
}

#[derive(Deserialize, ToSchema)]
pub struct CheckUsernameReq {
    pub username: String,
    pub kind: AccountKind,
}

#[derive(Deserialize, ToSchema)]
pub struct SendCodeReq {
    #[schema(example = "010-1234-5678")]
    pub phone: String,
}

#[derive(Deserialize, ToSchema)]
pub struct VerifyCodeReq {
    #[schema(example = "010-1234-5678")]
    pub phone: String,
    #[schema(example = "123456")]
    pub code: String,
}

#[derive(FromRow)]
pub struct UserSql {
    pub id: u64,
    pub login_id: String,
    pub password: String,
    pub name: String,
    pub role_id: u8,
    pub linked_user_id: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub sub: String,
    pub role: u8, // role id
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
    /// For parents, the student user they supervise
    pub linked_user_id: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}
