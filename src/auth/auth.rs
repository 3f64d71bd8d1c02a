use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::ApiError;
use crate::model::role::Role;
use crate::models::TokenType;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub login_id: String,
    pub role: Role,

    /// For parents, the student user they supervise
    pub linked_user_id: Option<u64>,
}

/// Validates a raw `Authorization` header value and builds the caller.
pub fn authenticate(header: Option<&str>, secret: &str) -> Result<AuthUser, &'static str> {
    let header = header.ok_or("Missing Authorization header")?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or("Authorization header must start with Bearer")?;

    let claims = verify_token(token, secret).map_err(|_| "Invalid or expired token")?;

    if claims.token_type != TokenType::Access {
        return Err("Access token required");
    }

    let role = Role::from_id(claims.role).ok_or("Invalid role")?;

    Ok(AuthUser {
        user_id: claims.user_id,
        login_id: claims.sub,
        role,
        linked_user_id: claims.linked_user_id,
    })
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Set by the auth middleware on protected scopes.
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                tracing::error!("Config missing from app data");
                return ready(Err(ApiError::Internal));
            }
        };

        let header = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok());

        ready(authenticate(header, &config.jwt_secret).map_err(ApiError::unauthorized))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin only"))
        }
    }

    pub fn require_student(&self) -> Result<(), ApiError> {
        if self.role == Role::Student {
            Ok(())
        } else {
            Err(ApiError::forbidden("Students only"))
        }
    }

    /// Admins see everyone, students themselves, parents their linked student.
    pub fn can_access(&self, user_id: u64) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Student => self.user_id == user_id,
            Role::Parent => self.linked_user_id == Some(user_id),
        }
    }

    pub fn require_access_to(&self, user_id: u64) -> Result<(), ApiError> {
        if self.can_access(user_id) {
            Ok(())
        } else {
            Err(ApiError::forbidden("Not allowed to view this user's records"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};

    const SECRET: &str = "test-secret";

    fn user(role: Role, user_id: u64, linked: Option<u64>) -> AuthUser {
        AuthUser {
            user_id,
            login_id: "someone".into(),
            role,
            linked_user_id: linked,
        }
    }

    #[test]
    fn access_rules_per_role() {
        assert!(user(Role::Admin, 1, None).can_access(99));
        assert!(user(Role::Student, 7, None).can_access(7));
        assert!(!user(Role::Student, 7, None).can_access(8));
        assert!(user(Role::Parent, 3, Some(7)).can_access(7));
        assert!(!user(Role::Parent, 3, Some(7)).can_access(3));
        assert!(!user(Role::Parent, 3, None).can_access(7));
    }

    #[test]
    fn role_guards() {
        assert!(user(Role::Admin, 1, None).require_admin().is_ok());
        assert!(user(Role::Parent, 1, None).require_admin().is_err());
        assert!(user(Role::Student, 1, None).require_student().is_ok());
        assert!(user(Role::Admin, 1, None).require_student().is_err());
    }

    #[test]
    fn authenticate_accepts_access_tokens_only() {
        let access = generate_access_token(7, "kid".into(), 3, None, SECRET, 900).unwrap();
        let header = format!("Bearer {}", access);
        let caller = authenticate(Some(header.as_str()), SECRET).unwrap();
        assert_eq!(caller.user_id, 7);
        assert_eq!(caller.role, Role::Student);

        let (refresh, _) = generate_refresh_token(7, "kid".into(), 3, None, SECRET, 900).unwrap();
        let header = format!("Bearer {}", refresh);
        assert_eq!(authenticate(Some(header.as_str()), SECRET).unwrap_err(), "Access token required");

        assert!(authenticate(None, SECRET).is_err());
        assert!(authenticate(Some(access.as_str()), SECRET).is_err());
    }
}
