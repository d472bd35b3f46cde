use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::ApiError;
use crate::model::role::Role;
use crate::models::TokenType;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub employee_id: u64,
    pub employee_code: String,
    pub role: Role,
}

impl AuthUser {
    /// Decode a bearer access token into the caller.
    pub fn from_token(token: &str, secret: &str) -> Result<Self, ApiError> {
        let claims = verify_token(token, secret)
            .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;

        if claims.token_type != TokenType::Access {
            return Err(ApiError::unauthorized("Access token required"));
        }

        let role =
            Role::from_id(claims.role).ok_or_else(|| ApiError::unauthorized("Invalid role"))?;

        Ok(AuthUser {
            employee_id: claims.employee_id,
            employee_code: claims.sub,
            role,
        })
    }
}

pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // the auth middleware already decoded the token for protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match bearer_token(req) {
            Some(t) => t,
            None => return ready(Err(ApiError::unauthorized("Missing token").into())),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => return ready(Err(ApiError::Internal.into())),
        };

        ready(AuthUser::from_token(token, &config.jwt_secret).map_err(Into::into))
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

    pub fn require_hr_or_admin(&self) -> Result<(), ApiError> {
        if self.is_hr_or_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("HR/Admin only"))
        }
    }

    /// Employees may act on their own records; HR and admins on anyone's.
    pub fn require_self_or_hr(&self, employee_id: u64) -> Result<(), ApiError> {
        if self.employee_id == employee_id || self.is_hr_or_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Not allowed to access another employee's records"))
        }
    }

    pub fn is_hr_or_admin(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Hr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            employee_id: 5,
            employee_code: "EMP-005".into(),
            role,
        }
    }

    #[test]
    fn employee_can_only_reach_own_records() {
        let emp = user(Role::Employee);
        assert!(emp.require_self_or_hr(5).is_ok());
        assert!(emp.require_self_or_hr(6).is_err());
        assert!(emp.require_hr_or_admin().is_err());
    }

    #[test]
    fn hr_is_not_admin() {
        let hr = user(Role::Hr);
        assert!(hr.require_hr_or_admin().is_ok());
        assert!(hr.require_self_or_hr(99).is_ok());
        assert!(hr.require_admin().is_err());
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let (token, _) =
            crate::auth::jwt::generate_refresh_token(5, "EMP-005".into(), 3, "k", 60).unwrap();
        assert!(AuthUser::from_token(&token, "k").is_err());
    }
}
