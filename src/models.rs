use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "29001011234567")]
    pub national_id: String,
}

#[derive(FromRow)]
pub struct LoginRow {
    pub id: u64, // BIGINT UNSIGNED
    pub employee_code: String,
    pub national_id_hash: String,
    pub role: u8,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub employee_id: u64,
    pub sub: String, // employee code
    pub role: u8,
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}
