use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// National IDs are stored hashed; digits only, so spaces and dashes are dropped first.
pub fn normalize_national_id(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub fn hash_national_id(national_id: &str) -> Result<String, argon2::password_hash::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    Ok(argon2
        .hash_password(normalize_national_id(national_id).as_bytes(), &salt)?
        .to_string())
}

pub fn verify_national_id(
    national_id: &str,
    hashed: &str,
) -> Result<(), argon2::password_hash::Error> {
    let argon2 = Argon2::default();
    let parsed = PasswordHash::new(hashed)?;

    argon2.verify_password(normalize_national_id(national_id).as_bytes(), &parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hashed = hash_national_id("29001011234567").unwrap();
        assert!(verify_national_id("2900-101-1234567", &hashed).is_ok());
        assert!(verify_national_id("29001011234568", &hashed).is_err());
    }

    #[test]
    fn garbage_hash_is_an_error_not_a_panic() {
        assert!(verify_national_id("1", "not-a-phc-string").is_err());
    }
}
