/// Authentication
///
/// - `password`: Argon2id hashing behind the `PasswordHasher` trait
/// - `jwt`: HS256 token signing and validation
/// - `session`: token issuance and verification against live user state

pub mod jwt;
pub mod password;
pub mod session;
