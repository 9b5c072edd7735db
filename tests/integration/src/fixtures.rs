//! Test data builders

use pulse_common::TokenVerifier;
use pulse_core::UserId;

/// Signing secret shared between the test server and issued tokens
pub const TEST_JWT_SECRET: &str = "integration-test-secret";

/// A user with a token the test server accepts
pub struct TestUser {
    pub user_id: UserId,
    pub username: String,
    pub token: String,
}

/// Mint a user with a valid one-hour token
pub fn test_user(username: &str) -> TestUser {
    let user_id = UserId::generate();
    let token = TokenVerifier::new(TEST_JWT_SECRET)
        .issue(user_id, username, 3600)
        .expect("token issuance");

    TestUser {
        user_id,
        username: username.to_string(),
        token,
    }
}

/// Mint a token that expired well past any validation leeway
pub fn expired_token() -> String {
    TokenVerifier::new(TEST_JWT_SECRET)
        .issue(UserId::generate(), "lapsed", -120)
        .expect("token issuance")
}
