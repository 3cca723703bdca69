//! Login name generation for collision retries.

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::protocol_constants::LOGIN_SUFFIX_LEN;

/// Returns `base` followed by a dash and a random alphanumeric suffix.
///
/// The result always differs from `base`, so a retry never reuses the name
/// that just collided.
pub fn randomized_login(base: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(LOGIN_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{}-{}", base, suffix)
}
