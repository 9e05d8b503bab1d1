//! Random usernames, passwords and device labels for throwaway identities.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

use crate::app::errors::ProvisionError;

/// Length of every generated password.
pub const PASSWORD_LENGTH: usize = 25;

/// Symbols a generated password may contain; at least one is always present.
pub const PASSWORD_SYMBOLS: &str = "%&.!-";

/// Upper bound on rejection-sampling attempts before giving up.
pub const MAX_PASSWORD_ATTEMPTS: usize = 64;

const LETTERS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";

static PASSWORD_ALPHABET: Lazy<Vec<char>> = Lazy::new(|| {
    LETTERS
        .chars()
        .chain(DIGITS.chars())
        .chain(PASSWORD_SYMBOLS.chars())
        .collect()
});

static USERNAME_ALPHABET: Lazy<Vec<char>> =
    Lazy::new(|| LETTERS.chars().chain(DIGITS.chars()).collect());

static HAS_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").expect("valid regex"));
static HAS_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zA-Z]").expect("valid regex"));
static HAS_SYMBOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[%&.!\-]").expect("valid regex"));

/// How usernames are formed: `<prefix><random alphanumerics>@<domain>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingPolicy {
    /// Local-part prefix, e.g. `testuser+`.
    pub prefix: String,
    /// Number of random alphanumerics after the prefix.
    pub random_len: usize,
    /// Email domain.
    pub domain: String,
}

impl Default for NamingPolicy {
    fn default() -> Self {
        Self {
            prefix: "testuser+".to_string(),
            random_len: 5,
            domain: "test.com".to_string(),
        }
    }
}

impl NamingPolicy {
    /// Generate a username using the thread-local RNG.
    pub fn generate_username(&self) -> String {
        self.generate_username_with(&mut rand::thread_rng())
    }

    /// Generate a username from the given RNG.
    pub fn generate_username_with<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let local: String = sample(rng, &USERNAME_ALPHABET, self.random_len);
        format!("{}{}@{}", self.prefix, local, self.domain)
    }
}

/// Whether a candidate meets the composition policy: fixed length, at least
/// one digit, one ASCII letter and one allowed symbol.
pub fn satisfies_password_policy(candidate: &str) -> bool {
    candidate.chars().count() == PASSWORD_LENGTH
        && HAS_DIGIT.is_match(candidate)
        && HAS_LETTER.is_match(candidate)
        && HAS_SYMBOL.is_match(candidate)
}

/// Generate a policy-compliant password using the thread-local RNG.
pub fn generate_password() -> Result<String, ProvisionError> {
    generate_password_with(&mut rand::thread_rng(), MAX_PASSWORD_ATTEMPTS)
}

/// Rejection-sample a policy-compliant password, giving up after
/// `max_attempts` candidates.
pub fn generate_password_with<R: Rng + ?Sized>(
    rng: &mut R,
    max_attempts: usize,
) -> Result<String, ProvisionError> {
    for attempt in 1..=max_attempts {
        let candidate = sample(rng, &PASSWORD_ALPHABET, PASSWORD_LENGTH);
        if satisfies_password_policy(&candidate) {
            if attempt > 1 {
                trace_trace!("Password accepted after {} candidates", attempt);
            }
            return Ok(candidate);
        }
    }

    Err(ProvisionError::PasswordGeneration {
        attempts: max_attempts,
    })
}

/// Ten random ASCII letters, used as the MFA device's friendly name.
pub fn generate_device_label() -> String {
    let letters: Vec<char> = LETTERS.chars().collect();
    sample(&mut rand::thread_rng(), &letters, 10)
}

fn sample<R: Rng + ?Sized>(rng: &mut R, alphabet: &[char], len: usize) -> String {
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_passwords_always_satisfy_policy() {
        for _ in 0..10_000 {
            let password = generate_password().unwrap();
            assert_eq!(password.len(), PASSWORD_LENGTH);
            assert!(password.chars().any(|c| c.is_ascii_digit()), "{password}");
            assert!(password.chars().any(|c| c.is_ascii_alphabetic()), "{password}");
            assert!(
                password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)),
                "{password}"
            );
            assert!(password
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SYMBOLS.contains(c)));
        }
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let first = generate_password_with(&mut StdRng::seed_from_u64(7), 8).unwrap();
        let second = generate_password_with(&mut StdRng::seed_from_u64(7), 8).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_degenerate_rng_exhausts_attempts() {
        // A constant RNG always picks the first alphabet entry: 25 x 'a'
        let mut rng = StepRng::new(0, 0);
        let err = generate_password_with(&mut rng, 5).unwrap_err();
        assert!(matches!(err, ProvisionError::PasswordGeneration { attempts: 5 }));
    }

    #[test]
    fn test_policy_rejects_incomplete_candidates() {
        assert!(!satisfies_password_policy("abcdefghijklmnopqrstuvwxy"));
        assert!(!satisfies_password_policy("abcdefghijklmnopqrstuvwx1"));
        assert!(!satisfies_password_policy("1234567890123456789012%!."));
        assert!(!satisfies_password_policy("short1!"));
        assert!(satisfies_password_policy("abcdefghijklmnopqrstuvw1!"));
    }

    #[test]
    fn test_username_shape() {
        let policy = NamingPolicy::default();
        let username = policy.generate_username();
        assert!(username.starts_with("testuser+"));
        assert!(username.ends_with("@test.com"));
        let local = &username["testuser+".len()..username.len() - "@test.com".len()];
        assert_eq!(local.len(), 5);
        assert!(local.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_custom_naming_policy() {
        let policy = NamingPolicy {
            prefix: "ci-".to_string(),
            random_len: 8,
            domain: "example.org".to_string(),
        };
        let username = policy.generate_username_with(&mut StdRng::seed_from_u64(1));
        assert!(username.starts_with("ci-"));
        assert!(username.ends_with("@example.org"));
        assert_eq!(username.len(), "ci-".len() + 8 + "@example.org".len());
    }

    #[test]
    fn test_device_label() {
        let label = generate_device_label();
        assert_eq!(label.len(), 10);
        assert!(label.chars().all(|c| c.is_ascii_alphabetic()));
    }
}
