use regex::Regex;
use std::sync::OnceLock;

pub const MIN_PASSWORD_LENGTH: usize = 6;

fn email_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Regex should compile"))
}

fn accountname_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_.]+$").expect("Regex should compile"))
}

/// `local@domain.tld` shape: no whitespace or `@` in either part, and a dot
/// somewhere after the `@`.
pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// ASCII letters, digits, `_` and `.` only; at least one character.
pub fn is_valid_accountname(accountname: &str) -> bool {
    accountname_regex().is_match(accountname)
}

pub fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}
