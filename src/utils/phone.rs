use once_cell::sync::Lazy;
use regex::Regex;

/// Korean mobile numbers: 01X followed by 7 or 8 digits.
static MOBILE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^01[0-9]{8,9}$").expect("valid mobile number pattern"));

/// Strips everything but digits (`010-1234-5678` -> `01012345678`).
pub fn normalize(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub fn is_valid(phone: &str) -> bool {
    MOBILE_NUMBER.is_match(&normalize(phone))
}
