//! Address and phone formatting for dispatcher action links.
//!
//! Both functions are total: any input string yields a well-formed URL/URI.

/// Base URL for a map search; the encoded address is appended as the query.
pub const MAP_SEARCH_BASE: &str = "https://www.google.com/maps/search/?api=1&query=";

/// Query used when the address is blank.
pub const EMPTY_ADDRESS_QUERY: &str = "台灣";

/// Dial URI used when the phone string contains no digits.
pub const DIAL_PLACEHOLDER: &str = "tel:0000000000";

/// Collapse every whitespace run (newlines included) to a single space and trim.
pub fn normalize_address(address: &str) -> String {
    address.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build a map-search URL for a free-text address.
pub fn to_map_url(address: &str) -> String {
    let normalized = normalize_address(address);
    let query = if normalized.is_empty() {
        EMPTY_ADDRESS_QUERY
    } else {
        normalized.as_str()
    };
    format!("{MAP_SEARCH_BASE}{}", urlencoding::encode(query))
}

/// Keep only the digits of a phone string, in order, as ASCII.
///
/// Full-width digits (U+FF10..U+FF19) from CJK input methods count as digits.
pub fn phone_digits(phone: &str) -> String {
    phone.chars().filter_map(ascii_digit).collect()
}

fn ascii_digit(c: char) -> Option<char> {
    match c {
        '0'..='9' => Some(c),
        '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32),
        _ => None,
    }
}

/// Build a `tel:` URI from a phone string with arbitrary separators.
pub fn to_dial_uri(phone: &str) -> String {
    let digits = phone_digits(phone);
    if digits.is_empty() {
        DIAL_PLACEHOLDER.to_string()
    } else {
        format!("tel:{digits}")
    }
}
