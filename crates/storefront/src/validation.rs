//! Field validators shared by forms, the cart and checkout.
//!
//! Each validator returns the user-facing message on failure so results can
//! be collected into [`ValidationErrors`](crate::error::ValidationErrors).
//! Nothing here touches the network.

use std::sync::LazyLock;

use bookshop_core::Email;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use rust_decimal::Decimal;

/// Upper bound on any single line's quantity, whatever the stock.
pub const MAX_QUANTITY: u32 = 999;

static ZIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("Invalid regex"));

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?1?[-.\s]?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}$")
        .expect("Invalid regex")
});

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("Invalid regex"));

static PASSWORD_SPECIAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[!@#$%^&*()_+\-=\[\]{};':"\\|,.<>?]"#).expect("Invalid regex")
});

fn digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

// =============================================================================
// Quantity
// =============================================================================

/// The largest quantity allowed for a book: `min(stock, 999)`, or 999 when
/// stock is unknown.
#[must_use]
pub fn max_quantity(stock: Option<u32>) -> u32 {
    stock.map_or(MAX_QUANTITY, |stock| stock.min(MAX_QUANTITY))
}

/// Validate a requested quantity against the combined cap.
///
/// # Errors
///
/// Returns the message to show next to the quantity field.
pub fn quantity(requested: i64, stock: Option<u32>) -> Result<u32, String> {
    if requested < 1 {
        return Err("Quantity must be at least 1".to_string());
    }
    if requested > i64::from(MAX_QUANTITY) {
        return Err(format!("Quantity cannot exceed {MAX_QUANTITY}"));
    }
    match stock {
        Some(0) => Err("This book is currently out of stock".to_string()),
        Some(stock) if requested > i64::from(stock) => {
            Err(format!("Only {stock} items available in stock"))
        }
        // Bounded by MAX_QUANTITY above.
        _ => Ok(u32::try_from(requested).unwrap_or(MAX_QUANTITY)),
    }
}

/// Pull an edited quantity back into `1..=max_quantity(stock)`.
#[must_use]
pub fn clamp_quantity(requested: i64, stock: Option<u32>) -> u32 {
    let max = i64::from(max_quantity(stock).max(1));
    u32::try_from(requested.clamp(1, max)).unwrap_or(1)
}

// =============================================================================
// Text fields
// =============================================================================

/// Non-empty after trimming.
///
/// # Errors
///
/// Returns `"{label} is required"`.
pub fn required(value: &str, label: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{label} is required"))
    } else {
        Ok(())
    }
}

/// A person's name: 2 to 50 characters after trimming.
///
/// # Errors
///
/// Returns a message naming `label`.
pub fn name(value: &str, label: &str) -> Result<(), String> {
    required(value, label)?;
    match value.trim().chars().count() {
        0..2 => Err(format!("{label} must be at least 2 characters long")),
        51.. => Err(format!("{label} is too long (max 50 characters)")),
        _ => Ok(()),
    }
}

/// A street address: 5 to 200 characters after trimming.
///
/// # Errors
///
/// Returns the message for the address field.
pub fn address(value: &str) -> Result<(), String> {
    required(value, "Address")?;
    match value.trim().chars().count() {
        0..5 => Err("Address must be at least 5 characters long".to_string()),
        201.. => Err("Address is too long (max 200 characters)".to_string()),
        _ => Ok(()),
    }
}

/// An email address.
///
/// # Errors
///
/// Returns the parse failure's message.
pub fn email(value: &str) -> Result<Email, String> {
    Email::parse(value).map_err(|e| e.to_string())
}

/// A US ZIP code: `12345` or `12345-6789`.
///
/// # Errors
///
/// Returns the message for the ZIP field.
pub fn zip_code(value: &str) -> Result<(), String> {
    required(value, "ZIP code")?;
    if ZIP_RE.is_match(value.trim()) {
        Ok(())
    } else {
        Err("Please enter a valid ZIP code (e.g., 12345 or 12345-6789)".to_string())
    }
}

/// A US phone number: 10 digits in any common notation.
///
/// # Errors
///
/// Returns the message for the phone field.
pub fn phone(value: &str) -> Result<(), String> {
    required(value, "Phone number")?;
    if digits(value).len() != 10 {
        return Err("Phone number must be exactly 10 digits".to_string());
    }
    if PHONE_RE.is_match(value.trim()) {
        Ok(())
    } else {
        Err("Please enter a valid phone number (e.g., (555) 123-4567)".to_string())
    }
}

/// A username: 3 to 50 letters, digits, `_` or `-`.
///
/// # Errors
///
/// Returns the message for the username field.
pub fn username(value: &str) -> Result<(), String> {
    required(value, "Username")?;
    let trimmed = value.trim();
    match trimmed.chars().count() {
        0..3 => Err("Username must be at least 3 characters long".to_string()),
        51.. => Err("Username is too long (max 50 characters)".to_string()),
        _ if !USERNAME_RE.is_match(trimmed) => Err(
            "Username can only contain letters, numbers, underscores, and hyphens".to_string(),
        ),
        _ => Ok(()),
    }
}

/// A password: 8 to 128 characters with upper, lower, digit and symbol.
///
/// # Errors
///
/// Returns the first unmet rule.
pub fn password(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("Password is required".to_string());
    }
    let len = value.chars().count();
    if len < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }
    if len > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }
    if !value.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("Password must contain at least one uppercase letter".to_string());
    }
    if !value.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("Password must contain at least one lowercase letter".to_string());
    }
    if !value.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one number".to_string());
    }
    if !PASSWORD_SPECIAL_RE.is_match(value) {
        return Err("Password must contain at least one special character".to_string());
    }
    Ok(())
}

// =============================================================================
// Catalog
// =============================================================================

/// Highest price a book may be listed at.
pub const MAX_BOOK_PRICE: Decimal = Decimal::from_parts(999_999, 0, 0, false, 2);

/// A book title: 1 to 200 characters after trimming.
///
/// # Errors
///
/// Returns the message for the title field.
pub fn book_title(value: &str) -> Result<(), String> {
    required(value, "Book title")?;
    if value.trim().chars().count() > 200 {
        return Err("Book title is too long (max 200 characters)".to_string());
    }
    Ok(())
}

/// A list price: `0.00..=9999.99` with at most two decimals.
///
/// # Errors
///
/// Returns the message for the price field.
pub fn price(value: Decimal) -> Result<(), String> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err("Price must be at least $0".to_string());
    }
    if value > MAX_BOOK_PRICE {
        return Err("Price cannot exceed $9,999.99".to_string());
    }
    if value.normalize().scale() > 2 {
        return Err("Price can have at most 2 decimal places".to_string());
    }
    Ok(())
}

/// Units in stock; never negative.
///
/// # Errors
///
/// Returns the message for the stock field.
pub fn stock(value: i64) -> Result<(), String> {
    if value < 0 {
        Err("Stock quantity cannot be negative".to_string())
    } else {
        Ok(())
    }
}

/// An ISBN-10 or ISBN-13; hyphens and spaces are ignored.
///
/// # Errors
///
/// Returns the message for the ISBN field.
pub fn isbn(value: &str) -> Result<(), String> {
    let clean: String = value
        .chars()
        .filter(|c| !matches!(c, '-' | ' '))
        .collect();
    if clean.is_empty() {
        return Err("ISBN is required".to_string());
    }
    let valid = match clean.len() {
        10 => {
            let (body, check) = clean.split_at(9);
            body.bytes().all(|b| b.is_ascii_digit())
                && check.bytes().all(|b| b.is_ascii_digit() || b == b'X')
        }
        13 => clean.bytes().all(|b| b.is_ascii_digit()),
        _ => return Err("ISBN must be 10 or 13 characters long".to_string()),
    };
    if valid {
        Ok(())
    } else {
        Err(format!("Invalid ISBN-{} format", clean.len()))
    }
}

/// A publication year between 1000 and five years after `today`.
///
/// # Errors
///
/// Returns the message for the publish year field.
pub fn publish_year(year: i32, today: NaiveDate) -> Result<(), String> {
    if (1000..=today.year() + 5).contains(&year) {
        Ok(())
    } else {
        Err("Please enter a valid publish year".to_string())
    }
}

// =============================================================================
// Payment card
// =============================================================================

/// A 16-digit card number; spaces and dashes are ignored.
///
/// Returns the bare digits.
///
/// # Errors
///
/// Returns the message for the card number field.
pub fn card_number(value: &str) -> Result<String, String> {
    let clean = digits(value);
    if value.trim().is_empty() || clean.is_empty() {
        return Err("Credit card number is required".to_string());
    }
    if clean.len() != 16 {
        return Err("Credit card number must be exactly 16 digits".to_string());
    }
    Ok(clean)
}

/// Luhn checksum over the digits of `number`.
#[must_use]
pub fn luhn_checksum_valid(number: &str) -> bool {
    let clean = digits(number);
    if clean.is_empty() {
        return false;
    }
    let sum: u32 = clean
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                digit
            }
        })
        .sum();
    sum % 10 == 0
}

/// A card expiry in `MM/YY` form, checked against `today`.
///
/// The current month is still valid; more than 20 years ahead is not.
/// Returns `(month, full year)`.
///
/// # Errors
///
/// Returns the message for the expiry field.
pub fn expiry(value: &str, today: NaiveDate) -> Result<(u32, i32), String> {
    if value.trim().is_empty() {
        return Err("Expiry date is required".to_string());
    }
    let clean = digits(value);
    if clean.len() != 4 {
        return Err("Expiry date must be in MM/YY format".to_string());
    }
    let (mm, yy) = clean.split_at(2);
    let month: u32 = mm
        .parse()
        .map_err(|_| "Invalid expiration date format".to_string())?;
    let year: i32 = yy
        .parse::<i32>()
        .map_err(|_| "Invalid expiration date format".to_string())?
        + 2000;

    if !(1..=12).contains(&month) {
        return Err("Month must be between 1 and 12".to_string());
    }
    if (year, month) < (today.year(), today.month()) {
        return Err("Card has expired".to_string());
    }
    if year > today.year() + 20 {
        return Err("Expiration year is too far in the future".to_string());
    }
    Ok((month, year))
}

/// A 3 or 4 digit security code.
///
/// # Errors
///
/// Returns the message for the CVV field.
pub fn cvv(value: &str) -> Result<(), String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("CVV is required".to_string());
    }
    if !(3..=4).contains(&trimmed.len()) || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err("CVV must be 3 or 4 digits".to_string());
    }
    Ok(())
}

// =============================================================================
// Formatting
// =============================================================================

/// Group up to 16 digits in fours: `4242 4242 4242 4242`.
#[must_use]
pub fn format_card_number(value: &str) -> String {
    let clean: String = digits(value).chars().take(16).collect();
    clean
        .as_bytes()
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `(XXX) XXX-XXXX`, formatting as much as has been typed.
#[must_use]
pub fn format_phone(value: &str) -> String {
    let clean: String = digits(value).chars().take(10).collect();
    if clean.len() < 3 {
        return clean;
    }
    let (area, rest) = clean.split_at(3);
    if rest.len() < 3 {
        return format!("({area}) {rest}");
    }
    let (exchange, line) = rest.split_at(3);
    format!("({area}) {exchange}-{line}")
}

/// `MM/YY` from whatever digits were typed.
#[must_use]
pub fn format_expiry(value: &str) -> String {
    let clean: String = digits(value).chars().take(4).collect();
    if clean.len() < 2 {
        return clean;
    }
    let (month, year) = clean.split_at(2);
    format!("{month}/{year}")
}
