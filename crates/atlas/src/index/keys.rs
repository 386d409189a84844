//! Bucket functions mapping record attributes to folder keys.
//!
//! Every function here is pure: the same input always lands in the same
//! folder, which is what makes re-adding or re-deleting a record safe.

use crate::folder::FolderKey;

pub use crate::sky::grid::position_key;

/// Longest alphabetic prefix kept as the first name component.
const MAX_PREFIX_LEN: usize = 16;

/// Folder key for a catalog designation or free-form name.
///
/// The name is upper-cased, whitespace is dropped and any character that is
/// not an ASCII letter or digit becomes `_`. The key is then the leading run
/// of letters (or `_` when there is none), followed by the first character
/// and the first two characters of what remains.
///
/// # Examples
///
/// ```rust,ignore
/// assert_eq!(name_key("HD 12345").to_string(), "HD/1/12");
/// assert_eq!(name_key("Vega").to_string(), "VEGA");
/// assert_eq!(name_key("M31").to_string(), "M/3/31");
/// ```
pub fn name_key(name: &str) -> FolderKey {
    let normalized: String = name
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();

    let letters = normalized
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(normalized.len());
    let (prefix, rest) = normalized.split_at(letters);

    let mut components = Vec::with_capacity(3);
    if prefix.is_empty() {
        components.push("_".to_string());
    } else {
        components.push(prefix[..prefix.len().min(MAX_PREFIX_LEN)].to_string());
    }
    if !rest.is_empty() {
        components.push(rest[..1].to_string());
    }
    if rest.len() >= 2 {
        components.push(rest[..2].to_string());
    }
    FolderKey::new(components)
}

/// Folder key `[yyyy, mm, dd]` of the UTC day containing `unix_seconds`.
pub fn date_key(unix_seconds: i64) -> FolderKey {
    let (days, _) = div_floor(unix_seconds, 86_400);
    let (year, month, day) = civil_from_days(days);
    day_key(year, month, day)
}

/// Folder key `[yyyy, mm, dd]` for a calendar day.
pub fn day_key(year: i32, month: u32, day: u32) -> FolderKey {
    FolderKey::new(vec![
        format!("{year:04}"),
        format!("{month:02}"),
        format!("{day:02}"),
    ])
}

fn div_floor(value: i64, divisor: i64) -> (i64, i64) {
    let mut quotient = value / divisor;
    let mut remainder = value % divisor;
    if remainder < 0 {
        quotient -= 1;
        remainder += divisor;
    }
    (quotient, remainder)
}

/// Proleptic Gregorian date of the day `days` after 1970-01-01.
fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let shifted = days + 719_468;
    let (era, day_of_era) = div_floor(shifted, 146_097);
    let year_of_era =
        (day_of_era - day_of_era / 1_460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let month_index = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * month_index + 2) / 5 + 1;
    let month = if month_index < 10 {
        month_index + 3
    } else {
        month_index - 9
    };
    let year = year_of_era + era * 400 + i64::from(month <= 2);
    (year as i32, month as u32, day as u32)
}
