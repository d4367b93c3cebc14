//! Chain POS - order lifecycle and board synchronization core.
//!
//! The order-management backbone of a point-of-sale system for a small
//! restaurant/delivery chain. Persistence lives in a hosted Supabase project
//! reached over PostgREST; this crate owns the session's canonical in-memory
//! order list, the write-through update protocol, the kanban/list board
//! projections with optimistic drag moves, and the management-dashboard
//! aggregation, plus the customer/store directories and the translation
//! cache the screens are built on.

use serde_json::Value;

pub mod api;
pub mod app;
pub mod board;
pub mod customers;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod orders;
pub mod remote;
pub mod storage;
pub mod stores;
pub mod translations;
pub mod types;
pub mod watch;

pub use error::{PosError, Result};

// ---------------------------------------------------------------------------
// Lenient JSON field helpers
//
// Rows written by older clients are inconsistent about types (numbers as
// strings, booleans as 0/1/"true"). These helpers normalize reads.
// ---------------------------------------------------------------------------

pub(crate) fn value_str(v: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = v.get(*key).and_then(|x| x.as_str()) {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

pub(crate) fn value_f64(v: &Value, keys: &[&str]) -> Option<f64> {
    for key in keys {
        if let Some(field) = v.get(*key) {
            if let Some(n) = field.as_f64() {
                return Some(n);
            }
            if let Some(parsed) = field.as_str().and_then(|s| s.trim().parse::<f64>().ok()) {
                return Some(parsed);
            }
        }
    }
    None
}

pub(crate) fn value_bool(v: &Value, keys: &[&str]) -> Option<bool> {
    for key in keys {
        if let Some(field) = v.get(*key) {
            if let Some(flag) = field.as_bool() {
                return Some(flag);
            }
            if let Some(flag) = field.as_i64() {
                return Some(flag == 1);
            }
            if let Some(flag) = field.as_str() {
                let normalized = flag.trim().to_ascii_lowercase();
                if matches!(normalized.as_str(), "true" | "1" | "yes" | "on") {
                    return Some(true);
                }
                if matches!(normalized.as_str(), "false" | "0" | "no" | "off") {
                    return Some(false);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_str_skips_blank_fields_and_tries_aliases() {
        let v = serde_json::json!({ "name": "  ", "fullName": " Ava " });
        assert_eq!(value_str(&v, &["name", "fullName"]).as_deref(), Some("Ava"));
        assert_eq!(value_str(&v, &["missing"]), None);
    }

    #[test]
    fn value_f64_accepts_numbers_and_numeric_strings() {
        let v = serde_json::json!({ "a": 1.5, "b": "2.25", "c": "oops" });
        assert_eq!(value_f64(&v, &["a"]), Some(1.5));
        assert_eq!(value_f64(&v, &["b"]), Some(2.25));
        assert_eq!(value_f64(&v, &["c"]), None);
    }

    #[test]
    fn value_bool_accepts_every_legacy_encoding() {
        let v = serde_json::json!({ "a": true, "b": 1, "c": "Yes", "d": "off", "e": "maybe" });
        assert_eq!(value_bool(&v, &["a"]), Some(true));
        assert_eq!(value_bool(&v, &["b"]), Some(true));
        assert_eq!(value_bool(&v, &["c"]), Some(true));
        assert_eq!(value_bool(&v, &["d"]), Some(false));
        assert_eq!(value_bool(&v, &["e"]), None);
    }
}
