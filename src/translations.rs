//! Translation service and in-memory cache.
//!
//! UI strings live in the hosted `language_setup` table keyed by
//! `section.key` names. The cache resolves database strings first, then a
//! small built-in table so the screens stay usable while translations load
//! (or when the project has none for a language), and finally falls back to
//! the key itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use crate::api::SupabaseClient;
use crate::error::{PosError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub id: String,
    pub key_name: String,
    pub language_code: String,
    pub translated_text: String,
    #[serde(default)]
    pub group_category: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Fields for a new translation row; the id and timestamps are assigned by
/// the hosted store.
#[derive(Debug, Clone, Serialize)]
pub struct NewTranslation {
    pub key_name: String,
    pub language_code: String,
    pub translated_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub code: String,
    pub name: String,
    pub native_name: String,
    pub is_rtl: bool,
    pub is_active: bool,
}

/// The languages every deployment starts with, also used when the language
/// table cannot be reached.
pub fn default_languages() -> Vec<LanguageConfig> {
    vec![
        LanguageConfig {
            code: "en".into(),
            name: "English".into(),
            native_name: "English".into(),
            is_rtl: false,
            is_active: true,
        },
        LanguageConfig {
            code: "ar".into(),
            name: "Arabic".into(),
            native_name: "العربية".into(),
            is_rtl: true,
            is_active: true,
        },
    ]
}

// ---------------------------------------------------------------------------
// Built-in fallback strings
// ---------------------------------------------------------------------------

const FALLBACK_EN: &[(&str, &str)] = &[
    ("app.dashboard", "Dashboard"),
    ("app.newOrder", "New Order"),
    ("app.loading", "Loading..."),
    ("app.save", "Save"),
    ("app.cancel", "Cancel"),
    ("index.noOrders", "No orders"),
    ("index.ordersTotal", "{count} orders total"),
    ("management.title", "Management Dashboard"),
    ("management.totalOrders", "Total Orders"),
    ("management.openOrders", "Open Orders"),
    ("management.deliveredOrders", "Delivered Orders"),
    ("management.totalRevenue", "Total Revenue"),
    ("status.orderReceived", "Order Received"),
    ("status.storeReceived", "Store Received"),
];

const FALLBACK_AR: &[(&str, &str)] = &[
    ("app.dashboard", "لوحة التحكم"),
    ("app.newOrder", "طلب جديد"),
    ("app.loading", "جاري التحميل..."),
    ("app.save", "حفظ"),
    ("app.cancel", "إلغاء"),
    ("index.noOrders", "لا توجد طلبات"),
    ("index.ordersTotal", "{count} طلب إجمالي"),
    ("management.title", "لوحة الإدارة"),
    ("status.orderReceived", "تم استلام الطلب"),
    ("status.storeReceived", "تم استلام المتجر"),
];

fn builtin_fallback(language: &str, key: &str) -> Option<&'static str> {
    let table = match language {
        "en" => FALLBACK_EN,
        "ar" => FALLBACK_AR,
        _ => return None,
    };
    table
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, text)| *text)
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Per-language key/text map resolved database-first.
#[derive(Debug, Clone, Default)]
pub struct TranslationCache {
    language: String,
    entries: HashMap<String, String>,
}

impl TranslationCache {
    pub fn new(language: impl Into<String>, entries: HashMap<String, String>) -> Self {
        Self {
            language: language.into(),
            entries,
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Resolve a key: database strings win, the built-in table fills gaps,
    /// and an unknown key renders as itself so missing strings are visible
    /// rather than blank. `{name}` placeholders are substituted from `vars`.
    pub fn translate(&self, key: &str, vars: &[(&str, &str)]) -> String {
        let mut value = self
            .entries
            .get(key)
            .map(String::as_str)
            .or_else(|| builtin_fallback(&self.language, key))
            .unwrap_or(key)
            .to_string();
        for (name, replacement) in vars {
            value = value.replace(&format!("{{{name}}}"), replacement);
        }
        value
    }
}

/// Group a key/text map by the key prefix before the first dot; keys without
/// a prefix land in "general".
pub fn group_by_category(
    entries: &HashMap<String, String>,
) -> HashMap<String, HashMap<String, String>> {
    let mut grouped: HashMap<String, HashMap<String, String>> = HashMap::new();
    for (key, text) in entries {
        let category = match key.split_once('.') {
            Some((prefix, _)) => prefix.to_string(),
            None => "general".to_string(),
        };
        grouped
            .entry(category)
            .or_default()
            .insert(key.clone(), text.clone());
    }
    grouped
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct TranslationService {
    api: SupabaseClient,
}

impl TranslationService {
    pub fn new(api: SupabaseClient) -> Self {
        Self { api }
    }

    /// Active languages, ordered by name. Falls back to the built-in pair
    /// when the table cannot be reached so the language switcher never comes
    /// up empty.
    pub async fn fetch_available_languages(&self) -> Vec<LanguageConfig> {
        let rows = self
            .api
            .select(
                "languages",
                &[
                    ("select", "*".to_string()),
                    ("is_active", "eq.true".to_string()),
                    ("order", "name".to_string()),
                ],
            )
            .await;
        match rows {
            Ok(Value::Array(rows)) => rows
                .iter()
                .filter_map(|row| {
                    Some(LanguageConfig {
                        code: row.get("code")?.as_str()?.to_string(),
                        name: row.get("name")?.as_str()?.to_string(),
                        native_name: row
                            .get("native_name")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        is_rtl: row.get("is_rtl").and_then(Value::as_bool).unwrap_or(false),
                        is_active: row.get("is_active").and_then(Value::as_bool).unwrap_or(true),
                    })
                })
                .collect(),
            Ok(_) => default_languages(),
            Err(e) => {
                warn!(error = %e, "language list fetch failed, using defaults");
                default_languages()
            }
        }
    }

    /// Key/text map for one language, ready to seed a [`TranslationCache`].
    pub async fn fetch_translations_by_language(
        &self,
        language_code: &str,
    ) -> Result<HashMap<String, String>> {
        let rows = self
            .api
            .select(
                "language_setup",
                &[
                    ("select", "key_name,translated_text".to_string()),
                    ("language_code", format!("eq.{language_code}")),
                ],
            )
            .await?;
        let mut entries = HashMap::new();
        if let Some(rows) = rows.as_array() {
            for row in rows {
                if let (Some(key), Some(text)) = (
                    row.get("key_name").and_then(Value::as_str),
                    row.get("translated_text").and_then(Value::as_str),
                ) {
                    entries.insert(key.to_string(), text.to_string());
                }
            }
        }
        Ok(entries)
    }

    /// Load a ready-to-use cache for one language.
    pub async fn load_cache(&self, language_code: &str) -> Result<TranslationCache> {
        let entries = self.fetch_translations_by_language(language_code).await?;
        Ok(TranslationCache::new(language_code, entries))
    }

    /// Every translation row, for the language-management screen.
    pub async fn fetch_all_translations(&self) -> Result<Vec<Translation>> {
        let rows = self
            .api
            .select(
                "language_setup",
                &[
                    ("select", "*".to_string()),
                    ("order", "key_name.asc".to_string()),
                ],
            )
            .await?;
        serde_json::from_value(rows)
            .map_err(|e| PosError::remote(format!("Malformed translation rows: {e}")))
    }

    pub async fn add_translation(&self, translation: &NewTranslation) -> Result<Translation> {
        let inserted = self
            .api
            .insert(
                "language_setup",
                &serde_json::to_value(vec![translation])
                    .map_err(|e| PosError::validation(format!("serialize translation: {e}")))?,
            )
            .await?;
        let row = inserted
            .as_array()
            .and_then(|arr| arr.first())
            .cloned()
            .ok_or_else(|| PosError::remote("Hosted store returned no translation row"))?;
        serde_json::from_value(row)
            .map_err(|e| PosError::remote(format!("Malformed translation row: {e}")))
    }

    pub async fn update_translation(&self, id: &str, updates: &Value) -> Result<Translation> {
        let rows = self
            .api
            .update("language_setup", &[("id", format!("eq.{id}"))], updates)
            .await?;
        let row = rows
            .as_array()
            .and_then(|arr| arr.first())
            .cloned()
            .ok_or_else(|| PosError::not_found("Translation"))?;
        serde_json::from_value(row)
            .map_err(|e| PosError::remote(format!("Malformed translation row: {e}")))
    }

    pub async fn delete_translation(&self, id: &str) -> Result<()> {
        self.api
            .delete("language_setup", &[("id", format!("eq.{id}"))])
            .await
    }

    /// Bulk import, used by the seed scripts and the JSON upload flow.
    pub async fn bulk_import_translations(&self, translations: &[NewTranslation]) -> Result<()> {
        if translations.is_empty() {
            return Ok(());
        }
        let body = serde_json::to_value(translations)
            .map_err(|e| PosError::validation(format!("serialize translations: {e}")))?;
        self.api.insert("language_setup", &body).await?;
        Ok(())
    }

    /// Translations for one language grouped by key prefix, for the grouped
    /// management view.
    pub async fn fetch_translations_by_category(
        &self,
        language_code: &str,
    ) -> Result<HashMap<String, HashMap<String, String>>> {
        let entries = self.fetch_translations_by_language(language_code).await?;
        Ok(group_by_category(&entries))
    }
}
