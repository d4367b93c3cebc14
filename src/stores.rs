//! Store directory.
//!
//! The chain's locations come from the `stores` table; locations that were
//! only ever entered through the admin setup screens live in `store_setup`
//! with bilingual name columns, so lookups fall back there.

use serde_json::Value;

use crate::api::SupabaseClient;
use crate::error::Result;
use crate::types::Store;
use crate::value_str;

fn parse_store_row(row: &Value) -> Option<Store> {
    Some(Store {
        id: value_str(row, &["id"])?,
        name: value_str(row, &["name"]).unwrap_or_default(),
        address: value_str(row, &["address"]).unwrap_or_default(),
    })
}

/// `store_setup` rows carry English/Arabic names instead of a name/address
/// pair; the Arabic name doubles as the display address.
fn store_from_setup_row(row: &Value) -> Option<Store> {
    Some(Store {
        id: value_str(row, &["id"])?,
        name: value_str(row, &["store_eng_name"]).unwrap_or_default(),
        address: value_str(row, &["store_ar_name"]).unwrap_or_default(),
    })
}

#[derive(Clone)]
pub struct StoreDirectory {
    api: SupabaseClient,
}

impl StoreDirectory {
    pub fn new(api: SupabaseClient) -> Self {
        Self { api }
    }

    /// Every configured location, for the POS flow and the dashboard filter.
    pub async fn fetch_stores(&self) -> Result<Vec<Store>> {
        let rows = self
            .api
            .select("stores", &[("select", "*".to_string())])
            .await?;
        Ok(rows
            .as_array()
            .map(|arr| arr.iter().filter_map(parse_store_row).collect())
            .unwrap_or_default())
    }

    /// Find a store by id, falling back to the setup table for locations that
    /// were never promoted into `stores`.
    pub async fn find_store_by_id(&self, id: &str) -> Result<Option<Store>> {
        let row = self
            .api
            .select_one(
                "stores",
                &[("select", "*".to_string()), ("id", format!("eq.{id}"))],
            )
            .await?;
        if let Some(row) = row {
            return Ok(parse_store_row(&row));
        }

        let setup_row = self
            .api
            .select_one(
                "store_setup",
                &[("select", "*".to_string()), ("id", format!("eq.{id}"))],
            )
            .await?;
        Ok(setup_row.as_ref().and_then(store_from_setup_row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_row_maps_directly() {
        let store = parse_store_row(&serde_json::json!({
            "id": "store-1",
            "name": "Downtown",
            "address": "Main Sq"
        }))
        .unwrap();
        assert_eq!(store.name, "Downtown");
        assert_eq!(store.address, "Main Sq");
    }

    #[test]
    fn setup_row_uses_bilingual_names() {
        let store = store_from_setup_row(&serde_json::json!({
            "id": "store-2",
            "store_eng_name": "Heliopolis",
            "store_ar_name": "مصر الجديدة"
        }))
        .unwrap();
        assert_eq!(store.name, "Heliopolis");
        assert_eq!(store.address, "مصر الجديدة");
    }

    #[test]
    fn rows_without_an_id_are_skipped() {
        assert!(parse_store_row(&serde_json::json!({ "name": "Ghost" })).is_none());
    }
}
