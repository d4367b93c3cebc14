//! Customer directory backed by the hosted store.
//!
//! Customers are looked up by phone number at the start of every POS order.
//! Rows are parsed leniently: `payment_methods` arrives either as a JSON
//! object or as a serialized string depending on which client wrote it, and
//! `gis_location` coordinates show up as numbers or numeric strings.

use serde_json::Value;
use tracing::{info, warn};

use crate::api::SupabaseClient;
use crate::error::{PosError, Result};
use crate::types::{Address, Customer, GeoPoint, PaymentPreferences};
use crate::{value_bool, value_f64, value_str};

/// Digits-only form used for phone comparisons.
pub fn normalize_phone(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

// ---------------------------------------------------------------------------
// Row parsing
// ---------------------------------------------------------------------------

fn parse_payment_preferences(value: Option<&Value>) -> PaymentPreferences {
    let resolved = match value {
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw).ok(),
        Some(v) if v.is_object() => Some(v.clone()),
        _ => None,
    };
    match resolved {
        Some(obj) => PaymentPreferences {
            cash: value_bool(&obj, &["cash"]).unwrap_or(false),
            visa: value_bool(&obj, &["visa"]).unwrap_or(false),
            credit: value_bool(&obj, &["credit"]).unwrap_or(false),
        },
        None => PaymentPreferences::default(),
    }
}

fn parse_geo_point(value: Option<&Value>) -> Option<GeoPoint> {
    let obj = value.filter(|v| v.is_object())?;
    let lat = value_f64(obj, &["lat"])?;
    let lng = value_f64(obj, &["lng"])?;
    Some(GeoPoint { lat, lng })
}

fn parse_address_row(row: &Value) -> Address {
    Address {
        id: value_str(row, &["id"]).unwrap_or_default(),
        street: value_str(row, &["street"]).unwrap_or_default(),
        city: value_str(row, &["city"]).unwrap_or_default(),
        zip_code: value_str(row, &["zip_code"]).unwrap_or_default(),
        gis_location: parse_geo_point(row.get("gis_location")),
        store_id: value_str(row, &["store_id"]).unwrap_or_default(),
    }
}

fn parse_customer_row(row: &Value, addresses: Vec<Address>) -> Customer {
    Customer {
        id: value_str(row, &["id"]).unwrap_or_default(),
        phone_number: value_str(row, &["phone_number"]).unwrap_or_default(),
        name: value_str(row, &["name"]).unwrap_or_default(),
        addresses,
        payment_methods: parse_payment_preferences(row.get("payment_methods")),
    }
}

/// Whether the customer already has an address with this street
/// (case-insensitive, the same check the order-entry flow uses before
/// appending a new address).
fn has_street(customer: &Customer, street: &str) -> bool {
    customer
        .addresses
        .iter()
        .any(|addr| addr.street.eq_ignore_ascii_case(street))
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// Parameters for creating (or extending) a customer from the new-order flow.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub phone_number: String,
    pub name: String,
    pub address: String,
    pub payment_methods: PaymentPreferences,
    pub region_id: Option<String>,
}

#[derive(Clone)]
pub struct CustomerDirectory {
    api: SupabaseClient,
}

impl CustomerDirectory {
    pub fn new(api: SupabaseClient) -> Self {
        Self { api }
    }

    async fn addresses_by_customer(
        &self,
        customer_ids: &[String],
    ) -> Result<Vec<(String, Address)>> {
        if customer_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self
            .api
            .select(
                "addresses",
                &[
                    ("select", "*".to_string()),
                    ("customer_id", format!("in.({})", customer_ids.join(","))),
                ],
            )
            .await?;
        let rows = rows.as_array().cloned().unwrap_or_default();
        Ok(rows
            .iter()
            .map(|row| {
                (
                    value_str(row, &["customer_id"]).unwrap_or_default(),
                    parse_address_row(row),
                )
            })
            .collect())
    }

    /// Full directory, addresses attached.
    pub async fn fetch_customers(&self) -> Result<Vec<Customer>> {
        let rows = self
            .api
            .select("customers", &[("select", "*".to_string())])
            .await?;
        let rows = rows.as_array().cloned().unwrap_or_default();
        let ids: Vec<String> = rows
            .iter()
            .filter_map(|row| value_str(row, &["id"]))
            .collect();
        let mut by_customer: std::collections::HashMap<String, Vec<Address>> =
            std::collections::HashMap::new();
        for (customer_id, address) in self.addresses_by_customer(&ids).await? {
            by_customer.entry(customer_id).or_default().push(address);
        }

        let customers = rows
            .iter()
            .map(|row| {
                let id = value_str(row, &["id"]).unwrap_or_default();
                let mine = by_customer.remove(&id).unwrap_or_default();
                parse_customer_row(row, mine)
            })
            .collect();
        Ok(customers)
    }

    /// Exact phone-number lookup. `None` when the customer is unknown.
    pub async fn find_by_phone(&self, phone_number: &str) -> Result<Option<Customer>> {
        let row = self
            .api
            .select_one(
                "customers",
                &[
                    ("select", "*".to_string()),
                    ("phone_number", format!("eq.{phone_number}")),
                ],
            )
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let id = value_str(&row, &["id"]).unwrap_or_default();
        let addresses = self
            .addresses_by_customer(&[id])
            .await?
            .into_iter()
            .map(|(_, addr)| addr)
            .collect();
        Ok(Some(parse_customer_row(&row, addresses)))
    }

    /// First configured store, used as the default for fresh addresses.
    async fn default_store_id(&self) -> String {
        match self
            .api
            .select_one("store_setup", &[("select", "id".to_string())])
            .await
        {
            Ok(Some(row)) => value_str(&row, &["id"]).unwrap_or_default(),
            Ok(None) => String::new(),
            Err(e) => {
                warn!(error = %e, "default store lookup failed, leaving store_id empty");
                String::new()
            }
        }
    }

    async fn insert_address(&self, customer_id: &str, street: &str) -> Result<Address> {
        let default_store_id = self.default_store_id().await;
        let inserted = self
            .api
            .insert(
                "addresses",
                &serde_json::json!([{
                    "customer_id": customer_id,
                    "street": street,
                    "city": "",
                    "zip_code": "",
                    "store_id": default_store_id,
                }]),
            )
            .await?;
        let row = inserted
            .as_array()
            .and_then(|arr| arr.first())
            .cloned()
            .ok_or_else(|| PosError::remote("Hosted store returned no address row"))?;
        Ok(parse_address_row(&row))
    }

    /// Create a customer, or extend an existing one that shares the phone
    /// number. An existing customer only gains a new address when the street
    /// is genuinely new for them.
    pub async fn add_customer(&self, params: NewCustomer) -> Result<Customer> {
        if let Some(mut existing) = self.find_by_phone(&params.phone_number).await? {
            if !has_street(&existing, &params.address) {
                let address = self.insert_address(&existing.id, &params.address).await?;
                existing.addresses.push(address);
            }
            return Ok(existing);
        }

        let inserted = self
            .api
            .insert(
                "customers",
                &serde_json::json!([{
                    "phone_number": params.phone_number,
                    "name": params.name,
                    "payment_methods": params.payment_methods,
                    "region_id": params.region_id,
                }]),
            )
            .await?;
        let row = inserted
            .as_array()
            .and_then(|arr| arr.first())
            .cloned()
            .ok_or_else(|| PosError::remote("Hosted store returned no customer row"))?;
        let customer_id = value_str(&row, &["id"])
            .ok_or_else(|| PosError::remote("Hosted store returned a customer without an id"))?;

        let address = self.insert_address(&customer_id, &params.address).await?;
        info!(customer_id = %customer_id, "customer created");
        Ok(parse_customer_row(&row, vec![address]))
    }

    /// Update the customer record itself (addresses are managed separately).
    pub async fn update_customer(&self, customer: &Customer) -> Result<Customer> {
        let rows = self
            .api
            .update(
                "customers",
                &[("id", format!("eq.{}", customer.id))],
                &serde_json::json!({
                    "phone_number": customer.phone_number,
                    "name": customer.name,
                    "payment_methods": customer.payment_methods,
                }),
            )
            .await?;
        let row = rows
            .as_array()
            .and_then(|arr| arr.first())
            .cloned()
            .ok_or_else(|| PosError::not_found("Customer"))?;
        Ok(parse_customer_row(&row, customer.addresses.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_phone_strips_formatting() {
        assert_eq!(normalize_phone("(010) 123-4567"), "0101234567");
        assert_eq!(normalize_phone("+20 10 1234 567"), "20101234567");
    }

    #[test]
    fn payment_preferences_parse_object_and_string_forms() {
        let from_object = parse_payment_preferences(Some(&serde_json::json!({
            "cash": true, "visa": 1, "credit": "false"
        })));
        assert!(from_object.cash);
        assert!(from_object.visa);
        assert!(!from_object.credit);

        let from_string = parse_payment_preferences(Some(&serde_json::json!(
            "{\"cash\":false,\"visa\":true,\"credit\":true}"
        )));
        assert!(!from_string.cash);
        assert!(from_string.visa);
        assert!(from_string.credit);
    }

    #[test]
    fn malformed_payment_preferences_fall_back_to_cash_only() {
        let fallback = parse_payment_preferences(Some(&serde_json::json!("not json")));
        assert_eq!(fallback, PaymentPreferences::default());
        assert!(fallback.cash);
        assert_eq!(parse_payment_preferences(None), PaymentPreferences::default());
    }

    #[test]
    fn geo_point_accepts_numbers_and_numeric_strings() {
        let from_numbers = parse_geo_point(Some(&serde_json::json!({
            "lat": 30.04, "lng": 31.23
        })));
        assert_eq!(
            from_numbers,
            Some(GeoPoint {
                lat: 30.04,
                lng: 31.23
            })
        );
        let from_strings = parse_geo_point(Some(&serde_json::json!({
            "lat": "30.04", "lng": "31.23"
        })));
        assert_eq!(from_strings, from_numbers);
        assert_eq!(parse_geo_point(Some(&serde_json::json!([30.04, 31.23]))), None);
        assert_eq!(parse_geo_point(None), None);
    }

    #[test]
    fn street_match_is_case_insensitive() {
        let row = serde_json::json!({
            "id": "cust-1",
            "phone_number": "0101234567",
            "name": "Ava",
            "payment_methods": { "cash": true, "visa": false, "credit": false }
        });
        let customer = parse_customer_row(
            &row,
            vec![Address {
                id: "addr-1".into(),
                street: "12 Nile St".into(),
                city: "Cairo".into(),
                zip_code: "11511".into(),
                gis_location: None,
                store_id: "store-1".into(),
            }],
        );
        assert!(has_street(&customer, "12 NILE st"));
        assert!(!has_street(&customer, "9 Tahrir Sq"));
    }
}
