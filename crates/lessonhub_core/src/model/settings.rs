//! Admin settings and the public services page documents.

use super::{as_number, children, text};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_CURRENCY: &str = "₱ PHP";
pub const DEFAULT_BACKGROUND: &str = "#ffffff";

/// `adminSettings`. Numeric fields keep the string form the admin typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminSettings {
    pub startup_image: String,
    pub background_image: String,
    pub background_color: String,
    pub amount_per_signup: String,
    pub resell_price: String,
    pub resell_count: String,
    pub currency_symbol: String,
    pub updated_at: String,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            startup_image: String::new(),
            background_image: String::new(),
            background_color: DEFAULT_BACKGROUND.to_string(),
            amount_per_signup: "0".to_string(),
            resell_price: "0".to_string(),
            resell_count: "0".to_string(),
            currency_symbol: DEFAULT_CURRENCY.to_string(),
            updated_at: String::new(),
        }
    }
}

impl AdminSettings {
    pub fn from_value(snapshot: Option<&Value>) -> Self {
        let defaults = Self::default();
        let Some(record) = snapshot.filter(|value| value.is_object()) else {
            return defaults;
        };
        let or_default = |key: &str, fallback: &str| {
            let value = text(record, key);
            if value.is_empty() {
                fallback.to_string()
            } else {
                value
            }
        };
        Self {
            startup_image: text(record, "startupImage"),
            background_image: text(record, "backgroundImage"),
            background_color: or_default("backgroundColor", &defaults.background_color),
            amount_per_signup: or_default("amountPerSignup", &defaults.amount_per_signup),
            resell_price: or_default("resellPrice", &defaults.resell_price),
            resell_count: or_default("resellCount", &defaults.resell_count),
            currency_symbol: or_default("currencySymbol", &defaults.currency_symbol),
            updated_at: text(record, "updatedAt"),
        }
    }

    /// Symbol part of `currencySymbol` (`"₱ PHP"` -> `"₱"`).
    pub fn currency(&self) -> String {
        self.currency_symbol
            .split_whitespace()
            .next()
            .unwrap_or("₱")
            .to_string()
    }

    pub fn signup_amount(&self) -> f64 {
        parse_amount(&self.amount_per_signup)
    }

    pub fn resell_unit_price(&self) -> f64 {
        parse_amount(&self.resell_price)
    }

    pub fn resell_units(&self) -> u64 {
        parse_amount(&self.resell_count).max(0.0) as u64
    }
}

fn parse_amount(raw: &str) -> f64 {
    as_number(&Value::String(raw.to_string())).unwrap_or(0.0)
}

/// One tile on the services page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTile {
    pub icon: String,
    pub label: String,
}

/// Decodes `publicSettings/services` (stored as an array).
pub fn decode_services(snapshot: Option<&Value>) -> Vec<ServiceTile> {
    children(snapshot)
        .into_iter()
        .map(|(_, tile)| ServiceTile {
            icon: text(tile, "icon"),
            label: text(tile, "label"),
        })
        .collect()
}

pub fn services_value(tiles: &[ServiceTile]) -> Value {
    Value::Array(
        tiles
            .iter()
            .map(|tile| json!({"icon": tile.icon, "label": tile.label}))
            .collect(),
    )
}

/// Editable contact fields on the services page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactField {
    Facebook,
    Email,
    Phone,
    Website,
    Location1,
    Location2,
}

impl ContactField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "facebook" => Some(Self::Facebook),
            "email" => Some(Self::Email),
            "phone" => Some(Self::Phone),
            "website" => Some(Self::Website),
            "location1" => Some(Self::Location1),
            "location2" => Some(Self::Location2),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Facebook => "facebook",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Website => "website",
            Self::Location1 => "location1",
            Self::Location2 => "location2",
        }
    }
}

/// `publicSettings/contactInfo`. Blank for a fresh white-label deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactInfo {
    pub facebook: String,
    pub email: String,
    pub phone: String,
    pub website: String,
    pub location1: String,
    pub location2: String,
}

impl ContactInfo {
    pub fn from_value(snapshot: Option<&Value>) -> Self {
        let Some(record) = snapshot else {
            return Self::default();
        };
        Self {
            facebook: text(record, "facebook"),
            email: text(record, "email"),
            phone: text(record, "phone"),
            website: text(record, "website"),
            location1: text(record, "location1"),
            location2: text(record, "location2"),
        }
    }

    pub fn set(&mut self, field: ContactField, value: String) {
        let slot = match field {
            ContactField::Facebook => &mut self.facebook,
            ContactField::Email => &mut self.email,
            ContactField::Phone => &mut self.phone,
            ContactField::Website => &mut self.website,
            ContactField::Location1 => &mut self.location1,
            ContactField::Location2 => &mut self.location2,
        };
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_services, services_value, AdminSettings, ContactField, ContactInfo, ServiceTile};
    use serde_json::json;

    #[test]
    fn admin_settings_fill_defaults_and_parse_amounts() {
        let settings = AdminSettings::from_value(Some(&json!({
            "amountPerSignup": "150.5",
            "resellCount": 3,
            "currencySymbol": "$ USD"
        })));
        assert_eq!(settings.signup_amount(), 150.5);
        assert_eq!(settings.resell_units(), 3);
        assert_eq!(settings.currency(), "$");
        assert_eq!(settings.background_color, "#ffffff");

        let defaults = AdminSettings::from_value(None);
        assert_eq!(defaults.currency(), "₱");
        assert_eq!(defaults.signup_amount(), 0.0);
    }

    #[test]
    fn services_keep_array_order() {
        let tiles = decode_services(Some(&json!([
            {"icon": "💼", "label": "Tax"},
            {"icon": "📦", "label": "Shipping"}
        ])));
        assert_eq!(tiles[1].label, "Shipping");
        let value = services_value(&[ServiceTile {
            icon: "💼".to_string(),
            label: "Tax".to_string(),
        }]);
        assert_eq!(value, json!([{"icon": "💼", "label": "Tax"}]));
    }

    #[test]
    fn contact_fields_are_addressable() {
        let mut info = ContactInfo::from_value(None);
        let field = ContactField::parse("phone").expect("known field");
        info.set(field, "+1 555".to_string());
        assert_eq!(info.phone, "+1 555");
        assert!(ContactField::parse("fax").is_none());
    }
}
