// 🧳 Entry Info - Traveler data for one destination
//
// One EntryInfo per traveler per destination. Every field edit mutates it;
// a resubmission supersedes it with a new version (see versioning.rs).

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// FIELD HELPERS
// ============================================================================

/// A text field counts as filled when present and not blank
pub fn is_filled(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |v| !v.trim().is_empty())
}

// ============================================================================
// PASSPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Passport {
    pub passport_number: Option<String>,
    pub full_name: Option<String>,
    /// ISO 3166 alpha-3 (e.g., "CHN", "USA")
    pub nationality: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub photo_uri: Option<String>,
}

// ============================================================================
// PERSONAL INFO
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalInfo {
    pub occupation: Option<String>,
    pub province_city: Option<String>,
    pub country_region: Option<String>,
    pub email: Option<String>,
    pub phone_code: Option<String>,
    pub phone_number: Option<String>,
}

// ============================================================================
// FUNDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundType {
    Cash,
    BankCard,
    BankStatement,
    Document,
    Other,
}

impl FundType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundType::Cash => "cash",
            FundType::BankCard => "bank_card",
            FundType::BankStatement => "bank_statement",
            FundType::Document => "document",
            FundType::Other => "other",
        }
    }
}

/// Proof of funds item (cash on hand, card, statement photo...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundItem {
    pub id: String,
    pub fund_type: FundType,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub photo_uri: Option<String>,
}

impl FundItem {
    pub fn new(fund_type: FundType, amount: Option<f64>, currency: Option<&str>) -> Self {
        FundItem {
            id: uuid::Uuid::new_v4().to_string(),
            fund_type,
            amount,
            currency: currency.map(str::to_string),
            photo_uri: None,
        }
    }

    /// A fund item is usable evidence if it carries a positive amount or a photo
    pub fn is_filled(&self) -> bool {
        self.amount.map_or(false, |a| a > 0.0) || is_filled(&self.photo_uri)
    }
}

// ============================================================================
// TRAVEL
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TravelInfo {
    pub travel_purpose: Option<String>,
    /// Local date at the destination
    pub arrival_date: Option<NaiveDate>,
    /// Local time at the destination (midnight when unknown)
    pub arrival_time: Option<NaiveTime>,
    pub arrival_flight_number: Option<String>,
    pub departure_date: Option<NaiveDate>,
    pub departure_flight_number: Option<String>,
    pub accommodation_type: Option<String>,
    pub accommodation_address: Option<String>,
    pub boarding_country: Option<String>,
    pub visa_number: Option<String>,
}

// ============================================================================
// ENTRY INFO
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryInfo {
    /// Stable identity across versions
    #[serde(default = "default_uuid")]
    pub id: String,
    pub traveler_id: String,
    /// Destination code (e.g., "TH")
    pub destination: String,
    #[serde(default)]
    pub passport: Passport,
    #[serde(default)]
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub funds: Vec<FundItem>,
    #[serde(default)]
    pub travel: TravelInfo,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Photo reference with the field it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRef {
    pub source: String,
    pub uri: String,
}

impl EntryInfo {
    pub fn new(traveler_id: &str, destination: &str) -> Self {
        EntryInfo {
            id: default_uuid(),
            traveler_id: traveler_id.to_string(),
            destination: destination.to_uppercase(),
            passport: Passport::default(),
            personal_info: PersonalInfo::default(),
            funds: Vec::new(),
            travel: TravelInfo::default(),
            updated_at: Utc::now(),
        }
    }

    /// Stamp the edit time (call after mutating any field)
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Fund items that count towards completion
    pub fn filled_funds(&self) -> usize {
        self.funds.iter().filter(|f| f.is_filled()).count()
    }

    /// All photo URIs attached to this entry
    pub fn photo_refs(&self) -> Vec<PhotoRef> {
        let mut refs = Vec::new();

        if let Some(uri) = self.passport.photo_uri.as_deref().filter(|u| !u.trim().is_empty()) {
            refs.push(PhotoRef {
                source: "passport".to_string(),
                uri: uri.to_string(),
            });
        }

        for (i, fund) in self.funds.iter().enumerate() {
            if let Some(uri) = fund.photo_uri.as_deref().filter(|u| !u.trim().is_empty()) {
                refs.push(PhotoRef {
                    source: format!("funds[{}]", i),
                    uri: uri.to_string(),
                });
            }
        }

        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_filled_ignores_blank() {
        assert!(!is_filled(&None));
        assert!(!is_filled(&Some("   ".to_string())));
        assert!(is_filled(&Some("E1234567".to_string())));
    }

    #[test]
    fn test_fund_item_filled() {
        let empty = FundItem::new(FundType::Cash, None, Some("THB"));
        assert!(!empty.is_filled());

        let zero = FundItem::new(FundType::Cash, Some(0.0), Some("THB"));
        assert!(!zero.is_filled());

        let cash = FundItem::new(FundType::Cash, Some(20000.0), Some("THB"));
        assert!(cash.is_filled());

        let mut photo_only = FundItem::new(FundType::BankStatement, None, None);
        photo_only.photo_uri = Some("file:///tmp/statement.jpg".to_string());
        assert!(photo_only.is_filled());
    }

    #[test]
    fn test_photo_refs() {
        let mut info = EntryInfo::new("traveler-1", "th");
        info.passport.photo_uri = Some("/photos/passport.jpg".to_string());
        let mut card = FundItem::new(FundType::BankCard, None, None);
        card.photo_uri = Some("/photos/card.jpg".to_string());
        info.funds.push(FundItem::new(FundType::Cash, Some(100.0), Some("USD")));
        info.funds.push(card);

        let refs = info.photo_refs();
        assert_eq!(info.destination, "TH");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].source, "passport");
        assert_eq!(refs[1].source, "funds[1]");
    }

    #[test]
    fn test_deserialize_camel_case_with_defaults() {
        let json = r#"{
            "travelerId": "t-1",
            "destination": "JP",
            "passport": { "passportNumber": "E1234567", "dateOfBirth": "1990-05-01" },
            "travel": { "arrivalDate": "2026-11-02", "arrivalTime": "14:30:00" }
        }"#;

        let info: EntryInfo = serde_json::from_str(json).unwrap();
        assert!(!info.id.is_empty());
        assert_eq!(info.passport.passport_number.as_deref(), Some("E1234567"));
        assert_eq!(
            info.travel.arrival_date,
            NaiveDate::from_ymd_opt(2026, 11, 2)
        );
        assert!(info.funds.is_empty());
    }
}
