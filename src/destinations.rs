// 🌏 Destinations - Static per-country configuration
//
// Each destination decides which personal/travel fields are required, how
// many proof-of-funds items it expects, and when its arrival card can be
// submitted relative to arrival.

use crate::config::MAX_HOURS;
use crate::entry::{is_filled, EntryInfo};
use anyhow::{anyhow, bail, Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

// ============================================================================
// FIELDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonalField {
    Occupation,
    ProvinceCity,
    CountryRegion,
    Email,
    PhoneCode,
    PhoneNumber,
}

impl PersonalField {
    pub fn name(&self) -> &'static str {
        match self {
            PersonalField::Occupation => "occupation",
            PersonalField::ProvinceCity => "province_city",
            PersonalField::CountryRegion => "country_region",
            PersonalField::Email => "email",
            PersonalField::PhoneCode => "phone_code",
            PersonalField::PhoneNumber => "phone_number",
        }
    }

    pub fn is_filled(&self, info: &EntryInfo) -> bool {
        let p = &info.personal_info;
        match self {
            PersonalField::Occupation => is_filled(&p.occupation),
            PersonalField::ProvinceCity => is_filled(&p.province_city),
            PersonalField::CountryRegion => is_filled(&p.country_region),
            PersonalField::Email => is_filled(&p.email),
            PersonalField::PhoneCode => is_filled(&p.phone_code),
            PersonalField::PhoneNumber => is_filled(&p.phone_number),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelField {
    TravelPurpose,
    ArrivalDate,
    ArrivalFlightNumber,
    DepartureDate,
    DepartureFlightNumber,
    AccommodationType,
    AccommodationAddress,
    BoardingCountry,
    VisaNumber,
}

impl TravelField {
    pub fn name(&self) -> &'static str {
        match self {
            TravelField::TravelPurpose => "travel_purpose",
            TravelField::ArrivalDate => "arrival_date",
            TravelField::ArrivalFlightNumber => "arrival_flight_number",
            TravelField::DepartureDate => "departure_date",
            TravelField::DepartureFlightNumber => "departure_flight_number",
            TravelField::AccommodationType => "accommodation_type",
            TravelField::AccommodationAddress => "accommodation_address",
            TravelField::BoardingCountry => "boarding_country",
            TravelField::VisaNumber => "visa_number",
        }
    }

    pub fn is_filled(&self, info: &EntryInfo) -> bool {
        let t = &info.travel;
        match self {
            TravelField::TravelPurpose => is_filled(&t.travel_purpose),
            TravelField::ArrivalDate => t.arrival_date.is_some(),
            TravelField::ArrivalFlightNumber => is_filled(&t.arrival_flight_number),
            TravelField::DepartureDate => t.departure_date.is_some(),
            TravelField::DepartureFlightNumber => is_filled(&t.departure_flight_number),
            TravelField::AccommodationType => is_filled(&t.accommodation_type),
            TravelField::AccommodationAddress => is_filled(&t.accommodation_address),
            TravelField::BoardingCountry => is_filled(&t.boarding_country),
            TravelField::VisaNumber => is_filled(&t.visa_number),
        }
    }
}

// ============================================================================
// DESTINATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    /// ISO 3166 alpha-2 code (e.g., "TH")
    pub code: String,
    pub name: String,

    /// Fixed UTC offset of the arrival airport, in minutes
    pub utc_offset_minutes: i32,

    /// How long before arrival the card may be submitted (None = any time)
    pub submission_window_hours: Option<i64>,

    pub required_personal_fields: Vec<PersonalField>,
    pub required_travel_fields: Vec<TravelField>,

    /// Proof-of-funds items expected (0 = funds not tracked)
    pub min_fund_items: usize,

    /// Government arrival card, if the destination has one
    pub arrival_card: Option<String>,
}

impl Destination {
    /// Destination-local offset; falls back to UTC on an out-of-range value
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }

    pub fn has_window(&self) -> bool {
        self.submission_window_hours.is_some()
    }

    /// Reject values the window and arrival arithmetic cannot use
    pub fn validate(&self) -> Result<()> {
        if self.code.trim().is_empty() {
            bail!("Destination code must not be empty");
        }
        if FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).is_none() {
            bail!(
                "Destination {}: utc_offset_minutes {} is out of range",
                self.code,
                self.utc_offset_minutes
            );
        }
        if let Some(hours) = self.submission_window_hours {
            if !(1..=MAX_HOURS).contains(&hours) {
                bail!(
                    "Destination {}: submission_window_hours must be between 1 and {}, got {}",
                    self.code,
                    MAX_HOURS,
                    hours
                );
            }
        }
        Ok(())
    }
}

// ============================================================================
// DESTINATION REGISTRY
// ============================================================================

pub struct DestinationRegistry {
    destinations: HashMap<String, Destination>,
}

impl DestinationRegistry {
    /// Create registry with the built-in destinations
    pub fn new() -> Self {
        let mut registry = DestinationRegistry {
            destinations: HashMap::new(),
        };

        registry.register_default_destinations();
        registry
    }

    fn register_default_destinations(&mut self) {
        use PersonalField as P;
        use TravelField as T;

        // Japan - Visit Japan Web can be filled any time before arrival
        self.register(Destination {
            code: "JP".to_string(),
            name: "Japan".to_string(),
            utc_offset_minutes: 9 * 60,
            submission_window_hours: None,
            required_personal_fields: vec![P::Email],
            required_travel_fields: vec![
                T::TravelPurpose,
                T::ArrivalDate,
                T::ArrivalFlightNumber,
                T::AccommodationAddress,
                T::DepartureDate,
            ],
            min_fund_items: 1,
            arrival_card: Some("Visit Japan Web".to_string()),
        });

        // Malaysia - MDAC opens 3 days before arrival
        self.register(Destination {
            code: "MY".to_string(),
            name: "Malaysia".to_string(),
            utc_offset_minutes: 8 * 60,
            submission_window_hours: Some(72),
            required_personal_fields: vec![P::Email, P::PhoneCode, P::PhoneNumber],
            required_travel_fields: vec![
                T::ArrivalDate,
                T::ArrivalFlightNumber,
                T::DepartureDate,
                T::BoardingCountry,
                T::AccommodationType,
                T::AccommodationAddress,
            ],
            min_fund_items: 1,
            arrival_card: Some("MDAC".to_string()),
        });

        // Thailand - TDAC opens 3 days before arrival
        self.register(Destination {
            code: "TH".to_string(),
            name: "Thailand".to_string(),
            utc_offset_minutes: 7 * 60,
            submission_window_hours: Some(72),
            required_personal_fields: vec![
                P::Occupation,
                P::ProvinceCity,
                P::CountryRegion,
                P::Email,
                P::PhoneNumber,
            ],
            required_travel_fields: vec![
                T::TravelPurpose,
                T::ArrivalDate,
                T::ArrivalFlightNumber,
                T::BoardingCountry,
                T::AccommodationType,
                T::AccommodationAddress,
                T::DepartureDate,
            ],
            min_fund_items: 1,
            arrival_card: Some("TDAC".to_string()),
        });

        // Taiwan - online arrival card, 3 days
        self.register(Destination {
            code: "TW".to_string(),
            name: "Taiwan".to_string(),
            utc_offset_minutes: 8 * 60,
            submission_window_hours: Some(72),
            required_personal_fields: vec![P::Occupation, P::PhoneNumber],
            required_travel_fields: vec![
                T::TravelPurpose,
                T::ArrivalDate,
                T::ArrivalFlightNumber,
                T::AccommodationAddress,
                T::DepartureDate,
            ],
            min_fund_items: 1,
            arrival_card: Some("Online Arrival Card".to_string()),
        });

        // Singapore - SG Arrival Card, 3 days
        self.register(Destination {
            code: "SG".to_string(),
            name: "Singapore".to_string(),
            utc_offset_minutes: 8 * 60,
            submission_window_hours: Some(72),
            required_personal_fields: vec![P::Email, P::PhoneNumber],
            required_travel_fields: vec![
                T::ArrivalDate,
                T::ArrivalFlightNumber,
                T::BoardingCountry,
                T::AccommodationType,
                T::AccommodationAddress,
                T::DepartureDate,
            ],
            min_fund_items: 0,
            arrival_card: Some("SG Arrival Card".to_string()),
        });

        // Korea - e-Arrival Card, 3 days
        self.register(Destination {
            code: "KR".to_string(),
            name: "South Korea".to_string(),
            utc_offset_minutes: 9 * 60,
            submission_window_hours: Some(72),
            required_personal_fields: vec![P::Email, P::PhoneNumber],
            required_travel_fields: vec![
                T::TravelPurpose,
                T::ArrivalDate,
                T::ArrivalFlightNumber,
                T::AccommodationAddress,
            ],
            min_fund_items: 0,
            arrival_card: Some("e-Arrival Card".to_string()),
        });

        // Hong Kong - no arrival card
        self.register(Destination {
            code: "HK".to_string(),
            name: "Hong Kong".to_string(),
            utc_offset_minutes: 8 * 60,
            submission_window_hours: None,
            required_personal_fields: vec![],
            required_travel_fields: vec![T::ArrivalDate, T::DepartureDate],
            min_fund_items: 0,
            arrival_card: None,
        });

        // Vietnam - e-visa holders, no arrival card
        self.register(Destination {
            code: "VN".to_string(),
            name: "Vietnam".to_string(),
            utc_offset_minutes: 7 * 60,
            submission_window_hours: None,
            required_personal_fields: vec![P::Email],
            required_travel_fields: vec![
                T::ArrivalDate,
                T::AccommodationAddress,
                T::DepartureDate,
                T::VisaNumber,
            ],
            min_fund_items: 1,
            arrival_card: None,
        });
    }

    /// Register (or replace) a destination by code
    pub fn register(&mut self, mut destination: Destination) {
        destination.code = destination.code.to_uppercase();
        self.destinations
            .insert(destination.code.clone(), destination);
    }

    /// Merge destination overrides from a JSON file (array of destinations)
    pub fn load_overrides<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read destinations file: {:?}", path.as_ref()))?;

        let overrides: Vec<Destination> =
            serde_json::from_str(&content).context("Failed to parse destinations JSON")?;

        for destination in &overrides {
            destination.validate().with_context(|| {
                format!("Invalid destination in {:?}", path.as_ref())
            })?;
        }

        let count = overrides.len();
        for destination in overrides {
            self.register(destination);
        }

        tracing::info!(count, "loaded destination overrides");
        Ok(count)
    }

    /// Find destination by code (case-insensitive)
    pub fn find(&self, code: &str) -> Option<&Destination> {
        self.destinations.get(&code.trim().to_uppercase())
    }

    /// Find destination by code, failing on unknown codes
    pub fn get(&self, code: &str) -> Result<&Destination> {
        self.find(code)
            .ok_or_else(|| anyhow!("Unknown destination: {}", code))
    }

    /// All destinations sorted by code
    pub fn all(&self) -> Vec<&Destination> {
        let mut all: Vec<&Destination> = self.destinations.values().collect();
        all.sort_by(|a, b| a.code.cmp(&b.code));
        all
    }

    pub fn count(&self) -> usize {
        self.destinations.len()
    }
}

impl Default for DestinationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_destinations() {
        let registry = DestinationRegistry::new();

        assert_eq!(registry.count(), 8);

        let th = registry.find("th").unwrap();
        assert_eq!(th.name, "Thailand");
        assert_eq!(th.submission_window_hours, Some(72));
        assert_eq!(th.arrival_card.as_deref(), Some("TDAC"));

        let jp = registry.find("JP").unwrap();
        assert!(!jp.has_window());
        assert_eq!(jp.offset().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn test_unknown_destination() {
        let registry = DestinationRegistry::new();
        assert!(registry.find("XX").is_none());
        assert!(registry.get("XX").is_err());
    }

    #[test]
    fn test_all_sorted() {
        let registry = DestinationRegistry::new();
        let codes: Vec<&str> = registry.all().iter().map(|d| d.code.as_str()).collect();
        let mut sorted = codes.clone();
        sorted.sort();
        assert_eq!(codes, sorted);
    }

    #[test]
    fn test_load_overrides_replaces_by_code() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{
                "code": "th",
                "name": "Thailand",
                "utc_offset_minutes": 420,
                "submission_window_hours": 48,
                "required_personal_fields": ["email"],
                "required_travel_fields": ["arrival_date"],
                "min_fund_items": 0,
                "arrival_card": "TDAC"
            }}]"#
        )
        .unwrap();

        let mut registry = DestinationRegistry::new();
        let loaded = registry.load_overrides(file.path()).unwrap();

        assert_eq!(loaded, 1);
        assert_eq!(registry.count(), 8);

        let th = registry.find("TH").unwrap();
        assert_eq!(th.submission_window_hours, Some(48));
        assert_eq!(th.required_travel_fields, vec![TravelField::ArrivalDate]);
    }

    fn override_file(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", body).unwrap();
        file
    }

    #[test]
    fn test_load_overrides_rejects_bad_values() {
        let bad_window = override_file(
            r#"[{"code": "MY", "name": "Malaysia", "utc_offset_minutes": 480,
                 "submission_window_hours": -5, "required_personal_fields": [],
                 "required_travel_fields": [], "min_fund_items": 0, "arrival_card": null}]"#,
        );
        let bad_offset = override_file(
            r#"[{"code": "MY", "name": "Malaysia", "utc_offset_minutes": 100000,
                 "submission_window_hours": 72, "required_personal_fields": [],
                 "required_travel_fields": [], "min_fund_items": 0, "arrival_card": null}]"#,
        );
        let huge_window = override_file(
            r#"[{"code": "MY", "name": "Malaysia", "utc_offset_minutes": 480,
                 "submission_window_hours": 9000000000000, "required_personal_fields": [],
                 "required_travel_fields": [], "min_fund_items": 0, "arrival_card": null}]"#,
        );

        for file in [&bad_window, &bad_offset, &huge_window] {
            let mut registry = DestinationRegistry::new();
            assert!(registry.load_overrides(file.path()).is_err());
            // Nothing is merged when any entry is invalid
            assert_eq!(registry.find("MY").unwrap().submission_window_hours, Some(72));
        }
    }

    #[test]
    fn test_builtins_are_valid() {
        for destination in DestinationRegistry::new().all() {
            destination.validate().unwrap();
        }
    }

    #[test]
    fn test_field_filled_checks() {
        let mut info = EntryInfo::new("t-1", "TH");
        assert!(!PersonalField::Email.is_filled(&info));
        assert!(!TravelField::ArrivalDate.is_filled(&info));

        info.personal_info.email = Some("a@b.co".to_string());
        info.travel.arrival_date = chrono::NaiveDate::from_ymd_opt(2026, 11, 1);

        assert!(PersonalField::Email.is_filled(&info));
        assert!(TravelField::ArrivalDate.is_filled(&info));
    }
}
