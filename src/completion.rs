// 📊 Completion Calculator - Weighted completion across traveler data
//
// Four categories (passport, personal info, funds, travel), each reduced to
// filled/total counts. The overall percentage is a weighted average of the
// categories that have at least one required item.
//
// Metrics are derived on demand and never stored as the source of truth.

use crate::destinations::Destination;
use crate::entry::{is_filled, EntryInfo};
use serde::{Deserialize, Serialize};

// ============================================================================
// CATEGORIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Passport,
    PersonalInfo,
    Funds,
    Travel,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Passport,
        Category::PersonalInfo,
        Category::Funds,
        Category::Travel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Passport => "passport",
            Category::PersonalInfo => "personal_info",
            Category::Funds => "funds",
            Category::Travel => "travel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryState {
    Empty,
    Partial,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionState {
    NotStarted,
    InProgress,
    Complete,
}

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMetrics {
    pub category: Category,
    pub complete: usize,
    pub total: usize,
    pub state: CategoryState,
    pub missing_fields: Vec<String>,
}

impl CategoryMetrics {
    fn new(category: Category, complete: usize, total: usize, missing_fields: Vec<String>) -> Self {
        let state = if complete >= total {
            CategoryState::Complete
        } else if complete == 0 {
            CategoryState::Empty
        } else {
            CategoryState::Partial
        };

        CategoryMetrics {
            category,
            complete,
            total,
            state,
            missing_fields,
        }
    }

    /// Fraction in [0, 1]; a category with nothing required counts as done
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.complete as f64 / self.total as f64
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == CategoryState::Complete
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionMetrics {
    pub categories: Vec<CategoryMetrics>,
    /// Weighted percentage, 0-100
    pub percent: u8,
    pub state: CompletionState,
}

impl CompletionMetrics {
    pub fn category(&self, category: Category) -> Option<&CategoryMetrics> {
        self.categories.iter().find(|c| c.category == category)
    }

    pub fn is_complete(&self) -> bool {
        self.state == CompletionState::Complete
    }

    /// Missing fields as "category.field"
    pub fn missing_fields(&self) -> Vec<String> {
        self.categories
            .iter()
            .flat_map(|c| {
                c.missing_fields
                    .iter()
                    .map(move |f| format!("{}.{}", c.category.as_str(), f))
            })
            .collect()
    }

    pub fn summary(&self) -> String {
        let parts: Vec<String> = self
            .categories
            .iter()
            .map(|c| format!("{} {}/{}", c.category.as_str(), c.complete, c.total))
            .collect();

        format!("{}% ({})", self.percent, parts.join(", "))
    }
}

// ============================================================================
// WEIGHTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    pub passport: u32,
    pub personal_info: u32,
    pub funds: u32,
    pub travel: u32,
}

impl CategoryWeights {
    pub fn weight(&self, category: Category) -> u32 {
        match category {
            Category::Passport => self.passport,
            Category::PersonalInfo => self.personal_info,
            Category::Funds => self.funds,
            Category::Travel => self.travel,
        }
    }
}

impl Default for CategoryWeights {
    fn default() -> Self {
        CategoryWeights {
            passport: 30,
            personal_info: 20,
            funds: 20,
            travel: 30,
        }
    }
}

// ============================================================================
// CALCULATOR
// ============================================================================

/// Passport fields required by every destination
const PASSPORT_FIELDS: [&str; 6] = [
    "passport_number",
    "full_name",
    "nationality",
    "date_of_birth",
    "expiry_date",
    "gender",
];

pub struct CompletionCalculator {
    weights: CategoryWeights,
}

impl CompletionCalculator {
    pub fn new() -> Self {
        CompletionCalculator {
            weights: CategoryWeights::default(),
        }
    }

    pub fn with_weights(weights: CategoryWeights) -> Self {
        CompletionCalculator { weights }
    }

    /// Compute completion metrics for an entry against its destination
    pub fn compute(&self, info: &EntryInfo, destination: &Destination) -> CompletionMetrics {
        let categories = vec![
            self.passport_metrics(info),
            self.personal_metrics(info, destination),
            self.funds_metrics(info, destination),
            self.travel_metrics(info, destination),
        ];

        let counted: Vec<&CategoryMetrics> = categories.iter().filter(|c| c.total > 0).collect();

        // All-zero weights on the counted categories: plain average instead
        let weighted = counted
            .iter()
            .any(|c| self.weights.weight(c.category) > 0);

        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;

        for metrics in &counted {
            let weight = if weighted {
                self.weights.weight(metrics.category) as f64
            } else {
                1.0
            };
            weighted_sum += weight * metrics.ratio();
            weight_total += weight;
        }

        let all_complete = !counted.is_empty() && counted.iter().all(|c| c.is_complete());
        let any_filled = counted.iter().any(|c| c.complete > 0);

        let percent = if weight_total == 0.0 {
            0
        } else {
            let raw = (weighted_sum / weight_total * 100.0).round() as u8;
            // Rounding must not report 100% while something is still missing
            if raw >= 100 && !all_complete {
                99
            } else {
                raw.min(100)
            }
        };

        let state = if all_complete {
            CompletionState::Complete
        } else if any_filled {
            CompletionState::InProgress
        } else {
            CompletionState::NotStarted
        };

        CompletionMetrics {
            categories,
            percent,
            state,
        }
    }

    fn passport_metrics(&self, info: &EntryInfo) -> CategoryMetrics {
        let p = &info.passport;
        let filled = [
            is_filled(&p.passport_number),
            is_filled(&p.full_name),
            is_filled(&p.nationality),
            p.date_of_birth.is_some(),
            p.expiry_date.is_some(),
            is_filled(&p.gender),
        ];

        let missing: Vec<String> = PASSPORT_FIELDS
            .iter()
            .zip(filled.iter())
            .filter(|(_, ok)| !**ok)
            .map(|(name, _)| name.to_string())
            .collect();

        let complete = filled.iter().filter(|ok| **ok).count();
        CategoryMetrics::new(Category::Passport, complete, PASSPORT_FIELDS.len(), missing)
    }

    fn personal_metrics(&self, info: &EntryInfo, destination: &Destination) -> CategoryMetrics {
        let fields = &destination.required_personal_fields;
        let missing: Vec<String> = fields
            .iter()
            .filter(|f| !f.is_filled(info))
            .map(|f| f.name().to_string())
            .collect();

        CategoryMetrics::new(
            Category::PersonalInfo,
            fields.len() - missing.len(),
            fields.len(),
            missing,
        )
    }

    fn funds_metrics(&self, info: &EntryInfo, destination: &Destination) -> CategoryMetrics {
        let total = destination.min_fund_items;
        let complete = info.filled_funds().min(total);
        let missing = if complete < total {
            vec![format!("fund_items ({} more)", total - complete)]
        } else {
            Vec::new()
        };

        CategoryMetrics::new(Category::Funds, complete, total, missing)
    }

    fn travel_metrics(&self, info: &EntryInfo, destination: &Destination) -> CategoryMetrics {
        let fields = &destination.required_travel_fields;
        let missing: Vec<String> = fields
            .iter()
            .filter(|f| !f.is_filled(info))
            .map(|f| f.name().to_string())
            .collect();

        CategoryMetrics::new(
            Category::Travel,
            fields.len() - missing.len(),
            fields.len(),
            missing,
        )
    }
}

impl Default for CompletionCalculator {
    fn default() -> Self {
        Self::new()
    }
}

/// Completion with default weights
pub fn compute_completion(info: &EntryInfo, destination: &Destination) -> CompletionMetrics {
    CompletionCalculator::new().compute(info, destination)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::destinations::DestinationRegistry;
    use crate::entry::{FundItem, FundType};
    use chrono::NaiveDate;

    /// Entry with every Thailand field filled
    pub(crate) fn complete_thailand_entry() -> EntryInfo {
        let mut info = EntryInfo::new("traveler-1", "TH");

        info.passport.passport_number = Some("E12345678".to_string());
        info.passport.full_name = Some("LI MING".to_string());
        info.passport.nationality = Some("CHN".to_string());
        info.passport.date_of_birth = NaiveDate::from_ymd_opt(1990, 5, 1);
        info.passport.expiry_date = NaiveDate::from_ymd_opt(2032, 5, 1);
        info.passport.gender = Some("M".to_string());

        info.personal_info.occupation = Some("Engineer".to_string());
        info.personal_info.province_city = Some("Shanghai".to_string());
        info.personal_info.country_region = Some("CHN".to_string());
        info.personal_info.email = Some("li.ming@example.com".to_string());
        info.personal_info.phone_code = Some("86".to_string());
        info.personal_info.phone_number = Some("13800138000".to_string());

        info.funds
            .push(FundItem::new(FundType::Cash, Some(20000.0), Some("THB")));

        info.travel.travel_purpose = Some("HOLIDAY".to_string());
        info.travel.arrival_date = NaiveDate::from_ymd_opt(2026, 11, 2);
        info.travel.arrival_flight_number = Some("TG665".to_string());
        info.travel.boarding_country = Some("CHN".to_string());
        info.travel.accommodation_type = Some("HOTEL".to_string());
        info.travel.accommodation_address = Some("123 Sukhumvit Rd, Bangkok".to_string());
        info.travel.departure_date = NaiveDate::from_ymd_opt(2026, 11, 9);

        info
    }

    #[test]
    fn test_empty_entry() {
        let registry = DestinationRegistry::new();
        let th = registry.find("TH").unwrap();
        let info = EntryInfo::new("traveler-1", "TH");

        let metrics = compute_completion(&info, th);

        assert_eq!(metrics.percent, 0);
        assert_eq!(metrics.state, CompletionState::NotStarted);
        for c in &metrics.categories {
            assert_eq!(c.state, CategoryState::Empty);
        }
    }

    #[test]
    fn test_complete_entry() {
        let registry = DestinationRegistry::new();
        let th = registry.find("TH").unwrap();
        let info = complete_thailand_entry();

        let metrics = compute_completion(&info, th);

        assert_eq!(metrics.percent, 100);
        assert!(metrics.is_complete());
        assert!(metrics.missing_fields().is_empty());
    }

    #[test]
    fn test_weighted_percentage() {
        let registry = DestinationRegistry::new();
        let th = registry.find("TH").unwrap();
        let mut info = complete_thailand_entry();

        // Drop funds entirely: 80/100 weight satisfied
        info.funds.clear();
        let metrics = compute_completion(&info, th);
        assert_eq!(metrics.percent, 80);
        assert_eq!(metrics.state, CompletionState::InProgress);
        assert_eq!(
            metrics.category(Category::Funds).unwrap().state,
            CategoryState::Empty
        );

        // Half the passport fields missing: 80 - 15 = 65
        info.passport.passport_number = None;
        info.passport.full_name = None;
        info.passport.gender = Some(" ".to_string());
        let metrics = compute_completion(&info, th);
        assert_eq!(metrics.percent, 65);

        let passport = metrics.category(Category::Passport).unwrap();
        assert_eq!(passport.complete, 3);
        assert_eq!(passport.total, 6);
        assert_eq!(passport.state, CategoryState::Partial);
        assert!(passport.missing_fields.contains(&"gender".to_string()));
    }

    #[test]
    fn test_categories_without_requirements_are_excluded() {
        let registry = DestinationRegistry::new();
        let hk = registry.find("HK").unwrap();
        let mut info = EntryInfo::new("traveler-1", "HK");

        info.travel.arrival_date = NaiveDate::from_ymd_opt(2026, 11, 2);
        info.travel.departure_date = NaiveDate::from_ymd_opt(2026, 11, 5);

        // Only passport (30) and travel (30) count; travel is done
        let metrics = compute_completion(&info, hk);
        assert_eq!(metrics.percent, 50);

        let funds = metrics.category(Category::Funds).unwrap();
        assert_eq!(funds.total, 0);
        assert_eq!(funds.state, CategoryState::Complete);
    }

    #[test]
    fn test_rounding_never_reports_false_hundred() {
        let registry = DestinationRegistry::new();
        let th = registry.find("TH").unwrap();
        let mut info = complete_thailand_entry();
        info.travel.departure_date = None;

        let weights = CategoryWeights {
            passport: 1000,
            personal_info: 1000,
            funds: 1000,
            travel: 1,
        };
        let metrics = CompletionCalculator::with_weights(weights).compute(&info, th);

        assert_eq!(metrics.percent, 99);
        assert!(!metrics.is_complete());
        assert_eq!(metrics.missing_fields(), vec!["travel.departure_date".to_string()]);
    }

    #[test]
    fn test_zero_weights_fall_back_to_plain_average() {
        let registry = DestinationRegistry::new();
        let th = registry.find("TH").unwrap();
        let calculator = CompletionCalculator::with_weights(CategoryWeights {
            passport: 0,
            personal_info: 0,
            funds: 0,
            travel: 0,
        });

        let complete = calculator.compute(&complete_thailand_entry(), th);
        assert_eq!(complete.state, CompletionState::Complete);
        assert_eq!(complete.percent, 100);

        // Funds missing: 3 of 4 categories complete
        let mut info = complete_thailand_entry();
        info.funds.clear();
        let partial = calculator.compute(&info, th);
        assert_eq!(partial.state, CompletionState::InProgress);
        assert_eq!(partial.percent, 75);
    }

    #[test]
    fn test_extra_funds_do_not_overflow() {
        let registry = DestinationRegistry::new();
        let th = registry.find("TH").unwrap();
        let mut info = complete_thailand_entry();
        info.funds
            .push(FundItem::new(FundType::BankCard, Some(5000.0), Some("USD")));

        let metrics = compute_completion(&info, th);
        let funds = metrics.category(Category::Funds).unwrap();
        assert_eq!(funds.complete, 1);
        assert_eq!(funds.total, 1);
        assert_eq!(metrics.percent, 100);
    }

    #[test]
    fn test_summary() {
        let registry = DestinationRegistry::new();
        let th = registry.find("TH").unwrap();
        let metrics = compute_completion(&complete_thailand_entry(), th);

        assert_eq!(
            metrics.summary(),
            "100% (passport 6/6, personal_info 5/5, funds 1/1, travel 7/7)"
        );
    }
}
