//! Aggregates for the analytics view.
//!
//! # Invariants
//! - Test accounts never contribute to any figure.
//! - Percentages are rounded to two decimals; money figures are not rounded.

use crate::model::settings::AdminSettings;
use crate::model::student::StudentRecord;
use chrono::{DateTime, Datelike, NaiveDate};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceBuckets {
    pub mobile: usize,
    pub tablet: usize,
    pub desktop: usize,
    pub unknown: usize,
}

impl DeviceBuckets {
    pub fn add(&mut self, device: &str) {
        let device = device.trim().to_ascii_lowercase();
        if device.contains("mobile") {
            self.mobile += 1;
        } else if device.contains("tablet") {
            self.tablet += 1;
        } else if ["desktop", "windows", "mac"]
            .iter()
            .any(|hint| device.contains(hint))
        {
            self.desktop += 1;
        } else {
            self.unknown += 1;
        }
    }

    pub fn entries(&self) -> [(&'static str, usize); 4] {
        [
            ("mobile", self.mobile),
            ("tablet", self.tablet),
            ("desktop", self.desktop),
            ("unknown", self.unknown),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentCompletion {
    pub uid: String,
    pub name: String,
    pub percent: f64,
}

/// Resale figures derived from the admin settings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResellSummary {
    pub unit_price: f64,
    pub units: u64,
    pub revenue: f64,
    /// Revenue if two more units sell.
    pub forecast: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlySignups {
    /// `Jan 2024`.
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsReport {
    pub users: usize,
    pub active_users: usize,
    pub average_progress: f64,
    pub revenue: f64,
    pub currency: String,
    pub devices: DeviceBuckets,
    pub students: Vec<StudentCompletion>,
    pub resell: ResellSummary,
    pub signups: Vec<MonthlySignups>,
}

pub fn build_report(students: &[StudentRecord], settings: &AdminSettings) -> AnalyticsReport {
    let counted: Vec<&StudentRecord> = students
        .iter()
        .filter(|student| !student.is_test_account())
        .collect();

    let mut devices = DeviceBuckets::default();
    let mut per_student = Vec::with_capacity(counted.len());
    let mut total = 0.0;
    let mut active_users = 0;
    let mut months: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    for student in &counted {
        let percent = student.mean_progress();
        total += percent;
        if percent > 0.0 {
            active_users += 1;
        }
        devices.add(&student.device);
        if let Some(date) = parse_signup_date(&student.signup_date) {
            *months.entry((date.year(), date.month())).or_default() += 1;
        }
        let name = if student.full_name.trim().is_empty() {
            student.email.clone()
        } else {
            student.full_name.clone()
        };
        per_student.push(StudentCompletion {
            uid: student.uid.clone(),
            name,
            percent: round2(percent),
        });
    }

    let users = counted.len();
    let average_progress = if users == 0 {
        0.0
    } else {
        round2(total / users as f64)
    };
    let unit_price = settings.resell_unit_price();
    let units = settings.resell_units();

    AnalyticsReport {
        users,
        active_users,
        average_progress,
        revenue: users as f64 * settings.signup_amount(),
        currency: settings.currency(),
        devices,
        students: per_student,
        resell: ResellSummary {
            unit_price,
            units,
            revenue: unit_price * units as f64,
            forecast: unit_price * (units + 2) as f64,
        },
        signups: months
            .into_iter()
            .filter_map(|((year, month), count)| {
                NaiveDate::from_ymd_opt(year, month, 1).map(|first| MonthlySignups {
                    label: first.format("%b %Y").to_string(),
                    count,
                })
            })
            .collect(),
    }
}

/// Accepts RFC 3339 stamps and bare `YYYY-MM-DD` dates.
fn parse_signup_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|stamp| stamp.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Money figure without a trailing `.0` for whole amounts.
pub fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::{build_report, format_amount, DeviceBuckets};
    use crate::model::settings::AdminSettings;
    use crate::model::student::decode_students;
    use serde_json::json;

    #[test]
    fn device_strings_map_to_buckets() {
        let mut buckets = DeviceBuckets::default();
        for device in ["Mobile Safari", "tablet", "Windows 11", "MacBook", "desktop", "", "tv"] {
            buckets.add(device);
        }
        assert_eq!(buckets.mobile, 1);
        assert_eq!(buckets.tablet, 1);
        assert_eq!(buckets.desktop, 3);
        assert_eq!(buckets.unknown, 2);
    }

    #[test]
    fn report_skips_test_accounts_and_aggregates() {
        let students = decode_students(Some(&json!({
            "a": {"fullName": "Ana", "device": "mobile", "signupDate": "2024-01-15T08:00:00.000Z",
                  "progress": {"x": 100, "y": 50}},
            "b": {"fullName": "Ben", "device": "windows", "signupDate": "2024-01-20",
                  "progress": {}},
            "c": {"fullName": "Cy", "signupDate": "2024-03-02", "progress": {"x": 30}},
            "t": {"fullName": "Test Runner", "email": "t@example.test", "progress": {"x": 100}},
            "u": {"fullName": "Uma", "email": "testuser@example.test", "progress": {"x": 100}}
        })));
        let settings = AdminSettings::from_value(Some(&json!({
            "amountPerSignup": "150",
            "resellPrice": "20",
            "resellCount": "3",
            "currencySymbol": "$ USD"
        })));

        let report = build_report(&students, &settings);
        assert_eq!(report.users, 3);
        assert_eq!(report.active_users, 2);
        assert_eq!(report.average_progress, 35.0);
        assert_eq!(report.revenue, 450.0);
        assert_eq!(report.currency, "$");
        assert_eq!(report.devices.mobile, 1);
        assert_eq!(report.devices.desktop, 1);
        assert_eq!(report.devices.unknown, 1);
        assert_eq!(report.students[0].percent, 75.0);
        assert_eq!(report.resell.revenue, 60.0);
        assert_eq!(report.resell.forecast, 100.0);
        let months: Vec<(String, usize)> = report
            .signups
            .iter()
            .map(|month| (month.label.clone(), month.count))
            .collect();
        assert_eq!(
            months,
            vec![("Jan 2024".to_string(), 2), ("Mar 2024".to_string(), 1)]
        );
    }

    #[test]
    fn empty_population_has_zero_average() {
        let report = build_report(&[], &AdminSettings::default());
        assert_eq!(report.users, 0);
        assert_eq!(report.average_progress, 0.0);
        assert_eq!(report.currency, "₱");
        assert_eq!(format_amount(12.0), "12");
        assert_eq!(format_amount(12.5), "12.50");
    }
}
