use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use super::{ProviderProfile, ProviderRoster};
use crate::workflows::marketplace::domain::{ProviderId, ServiceCategory};

const MAX_RATING: u32 = 5;

#[derive(Debug)]
pub enum ProviderImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: u64, reason: String },
}

impl std::fmt::Display for ProviderImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderImportError::Io(err) => write!(f, "failed to read provider roster: {}", err),
            ProviderImportError::Csv(err) => write!(f, "invalid provider roster CSV: {}", err),
            ProviderImportError::InvalidRow { line, reason } => {
                write!(f, "provider roster line {}: {}", line, reason)
            }
        }
    }
}

impl std::error::Error for ProviderImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProviderImportError::Io(err) => Some(err),
            ProviderImportError::Csv(err) => Some(err),
            ProviderImportError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for ProviderImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ProviderImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Loads a [`ProviderRoster`] from a directory export.
///
/// Expected header: `Provider ID,Company Name,Average Rating,Total Reviews,Verified,Categories`.
pub struct ProviderRosterImporter;

impl ProviderRosterImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<ProviderRoster, ProviderImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<ProviderRoster, ProviderImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut profiles = Vec::new();

        for (index, record) in csv_reader.deserialize::<ProviderRow>().enumerate() {
            let row = record?;
            // Line 1 is the header.
            let line = index as u64 + 2;
            profiles.push(row.into_profile(line)?);
        }

        Ok(ProviderRoster::from_profiles(profiles))
    }
}

#[derive(Debug, Deserialize)]
struct ProviderRow {
    #[serde(rename = "Provider ID")]
    id: String,
    #[serde(rename = "Company Name")]
    company_name: String,
    #[serde(
        rename = "Average Rating",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    average_rating: Option<String>,
    #[serde(
        rename = "Total Reviews",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    total_reviews: Option<String>,
    #[serde(rename = "Verified", default, deserialize_with = "empty_string_as_none")]
    verified: Option<String>,
    #[serde(rename = "Categories", default, deserialize_with = "empty_string_as_none")]
    categories: Option<String>,
}

impl ProviderRow {
    fn into_profile(self, line: u64) -> Result<ProviderProfile, ProviderImportError> {
        let invalid = |reason: String| ProviderImportError::InvalidRow { line, reason };

        if self.id.is_empty() {
            return Err(invalid("provider id is blank".to_string()));
        }

        let average_rating = match self.average_rating.as_deref() {
            Some(raw) => {
                let rating = Decimal::from_str(raw)
                    .map_err(|_| invalid(format!("rating '{raw}' is not a number")))?;
                if rating.is_sign_negative() || rating > Decimal::from(MAX_RATING) {
                    return Err(invalid(format!("rating {rating} is outside 0-{MAX_RATING}")));
                }
                Some(rating)
            }
            None => None,
        };

        let total_reviews = match self.total_reviews.as_deref() {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| invalid(format!("review count '{raw}' is not a whole number")))?,
            None => 0,
        };

        let is_verified = match self.verified.as_deref() {
            Some(raw) => parse_flag(raw)
                .ok_or_else(|| invalid(format!("verified flag '{raw}' is not yes/no")))?,
            None => false,
        };

        let service_categories = match self.categories.as_deref() {
            Some(raw) => raw
                .split(';')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(|key| {
                    ServiceCategory::from_key(key)
                        .ok_or_else(|| invalid(format!("unknown service category '{key}'")))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let company_name = if self.company_name.is_empty() {
            self.id.clone()
        } else {
            self.company_name
        };

        Ok(ProviderProfile {
            id: ProviderId(self.id),
            company_name,
            average_rating,
            total_reviews,
            is_verified,
            service_categories,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "1" => Some(true),
        "no" | "n" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::marketplace::providers::ProviderDirectory;
    use std::io::Cursor;

    const ROSTER: &str = "Provider ID,Company Name,Average Rating,Total Reviews,Verified,Categories\n\
prov-aqua,AquaFix Plumbing,4.8,112,yes,plumbing;hvac\n\
prov-volt,Volt Brothers,,0,no,electrical\n\
prov-nest,Nest Maintenance,4.1,37,TRUE,General Maintenance; plumbing\n";

    #[test]
    fn imports_profiles_with_optional_fields() {
        let roster = ProviderRosterImporter::from_reader(Cursor::new(ROSTER)).expect("roster parses");
        assert_eq!(roster.len(), 3);

        let aqua = roster
            .find(&ProviderId("prov-aqua".to_string()))
            .expect("lookup succeeds")
            .expect("provider present");
        assert_eq!(aqua.average_rating, Some(Decimal::new(48, 1)));
        assert!(aqua.is_verified);
        assert_eq!(
            aqua.service_categories,
            vec![ServiceCategory::Plumbing, ServiceCategory::Hvac]
        );

        let volt = roster
            .find(&ProviderId("prov-volt".to_string()))
            .expect("lookup succeeds")
            .expect("provider present");
        assert_eq!(volt.average_rating, None);
        assert!(!volt.is_verified);
    }

    #[test]
    fn offering_orders_by_rating() {
        let roster = ProviderRosterImporter::from_reader(Cursor::new(ROSTER)).expect("roster parses");
        let plumbers: Vec<&str> = roster
            .offering(ServiceCategory::Plumbing)
            .into_iter()
            .map(|profile| profile.id.0.as_str())
            .collect();
        assert_eq!(plumbers, vec!["prov-aqua", "prov-nest"]);
    }

    #[test]
    fn rejects_out_of_range_ratings_with_line_numbers() {
        let csv = "Provider ID,Company Name,Average Rating,Total Reviews,Verified,Categories\n\
prov-ok,Fine Co,4.0,3,no,cleaning\n\
prov-bad,Bad Co,7.5,3,no,cleaning\n";
        match ProviderRosterImporter::from_reader(Cursor::new(csv)) {
            Err(ProviderImportError::InvalidRow { line, reason }) => {
                assert_eq!(line, 3);
                assert!(reason.contains("7.5"));
            }
            other => panic!("expected invalid row, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_categories() {
        let csv = "Provider ID,Company Name,Average Rating,Total Reviews,Verified,Categories\n\
prov-x,X,,,no,gardening\n";
        match ProviderRosterImporter::from_reader(Cursor::new(csv)) {
            Err(ProviderImportError::InvalidRow { line, reason }) => {
                assert_eq!(line, 2);
                assert!(reason.contains("gardening"));
            }
            other => panic!("expected invalid row, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unrecognized_verified_flags() {
        let csv = "Provider ID,Company Name,Average Rating,Total Reviews,Verified,Categories\n\
prov-x,X,,,maybe,cleaning\n";
        assert!(matches!(
            ProviderRosterImporter::from_reader(Cursor::new(csv)),
            Err(ProviderImportError::InvalidRow { line: 2, .. })
        ));
    }
}
