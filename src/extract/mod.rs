//! Field extraction: pure `Entity -> ExtractedRecord`, plus the early-skip filter.
//!
//! Nothing here fails. A field that cannot be found is left empty; that is the contract callers
//! rely on.

pub mod contact;
pub mod demographics;
pub mod filter;
pub mod location;

pub use contact::{extract_emails, extract_phones, normalize_email, normalize_phone};
pub use demographics::{extract_age, guess_gender, split_name};
pub use filter::accepts;
pub use location::{Location, extract_location, extract_postal_code};

use chrono::Datelike;

use crate::engine::hashing::derived_uid;
use crate::error::HarvestResult;
use crate::types::{Entity, ExtractedRecord};
use crate::utils::config::ValueConsts;

pub(crate) fn pad_three(values: Vec<String>) -> [String; 3] {
    let mut it = values.into_iter();
    [
        it.next().unwrap_or_default(),
        it.next().unwrap_or_default(),
        it.next().unwrap_or_default(),
    ]
}

/// 1.0 base, +0.5 for business accounts, + followers/10000 capped at 1.0. Two decimals.
pub fn value_score(entity: &Entity) -> f64 {
    let business = if entity.is_business {
        ValueConsts::BUSINESS_BONUS
    } else {
        0.0
    };
    let reach = (entity.followers as f64 / ValueConsts::FOLLOWER_SATURATION).min(1.0);
    ((ValueConsts::BASE + business + reach) * 100.0).round() / 100.0
}

/// What the worker pool calls per cache miss. Errors are treated as transient and retried.
pub trait RecordExtractor: Send + Sync {
    fn extract_record(&self, entity: &Entity, account: &str) -> HarvestResult<ExtractedRecord>;
}

impl RecordExtractor for Extractor {
    fn extract_record(&self, entity: &Entity, account: &str) -> HarvestResult<ExtractedRecord> {
        Ok(self.extract(entity, account))
    }
}

/// Extraction with a fixed reference year, so age and birth year are reproducible.
#[derive(Clone, Copy, Debug)]
pub struct Extractor {
    current_year: i32,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    /// Reference year taken from the local clock.
    pub fn new() -> Self {
        Self::with_year(chrono::Local::now().year())
    }

    pub fn with_year(current_year: i32) -> Self {
        Self { current_year }
    }

    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    /// Build the record for `entity` harvested from `account`.
    pub fn extract(&self, entity: &Entity, account: &str) -> ExtractedRecord {
        // Contact details may sit in the link as well as the bio.
        let contact_text = match entity.external_url.as_deref() {
            Some(url) if !url.is_empty() => format!("{} {}", entity.biography, url),
            _ => entity.biography.clone(),
        };
        let (first_name, last_name) = split_name(&entity.full_name);
        let location = extract_location(&entity.biography);
        let (age, birth_year) = extract_age(&entity.biography, self.current_year);

        ExtractedRecord {
            id: entity.id.clone(),
            username: entity.username.clone(),
            account: account.to_string(),
            emails: extract_emails(&contact_text),
            phones: extract_phones(&contact_text),
            madid: String::new(),
            first_name,
            last_name,
            zip: extract_postal_code(&entity.biography),
            city: location.city,
            state: location.state,
            country: location.country,
            location: location.raw,
            is_business: entity.is_business,
            is_verified: entity.is_verified,
            dob: String::new(),
            birth_year,
            gender: guess_gender(&entity.biography),
            age,
            uid: derived_uid(&entity.id),
            value: value_score(entity),
            followers_count: entity.followers,
            following_count: entity.following,
        }
    }
}
