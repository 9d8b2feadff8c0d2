use chrono::{DateTime, Duration, Utc};

/// Lifetime of a security header, from `Created` to `Expires`.
pub const VALIDITY_SECONDS: i64 = 600;

const SOAP_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    pub created: String,
    pub expires: String,
}

impl Timestamp {
    pub fn now() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(created: DateTime<Utc>) -> Self {
        let expires = created + Duration::seconds(VALIDITY_SECONDS);
        Timestamp {
            created: date_string_for_soap(&created),
            expires: date_string_for_soap(&expires),
        }
    }
}

fn date_string_for_soap(date: &DateTime<Utc>) -> String {
    date.format(SOAP_DATE_FORMAT).to_string()
}
