use serde::{Deserialize, Serialize};

/// PII category tag attached to a detected entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Person,
    Email,
    Phone,
    CreditCard,
    UsSsn,
    IpAddress,
    Url,
}

impl EntityType {
    pub const ALL: [EntityType; 7] = [
        Self::Person,
        Self::Email,
        Self::Phone,
        Self::CreditCard,
        Self::UsSsn,
        Self::IpAddress,
        Self::Url,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "PERSON",
            Self::Email => "EMAIL",
            Self::Phone => "PHONE",
            Self::CreditCard => "CREDIT_CARD",
            Self::UsSsn => "US_SSN",
            Self::IpAddress => "IP_ADDRESS",
            Self::Url => "URL",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PERSON" => Ok(Self::Person),
            "EMAIL" | "EMAIL_ADDRESS" => Ok(Self::Email),
            "PHONE" | "PHONE_NUMBER" => Ok(Self::Phone),
            "CREDIT_CARD" => Ok(Self::CreditCard),
            "US_SSN" | "SSN" => Ok(Self::UsSsn),
            "IP_ADDRESS" | "IP" => Ok(Self::IpAddress),
            "URL" => Ok(Self::Url),
            _ => Err(format!("Unknown entity type: {s}")),
        }
    }
}

/// A detected PII mention inside one image's extracted text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub text: String,
    /// Byte offset of the match start in the detected text
    pub start: usize,
    /// Byte offset one past the match end
    pub end: usize,
    /// Confidence in [0, 1]
    pub score: f32,
}

impl Entity {
    pub fn has_valid_score(&self) -> bool {
        self.score.is_finite() && (0.0..=1.0).contains(&self.score)
    }
}
