use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::{CoreError, CoreResult};

// ============================================================================
// Offers
// ============================================================================

/// Largest whole dollar amount written as a JSON integer.
const MAX_EXACT_AMOUNT: f64 = 9_007_199_254_740_991.0;

/// Writes whole dollar amounts as integers (`5000`, not `5000.0`).
pub fn serialize_amount<S: Serializer>(amount: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if amount.fract() == 0.0 && (0.0..=MAX_EXACT_AMOUNT).contains(amount) {
        serializer.serialize_u64(*amount as u64)
    } else {
        serializer.serialize_f64(*amount)
    }
}

/// A usable bid: finite and not negative.
pub fn is_valid_amount(amount: f64) -> bool {
    amount.is_finite() && amount >= 0.0
}

/// A bid submitted for a domain. `timestamp` is assigned by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub email: String,
    /// USD, fractions allowed.
    #[serde(serialize_with = "serialize_amount")]
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// The caller-supplied part of an offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferSubmission {
    pub email: String,
    #[serde(serialize_with = "serialize_amount")]
    pub amount: f64,
    #[serde(default)]
    pub description: Option<String>,
}

impl OfferSubmission {
    pub fn validate(&self) -> CoreResult<()> {
        if self.email.trim().is_empty() {
            return Err(CoreError::Validation("email is required".to_string()));
        }
        if !is_valid_amount(self.amount) {
            return Err(CoreError::Validation("amount must be a non-negative number".to_string()));
        }
        Ok(())
    }

    pub fn stamp(self, timestamp: DateTime<Utc>) -> Offer {
        Offer {
            email: self.email,
            amount: self.amount,
            description: self.description,
            timestamp,
        }
    }
}

/// An offer tagged with the domain it was made for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainOffer {
    pub domain: String,
    #[serde(flatten)]
    pub offer: Offer,
}

/// Sorts offers newest timestamp first.
pub fn sort_newest_first(offers: &mut [Offer]) {
    offers.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

// ============================================================================
// Receipts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCount {
    pub domain: String,
    pub requests: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitCount {
    pub domain: String,
    pub visits: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedOffer {
    pub domain: String,
    pub offer: Offer,
    pub total_offers: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAck {
    pub domain: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LedgerAck {
    pub fn new(domain: &str, message: &str) -> Self {
        Self {
            domain: domain.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        }
    }
}

// ============================================================================
// Stats
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainStat {
    pub domain: String,
    pub visits: u64,
    pub last_offer: Option<DateTime<Utc>>,
    /// Mean rounded to the nearest dollar.
    pub avg_offer: u64,
    #[serde(serialize_with = "serialize_amount")]
    pub top_offer: f64,
    pub offer_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn offer_at(amount: f64, at: DateTime<Utc>) -> Offer {
        Offer {
            email: "bidder@example.com".to_string(),
            amount,
            description: None,
            timestamp: at,
        }
    }

    #[test]
    fn test_sort_newest_first_ignores_insertion_order() {
        let base = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let mut offers = vec![
            offer_at(1.0, base + Duration::seconds(5)),
            offer_at(2.0, base),
            offer_at(3.0, base + Duration::seconds(30)),
            offer_at(4.0, base + Duration::milliseconds(1)),
        ];

        sort_newest_first(&mut offers);

        let amounts: Vec<f64> = offers.iter().map(|o| o.amount).collect();
        assert_eq!(amounts, vec![3.0, 1.0, 4.0, 2.0]);
    }

    #[test]
    fn test_submission_requires_email() {
        let submission = OfferSubmission {
            email: "   ".to_string(),
            amount: 100.0,
            description: None,
        };
        assert!(matches!(submission.validate(), Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_submission_amount_bounds() {
        let with_amount = |amount: f64| OfferSubmission {
            email: "a@b.com".to_string(),
            amount,
            description: None,
        };
        assert!(with_amount(0.0).validate().is_ok());
        assert!(with_amount(1500.5).validate().is_ok());
        assert!(with_amount(-1.0).validate().is_err());
        assert!(with_amount(f64::NAN).validate().is_err());
        assert!(with_amount(f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_amount_keeps_fraction_on_the_wire() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let value = serde_json::to_value(offer_at(1500.5, at)).unwrap();
        assert_eq!(value["amount"], 1500.5);

        let back: Offer = serde_json::from_value(value).unwrap();
        assert_eq!(back.amount, 1500.5);
    }

    #[test]
    fn test_offer_wire_shape() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let submitted = SubmittedOffer {
            domain: "example.com".to_string(),
            offer: OfferSubmission {
                email: "a@b.com".to_string(),
                amount: 5000.0,
                description: Some("x".to_string()),
            }
            .stamp(at),
            total_offers: 1,
        };

        let value = serde_json::to_value(&submitted).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "domain": "example.com",
                "offer": {
                    "email": "a@b.com",
                    "amount": 5000,
                    "description": "x",
                    "timestamp": "2025-03-01T12:00:00Z",
                },
                "totalOffers": 1,
            })
        );
    }

    #[test]
    fn test_domain_offer_is_flattened() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let tagged = DomainOffer {
            domain: "example.com".to_string(),
            offer: offer_at(10.0, at),
        };

        let value = serde_json::to_value(&tagged).unwrap();
        assert_eq!(value["domain"], "example.com");
        assert_eq!(value["amount"], 10);
        assert!(value.get("description").is_none());
    }
}
