//! Donation request and donation models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{WorkflowError, WorkflowResult};
use crate::review::ReviewStatus;

/// Unit system of a campaign: whole currency units or item counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DonationKind {
    #[serde(alias = "uang")]
    Money,
    #[serde(alias = "barang")]
    Goods,
}

impl DonationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DonationKind::Money => "money",
            DonationKind::Goods => "goods",
        }
    }
}

impl fmt::Display for DonationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DonationKind {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "money" | "uang" => Ok(DonationKind::Money),
            "goods" | "barang" => Ok(DonationKind::Goods),
            other => Err(WorkflowError::Validation(format!(
                "Unknown donation kind: {}",
                other
            ))),
        }
    }
}

/// A fundraising or collection campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub kind: DonationKind,
    pub target_amount: Option<i64>,
    pub target_items: Option<i64>,
    pub status: ReviewStatus,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DonationRequest {
    /// Target in the unit system selected by `kind`
    pub fn target(&self) -> i64 {
        match self.kind {
            DonationKind::Money => self.target_amount.unwrap_or(0),
            DonationKind::Goods => self.target_items.unwrap_or(0),
        }
    }
}

/// New donation request payload
#[derive(Debug, Clone, Deserialize)]
pub struct NewDonationRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(alias = "type")]
    pub kind: DonationKind,
    #[serde(default)]
    pub target_amount: Option<i64>,
    #[serde(default)]
    pub target_items: Option<i64>,
}

/// Donation request update payload
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateDonationRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(alias = "type")]
    pub kind: Option<DonationKind>,
    pub target_amount: Option<i64>,
    pub target_items: Option<i64>,
}

impl UpdateDonationRequest {
    /// Merge the changes over the current values into a full payload
    pub fn merge(self, current: &DonationRequest) -> NewDonationRequest {
        NewDonationRequest {
            title: self.title.unwrap_or_else(|| current.title.clone()),
            description: self
                .description
                .unwrap_or_else(|| current.description.clone()),
            category: self.category.unwrap_or_else(|| current.category.clone()),
            kind: self.kind.unwrap_or(current.kind),
            target_amount: self.target_amount.or(current.target_amount),
            target_items: self.target_items.or(current.target_items),
        }
    }
}

/// Filter for donation request listings
#[derive(Debug, Clone, Copy, Default)]
pub struct DonationRequestFilter {
    pub status: Option<ReviewStatus>,
    pub user_id: Option<Uuid>,
}

impl DonationRequestFilter {
    pub fn matches(&self, request: &DonationRequest) -> bool {
        self.status.is_none_or(|status| request.status == status)
            && self.user_id.is_none_or(|user_id| request.user_id == user_id)
    }
}

/// One contribution record against a donation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donation {
    pub id: Uuid,
    pub donation_request_id: Uuid,
    pub user_id: Uuid,
    pub kind: DonationKind,
    pub amount: Option<i64>,
    pub item_description: Option<String>,
    pub quantity: Option<i64>,
    pub item_image: Option<String>,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Donation {
    /// Contributed quantity in the unit system of its kind
    pub fn units(&self) -> i64 {
        match self.kind {
            DonationKind::Money => self.amount.unwrap_or(0),
            DonationKind::Goods => self.quantity.unwrap_or(0),
        }
    }

    /// Replace the contributed values, keeping identity and review status
    pub fn apply(&mut self, contribution: Contribution) {
        let (amount, item_description, quantity, item_image) = contribution.into_columns();
        self.amount = amount;
        self.item_description = item_description;
        self.quantity = quantity;
        self.item_image = item_image;
        self.updated_at = Utc::now();
    }
}

/// Raw donation payload as submitted by a donor
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DonationPayload {
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub item_description: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub item_image: Option<String>,
}

/// Validated contribution matching the campaign's kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contribution {
    Money {
        amount: i64,
    },
    Goods {
        description: String,
        quantity: i64,
        image: Option<String>,
    },
}

impl DonationPayload {
    /// Validate the payload against the kind of the target campaign.
    ///
    /// Goods donations without an explicit quantity count as one item.
    pub fn into_contribution(self, kind: DonationKind) -> WorkflowResult<Contribution> {
        match kind {
            DonationKind::Money => {
                if self.item_description.is_some() || self.quantity.is_some() {
                    return Err(WorkflowError::Validation(
                        "Item details are not accepted for money donations".to_string(),
                    ));
                }
                let amount = self.amount.ok_or_else(|| {
                    WorkflowError::Validation("Amount is required for money donations".to_string())
                })?;
                if amount <= 0 {
                    return Err(WorkflowError::Validation(
                        "Amount must be greater than zero".to_string(),
                    ));
                }
                Ok(Contribution::Money { amount })
            }
            DonationKind::Goods => {
                if self.amount.is_some() {
                    return Err(WorkflowError::Validation(
                        "Money amount is not accepted for goods donations".to_string(),
                    ));
                }
                let description = self
                    .item_description
                    .map(|d| d.trim().to_string())
                    .filter(|d| !d.is_empty())
                    .ok_or_else(|| {
                        WorkflowError::Validation(
                            "Item description is required for goods donations".to_string(),
                        )
                    })?;
                let quantity = self.quantity.unwrap_or(1);
                if quantity <= 0 {
                    return Err(WorkflowError::Validation(
                        "Quantity must be greater than zero".to_string(),
                    ));
                }
                let image = self
                    .item_image
                    .map(|i| i.trim().to_string())
                    .filter(|i| !i.is_empty());
                Ok(Contribution::Goods {
                    description,
                    quantity,
                    image,
                })
            }
        }
    }
}

impl Contribution {
    pub fn kind(&self) -> DonationKind {
        match self {
            Contribution::Money { .. } => DonationKind::Money,
            Contribution::Goods { .. } => DonationKind::Goods,
        }
    }

    /// Amount, item description, quantity and item image as stored
    fn into_columns(self) -> (Option<i64>, Option<String>, Option<i64>, Option<String>) {
        match self {
            Contribution::Money { amount } => (Some(amount), None, None, None),
            Contribution::Goods {
                description,
                quantity,
                image,
            } => (None, Some(description), Some(quantity), image),
        }
    }

    /// Build the stored record for this contribution
    pub fn into_donation(self, donation_request_id: Uuid, user_id: Uuid) -> Donation {
        let now = Utc::now();
        let kind = self.kind();
        let (amount, item_description, quantity, item_image) = self.into_columns();

        Donation {
            id: Uuid::new_v4(),
            donation_request_id,
            user_id,
            kind,
            amount,
            item_description,
            quantity,
            item_image,
            status: ReviewStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Filter for donation listings
#[derive(Debug, Clone, Copy, Default)]
pub struct DonationFilter {
    pub user_id: Option<Uuid>,
    pub donation_request_id: Option<Uuid>,
}

impl DonationFilter {
    pub fn matches(&self, donation: &Donation) -> bool {
        self.user_id.is_none_or(|user_id| donation.user_id == user_id)
            && self
                .donation_request_id
                .is_none_or(|id| donation.donation_request_id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_accepts_indonesian_aliases() {
        let kind: DonationKind = serde_json::from_str("\"uang\"").unwrap();
        assert_eq!(kind, DonationKind::Money);
        let kind: DonationKind = serde_json::from_str("\"barang\"").unwrap();
        assert_eq!(kind, DonationKind::Goods);
        assert_eq!("goods".parse::<DonationKind>().unwrap(), DonationKind::Goods);
    }

    #[test]
    fn test_money_payload_requires_positive_amount() {
        let payload = DonationPayload {
            amount: Some(0),
            ..Default::default()
        };
        let err = payload.into_contribution(DonationKind::Money).unwrap_err();
        assert_eq!(err.kind(), "validation");

        let missing = DonationPayload::default()
            .into_contribution(DonationKind::Money)
            .unwrap_err();
        assert_eq!(missing.kind(), "validation");

        let ok = DonationPayload {
            amount: Some(30_000),
            ..Default::default()
        }
        .into_contribution(DonationKind::Money)
        .unwrap();
        assert_eq!(ok, Contribution::Money { amount: 30_000 });
    }

    #[test]
    fn test_goods_payload_defaults_quantity_to_one() {
        let contribution = DonationPayload {
            item_description: Some("  beras 5kg ".to_string()),
            item_image: Some(" ".to_string()),
            ..Default::default()
        }
        .into_contribution(DonationKind::Goods)
        .unwrap();

        assert_eq!(
            contribution,
            Contribution::Goods {
                description: "beras 5kg".to_string(),
                quantity: 1,
                image: None,
            }
        );
    }

    #[test]
    fn test_payload_must_match_kind() {
        let goods_for_money = DonationPayload {
            item_description: Some("selimut".to_string()),
            ..Default::default()
        };
        assert_eq!(
            goods_for_money
                .into_contribution(DonationKind::Money)
                .unwrap_err()
                .kind(),
            "validation"
        );

        let money_for_goods = DonationPayload {
            amount: Some(10_000),
            item_description: Some("selimut".to_string()),
            ..Default::default()
        };
        assert_eq!(
            money_for_goods
                .into_contribution(DonationKind::Goods)
                .unwrap_err()
                .kind(),
            "validation"
        );
    }

    #[test]
    fn test_goods_payload_rejects_blank_description_and_bad_quantity() {
        let blank = DonationPayload {
            item_description: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(blank.into_contribution(DonationKind::Goods).is_err());

        let negative = DonationPayload {
            item_description: Some("buku".to_string()),
            quantity: Some(-2),
            ..Default::default()
        };
        assert!(negative.into_contribution(DonationKind::Goods).is_err());
    }

    #[test]
    fn test_into_donation_sets_only_matching_fields() {
        let request_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let donation = Contribution::Goods {
            description: "buku tulis".to_string(),
            quantity: 3,
            image: Some("uploads/buku.jpg".to_string()),
        }
        .into_donation(request_id, user_id);

        assert_eq!(donation.kind, DonationKind::Goods);
        assert_eq!(donation.amount, None);
        assert_eq!(donation.quantity, Some(3));
        assert_eq!(donation.units(), 3);
        assert_eq!(donation.status, ReviewStatus::Pending);
        assert_eq!(donation.donation_request_id, request_id);
    }
}
