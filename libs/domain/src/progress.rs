//! Donation progress aggregation
//!
//! Progress is always derived from the donation records at read time; no
//! collected total is stored next to the request.

use serde::{Deserialize, Serialize};

use crate::models::{Donation, DonationKind, DonationRequest};
use crate::review::ReviewStatus;

/// Which donation records count towards a campaign's total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPolicy {
    /// Every recorded donation counts, whatever its review status
    #[default]
    AllDonations,
    /// Only donations approved by the campaign owner or an admin count
    ApprovedOnly,
}

impl ProgressPolicy {
    pub fn counts(self, donation: &Donation) -> bool {
        match self {
            ProgressPolicy::AllDonations => true,
            ProgressPolicy::ApprovedOnly => donation.status == ReviewStatus::Approved,
        }
    }
}

/// Collected total and completion percentage of a donation request
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DonationProgress {
    pub kind: DonationKind,
    pub target: i64,
    pub collected: i64,
    /// Completion in percent, rounded to two decimals and capped at 100
    pub percent: f64,
    pub donation_count: usize,
}

/// Compute the progress of `request` from its donation records.
///
/// Records belonging to other requests or of a mismatching kind are ignored.
pub fn compute(
    request: &DonationRequest,
    donations: &[Donation],
    policy: ProgressPolicy,
) -> DonationProgress {
    let counted = donations.iter().filter(|donation| {
        donation.donation_request_id == request.id
            && donation.kind == request.kind
            && policy.counts(donation)
    });

    let (collected, donation_count) = counted.fold((0i64, 0usize), |(sum, count), donation| {
        (sum.saturating_add(donation.units()), count + 1)
    });

    let target = request.target();

    DonationProgress {
        kind: request.kind,
        target,
        collected,
        percent: percent(collected, target),
        donation_count,
    }
}

/// `min(100, round2(100 * collected / target))`, zero when the target is not positive
pub fn percent(collected: i64, target: i64) -> f64 {
    if target <= 0 {
        return 0.0;
    }

    let raw = 100.0 * collected as f64 / target as f64;
    let rounded = (raw * 100.0).round() / 100.0;
    rounded.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Contribution;
    use chrono::Utc;
    use uuid::Uuid;

    fn request(kind: DonationKind, target: i64) -> DonationRequest {
        let now = Utc::now();
        let (target_amount, target_items) = match kind {
            DonationKind::Money => (Some(target), None),
            DonationKind::Goods => (None, Some(target)),
        };
        DonationRequest {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Bantu banjir".to_string(),
            description: "Penggalangan dana".to_string(),
            category: "bencana".to_string(),
            kind,
            target_amount,
            target_items,
            status: ReviewStatus::Approved,
            decided_by: None,
            decided_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn money(request: &DonationRequest, amount: i64) -> Donation {
        Contribution::Money { amount }.into_donation(request.id, Uuid::new_v4())
    }

    fn goods(request: &DonationRequest, quantity: i64) -> Donation {
        Contribution::Goods {
            description: "paket sembako".to_string(),
            quantity,
            image: None,
        }
        .into_donation(request.id, Uuid::new_v4())
    }

    #[test]
    fn test_money_progress() {
        let req = request(DonationKind::Money, 100_000);
        let donations = vec![money(&req, 30_000), money(&req, 45_000)];

        let progress = compute(&req, &donations, ProgressPolicy::AllDonations);
        assert_eq!(progress.collected, 75_000);
        assert_eq!(progress.target, 100_000);
        assert_eq!(progress.percent, 75.00);
        assert_eq!(progress.donation_count, 2);
    }

    #[test]
    fn test_zero_target_is_zero_percent() {
        let req = request(DonationKind::Money, 0);
        let donations = vec![money(&req, 5_000)];

        let progress = compute(&req, &donations, ProgressPolicy::AllDonations);
        assert_eq!(progress.percent, 0.0);
        assert_eq!(progress.collected, 5_000);
    }

    #[test]
    fn test_goods_progress_is_clamped() {
        let req = request(DonationKind::Goods, 10);
        let mut donations = vec![goods(&req, 2), goods(&req, 3), goods(&req, 4)];

        assert_eq!(
            compute(&req, &donations, ProgressPolicy::AllDonations).percent,
            90.00
        );

        donations.push(goods(&req, 2));
        let progress = compute(&req, &donations, ProgressPolicy::AllDonations);
        assert_eq!(progress.collected, 11);
        assert_eq!(progress.percent, 100.00);
    }

    #[test]
    fn test_rounds_to_two_decimals() {
        assert_eq!(percent(1, 3), 33.33);
        assert_eq!(percent(2, 3), 66.67);
    }

    #[test]
    fn test_approved_only_policy() {
        let req = request(DonationKind::Money, 1_000);
        let mut approved = money(&req, 250);
        approved.status = ReviewStatus::Approved;
        let mut rejected = money(&req, 500);
        rejected.status = ReviewStatus::Rejected;
        let pending = money(&req, 100);
        let donations = vec![approved, rejected, pending];

        let all = compute(&req, &donations, ProgressPolicy::AllDonations);
        assert_eq!(all.collected, 850);

        let strict = compute(&req, &donations, ProgressPolicy::ApprovedOnly);
        assert_eq!(strict.collected, 250);
        assert_eq!(strict.percent, 25.0);
        assert_eq!(strict.donation_count, 1);
    }

    #[test]
    fn test_ignores_foreign_records() {
        let req = request(DonationKind::Money, 1_000);
        let other = request(DonationKind::Money, 1_000);
        let donations = vec![money(&req, 100), money(&other, 900)];

        assert_eq!(
            compute(&req, &donations, ProgressPolicy::AllDonations).collected,
            100
        );
    }
}
