use std::collections::HashMap;
use uuid::Uuid;

/// A participant's income as of the moment a cost is being split.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticipantIncome {
    pub participant_id: Uuid,
    pub income: f64,
}

/// Splits `total` across the participants in proportion to their incomes.
/// Shares are returned unrounded; presentation layers round for display.
///
/// Every participant receives a zero share when there is nothing meaningful
/// to split: a non-finite or non-positive total, an empty participant set,
/// or incomes that sum to zero (or fail to sum to a finite positive value).
pub fn split_by_income(
    total: f64,
    participant_incomes: &[ParticipantIncome],
) -> HashMap<Uuid, f64> {
    let zero_shares = || {
        participant_incomes
            .iter()
            .map(|p| (p.participant_id, 0.0))
            .collect()
    };

    if !total.is_finite() || total <= 0.0 {
        return zero_shares();
    }

    let income_sum: f64 = participant_incomes.iter().map(|p| p.income).sum();

    if !income_sum.is_finite() || income_sum <= 0.0 {
        return zero_shares();
    }

    participant_incomes
        .iter()
        .map(|p| (p.participant_id, total * (p.income / income_sum)))
        .collect()
}
