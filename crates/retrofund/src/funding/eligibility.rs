use std::collections::{BTreeMap, HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::VoterAddress;

/// Admission rule for a pool's ballots. Exactly one per pool.
///
/// Serialized the way pool managers submit it:
/// `{"eligibilityType": "weighted", "data": {"voters": {"0x..": 50}}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "eligibilityType", content = "data", rename_all = "lowercase")]
pub enum EligibilityCriteria {
    /// Allow-list; every listed voter carries the same weight.
    Linear { voters: Vec<VoterAddress> },
    /// Per-voter influence in [0, 100].
    Weighted {
        voters: BTreeMap<VoterAddress, Decimal>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EligibilityPolicy {
    Linear,
    Weighted,
}

impl EligibilityCriteria {
    pub fn policy(&self) -> EligibilityPolicy {
        match self {
            EligibilityCriteria::Linear { .. } => EligibilityPolicy::Linear,
            EligibilityCriteria::Weighted { .. } => EligibilityPolicy::Weighted,
        }
    }

    /// Write-time validation; stored criteria are assumed to have passed it.
    pub fn validate(&self) -> Result<(), EligibilityError> {
        match self {
            EligibilityCriteria::Linear { voters } => {
                if let Some(voter) = voters.iter().find(|voter| !voter.is_well_formed()) {
                    return Err(EligibilityError::MalformedAddress(voter.clone()));
                }
                Ok(())
            }
            EligibilityCriteria::Weighted { voters } => {
                let mut seen = HashSet::new();
                for (voter, weight) in voters {
                    if !voter.is_well_formed() {
                        return Err(EligibilityError::MalformedAddress(voter.clone()));
                    }
                    if *weight < Decimal::ZERO || *weight > Decimal::ONE_HUNDRED {
                        return Err(EligibilityError::WeightOutOfRange {
                            voter: voter.clone(),
                            weight: *weight,
                        });
                    }
                    if !seen.insert(voter.normalized()) {
                        return Err(EligibilityError::DuplicateVoter(voter.clone()));
                    }
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EligibilityError {
    #[error("{0} is not a valid address")]
    MalformedAddress(VoterAddress),
    #[error("weight {weight} for {voter} must be between 0 and 100")]
    WeightOutOfRange { voter: VoterAddress, weight: Decimal },
    #[error("{0} is listed more than once")]
    DuplicateVoter(VoterAddress),
}

/// Answers "does this voter count, and for how much" against one pool's criteria.
#[derive(Debug, Clone)]
pub struct EligibilityResolver {
    policy: EligibilityPolicy,
    weights: HashMap<String, Decimal>,
}

impl EligibilityResolver {
    pub fn new(criteria: &EligibilityCriteria) -> Self {
        let weights = match criteria {
            EligibilityCriteria::Linear { voters } => voters
                .iter()
                .map(|voter| (voter.normalized(), Decimal::ONE))
                .collect(),
            EligibilityCriteria::Weighted { voters } => voters
                .iter()
                .map(|(voter, weight)| (voter.normalized(), *weight))
                .collect(),
        };

        Self {
            policy: criteria.policy(),
            weights,
        }
    }

    pub fn policy(&self) -> EligibilityPolicy {
        self.policy
    }

    /// Weighted pools treat a stored weight of exactly 0 as "not eligible".
    pub fn is_eligible(&self, voter: &VoterAddress) -> bool {
        match self.policy {
            EligibilityPolicy::Linear => self.weights.contains_key(&voter.normalized()),
            EligibilityPolicy::Weighted => self
                .weight_of(voter)
                .map(|weight| weight > Decimal::ZERO && weight <= Decimal::ONE_HUNDRED)
                .unwrap_or(false),
        }
    }

    /// Stored weight for the voter; linear members always weigh 1.
    pub fn weight_of(&self, voter: &VoterAddress) -> Option<Decimal> {
        self.weights.get(&voter.normalized()).copied()
    }

    /// Weight a ballot from `voter` contributes to aggregation, or `None` when it is discarded.
    pub fn admit(&self, voter: &VoterAddress) -> Option<Decimal> {
        if !self.is_eligible(voter) {
            return None;
        }
        match self.policy {
            EligibilityPolicy::Linear => Some(Decimal::ONE),
            EligibilityPolicy::Weighted if voter.is_well_formed() => self.weight_of(voter),
            EligibilityPolicy::Weighted => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "0x1111111111111111111111111111111111111111";
    const BOB: &str = "0x2222222222222222222222222222222222222222";
    const CAROL: &str = "0xABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD";

    fn weighted(entries: &[(&str, i64)]) -> EligibilityCriteria {
        EligibilityCriteria::Weighted {
            voters: entries
                .iter()
                .map(|(voter, weight)| (VoterAddress::new(*voter), Decimal::from(*weight)))
                .collect(),
        }
    }

    #[test]
    fn linear_membership_is_case_insensitive() {
        let criteria = EligibilityCriteria::Linear {
            voters: vec![VoterAddress::new(CAROL)],
        };
        let resolver = EligibilityResolver::new(&criteria);

        assert!(resolver.is_eligible(&VoterAddress::new(CAROL.to_ascii_lowercase())));
        assert!(!resolver.is_eligible(&VoterAddress::new(ALICE)));
        assert_eq!(
            resolver.admit(&VoterAddress::new(CAROL)),
            Some(Decimal::ONE)
        );
    }

    #[test]
    fn weighted_zero_weight_is_ineligible() {
        let resolver = EligibilityResolver::new(&weighted(&[(ALICE, 0), (BOB, 60)]));

        assert!(!resolver.is_eligible(&VoterAddress::new(ALICE)));
        assert_eq!(resolver.weight_of(&VoterAddress::new(ALICE)), Some(Decimal::ZERO));
        assert_eq!(resolver.admit(&VoterAddress::new(ALICE)), None);
        assert_eq!(
            resolver.admit(&VoterAddress::new(BOB)),
            Some(Decimal::from(60))
        );
    }

    #[test]
    fn weighted_admission_requires_well_formed_address() {
        let criteria = EligibilityCriteria::Weighted {
            voters: BTreeMap::from([(VoterAddress::new("bob.eth"), Decimal::from(40))]),
        };
        let resolver = EligibilityResolver::new(&criteria);
        assert!(resolver.is_eligible(&VoterAddress::new("bob.eth")));
        assert_eq!(resolver.admit(&VoterAddress::new("bob.eth")), None);
    }

    #[test]
    fn validation_rejects_malformed_input() {
        let linear = EligibilityCriteria::Linear {
            voters: vec![VoterAddress::new(ALICE), VoterAddress::new("0xnope")],
        };
        assert_eq!(
            linear.validate(),
            Err(EligibilityError::MalformedAddress(VoterAddress::new("0xnope")))
        );

        assert!(matches!(
            weighted(&[(ALICE, 101)]).validate(),
            Err(EligibilityError::WeightOutOfRange { .. })
        ));
        let carol_lower = CAROL.to_ascii_lowercase();
        assert!(matches!(
            weighted(&[(CAROL, 10), (carol_lower.as_str(), 20)]).validate(),
            Err(EligibilityError::DuplicateVoter(_))
        ));
        assert_eq!(weighted(&[(ALICE, 0), (BOB, 100)]).validate(), Ok(()));
    }

    #[test]
    fn criteria_round_trip_through_manager_payload() {
        let payload = serde_json::json!({
            "eligibilityType": "weighted",
            "data": { "voters": { ALICE: 50, BOB: "100" } }
        });
        let criteria: EligibilityCriteria =
            serde_json::from_value(payload).expect("weighted criteria parse");
        assert_eq!(criteria.policy(), EligibilityPolicy::Weighted);
        assert_eq!(criteria, weighted(&[(ALICE, 50), (BOB, 100)]));
    }
}
