use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// The fixed set of specialist domains. Each domain owns its own tool subset
/// and system prompt; a worker is bound to exactly one.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SpecialistDomain {
    Maintenance,
    Operations,
}

impl SpecialistDomain {
    pub const ALL: [SpecialistDomain; 2] =
        [SpecialistDomain::Maintenance, SpecialistDomain::Operations];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Maintenance => "maintenance",
            Self::Operations => "operations",
        }
    }
}

impl std::fmt::Display for SpecialistDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SpecialistDomain {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "maintenance" => Ok(Self::Maintenance),
            "operations" => Ok(Self::Operations),
            other => Err(DomainError::UnknownDomain(other.to_string())),
        }
    }
}

/// Outcome of classifying one query. `domains` is non-empty, sorted, and
/// deduplicated; when `is_ambiguous` is set it holds exactly the configured
/// default domain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub domains: Vec<SpecialistDomain>,
    pub is_ambiguous: bool,
    pub rationale: String,
}

impl ClassificationResult {
    pub fn matched(mut domains: Vec<SpecialistDomain>, rationale: impl Into<String>) -> Self {
        domains.sort();
        domains.dedup();
        Self { domains, is_ambiguous: false, rationale: rationale.into() }
    }

    pub fn fallback(default_domain: SpecialistDomain, rationale: impl Into<String>) -> Self {
        Self { domains: vec![default_domain], is_ambiguous: true, rationale: rationale.into() }
    }

    pub fn is_cross_domain(&self) -> bool {
        self.domains.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::{ClassificationResult, SpecialistDomain};

    #[test]
    fn matched_result_sorts_and_dedups_domains() {
        let result = ClassificationResult::matched(
            vec![
                SpecialistDomain::Operations,
                SpecialistDomain::Maintenance,
                SpecialistDomain::Operations,
            ],
            "both lexicons fired",
        );

        assert_eq!(
            result.domains,
            vec![SpecialistDomain::Maintenance, SpecialistDomain::Operations]
        );
        assert!(result.is_cross_domain());
        assert!(!result.is_ambiguous);
    }

    #[test]
    fn fallback_result_holds_exactly_the_default_domain() {
        let result = ClassificationResult::fallback(SpecialistDomain::Operations, "no trigger");
        assert_eq!(result.domains, vec![SpecialistDomain::Operations]);
        assert!(result.is_ambiguous);
        assert!(!result.is_cross_domain());
    }

    #[test]
    fn domain_round_trips_through_str() {
        for domain in SpecialistDomain::ALL {
            assert_eq!(domain.as_str().parse::<SpecialistDomain>().expect("parse"), domain);
        }
        assert!("catering".parse::<SpecialistDomain>().is_err());
    }
}
