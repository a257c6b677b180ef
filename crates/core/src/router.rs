use serde::{Deserialize, Serialize};

use crate::domain::classification::{ClassificationResult, SpecialistDomain};

/// Trigger lexicons are matched case-insensitively as substrings of the
/// normalized query, so plural and inflected forms match their stem.
const MAINTENANCE_TRIGGERS: &[&str] = &[
    "maintenance",
    "fault",
    "failure",
    "component",
    "reliability",
    "sensor",
    "reading",
    "repair",
    "hydraulic",
    "engine",
    "avionics",
    "severity",
    "critical",
    "inspection",
    "overhaul",
];

const OPERATIONS_TRIGGERS: &[&str] = &[
    "flight",
    "delay",
    "route",
    "airport",
    "operator",
    "schedule",
    "departure",
    "arrival",
    "on-time",
    "on time",
    "airline",
    "carrier",
    "cancellation",
    "turnaround",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Where ambiguous traffic lands. Operations carries the broader
    /// general-purpose coverage, so it is the shipped default.
    pub default_domain: SpecialistDomain,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self { default_domain: SpecialistDomain::Operations }
    }
}

/// Deterministic lexical classifier. No model call and no I/O: routing
/// decisions must stay auditable and available when the reasoning provider
/// is not.
#[derive(Clone, Debug, Default)]
pub struct IntentRouter {
    config: RouterConfig,
}

impl IntentRouter {
    pub fn new(config: RouterConfig) -> Self {
        Self { config }
    }

    pub fn default_domain(&self) -> SpecialistDomain {
        self.config.default_domain
    }

    /// Domain matches are independent membership tests, never mutually
    /// exclusive branches: a query firing both lexicons is cross-domain.
    pub fn classify(&self, text: &str) -> ClassificationResult {
        let normalized = normalize(text);

        let mut matched_domains = Vec::new();
        let mut fired = Vec::new();
        for domain in SpecialistDomain::ALL {
            let hits = matched_triggers(domain, &normalized);
            if !hits.is_empty() {
                matched_domains.push(domain);
                fired.push(format!("{domain}: {}", hits.join(", ")));
            }
        }

        if matched_domains.is_empty() {
            return ClassificationResult::fallback(
                self.config.default_domain,
                format!(
                    "no domain triggers matched; defaulting to {}",
                    self.config.default_domain
                ),
            );
        }

        ClassificationResult::matched(matched_domains, fired.join("; "))
    }
}

pub fn triggers_for(domain: SpecialistDomain) -> &'static [&'static str] {
    match domain {
        SpecialistDomain::Maintenance => MAINTENANCE_TRIGGERS,
        SpecialistDomain::Operations => OPERATIONS_TRIGGERS,
    }
}

fn matched_triggers(domain: SpecialistDomain, normalized_text: &str) -> Vec<&'static str> {
    triggers_for(domain)
        .iter()
        .copied()
        .filter(|trigger| normalized_text.contains(trigger))
        .collect()
}

fn normalize(text: &str) -> String {
    text.to_ascii_lowercase()
}
