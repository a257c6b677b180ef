use aerolens_core::config::{AppConfig, LoadOptions};
use aerolens_core::router::triggers_for;
use aerolens_core::{IntentRouter, RouterConfig, SpecialistDomain};

pub fn run(text: &str) -> String {
    let (router, config_note) = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => (
            IntentRouter::new(RouterConfig { default_domain: config.routing.default_domain }),
            None,
        ),
        Err(error) => (
            IntentRouter::default(),
            Some(format!("note: using built-in default routing (config not loaded: {error})")),
        ),
    };

    let result = router.classify(text);

    let mut lines = vec![
        format!("query: {text}"),
        format!(
            "domains: {}",
            result.domains.iter().map(SpecialistDomain::as_str).collect::<Vec<_>>().join(",")
        ),
        format!("cross_domain: {}", result.is_cross_domain()),
        format!("is_ambiguous: {}", result.is_ambiguous),
        format!("rationale: {}", result.rationale),
    ];
    lines.push(format!(
        "lexicon sizes: maintenance={}, operations={}",
        triggers_for(SpecialistDomain::Maintenance).len(),
        triggers_for(SpecialistDomain::Operations).len()
    ));
    if let Some(note) = config_note {
        lines.push(note);
    }

    lines.join("\n")
}
