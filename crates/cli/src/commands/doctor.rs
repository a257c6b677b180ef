use aerolens_agent::HttpReasoningClient;
use aerolens_core::config::{AppConfig, ConfigError, LoadOptions};
use aerolens_core::router::triggers_for;
use aerolens_core::SpecialistDomain;
use aerolens_gateway::TokenManager;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report(AppConfig::load(LoadOptions::default()));

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        });
    }

    render_human(&report)
}

fn build_report(config_result: Result<AppConfig, ConfigError>) -> DoctorReport {
    let mut checks = Vec::new();

    match config_result {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_gateway_credentials(&config));
            checks.push(check_reasoning_client(&config));
            checks.push(check_routing(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["gateway_credentials", "reasoning_client", "routing"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped: configuration did not validate".to_string(),
                });
            }
        }
    }

    let failed = checks.iter().filter(|check| check.status == CheckStatus::Fail).count();
    let overall_status = if failed == 0 { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if failed == 0 {
        format!("{} checks passed", checks.len())
    } else {
        format!("{failed} of {} checks failed", checks.len())
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_gateway_credentials(config: &AppConfig) -> DoctorCheck {
    let manager = match TokenManager::from_config(&config.gateway) {
        Ok(manager) => manager,
        Err(error) => {
            return DoctorCheck {
                name: "gateway_credentials",
                status: CheckStatus::Fail,
                details: error.to_string(),
            }
        }
    };

    if config.gateway.auth.has_static_token() {
        return DoctorCheck {
            name: "gateway_credentials",
            status: CheckStatus::Pass,
            details: "static bearer token configured".to_string(),
        };
    }

    // Client-credentials mode: actually exercise the token endpoint.
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "gateway_credentials",
                status: CheckStatus::Fail,
                details: format!("runtime initialization failed: {error}"),
            }
        }
    };

    match runtime.block_on(manager.probe()) {
        Ok(()) => DoctorCheck {
            name: "gateway_credentials",
            status: CheckStatus::Pass,
            details: "token endpoint issued an access token".to_string(),
        },
        Err(error) => DoctorCheck {
            name: "gateway_credentials",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_reasoning_client(config: &AppConfig) -> DoctorCheck {
    match HttpReasoningClient::from_config(&config.llm) {
        Ok(_) => DoctorCheck {
            name: "reasoning_client",
            status: CheckStatus::Pass,
            details: format!("{:?} client ready (model {})", config.llm.provider, config.llm.model),
        },
        Err(error) => DoctorCheck {
            name: "reasoning_client",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_routing(config: &AppConfig) -> DoctorCheck {
    DoctorCheck {
        name: "routing",
        status: CheckStatus::Pass,
        details: format!(
            "default domain {}; {} maintenance triggers, {} operations triggers",
            config.routing.default_domain,
            triggers_for(SpecialistDomain::Maintenance).len(),
            triggers_for(SpecialistDomain::Operations).len()
        ),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![format!("doctor: {}", report.summary)];
    for check in &report.checks {
        let status = match check.status {
            CheckStatus::Pass => "PASS",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Skipped => "SKIP",
        };
        lines.push(format!("  {status} {} - {}", check.name, check.details));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use aerolens_core::config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};

    use super::{build_report, render_human, CheckStatus};

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.gateway.auth.static_token = Some("bearer-test".to_string().into());
        config.validate().expect("fixture config must validate");
        config
    }

    #[test]
    fn all_checks_pass_with_a_valid_static_token_config() {
        let report = build_report(Ok(valid_config()));

        assert_eq!(report.overall_status, CheckStatus::Pass);
        assert_eq!(report.checks.len(), 4);
        assert!(report.checks.iter().all(|check| check.status == CheckStatus::Pass));
    }

    #[test]
    fn config_failure_skips_the_downstream_checks() {
        let load_error = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides::default(),
            require_file: true,
            config_path: Some("/nonexistent/aerolens.toml".into()),
        })
        .expect_err("load must fail");
        let report = build_report(Err::<AppConfig, ConfigError>(load_error));

        assert_eq!(report.overall_status, CheckStatus::Fail);
        assert!(report
            .checks
            .iter()
            .skip(1)
            .all(|check| check.status == CheckStatus::Skipped));
    }

    #[test]
    fn human_rendering_labels_each_check() {
        let report = build_report(Ok(valid_config()));
        let rendered = render_human(&report);

        assert!(rendered.contains("PASS config_validation"));
        assert!(rendered.contains("PASS gateway_credentials"));
        assert!(rendered.contains("PASS routing"));
    }
}
