use chrono::{DateTime, Utc};
use deskpilot_agent::router::{IntentRouter, RouterSettings};
use deskpilot_core::config::{AppConfig, LoadOptions};
use deskpilot_core::Intent;
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
    checked_at: DateTime<Utc>,
    checks: Vec<DoctorCheck>,
}

const ROUTING_PROBES: [(&str, Intent); 2] = [
    ("the printer is broken, please open a ticket", Intent::TicketCreation),
    ("where is the wiki page for the vpn setup", Intent::KnowledgeQuery),
];

const DEPENDENT_CHECKS: [&str; 5] =
    ["routing_keywords", "remote_classifier", "tool_bindings", "tool_provider", "routing_probe"];

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_routing_keywords(&config));
            checks.push(check_remote_classifier(&config));
            checks.push(check_tool_bindings(&config));
            checks.push(check_tool_provider(&config));
            checks.push(check_routing_probe(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checked_at: Utc::now(), checks }
}

fn check_routing_keywords(config: &AppConfig) -> DoctorCheck {
    let routing = &config.routing;
    let strict = routing.ticket_keywords.len()
        + routing.agent_keywords.len()
        + routing.knowledge_keywords.len();
    let loose = routing.fallback_ticket_keywords.len() + routing.fallback_knowledge_keywords.len();

    if strict + loose == 0 {
        return DoctorCheck {
            name: "routing_keywords",
            status: CheckStatus::Fail,
            details: "every keyword list is empty; all turns would route to general chat"
                .to_string(),
        };
    }

    DoctorCheck {
        name: "routing_keywords",
        status: CheckStatus::Pass,
        details: format!("{strict} strict and {loose} fallback keywords loaded"),
    }
}

fn check_remote_classifier(config: &AppConfig) -> DoctorCheck {
    if !config.routing.remote_classification {
        return DoctorCheck {
            name: "remote_classifier",
            status: CheckStatus::Skipped,
            details: "remote classification disabled; keyword layers only".to_string(),
        };
    }

    DoctorCheck {
        name: "remote_classifier",
        status: CheckStatus::Pass,
        details: format!(
            "provider `{}` model `{}` with a {}ms deadline",
            config.llm.provider.as_str(),
            config.llm.model,
            config.routing.classification_timeout_ms
        ),
    }
}

fn check_tool_bindings(config: &AppConfig) -> DoctorCheck {
    let tools = &config.tools;
    if tools.ticket_tool == tools.wiki_tool {
        return DoctorCheck {
            name: "tool_bindings",
            status: CheckStatus::Fail,
            details: format!(
                "ticket and wiki handlers are both bound to `{}`",
                tools.ticket_tool
            ),
        };
    }

    DoctorCheck {
        name: "tool_bindings",
        status: CheckStatus::Pass,
        details: format!("ticket -> `{}`, wiki -> `{}`", tools.ticket_tool, tools.wiki_tool),
    }
}

fn check_tool_provider(config: &AppConfig) -> DoctorCheck {
    let Some(url) = config.tools.provider_url.as_deref() else {
        return DoctorCheck {
            name: "tool_provider",
            status: CheckStatus::Skipped,
            details: "no tool provider configured".to_string(),
        };
    };

    let token = if config.tools.provider_token.is_some() { "with" } else { "without" };
    let format = config.tools.expected_format.map(|format| format.as_str()).unwrap_or("auto");
    DoctorCheck {
        name: "tool_provider",
        status: CheckStatus::Pass,
        details: format!("`{url}` {token} token, response format {format}"),
    }
}

/// Runs known phrases through the keyword layers on a throwaway runtime.
fn check_routing_probe(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "routing_probe",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let router = IntentRouter::new(RouterSettings::from(&config.routing), None);
    let mismatches = runtime.block_on(async {
        let mut mismatches = Vec::new();
        for (phrase, expected) in ROUTING_PROBES {
            let decision = router.route(phrase, "doctor-probe").await;
            if decision.intent != expected {
                mismatches.push(format!("`{phrase}` -> {} (expected {expected})", decision.intent));
            }
        }
        mismatches
    });

    if mismatches.is_empty() {
        DoctorCheck {
            name: "routing_probe",
            status: CheckStatus::Pass,
            details: format!("{} probe phrases routed as expected", ROUTING_PROBES.len()),
        }
    } else {
        DoctorCheck {
            name: "routing_probe",
            status: CheckStatus::Fail,
            details: mismatches.join("; "),
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
