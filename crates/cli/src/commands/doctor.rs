use intune_agent::{AgentCatalog, MANIFEST_FILE};
use intune_core::config::{AppConfig, LoadOptions};
use intune_db::{connect_with_settings, migrations};
use serde::Serialize;

use crate::commands::{current_thread_runtime, escape_json, CommandResult};

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

pub fn run(json_output: bool) -> CommandResult {
    run_with(LoadOptions::default(), json_output)
}

pub fn run_with(options: LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_agent_catalog(&config));
            checks.push(check_session_store(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["agent_catalog", "session_store"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_agent_catalog(config: &AppConfig) -> DoctorCheck {
    let catalog = match AgentCatalog::load(&config.agents.dir) {
        Ok(catalog) => catalog,
        Err(error) => {
            return DoctorCheck {
                name: "agent_catalog",
                status: CheckStatus::Fail,
                details: error.to_string(),
            };
        }
    };

    match catalog.get(&config.agents.root) {
        Some(root) => DoctorCheck {
            name: "agent_catalog",
            status: CheckStatus::Pass,
            details: format!(
                "{} app(s) loaded; root `{}` is `{}` with {} tool(s)",
                catalog.len(),
                config.agents.root,
                root.name,
                root.tools.len()
            ),
        },
        None => DoctorCheck {
            name: "agent_catalog",
            status: CheckStatus::Fail,
            details: format!(
                "root agent manifest `{}` not found",
                config.root_agent_dir().join(MANIFEST_FILE).display()
            ),
        },
    }
}

fn check_session_store(config: &AppConfig) -> DoctorCheck {
    let Some(uri) = config.session.resolve_uri() else {
        return DoctorCheck {
            name: "session_store",
            status: CheckStatus::Pass,
            details: "no persistent store; sessions are held in memory".to_string(),
        };
    };

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "session_store",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &uri,
            config.session.max_connections,
            config.session.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to open session store: {error}"))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| format!("session schema migration failed: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "session_store",
            status: CheckStatus::Pass,
            details: format!("session store ready at `{uri}`"),
        },
        Err(error) => {
            DoctorCheck { name: "session_store", status: CheckStatus::Fail, details: error }
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
