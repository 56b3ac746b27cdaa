use pizzabot_core::config::{AppConfig, LoadOptions};
use pizzabot_db::{connect_with_settings, connection::ping, migrations};
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::commands::{block_on, escape_json, CommandResult};

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

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
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

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            checks.push(check_signing_secret(&config));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            for name in ["signing_secret_readiness", "database_connectivity", "schema"] {
                checks.push(DoctorCheck::skipped(name, "configuration did not load"));
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

fn check_signing_secret(config: &AppConfig) -> DoctorCheck {
    let length = config.slack.signing_secret.expose_secret().trim().len();
    DoctorCheck::pass(
        "signing_secret_readiness",
        format!("signing secret present ({length} characters, value redacted)"),
    )
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let checked = block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;
        ping(&pool).await.map_err(|error| format!("database query failed: {error}"))?;

        let pending = migrations::pending_versions(&pool)
            .await
            .map_err(|error| format!("failed to read migration history: {error}"))?;

        pool.close().await;
        Ok::<Vec<i64>, String>(pending)
    });

    let checked = checked.unwrap_or_else(|error| Err(format!("failed to initialize async runtime: {error}")));

    match checked {
        Ok(pending) => {
            let connectivity = DoctorCheck::pass(
                "database_connectivity",
                format!("connected using `{}`", config.database.url),
            );
            let schema = if pending.is_empty() {
                DoctorCheck::pass("schema", "all migrations applied")
            } else {
                let versions: Vec<String> = pending.iter().map(i64::to_string).collect();
                DoctorCheck::fail(
                    "schema",
                    format!("pending migrations: {}; run `pizzabot migrate`", versions.join(", ")),
                )
            };
            vec![connectivity, schema]
        }
        Err(error) => vec![
            DoctorCheck::fail("database_connectivity", error),
            DoctorCheck::skipped("schema", "the database was unreachable"),
        ],
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
