use serde::Serialize;
use voicely_core::config::{AppConfig, LoadOptions};
use voicely_core::tenant::{FileTenantLoader, TenantId, TenantLoader};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub overall_status: CheckStatus,
    pub summary: String,
    pub checks: Vec<DoctorCheck>,
}

/// Renders the report and returns whether every check passed.
pub fn run(options: LoadOptions, json_output: bool) -> (bool, String) {
    let report = build_report(options);
    let passed = report.overall_status == CheckStatus::Pass;

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return (passed, output);
    }

    (passed, render_human(&report))
}

pub fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_tenants_dir(&config));
            checks.push(check_default_tenant(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["tenants_dir", "default_tenant"] {
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

fn check_tenants_dir(config: &AppConfig) -> DoctorCheck {
    let dir = &config.tenants.dir;
    if dir.is_dir() {
        DoctorCheck {
            name: "tenants_dir",
            status: CheckStatus::Pass,
            details: format!("tenant records are read from `{}`", dir.display()),
        }
    } else {
        DoctorCheck {
            name: "tenants_dir",
            status: CheckStatus::Fail,
            details: format!(
                "`{}` does not exist; run `voicely create-tenant <id>` to create it",
                dir.display()
            ),
        }
    }
}

/// Loads the default tenant exactly as the webhook would.
fn check_default_tenant(config: &AppConfig) -> DoctorCheck {
    let loader = FileTenantLoader::from_app_config(config);
    match loader.load(&TenantId::default_tenant()) {
        Ok(profile) => DoctorCheck {
            name: "default_tenant",
            status: CheckStatus::Pass,
            details: format!(
                "catalog loaded with {} package(s) and {} addon(s)",
                profile.catalog.packages.len(),
                profile.catalog.addons.len()
            ),
        },
        Err(error) => {
            DoctorCheck { name: "default_tenant", status: CheckStatus::Fail, details: error.to_string() }
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
