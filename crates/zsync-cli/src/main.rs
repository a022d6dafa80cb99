use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};
use uuid::Uuid;
use zsync_config::{LdapSettings, ZabbixSchema, ZabbixSettings};
use zsync_ldap::{LdapDirectory, LdapSourceConfig};
use zsync_reconcile::{
    run_sync, GroupId, OsRngSecretGenerator, ProtectionPolicy, RunReport, SyncError,
};
use zsync_zabbix::{ApiSchema, ZabbixClient, ZabbixConfig};

mod report;

use report::{sink_for, RunMeta};

const EXIT_OK: u8 = 0;
/// Fatal: configuration, directory or target unavailable, empty directory.
const EXIT_FATAL: u8 = 1;
/// Run completed but the target rejected at least one mutation.
const EXIT_MUTATION_FAILURES: u8 = 2;

#[derive(Parser)]
#[command(name = "zsync")]
#[command(about = "Synchronize Zabbix users with the members of an LDAP group", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short = 'c', long = "config-file", value_name = "PATH")]
    config_file: PathBuf,
}

fn init_tracing() {
    // stdout carries the report; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    // clap's own usage-error code (2) would collide with EXIT_MUTATION_FAILURES.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(EXIT_FATAL);
        }
    };

    init_tracing();

    let outcome = run(&cli);
    if let Err(e) = &outcome {
        error!(error = %format!("{e:#}"), "sync aborted");
        eprintln!("error: {e:#}");
    }
    ExitCode::from(exit_status(&outcome))
}

/// Process status for a finished (or aborted) run.
fn exit_status(outcome: &Result<RunReport>) -> u8 {
    match outcome {
        Ok(report) if report.has_failures() => EXIT_MUTATION_FAILURES,
        Ok(_) => EXIT_OK,
        Err(_) => EXIT_FATAL,
    }
}

fn run(cli: &Cli) -> Result<RunReport> {
    let started = Instant::now();
    let run_id = Uuid::new_v4();
    let started_at_utc = Utc::now();

    let loaded = zsync_config::load_sync_config(&cli.config_file)
        .map_err(|e| SyncError::Config(format!("{e:#}")))?;
    for pointer in &loaded.unused_leaf_pointers {
        warn!(pointer = %pointer, "config key is not used");
    }
    info!(
        run_id = %run_id,
        config_hash = %loaded.config_hash,
        config_file = %cli.config_file.display(),
        "configuration loaded"
    );

    let settings = loaded.settings;
    let policy = ProtectionPolicy::for_service_account(
        &settings.zabbix.user,
        settings.zabbix.protected.iter().cloned(),
    );
    let group = GroupId::new(settings.zabbix.usrgrpid.clone());

    let mut directory = LdapDirectory::new(ldap_source_config(&settings.ldap));
    let mut zabbix = ZabbixClient::new(zabbix_config(&settings.zabbix))
        .map_err(|e| SyncError::TargetSystemUnavailable(e.to_string()))?;

    let outcome = run_sync(
        &mut directory,
        &mut zabbix,
        &policy,
        &OsRngSecretGenerator,
        &group,
    );
    zabbix.logout();
    let report = outcome?.with_elapsed(started.elapsed());

    let meta = RunMeta {
        run_id: run_id.to_string(),
        started_at_utc,
        config_hash: loaded.config_hash,
    };
    let stdout = std::io::stdout();
    sink_for(settings.report_format, meta, stdout.lock())
        .emit(&report)
        .context("write run report")?;

    Ok(report)
}

fn ldap_source_config(ldap: &LdapSettings) -> LdapSourceConfig {
    LdapSourceConfig {
        url: ldap.url.clone(),
        port: ldap.port,
        bind_dn: ldap.bind_dn.clone(),
        bind_password: ldap.bind_password.expose().to_string(),
        base_dn: ldap.base_dn.clone(),
        filter: ldap.filter.clone(),
        member_attribute: ldap.member_attribute.clone(),
        timeout: Duration::from_secs(ldap.timeout_secs),
    }
}

fn zabbix_config(zabbix: &ZabbixSettings) -> ZabbixConfig {
    ZabbixConfig {
        url: zabbix.url.clone(),
        user: zabbix.user.clone(),
        password: zabbix.password.expose().to_string(),
        schema: match zabbix.schema {
            ZabbixSchema::Legacy => ApiSchema::Legacy,
            ZabbixSchema::Modern => ApiSchema::Modern,
        },
        timeout: Duration::from_secs(zabbix.timeout_secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zsync_reconcile::{Identity, MutationFailure};

    #[test]
    fn clean_run_exits_zero() {
        let report = RunReport {
            created: 2,
            deleted: 1,
            ..RunReport::empty()
        };
        assert_eq!(exit_status(&Ok(report)), 0);
    }

    #[test]
    fn no_op_run_exits_zero() {
        assert_eq!(exit_status(&Ok(RunReport::empty())), 0);
    }

    #[test]
    fn mutation_failures_exit_two() {
        let report = RunReport {
            created: 1,
            failures: vec![MutationFailure::CreateRejected {
                identity: Identity::new("carol"),
                cause: "api error -32602: Invalid params.".to_string(),
            }],
            ..RunReport::empty()
        };
        assert_eq!(exit_status(&Ok(report)), 2);
    }

    #[test]
    fn fatal_errors_exit_one() {
        let outcome: Result<RunReport> = Err(SyncError::EmptyAuthoritativeSource.into());
        assert_eq!(exit_status(&outcome), 1);

        let outcome: Result<RunReport> = Err(anyhow::anyhow!("write run report"));
        assert_eq!(exit_status(&outcome), 1);
    }
}
