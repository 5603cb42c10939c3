//! Wires the CLI to live collaborators and runs one site on a
//! single-threaded runtime.

use anyhow::{Context, Result};
use tokio::runtime::Builder;
use tracing::{info, warn};

use crate::classify::{AnyProvider, LlmClassifier, DEFAULT_LLM_TIMEOUT};
use crate::config::{load_file_config, resolve_credentials, Cli, Credentials};
use crate::pipeline::Pipeline;
use crate::policy::ValidationPolicy;
use crate::profiler::{Profiler, SiteProfiler};
use crate::report::{
    append_ledger, default_report_path, render_profile_summary, render_summary, write_json,
};
use crate::search::FofaClient;

/// Validates configuration, then analyzes `cli.url`.
///
/// Configuration problems are reported before any request is made.
pub fn run(cli: Cli) -> Result<()> {
    cli.validate_url()?;
    let policy = cli.build_policy()?;
    let credentials = if cli.no_analysis {
        None
    } else {
        let file = load_file_config(cli.config.as_deref())?;
        Some(resolve_credentials(&cli, &file)?)
    };

    let rt = Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    rt.block_on(run_site(&cli, policy, credentials))
}

async fn run_site(
    cli: &Cli,
    policy: ValidationPolicy,
    credentials: Option<Credentials>,
) -> Result<()> {
    let site_url = cli.url.as_str();
    let profiler = SiteProfiler::new(cli.fetch_settings());

    info!(site = site_url, "extracting resources");
    let profile = profiler
        .profile(site_url)
        .await
        .with_context(|| format!("failed to extract resources from {site_url}"))?;

    let Some(credentials) = credentials else {
        warn!("skipping classification and validation (--no-analysis)");
        if let Some(path) = &cli.output {
            write_json(path, &profile)
                .with_context(|| format!("failed to write profile {}", path.display()))?;
            info!(path = %path.display(), "raw profile saved");
        }
        println!("{}", render_profile_summary(&profile));
        return Ok(());
    };

    let provider = AnyProvider::build(
        cli.llm_provider,
        credentials.llm_api_key,
        credentials.llm_base_url.as_deref(),
        credentials.llm_model.as_deref(),
        DEFAULT_LLM_TIMEOUT,
    )
    .context("failed to set up classification provider")?;
    let classifier = LlmClassifier::new(provider).with_max_tokens(cli.llm_max_tokens);
    let search = FofaClient::new(
        &credentials.fofa_api,
        credentials.fofa_key,
        cli.page_size,
        cli.search_timeout(),
    )
    .context("failed to set up search client")?;

    let pipeline =
        Pipeline::new(profiler, classifier, search, policy).with_icon_check(!cli.skip_icon);
    let report = pipeline.analyze_profile(profile).await;

    let path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_report_path(&report.url));
    write_json(&path, &report)
        .with_context(|| format!("failed to write report {}", path.display()))?;
    info!(path = %path.display(), "report saved");

    let appended = append_ledger(&cli.ledger, &report)
        .with_context(|| format!("failed to append ledger {}", cli.ledger.display()))?;
    if appended > 0 {
        info!(path = %cli.ledger.display(), appended, "ledger updated");
    }

    println!("{}", render_summary(&report));
    Ok(())
}
