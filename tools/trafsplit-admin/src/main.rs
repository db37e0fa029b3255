// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Traffic-split Administration CLI
//!
//! Command-line tool for editing domains, tests, variants and endpoint URLs
//! of a traffic-splitting backend.
//!
//! # Usage
//!
//! ```bash
//! # Log in (token is kept in the state directory)
//! trafsplit-admin login --user admin
//!
//! # List domains in their saved order
//! trafsplit-admin domains
//!
//! # Replace the default URLs of a domain
//! trafsplit-admin domain sync-urls d1 --url http://a --url http://b
//!
//! # Save an edited test tree
//! trafsplit-admin test sync --file checkout.json
//!
//! # Drain a variant
//! trafsplit-admin variant drain v2
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};
use trafsplit::order::ids_of;
use trafsplit::sync::{self, OpStatus, ReplaceOutcome};
use trafsplit::{
    ActionOutcome, ClientConfig, Domain, Endpoint, FileStore, HttpTransport, KeyValueStore,
    Notice, OrderBook, Session, Severity, SyncReport, Test, TestRef, Variant, DOMAIN_ORDER_KEY,
    VARIANT_ORDER_KEY,
};
use tracing_subscriber::EnvFilter;

/// Traffic-split Administration CLI
#[derive(Parser, Debug)]
#[command(name = "trafsplit-admin")]
#[command(about = "Traffic-split configuration admin")]
#[command(version)]
struct Args {
    /// Configuration file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(long, env = "TRAFSPLIT_API_BASE_URL")]
    api_url: Option<String>,

    /// Directory holding the saved token and list order
    #[arg(long, env = "TRAFSPLIT_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and keep the token
    Login {
        #[arg(short, long)]
        user: String,

        #[arg(short, long, env = "TRAFSPLIT_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the saved token
    Logout,

    /// List domains in their saved order
    Domains,

    /// Domain operations
    Domain {
        #[command(subcommand)]
        cmd: DomainCmd,
    },

    /// Test operations
    Test {
        #[command(subcommand)]
        cmd: TestCmd,
    },

    /// List variants in their saved order
    Variants {
        /// Only variants of this test
        #[arg(short, long)]
        test: Option<String>,

        /// Which variants to show
        #[arg(long, value_enum, default_value = "all")]
        filter: VariantFilter,
    },

    /// Variant operations
    Variant {
        #[command(subcommand)]
        cmd: VariantCmd,
    },

    /// Variant endpoint URL operations
    Endpoint {
        #[command(subcommand)]
        cmd: EndpointCmd,
    },
}

/// Variant list filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum VariantFilter {
    All,
    /// Enabled variants
    Alive,
    /// Disabled variants
    Down,
}

impl VariantFilter {
    fn keeps(self, variant: &Variant) -> bool {
        match self {
            VariantFilter::All => true,
            VariantFilter::Alive => variant.active,
            VariantFilter::Down => !variant.active,
        }
    }
}

#[derive(Subcommand, Debug)]
enum DomainCmd {
    /// Show one domain with its tests and default URLs
    Show { id: String },

    /// Create a domain
    Create { host: String },

    /// Delete a domain with everything under it
    Delete { id: String },

    /// Set the default URLs of a domain
    SyncUrls {
        id: String,

        /// Resulting URL list (repeat for several)
        #[arg(long = "url")]
        urls: Vec<String>,
    },

    /// Move a domain before another one in the list
    Move {
        id: String,

        #[arg(long)]
        before: String,
    },
}

#[derive(Subcommand, Debug)]
enum TestCmd {
    /// Show one test with its variants and URLs
    Show { id: String },

    /// Create a test under a domain
    Create {
        #[arg(long)]
        domain: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        subpath: Option<String>,
    },

    /// Save an edited test tree from a JSON file
    ///
    /// Ids of created entities are written back to the file.
    Sync {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Delete a test
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum VariantCmd {
    /// Add a variant to a test
    Add {
        #[arg(long)]
        test: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        weight: f64,

        /// Endpoint URL (repeat for several)
        #[arg(long = "url")]
        urls: Vec<String>,
    },

    /// Set the weight of a variant
    Weight { id: String, weight: f64 },

    /// Enable a variant (or disable with --off)
    Enable {
        id: String,

        #[arg(long)]
        off: bool,
    },

    /// Stop new traffic to a variant
    Drain { id: String },

    /// Delete a variant
    Delete { id: String },

    /// Move a variant before another one in the list
    Move {
        id: String,

        #[arg(long)]
        before: String,
    },
}

#[derive(Subcommand, Debug)]
enum EndpointCmd {
    /// Attach a URL to a variant
    Add {
        variant: String,
        url: String,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// Remove a URL from a variant
    Remove { variant: String, url: String },

    /// Replace a variant URL, keeping the old one if removal fails
    Replace {
        variant: String,

        #[arg(long)]
        from: String,

        url: String,
    },

    /// Set the description of a URL (at most 50 characters)
    Describe { url: String, description: String },
}

fn main() {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args) {
        match e.downcast_ref::<trafsplit::Error>() {
            Some(trafsplit::Error::PartialSync { source, report }) => {
                print_report(report);
                print_notice(&Notice::from(&**source));
            }
            Some(err) => print_notice(&Notice::from(err)),
            None => eprintln!("{} {:#}", "Error:".red().bold(), e),
        }
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> anyhow::Result<ClientConfig> {
    let mut config = ClientConfig::resolve(args.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(url) = &args.api_url {
        config.api_base_url = url.clone();
    }
    if let Some(dir) = &args.state_dir {
        config.state_dir = dir.clone();
    }
    config.validate()?;
    Ok(config)
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    let store = FileStore::open(&config.state_dir)?;
    let transport = HttpTransport::new(&config)?;
    let mut session = Session::restore(transport, &store)?;
    tracing::debug!("Backend {}, state in {}", config.base_url(), store.path().display());

    match args.command {
        Commands::Login { user, password } => {
            session.login(&store, &user, &password)?;
            print_notice(&Notice::success(format!("Logged in as {}", user)));
        }
        Commands::Logout => {
            session.logout(&store)?;
            print_notice(&Notice::info("Logged out"));
        }
        Commands::Domains => cmd_domains(&mut session, &store)?,
        Commands::Domain { cmd } => cmd_domain(&mut session, &store, cmd)?,
        Commands::Test { cmd } => cmd_test(&mut session, cmd)?,
        Commands::Variants { test, filter } => {
            cmd_variants(&session, &store, test.as_deref(), filter)?
        }
        Commands::Variant { cmd } => cmd_variant(&mut session, &store, cmd)?,
        Commands::Endpoint { cmd } => cmd_endpoint(&mut session, cmd)?,
    }
    Ok(())
}

// ============================================================================
// Domains
// ============================================================================

#[derive(Tabled)]
struct DomainRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Active")]
    active: String,
    #[tabled(rename = "Tests")]
    tests: usize,
    #[tabled(rename = "Default URLs")]
    urls: usize,
}

fn cmd_domains(session: &mut Session<HttpTransport>, store: &FileStore) -> anyhow::Result<()> {
    let domains = session.refresh()?.to_vec();
    let domains = OrderBook::new(store, DOMAIN_ORDER_KEY).apply(domains)?;

    println!("{}", "Domains".cyan().bold());
    println!("  Count: {}", domains.len());
    println!();

    if domains.is_empty() {
        println!("  {}", "No domains configured".yellow());
        return Ok(());
    }

    let rows: Vec<DomainRow> = domains
        .iter()
        .map(|d| DomainRow {
            id: id_or_dash(d.domain_id.as_deref()),
            host: d.host.clone(),
            active: yes_no(d.active),
            tests: d.tests.len(),
            urls: d.default_endpoints.len(),
        })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}

fn cmd_domain(
    session: &mut Session<HttpTransport>,
    store: &FileStore,
    cmd: DomainCmd,
) -> anyhow::Result<()> {
    match cmd {
        DomainCmd::Show { id } => {
            let domain = session.refresh_domain(&id)?.clone();
            println!("{} {}", "Domain".cyan().bold(), domain.host.bold());
            println!("  ID:     {}", id);
            println!("  Active: {}", yes_no(domain.active));
            println!();
            print_endpoints("Default URLs", &domain.default_endpoints);
            println!();
            println!("  {}", "Tests:".bold());
            if domain.tests.is_empty() {
                println!("    {}", "none".yellow());
            }
            for test in &domain.tests {
                println!(
                    "    {} {} ({} variants)",
                    id_or_dash(test.test_id.as_deref()),
                    test.name,
                    test.variants.len()
                );
            }
        }
        DomainCmd::Create { host } => {
            let created = session.create_domain(&Domain::new(host))?;
            if let Some(id) = created.domain_id.as_deref() {
                OrderBook::new(store, DOMAIN_ORDER_KEY).push(id)?;
            }
            print_notice(&Notice::success(format!(
                "Created domain {} ({})",
                created.host,
                id_or_dash(created.domain_id.as_deref())
            )));
        }
        DomainCmd::Delete { id } => {
            let outcome = session.delete_domain(&id)?;
            OrderBook::new(store, DOMAIN_ORDER_KEY).forget(&id)?;
            print_action("Deleted domain", &id, outcome);
        }
        DomainCmd::SyncUrls { id, urls } => {
            let original = session.api().domain(&id)?;
            let mut edited = original.clone();
            edited.default_endpoints = desired_endpoints(&original.default_endpoints, &urls);

            let report = sync::save_domain_urls(session, &original, &mut edited)?;
            print_report(&report);
            print_notice(&Notice::from_report(&report));
        }
        DomainCmd::Move { id, before } => {
            let domains = session.api().domains()?;
            let book = OrderBook::new(store, DOMAIN_ORDER_KEY);
            let moved = reorder(&book, &ids_of(&domains), "domain", &id, &before)?;
            print_order(&moved);
        }
    }
    Ok(())
}

/// Move `id` before `before` in the saved order of the listed ids.
fn reorder<S: KeyValueStore>(
    book: &OrderBook<S>,
    listed: &[String],
    kind: &str,
    id: &str,
    before: &str,
) -> anyhow::Result<Vec<String>> {
    let current = book.load(listed)?;
    for wanted in [id, before] {
        if !current.iter().any(|known| known == wanted) {
            bail!("unknown {} {}", kind, wanted);
        }
    }
    Ok(book.move_before(&current, id, before)?)
}

/// Endpoints for a desired URL list; URLs already present keep their id.
fn desired_endpoints(existing: &[Endpoint], urls: &[String]) -> Vec<Endpoint> {
    urls.iter()
        .map(|url| {
            existing
                .iter()
                .find(|e| &e.url == url)
                .cloned()
                .unwrap_or_else(|| Endpoint::new(url.as_str()))
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[derive(Tabled)]
struct VariantRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Weight")]
    weight: f64,
    #[tabled(rename = "Active")]
    active: String,
    #[tabled(rename = "URLs")]
    urls: String,
}

fn variant_rows(variants: &[Variant]) -> Vec<VariantRow> {
    variants
        .iter()
        .map(|v| VariantRow {
            id: id_or_dash(v.variant_id.as_deref()),
            name: v.name.clone(),
            weight: v.weight,
            active: yes_no(v.active),
            urls: if v.endpoints.is_empty() {
                "-".to_string()
            } else {
                v.endpoints
                    .iter()
                    .map(|e| e.url.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            },
        })
        .collect()
}

fn cmd_test(session: &mut Session<HttpTransport>, cmd: TestCmd) -> anyhow::Result<()> {
    match cmd {
        TestCmd::Show { id } => {
            let test = session.refresh_test(&id)?;
            println!("{} {}", "Test".cyan().bold(), test.name.bold());
            println!("  ID:      {}", id);
            println!("  Active:  {}", yes_no(test.active));
            if let Some(subpath) = &test.subpath {
                println!("  Subpath: {}", subpath);
            }
            println!();
            if test.variants.is_empty() {
                println!("  {}", "No variants".yellow());
            } else {
                println!("{}", Table::new(variant_rows(&test.variants)));
            }
        }
        TestCmd::Create {
            domain,
            name,
            subpath,
        } => {
            let original = Test::new(name.as_str());
            let mut edited = Test {
                subpath,
                domain: Some(trafsplit::DomainRef { domain_id: domain }),
                ..original.clone()
            };
            let report = sync::sync_test(session, &original, &mut edited)?;
            print_notice(&Notice::from_report(&report));
        }
        TestCmd::Sync { file } => {
            let mut edited = read_test(&file)?;
            let original = match &edited.test_id {
                Some(id) => session.api().test(id)?,
                None => Test::new(edited.name.as_str()),
            };

            let result = sync::sync_test(session, &original, &mut edited);
            // created ids are kept even when part of the sync failed
            write_test(&file, &edited)?;
            let report = result?;
            print_report(&report);
            print_notice(&Notice::from_report(&report));
        }
        TestCmd::Delete { id } => {
            let outcome = session.delete_test(&id)?;
            print_action("Deleted test", &id, outcome);
        }
    }
    Ok(())
}

fn read_test(path: &Path) -> anyhow::Result<Test> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid test tree in {}", path.display()))
}

fn write_test(path: &Path, test: &Test) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(test)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

// ============================================================================
// Variants
// ============================================================================

fn cmd_variants(
    session: &Session<HttpTransport>,
    store: &FileStore,
    test: Option<&str>,
    filter: VariantFilter,
) -> anyhow::Result<()> {
    let variants = session.variants_with_endpoints(test)?;
    let variants: Vec<Variant> = OrderBook::new(store, VARIANT_ORDER_KEY)
        .apply(variants)?
        .into_iter()
        .filter(|v| filter.keeps(v))
        .collect();

    println!("{}", "Variants".cyan().bold());
    println!("  Count: {}", variants.len());
    println!();
    if variants.is_empty() {
        println!("  {}", "No variants".yellow());
    } else {
        println!("{}", Table::new(variant_rows(&variants)));
    }
    Ok(())
}

fn cmd_variant(
    session: &mut Session<HttpTransport>,
    store: &FileStore,
    cmd: VariantCmd,
) -> anyhow::Result<()> {
    match cmd {
        VariantCmd::Add {
            test,
            name,
            weight,
            urls,
        } => {
            let original = session.api().test(&test)?;
            let mut edited = original.clone();
            let mut variant = Variant::new(name, weight);
            variant.test = Some(TestRef { test_id: test });
            variant.endpoints = urls.iter().map(|u| Endpoint::new(u.as_str())).collect();
            edited.variants.push(variant);

            let report = sync::sync_test(session, &original, &mut edited)?;
            if let Some(id) = edited.variants.last().and_then(|v| v.variant_id.as_deref()) {
                OrderBook::new(store, VARIANT_ORDER_KEY).push(id)?;
            }
            print_notice(&Notice::from_report(&report));
        }
        VariantCmd::Weight { id, weight } => {
            session.set_variant_weight(&id, weight)?;
            print_notice(&Notice::success(format!("Variant {} weight set to {}", id, weight)));
        }
        VariantCmd::Enable { id, off } => {
            session.set_variant_enabled(&id, !off)?;
            let state = if off { "disabled" } else { "enabled" };
            print_notice(&Notice::success(format!("Variant {} {}", id, state)));
        }
        VariantCmd::Drain { id } => {
            let outcome = session.drain_variant(&id)?;
            print_action("Draining variant", &id, outcome);
        }
        VariantCmd::Delete { id } => {
            let outcome = session.delete_variant(&id)?;
            OrderBook::new(store, VARIANT_ORDER_KEY).forget(&id)?;
            print_action("Deleted variant", &id, outcome);
        }
        VariantCmd::Move { id, before } => {
            let variants = session.api().variants()?;
            let book = OrderBook::new(store, VARIANT_ORDER_KEY);
            let moved = reorder(&book, &ids_of(&variants), "variant", &id, &before)?;
            print_order(&moved);
        }
    }
    Ok(())
}

// ============================================================================
// Endpoints
// ============================================================================

fn cmd_endpoint(session: &mut Session<HttpTransport>, cmd: EndpointCmd) -> anyhow::Result<()> {
    match cmd {
        EndpointCmd::Add {
            variant,
            url,
            description,
        } => {
            session
                .api()
                .add_variant_endpoint(&variant, &url, description.as_deref())?;
            let endpoints = session.refresh_variant_endpoints(&variant)?;
            print_endpoints("URLs", &endpoints);
        }
        EndpointCmd::Remove { variant, url } => {
            let endpoints = session.remove_variant_url(&variant, &url)?;
            print_endpoints("URLs", &endpoints);
        }
        EndpointCmd::Replace { variant, from, url } => {
            let notice = match sync::replace_endpoint_url(session, &variant, Some(&from), &url)? {
                ReplaceOutcome::Unchanged => Notice::info("URL unchanged"),
                ReplaceOutcome::Created => Notice::success(format!("Added {}", url)),
                ReplaceOutcome::Replaced => {
                    Notice::success(format!("Replaced {} with {}", from, url))
                }
                ReplaceOutcome::PreviousKept { error } => Notice::warning(format!(
                    "Added {} but could not remove {}: {}",
                    url, from, error
                )),
            };
            print_notice(&notice);
        }
        EndpointCmd::Describe { url, description } => {
            session.describe_url(&url, &description)?;
            print_notice(&Notice::success(format!("Description of {} updated", url)));
        }
    }
    Ok(())
}

// ============================================================================
// Output helpers
// ============================================================================

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Operation")]
    label: String,
    #[tabled(rename = "Result")]
    result: String,
}

fn print_report(report: &SyncReport) {
    if report.is_empty() {
        return;
    }
    let rows: Vec<OutcomeRow> = report
        .outcomes
        .iter()
        .map(|o| OutcomeRow {
            label: o.label.clone(),
            result: match &o.status {
                OpStatus::Done => "ok".to_string(),
                OpStatus::Created(id) => format!("created {}", id),
                OpStatus::Failed { message, .. } => format!("failed: {}", message),
                OpStatus::Skipped => "skipped".to_string(),
            },
        })
        .collect();
    println!("{}", Table::new(rows));
}

fn print_notice(notice: &Notice) {
    match notice.severity {
        Severity::Success => println!("{} {}", "OK".green().bold(), notice),
        Severity::Info => println!("{} {}", "Info:".cyan().bold(), notice),
        Severity::Warning => eprintln!("{} {}", "Warning:".yellow().bold(), notice),
        Severity::Error => eprintln!("{} {}", "Error:".red().bold(), notice),
    }
}

fn print_action(what: &str, id: &str, outcome: ActionOutcome) {
    match outcome {
        ActionOutcome::Dispatched => print_notice(&Notice::success(format!("{} {}", what, id))),
        ActionOutcome::Skipped => {
            print_notice(&Notice::info(format!("{} {}: already sent", what, id)))
        }
    }
}

fn print_endpoints(title: &str, endpoints: &[Endpoint]) {
    println!("  {}", format!("{}:", title).bold());
    if endpoints.is_empty() {
        println!("    {}", "none".yellow());
    }
    for endpoint in endpoints {
        let alive = match endpoint.alive {
            Some(true) => "up".green(),
            Some(false) => "down".red(),
            None => "?".normal(),
        };
        match &endpoint.description {
            Some(text) => println!("    [{}] {} - {}", alive, endpoint.url, text),
            None => println!("    [{}] {}", alive, endpoint.url),
        }
    }
}

fn print_order(order: &[String]) {
    println!("{}", "Order".cyan().bold());
    for (i, id) in order.iter().enumerate() {
        println!("  {:>3}. {}", i + 1, id);
    }
}

fn id_or_dash(id: Option<&str>) -> String {
    id.unwrap_or("-").to_string()
}

fn yes_no(flag: bool) -> String {
    let text = if flag { "yes" } else { "no" };
    text.to_string()
}
