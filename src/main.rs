mod analysis;
mod cli;
mod config;
mod db;
mod error;
mod llm;
mod models;
mod remote;
mod session;
mod telemetry;
mod upload;
mod web;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use analysis::trigger::{
    document_id_or_generated, fetch_analysis, request_report, trigger_analysis, AnalysisRequest,
};
use cli::{Cli, Commands};
use config::settings::Config;
use db::store::{MemoryStore, SessionStore, SqliteStore};
use error::DeskError;
use models::{Analysis, DocumentStatus, RiskLevel, Session};
use remote::SupabaseClient;
use session::guard::CHECKING_MESSAGE;
use session::{guard, GuardOutcome, SessionManager};
use upload::{SelectedFile, UploadFlow};

type Manager = SessionManager<SupabaseClient, Box<dyn SessionStore>>;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let command = cli.command.as_ref().map(|c| c.name()).unwrap_or("status");
    if let Err(err) = run(cli).await {
        let telemetry_config = config::settings::load_config()
            .map(|c| c.telemetry)
            .unwrap_or_default();
        let report = telemetry::ErrorReport::from_error(&err, Some(command));
        if let Some(dispatch) = telemetry::report_error(&telemetry_config, report) {
            let _ = tokio::time::timeout(Duration::from_secs(2), dispatch).await;
        }

        eprintln!();
        for line in telemetry::recovery_screen(&format!("{:#}", err)).lines() {
            eprintln!("  {}", line.red());
        }
        eprintln!();
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "lexdesk=debug,tower_http=debug"
    } else {
        "lexdesk=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::settings::load_config()?;
    let mut manager = open_manager(&config, cli.ephemeral)?;
    manager.init().context("Failed to restore session")?;

    match cli.command {
        Some(Commands::Signin { email, password }) => {
            handle_signin(&mut manager, &email, &password).await
        }
        Some(Commands::Signup {
            email,
            password,
            tenant,
        }) => handle_signup(&mut manager, &email, &password, &tenant).await,
        Some(Commands::Signout) => handle_signout(&mut manager),
        Some(Commands::Status) | None => {
            handle_status(&manager);
            Ok(())
        }
        Some(Commands::Upload {
            file,
            analyze,
            document_id,
        }) => handle_upload(&manager, &config, &file, analyze, document_id).await,
        Some(Commands::Analyze { file, json }) => handle_analyze(&config, &file, json).await,
        Some(Commands::Report { document_id }) => {
            handle_report(&manager, &config, &document_id).await
        }
        Some(Commands::Documents) => {
            handle_documents(&manager);
            Ok(())
        }
        Some(Commands::Show { document_id }) => {
            handle_show(&manager, &config, &document_id).await
        }
        Some(Commands::Serve { port }) => {
            let state = web::api::AppState {
                session: manager.session().cloned(),
                loading: manager.is_loading(),
            };
            web::server::start_server(port, state).await
        }
    }
}

fn open_manager(config: &Config, ephemeral: bool) -> Result<Manager> {
    let store: Box<dyn SessionStore> = if ephemeral {
        Box::new(MemoryStore::new())
    } else {
        Box::new(SqliteStore::open_default()?)
    };
    Ok(SessionManager::new(
        SupabaseClient::from_config(&config.backend),
        store,
    ))
}

/// Expected failures are shown inline, not treated as crashes.
fn fail_inline(message: &str) -> ! {
    eprintln!("\n  {} {}\n", "✗".red(), message.red());
    std::process::exit(1);
}

/// Signed-in session for a protected command, or exit with a sign-in hint.
fn require_session<'a>(manager: &'a Manager, from: &str) -> &'a Session {
    match guard(manager.session(), manager.is_loading(), from) {
        GuardOutcome::Allow(session) => session,
        GuardOutcome::Checking => fail_inline(CHECKING_MESSAGE),
        GuardOutcome::Redirect { .. } => fail_inline(&format!(
            "Sign in required. Run `lexdesk signin --email <email>`, then `lexdesk {}` again.",
            from
        )),
    }
}

async fn handle_signin(manager: &mut Manager, email: &str, password: &str) -> Result<()> {
    let result = manager.sign_in(email, password).await;
    match result {
        Ok(session) => {
            print_signed_in(&session);
            Ok(())
        }
        Err(_) => fail_inline(manager.error().unwrap_or("Unable to sign in")),
    }
}

async fn handle_signup(
    manager: &mut Manager,
    email: &str,
    password: &str,
    tenant: &str,
) -> Result<()> {
    let result = manager.sign_up(email, password, tenant).await;
    match result {
        Ok(session) => {
            print_signed_in(&session);
            Ok(())
        }
        Err(_) => fail_inline(manager.error().unwrap_or("Unable to sign up")),
    }
}

fn handle_signout(manager: &mut Manager) -> Result<()> {
    manager.sign_out().context("Failed to clear stored session")?;
    println!("\n  {} {}\n", "●".dimmed(), "Signed out.".dimmed());
    Ok(())
}

fn handle_status(manager: &Manager) {
    match guard(manager.session(), manager.is_loading(), "status") {
        GuardOutcome::Checking => println!("\n  {} {}\n", "◉".cyan(), CHECKING_MESSAGE.dimmed()),
        GuardOutcome::Redirect { .. } => println!(
            "\n  {} {}\n",
            "●".dimmed(),
            "Not signed in. Uploads will use the demo path.".dimmed()
        ),
        GuardOutcome::Allow(session) => print_signed_in(session),
    }
}

fn print_signed_in(session: &Session) {
    println!();
    println!(
        "  {} Signed in as {}",
        "✓".green(),
        session
            .user
            .email
            .as_deref()
            .unwrap_or(&session.user.id)
            .bold()
    );
    match session.tenant_id() {
        Some(tenant) => println!("  {}   tenant {}", "│".dimmed(), tenant.cyan()),
        None => println!("  {}   {}", "│".dimmed(), "no tenant assigned".yellow()),
    }
    if let Some(secs) = session.expires_in {
        println!("  {}   token valid for {}m", "│".dimmed(), secs / 60);
    }
    println!();
}

async fn handle_upload(
    manager: &Manager,
    config: &Config,
    path: &Path,
    analyze: bool,
    document_id: Option<String>,
) -> Result<()> {
    let file = match SelectedFile::from_path(path) {
        Ok(f) => f,
        Err(e) => fail_inline(&format!("{:#}", e)),
    };

    let mut flow = UploadFlow::new(config.backend.bucket.clone());
    if let Err(e) = flow.select(file) {
        fail_inline(&e.to_string());
    }
    if let Some(selected) = flow.file() {
        println!("\n  {} Uploading {}", "◉".cyan(), selected.describe().bold());
    }

    let stored = flow
        .upload(manager.client(), manager.access_token(), manager.tenant_id())
        .await;
    let Some(stored) = stored else {
        fail_inline(flow.error().unwrap_or("Upload failed"));
    };
    println!("  {} Last upload saved to: {}", "✓".green(), stored.cyan());

    if !analyze {
        println!();
        return Ok(());
    }

    let (Some(token), Some(tenant)) = (manager.access_token(), manager.tenant_id()) else {
        println!(
            "  {} {}\n",
            "●".dimmed(),
            "Demo upload: analysis needs a signed-in tenant.".dimmed()
        );
        return Ok(());
    };

    let (document_id, generated) = document_id_or_generated(document_id);
    if generated {
        tracing::warn!(document = %document_id, "analysis requested without a document id");
        println!(
            "  {} {}",
            "!".yellow(),
            format!(
                "No --document-id given; using {}. The backend has no document row for it, so the result is shown but not saved.",
                document_id
            )
            .yellow()
        );
    }
    let request =
        AnalysisRequest::for_upload(&document_id, tenant, &stored, &config.backend.bucket);
    println!("  {} Analyzing {}", "◉".cyan(), document_id.dimmed());

    match trigger_analysis(
        manager.client(),
        &config.backend.analysis_function,
        &request,
        token,
    )
    .await
    {
        Ok(analysis) => {
            print_analysis(&document_id, &analysis);
            Ok(())
        }
        Err(e) => fail_inline(&describe_remote_error("Analysis failed", &e)),
    }
}

async fn handle_analyze(config: &Config, path: &Path, json: bool) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let text = analysis::pipeline::document_text(&bytes);

    if !json {
        println!("\n  {} {}", "◉".cyan(), "Thinking...".dimmed());
    }
    let analysis = match analysis::pipeline::analyze_text(&config.llm, &text).await {
        Ok(a) => a,
        Err(e) => fail_inline(&describe_remote_error("Analysis failed", &e)),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        print_analysis(&name, &analysis);
    }
    Ok(())
}

async fn handle_report(manager: &Manager, config: &Config, document_id: &str) -> Result<()> {
    let session = require_session(manager, "report");
    let Some(tenant) = session.tenant_id() else {
        fail_inline("Your account has no tenant; reports are tenant-scoped.");
    };

    let report = request_report(
        manager.client(),
        &config.backend.report_function,
        tenant,
        document_id,
        &session.access_token,
    )
    .await;
    match report {
        Ok(report) => {
            println!();
            if let Some(url) = report.signed_url {
                println!("  {} Report ready: {}", "✓".green(), url.cyan());
            }
            if let Some(path) = report.path {
                println!("  {}   stored at {}", "│".dimmed(), path.dimmed());
            }
            println!();
            Ok(())
        }
        Err(e) => fail_inline(&describe_remote_error("Report failed", &e)),
    }
}

fn handle_documents(manager: &Manager) {
    require_session(manager, "documents");
    let documents = models::demo_documents();

    print_header("Documents", &format!("{} documents", documents.len()));
    for doc in &documents {
        let status = match doc.status {
            DocumentStatus::Complete => doc.status.as_str().green(),
            DocumentStatus::Processing => doc.status.as_str().cyan(),
            DocumentStatus::Pending => doc.status.as_str().dimmed(),
            DocumentStatus::Failed => doc.status.as_str().red(),
        };
        let risk = doc
            .risk
            .map(|r| risk_label(r).to_string())
            .unwrap_or_else(|| "-".dimmed().to_string());
        println!(
            "  {} {}  {:<32} {:>10}  {:>6}  {}",
            "│".dimmed(),
            doc.id.dimmed(),
            doc.name,
            status,
            risk,
            doc.updated_at.format("%b %d %H:%M").to_string().dimmed()
        );
    }
    println!();
}

/// Stored analysis for tenant sessions; demo data when the backend has none.
async fn handle_show(manager: &Manager, config: &Config, document_id: &str) -> Result<()> {
    let session = require_session(manager, "show");
    let stored = match session.tenant_id() {
        Some(tenant) => {
            let fetched = fetch_analysis(
                manager.client(),
                &config.backend.analysis_fetch_function,
                tenant,
                document_id,
                &session.access_token,
            )
            .await;
            match fetched {
                Ok(found) => found,
                Err(e) => fail_inline(&describe_remote_error("Could not load analysis", &e)),
            }
        }
        None => None,
    };
    match stored.or_else(|| models::demo_analysis(document_id)) {
        Some(analysis) => print_analysis(document_id, &analysis),
        None => fail_inline(&format!("No analysis for document {}", document_id)),
    }
    Ok(())
}

fn describe_remote_error(prefix: &str, err: &DeskError) -> String {
    if err.is_retryable() {
        format!("{}: {} (temporary, try again)", prefix, err)
    } else {
        format!("{}: {}", prefix, err)
    }
}

// ─── Rich output helpers ────────────────────────────────────

fn print_header(title: &str, detail: &str) {
    println!();
    println!("  {} {}  {}", "◉".cyan(), title.bold(), detail.dimmed());
    println!("  {}", "─".repeat(60).dimmed());
}

fn risk_label(risk: RiskLevel) -> colored::ColoredString {
    match risk {
        RiskLevel::High => risk.as_str().red().bold(),
        RiskLevel::Medium => risk.as_str().yellow(),
        RiskLevel::Low => risk.as_str().green(),
    }
}

fn print_analysis(document: &str, analysis: &Analysis) {
    let high = analysis.highest_risk_clauses().count();
    print_header(
        &format!("Analysis: {}", document),
        &format!("{} clauses, {} high risk", analysis.clauses.len(), high),
    );
    println!("  Overall risk: {}", risk_label(analysis.overall_risk));
    println!();
    for line in analysis.summary.lines() {
        println!("  {}", line);
    }

    for clause in &analysis.clauses {
        println!();
        println!(
            "  {} {}  {}  {}",
            "┌".dimmed(),
            clause.title.bold(),
            risk_label(clause.risk),
            format!("p.{}", clause.page).dimmed()
        );
        if !clause.explanation.is_empty() {
            println!("  {} {}", "│".dimmed(), clause.explanation);
        }
        if !clause.recommendation.is_empty() {
            println!("  {} {} {}", "│".dimmed(), "→".cyan(), clause.recommendation);
        }
        for rect in &clause.bounds {
            println!(
                "  {} {}",
                "│".dimmed(),
                format!(
                    "highlight x={} y={} {}×{}",
                    rect.x, rect.y, rect.width, rect.height
                )
                .dimmed()
            );
        }
        println!("  {}", "└".dimmed());
    }
    println!();
}
