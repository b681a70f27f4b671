use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use std::env;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use entry_pack::{
    ArchivalJob, Config, EntryInfo, EntryPackService, PackStatusReport, SubmissionMethod,
    SubmissionReadiness,
};

fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow!("Failed to load configuration: {}", e))?;

    // Logs go to stderr; stdout is for command output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");
    let rest: &[String] = if args.len() > 2 { &args[2..] } else { &[] };

    if command == "help" || command == "--help" {
        print_usage();
        return Ok(());
    }

    let service = EntryPackService::open(&config)?;

    match command {
        "import" => run_import(&service, rest),
        "status" => run_status(&service, rest),
        "submit" => run_submit(&service, rest),
        "cancel" => run_cancel(&service, rest),
        "sweep" => run_sweep(&service),
        "history" => run_history(&service, rest),
        "export" => run_export(&service, rest),
        "delete" => run_delete(&service, rest),
        "destinations" => run_destinations(&service),
        other => {
            eprintln!("❌ Unknown command: {}", other);
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("🧳 entry-pack {}", entry_pack::VERSION);
    println!();
    println!("Usage:");
    println!("  entry-pack import <entry_info.json>");
    println!("  entry-pack status [pack_id]");
    println!("  entry-pack submit <pack_id> <confirmation> [api|webview|manual]");
    println!("  entry-pack cancel <pack_id> [reason]");
    println!("  entry-pack sweep");
    println!("  entry-pack history <pack_id>");
    println!("  entry-pack export <pack_id> <path.json|path.csv>");
    println!("  entry-pack delete <pack_id>");
    println!("  entry-pack destinations");
}

fn arg<'a>(rest: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    rest.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing argument: <{}>", name))
}

fn print_report(report: &PackStatusReport) {
    let pack = &report.pack;
    println!("📦 Pack {}", pack.id);
    println!("   Destination: {} ({})", report.destination_name, pack.destination);
    println!("   Status:      {} [{}]", report.display.label(), pack.status);
    println!("   Completion:  {}", report.completion.summary());
    println!("   Window:      {}", report.window.describe());
    match &report.readiness {
        SubmissionReadiness::Incomplete { missing } => {
            println!("   Missing:     {}", missing.join(", "));
        }
        SubmissionReadiness::WaitingForWindow { opens_at } => {
            println!("   Opens at:    {}", opens_at.format("%Y-%m-%d %H:%M UTC"));
        }
        other => println!("   Readiness:   {:?}", other),
    }
    if let Some(submission) = &pack.current_submission {
        println!(
            "   Confirmed:   {} via {} at {}",
            submission.confirmation_number.as_deref().unwrap_or("-"),
            submission.method.as_str(),
            submission.submitted_at.format("%Y-%m-%d %H:%M UTC")
        );
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

fn run_import(service: &EntryPackService, rest: &[String]) -> Result<()> {
    let path = Path::new(arg(rest, 0, "entry_info.json")?);

    println!("📂 Loading entry info from {:?}...", path);
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read entry info file: {:?}", path))?;
    let info: EntryInfo = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse entry info JSON: {:?}", path))?;

    let now = Utc::now();
    let pack = service.create_pack(info, now)?;
    println!("✓ Created pack {}", pack.id);

    print_report(&service.status_report(&pack, now)?);
    Ok(())
}

fn run_status(service: &EntryPackService, rest: &[String]) -> Result<()> {
    let now = Utc::now();

    if let Some(pack_id) = rest.first() {
        print_report(&service.view_pack(pack_id, now)?);
        return Ok(());
    }

    let reports = service.list_reports(now)?;
    if reports.is_empty() {
        println!("📭 No entry packs yet. Run: entry-pack import <entry_info.json>");
        return Ok(());
    }

    println!("📊 {} entry pack(s)", reports.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for report in &reports {
        println!(
            "{}  {:<3} {:>3}%  {:<16} {}",
            report.pack.id,
            report.pack.destination,
            report.completion.percent,
            report.display.label(),
            report.window.describe()
        );
    }
    Ok(())
}

fn run_submit(service: &EntryPackService, rest: &[String]) -> Result<()> {
    let pack_id = arg(rest, 0, "pack_id")?;
    let confirmation = arg(rest, 1, "confirmation")?;
    let method: SubmissionMethod = match rest.get(2) {
        Some(m) => m.parse().map_err(|e: String| anyhow!(e))?,
        None => SubmissionMethod::Manual,
    };

    let now = Utc::now();
    match service.prepare_submission(pack_id, now)? {
        SubmissionReadiness::Ready | SubmissionReadiness::AlreadySubmitted => {}
        SubmissionReadiness::ReadyUrgent => println!("⏰ Arrival is close, submitting now"),
        SubmissionReadiness::WaitingForWindow { opens_at } => {
            bail!("Submission window opens at {}", opens_at.format("%Y-%m-%d %H:%M UTC"))
        }
        other => bail!("Pack {} cannot be submitted: {:?}", pack_id, other),
    }

    let pack = service.submit(pack_id, method, confirmation, now)?;
    println!(
        "✅ Pack {} submitted ({} attempt(s) recorded)",
        pack.id,
        pack.attempt_count()
    );
    Ok(())
}

fn run_cancel(service: &EntryPackService, rest: &[String]) -> Result<()> {
    let pack_id = arg(rest, 0, "pack_id")?;
    let reason = if rest.len() > 1 {
        Some(rest[1..].join(" "))
    } else {
        None
    };

    let pack = service.cancel_submission(pack_id, reason, Utc::now())?;
    println!("↩️  Submission cancelled; pack {} is {}", pack.id, pack.status);
    Ok(())
}

fn run_sweep(service: &EntryPackService) -> Result<()> {
    println!("🗃️  Running archival sweep...");
    let report = ArchivalJob::new(service).run_once(Utc::now())?;

    println!("✓ Scanned:   {}", report.scanned);
    println!("✓ Completed: {}", report.completed);
    println!("✓ Expired:   {}", report.expired);
    println!("✓ Archived:  {}", report.archived);

    if !report.is_clean() {
        println!("⚠️  {} pack(s) failed:", report.failures.len());
        for failure in &report.failures {
            println!("   {} - {}", failure.pack_id, failure.error);
        }
    }
    Ok(())
}

fn run_history(service: &EntryPackService, rest: &[String]) -> Result<()> {
    let pack_id = arg(rest, 0, "pack_id")?;

    let versions = service.entry_info_history(pack_id)?;
    println!("🕰️  Entry info versions ({})", versions.version_count());
    for v in versions.history() {
        println!(
            "   v{}  {} → {}  by {}{}",
            v.version,
            v.valid_from.format("%Y-%m-%d %H:%M"),
            v.valid_until
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "current".to_string()),
            v.created_by,
            v.change_reason
                .as_ref()
                .map(|r| format!(" ({})", r))
                .unwrap_or_default()
        );
    }

    let snapshots = service.snapshots(pack_id)?;
    println!("\n📸 Snapshots ({})", snapshots.len());
    for s in &snapshots {
        let verified = if s.verify()? { "✓" } else { "✗ hash mismatch" };
        println!(
            "   {}  {:<10} {}%  {}",
            s.created_at.format("%Y-%m-%d %H:%M"),
            s.reason.as_str(),
            s.completion_percent,
            verified
        );
        for photo in s.missing_photos() {
            println!("      ⚠️  photo missing: {} ({})", photo.source, photo.uri);
        }
    }

    let events = service.history(pack_id)?;
    println!("\n🧾 Audit events ({})", events.len());
    for e in &events {
        println!(
            "   {}  {:<14} {:<8} {}",
            e.timestamp.format("%Y-%m-%d %H:%M:%S"),
            e.event_type.as_str(),
            e.actor,
            e.data
        );
    }

    let mirror = service.verify_mirror(pack_id)?;
    if mirror.is_consistent() {
        println!("\n✓ File mirror matches the database ({} events)", mirror.file_events);
    } else {
        println!(
            "\n⚠️  File mirror differs: {} missing on disk, {} missing in database",
            mirror.missing_in_files.len(),
            mirror.missing_in_db.len()
        );
    }
    Ok(())
}

fn run_export(service: &EntryPackService, rest: &[String]) -> Result<()> {
    let pack_id = arg(rest, 0, "pack_id")?;
    let path = Path::new(arg(rest, 1, "path")?);

    let format = service.export_pack(pack_id, path, Utc::now())?;
    println!("💾 Exported pack {} as {} to {:?}", pack_id, format.as_str(), path);
    Ok(())
}

fn run_delete(service: &EntryPackService, rest: &[String]) -> Result<()> {
    let pack_id = arg(rest, 0, "pack_id")?;

    service.delete_pack(pack_id, Utc::now())?;
    println!("🗑️  Pack {} deleted (history kept)", pack_id);
    Ok(())
}

fn run_destinations(service: &EntryPackService) -> Result<()> {
    let registry = service.destinations();
    println!("🌏 {} destination(s)", registry.count());
    for d in registry.all() {
        let window = d
            .submission_window_hours
            .map(|h| format!("{}h before arrival", h))
            .unwrap_or_else(|| "no window".to_string());
        println!(
            "   {}  {:<12} UTC{:+}  {:<20} funds ≥ {}",
            d.code,
            d.name,
            d.utc_offset_minutes as f64 / 60.0,
            window,
            d.min_fund_items
        );
    }
    Ok(())
}
