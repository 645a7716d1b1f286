use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use snctool_core::client::{RecordApi, SncCliClient};
use snctool_core::config::load_config;
use snctool_core::extract::extract_embedded_json;
use snctool_core::migrate::{MigrateOptions, migrate_values};
use snctool_core::patch::{
    PatchMode, PatchOptions, PatchReport, PatchSpec, PatchTarget, patch_record_field,
};
use snctool_core::runtime::{
    PathOverrides, ResolutionContext, ResolvedPaths, init_layout, inspect_runtime,
    normalize_for_display, resolve_paths,
};

#[derive(Debug, Parser)]
#[command(
    name = "snctool",
    version,
    about = "Record patch and data migration helper driving the snc CLI"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    project_root: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    project_root: Option<PathBuf>,
    config: Option<PathBuf>,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            project_root: cli.project_root.clone(),
            config: cli.config.clone(),
            diagnostics: cli.diagnostics,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    Init(InitArgs),
    Status,
    Patch(PatchArgs),
    Record(RecordArgs),
    Migrate(MigrateArgs),
    #[command(about = "Extract the embedded JSON payload from a captured CLI transcript")]
    Extract(ExtractArgs),
}

#[derive(Debug, Args)]
struct InitArgs {
    #[arg(long, help = "Overwrite an existing config file")]
    force: bool,
}

#[derive(Debug, Args)]
struct PatchArgs {
    #[command(subcommand)]
    command: PatchSubcommand,
}

#[derive(Debug, Subcommand)]
enum PatchSubcommand {
    #[command(about = "Insert content immediately after an anchor")]
    Insert(PatchInsertArgs),
    #[command(about = "Replace the region between an anchor and a terminator")]
    Replace(PatchReplaceArgs),
}

#[derive(Debug, Args)]
struct PatchCommonArgs {
    #[arg(long)]
    table: String,
    #[arg(long)]
    sys_id: String,
    #[arg(long)]
    field: String,
    #[arg(
        long = "anchor",
        required = true,
        help = "Literal anchor; repeat for fallbacks tried in order"
    )]
    anchors: Vec<String>,
    #[arg(long, value_name = "PATH", help = "File holding the patch content")]
    content_file: PathBuf,
    #[arg(long, help = "Skip when this substring is already present")]
    guard: Option<String>,
    #[arg(long, help = "Preview without writing the record back")]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct PatchInsertArgs {
    #[command(flatten)]
    common: PatchCommonArgs,
}

#[derive(Debug, Args)]
struct PatchReplaceArgs {
    #[command(flatten)]
    common: PatchCommonArgs,
    #[arg(
        long = "terminator",
        required = true,
        help = "Literal terminator; repeat for fallbacks tried in order"
    )]
    terminators: Vec<String>,
}

#[derive(Debug, Args)]
struct RecordArgs {
    #[command(subcommand)]
    command: RecordSubcommand,
}

#[derive(Debug, Subcommand)]
enum RecordSubcommand {
    #[command(about = "Print one text field of one record")]
    Get {
        #[arg(long)]
        table: String,
        #[arg(long)]
        sys_id: String,
        #[arg(long)]
        field: String,
    },
}

#[derive(Debug, Args)]
struct MigrateArgs {
    #[command(subcommand)]
    command: MigrateSubcommand,
}

#[derive(Debug, Subcommand)]
enum MigrateSubcommand {
    #[command(about = "Copy delimited parent values into child records")]
    Values {
        #[arg(long, help = "Plan the migration without creating records")]
        dry_run: bool,
        #[arg(long, help = "Cap the number of parent records queried")]
        limit: Option<usize>,
    },
}

#[derive(Debug, Args)]
struct ExtractArgs {
    path: PathBuf,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Init(args)) => run_init(&runtime, args),
        Some(Commands::Status) => run_status(&runtime),
        Some(Commands::Patch(PatchArgs { command })) => match command {
            PatchSubcommand::Insert(args) => run_patch(&runtime, args.common, Vec::new()),
            PatchSubcommand::Replace(args) => run_patch(&runtime, args.common, args.terminators),
        },
        Some(Commands::Record(RecordArgs { command })) => match command {
            RecordSubcommand::Get {
                table,
                sys_id,
                field,
            } => run_record_get(&runtime, &table, &sys_id, &field),
        },
        Some(Commands::Migrate(MigrateArgs { command })) => match command {
            MigrateSubcommand::Values { dry_run, limit } => {
                run_migrate_values(&runtime, dry_run, limit)
            }
        },
        Some(Commands::Extract(ExtractArgs { path })) => run_extract(&path),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn run_init(runtime: &RuntimeOptions, args: InitArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let report = init_layout(&paths, args.force)?;

    println!("Initialized snctool runtime layout");
    println!("project_root: {}", normalize_for_display(&paths.project_root));
    println!("state_dir: {}", normalize_for_display(&paths.state_dir));
    println!("review_dir: {}", normalize_for_display(&paths.review_dir));
    println!("config_path: {}", normalize_for_display(&paths.config_path));
    println!("created_dirs: {}", report.created_dirs.len());
    println!("wrote_config: {}", report.wrote_config);
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_status(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let status = inspect_runtime(&paths);
    let config = load_config(&paths.config_path)?;

    println!("runtime status");
    println!("project_root: {}", normalize_for_display(&paths.project_root));
    println!(
        "project_root_exists: {}",
        format_flag(status.project_root_exists)
    );
    println!("state_dir_exists: {}", format_flag(status.state_dir_exists));
    println!(
        "review_dir_exists: {}",
        format_flag(status.review_dir_exists)
    );
    println!("config_exists: {}", format_flag(status.config_exists));
    println!("snc_bin: {}", config.snc_bin());
    println!("migrate.method_table: {}", config.method_table());
    println!("migrate.value_table: {}", config.value_table());
    if !status.warnings.is_empty() {
        println!("warnings:");
        for warning in &status.warnings {
            println!("  - {warning}");
        }
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_patch(
    runtime: &RuntimeOptions,
    common: PatchCommonArgs,
    terminators: Vec<String>,
) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let config = load_config(&paths.config_path)?;
    let content = fs::read_to_string(&common.content_file)
        .with_context(|| format!("failed to read {}", common.content_file.display()))?;

    let mode = if terminators.is_empty() {
        PatchMode::InsertAfter
    } else {
        PatchMode::ReplaceToTerminator
    };
    let spec = PatchSpec {
        mode,
        anchors: common.anchors,
        terminators,
        guard: common.guard,
        content,
    };
    let target = PatchTarget {
        table: common.table,
        sys_id: common.sys_id,
        field: common.field,
    };
    let options = PatchOptions {
        dry_run: common.dry_run,
        review_dir: Some(paths.review_dir.clone()),
    };

    let mut api = SncCliClient::new(config.snc_bin());
    let report = patch_record_field(&mut api, &target, &spec, &options)?;
    print_patch_report(&report);
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_record_get(runtime: &RuntimeOptions, table: &str, sys_id: &str, field: &str) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let config = load_config(&paths.config_path)?;
    let mut api = SncCliClient::new(config.snc_bin());
    let blob = api.fetch_field(table, sys_id, field)?;
    println!("{blob}");
    Ok(())
}

fn run_migrate_values(
    runtime: &RuntimeOptions,
    dry_run: bool,
    limit: Option<usize>,
) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let config = load_config(&paths.config_path)?;
    let mut api = SncCliClient::new(config.snc_bin());
    let report = migrate_values(&mut api, &config, &MigrateOptions { dry_run, limit })?;

    println!("migrate values");
    println!("dry_run: {}", report.dry_run);
    println!("methods_seen: {}", report.methods_seen);
    println!("methods_skipped_empty: {}", report.methods_skipped_empty);
    println!("values_created: {}", report.values_created);
    for row in &report.rows {
        println!(
            "row: {} {:?} -> {} (sequence {}{})",
            row.method_name,
            row.display_value,
            row.actual_value,
            row.sequence,
            if row.created { ", created" } else { "" }
        );
    }
    if !report.errors.is_empty() {
        println!("errors:");
        for error in &report.errors {
            println!("  - {error}");
        }
    }
    println!("request_count: {}", report.request_count);
    print_diagnostics(runtime, &paths);

    if !report.errors.is_empty() {
        bail!("{} child record(s) failed to create", report.errors.len());
    }
    Ok(())
}

fn run_extract(path: &Path) -> Result<()> {
    let transcript =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let payload = extract_embedded_json(&transcript)
        .with_context(|| format!("no JSON payload in {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn print_patch_report(report: &PatchReport) {
    println!("patch {}", report.action);
    println!("target: {}/{}.{}", report.table, report.sys_id, report.field);
    println!("fetched_len: {}", report.fetched_len);
    if let Some(patched_len) = report.patched_len {
        println!("patched_len: {patched_len}");
        println!("lines_added: {}", report.lines_added);
        println!("lines_removed: {}", report.lines_removed);
    }
    if let Some(anchor) = &report.anchor_used {
        println!("anchor_used: {anchor:?}");
    }
    if let Some(terminator) = &report.terminator_used {
        println!("terminator_used: {terminator:?}");
    }
    if let Some(review_path) = &report.review_path {
        println!("review_path: {review_path}");
    }
    println!("request_count: {}", report.request_count);
}

fn resolve_runtime_paths(runtime: &RuntimeOptions) -> Result<ResolvedPaths> {
    let context = ResolutionContext::from_process()?;
    let overrides = PathOverrides {
        project_root: runtime.project_root.clone(),
        config: runtime.config.clone(),
    };
    resolve_paths(&context, &overrides)
}

fn print_diagnostics(runtime: &RuntimeOptions, paths: &ResolvedPaths) {
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
