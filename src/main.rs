use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use smartsum::actions::{Action, ActionOutcome, Selection};
use smartsum::app;
use smartsum::cli::{Cli, Commands, ConfigAction, MediaAction, ProjectAction};
use smartsum::config::Config;
use smartsum::defaults;
use smartsum::record::{NewMedia, Record, RecordKind};
use smartsum::store::Store;
use smartsum::summarize::SummaryOptions;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);
    log::debug!(
        "smartsum {} ({} backend)",
        smartsum::version_string(),
        defaults::gpu_backend()
    );

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Project { action } => handle_project_command(action, &config)?,
        Commands::Media { action } => handle_media_command(action, &config)?,
        Commands::Transcribe { ids } => {
            run_action(&config, Action::Transcribe, Selection::Media(ids))?;
        }
        Commands::Translate { to, ids } => {
            let to = to.trim().to_lowercase();
            let action = match to.as_str() {
                defaults::HEBREW_LANGUAGE => Some(Action::TranslateHebrew),
                defaults::ENGLISH_LANGUAGE => Some(Action::TranslateEnglish),
                _ => None,
            };
            match action {
                Some(action) => run_action(&config, action, Selection::Media(ids))?,
                None => {
                    let store = app::open_store(&config)?;
                    let media = ids
                        .iter()
                        .map(|id| store.get_media(*id))
                        .collect::<smartsum::Result<Vec<_>>>()?;
                    let orchestrator = app::build_orchestrator(&config, store)?;
                    println!("{}", format!("Translate to {}", defaults::language_name(&to)).bold());
                    for report in orchestrator.translate(&media, &to)? {
                        println!(
                            "  created {} {} ({} segments)",
                            report.kind, report.record_id, report.segments
                        );
                    }
                }
            }
        }
        Commands::TranslateText { ids } => {
            run_action(
                &config,
                Action::TranslateText,
                Selection::Records(RecordKind::Transcript, ids),
            )?;
        }
        Commands::Summarize {
            kind,
            max_words,
            min_words,
            ids,
        } => {
            let store = app::open_store(&config)?;
            let configured = config.summarize.options();
            let options = SummaryOptions {
                max_words: max_words.unwrap_or(configured.max_words),
                min_words: min_words.unwrap_or(configured.min_words),
                language: None,
            };
            let runner = app::build_runner(&config, store)?.with_summary_options(options);
            let outcome = runner.run(Action::Summarize, &Selection::Records(kind.into(), ids))?;
            print_outcome(&outcome, cli.quiet);
        }
        Commands::List { kind } => {
            let store = app::open_store(&config)?;
            print_records(store.as_ref(), kind.into())?;
        }
        Commands::Show { kind, id, segments } => {
            let store = app::open_store(&config)?;
            print_record(store.as_ref(), kind.into(), id, segments)?;
        }
        Commands::Reference {
            kind,
            id,
            text,
            file,
        } => {
            let reference = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => anyhow::bail!("Provide reference text or --file"),
            };
            let store = app::open_store(&config)?;
            set_reference(store.as_ref(), kind.into(), id, reference)?;
        }
        Commands::FetchLangs => {
            let runtime = tokio::runtime::Runtime::new()?;
            let paths = runtime.block_on(smartsum::langs::fetch_language_packs(
                &config.translate.index_url,
                defaults::LANGUAGE_PAIRS,
                &config.translate.packages_dir,
                &config.translate.install_dir,
                !cli.quiet,
            ))?;
            for path in paths {
                println!("{}", path.display());
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => print!("{}", config.to_toml()?),
            ConfigAction::Path => {
                let path = cli.config.clone().unwrap_or_else(Config::default_path);
                println!("{}", path.display());
            }
        },
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "smartsum",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Initialise env_logger from -q/-v; RUST_LOG still takes precedence.
fn init_logging(quiet: bool, verbose: u8) {
    let level = if quiet {
        log::LevelFilter::Error
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

/// Load configuration: explicit file, else default path; then env and CLI overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let config = if let Some(path) = &cli.config {
        Config::load(path).with_context(|| format!("Failed to load config from {}", path.display()))?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    let mut config = config.with_env_overrides();
    if let Some(db) = &cli.db {
        config.store.path = db.clone();
    }
    if let Some(timeout) = &cli.timeout {
        config.engine.timeout = timeout.clone();
    }
    config.validate()?;
    Ok(config)
}

fn run_action(config: &Config, action: Action, selection: Selection) -> Result<()> {
    let store = app::open_store(config)?;
    let runner = app::build_runner(config, store)?;
    let outcome = runner.run(action, &selection)?;
    print_outcome(&outcome, false);
    Ok(())
}

fn print_outcome(outcome: &ActionOutcome, quiet: bool) {
    if quiet {
        return;
    }
    println!("{}", outcome.action.label().bold());
    for (kind, id) in &outcome.created {
        println!("  created {} {}", kind, id);
    }
    for (kind, id) in &outcome.updated {
        println!("  updated {} {}", kind, id);
    }
    if outcome.created.is_empty() && outcome.updated.is_empty() {
        println!("  nothing to do");
    }
    if let Some(redirect) = &outcome.redirect {
        println!("  -> {}", redirect.cyan());
    }
}

fn handle_project_command(action: ProjectAction, config: &Config) -> Result<()> {
    let store = app::open_store(config)?;
    match action {
        ProjectAction::Add { name, description } => {
            let project = store.create_project(&name, description.as_deref())?;
            println!("Created project {} ({})", project.id, project.name);
        }
        ProjectAction::List => {
            println!("{}", "Projects".bold());
            for project in store.list_projects()? {
                println!(
                    "  {:>4}  {}{}",
                    project.id,
                    project.name,
                    project
                        .description
                        .map(|d| format!(" - {}", d.dimmed()))
                        .unwrap_or_default()
                );
            }
        }
        ProjectAction::Delete { id } => {
            store.delete_project(id)?;
            println!("Deleted project {}", id);
        }
    }
    Ok(())
}

fn handle_media_command(action: MediaAction, config: &Config) -> Result<()> {
    let store = app::open_store(config)?;
    match action {
        MediaAction::Add {
            project,
            path,
            title,
            language,
            url,
        } => {
            if !path.exists() {
                eprintln!("No such file: {}", path.display());
                std::process::exit(1);
            }
            let attachment = path
                .canonicalize()
                .with_context(|| format!("Failed to resolve {}", path.display()))?;
            let media = store.create_media(NewMedia {
                project_id: project,
                title,
                attachment: Some(attachment),
                language,
                url,
            })?;
            println!("Created media {} ({})", media.id, media.label());
        }
        MediaAction::List { project } => {
            println!("{}", "Media".bold());
            for media in store.list_media(project)? {
                println!(
                    "  {:>4}  {:<40}  {:<4}  project {}",
                    media.id,
                    media.label(),
                    media.language.as_deref().unwrap_or("-"),
                    media.project_id
                );
            }
        }
        MediaAction::Delete { id } => {
            store.delete_media(id)?;
            println!("Deleted media {}", id);
        }
    }
    Ok(())
}

fn print_records(store: &dyn Store, kind: RecordKind) -> Result<()> {
    let records = store.list_records(kind)?;
    println!(
        "{}",
        format!(
            "{:>4}  {:<30}  {:<4}  {:>7}  {:>9}  snippet",
            "id", "title", "lang", "wer", "elapsed"
        )
        .bold()
    );
    for record in &records {
        let snippet: String = record
            .snippet()
            .replace('\n', " ")
            .chars()
            .take(60)
            .collect();
        println!(
            "{:>4}  {:<30}  {:<4}  {:>7}  {:>9}  {}",
            record.id,
            record.title.as_deref().unwrap_or("-"),
            record.language.as_deref().unwrap_or("-"),
            record
                .wer
                .map(|w| format!("{:.2}", w))
                .unwrap_or_else(|| "-".to_string()),
            format!("{}s", record.time_elapsed().num_seconds()),
            snippet.dimmed()
        );
    }
    Ok(())
}

fn print_record(store: &dyn Store, kind: RecordKind, id: i64, segments: bool) -> Result<()> {
    let record = store.get_record(kind, id)?;
    println!("{}", record.to_string().bold());
    print_field("kind", Some(record.kind.as_str()));
    print_field("media", record.media_id.map(|id| id.to_string()).as_deref());
    print_field(
        "transcript",
        record.transcript_id.map(|id| id.to_string()).as_deref(),
    );
    print_field("language", record.language.as_deref());
    print_field("wer", record.wer.map(|w| format!("{:.2}", w)).as_deref());
    print_field(
        "elapsed",
        Some(format!("{}s", record.time_elapsed().num_seconds()).as_str()),
    );
    print_field("summary", record.summary.as_deref());
    print_field("reference", record.reference.as_deref());
    println!();
    println!("{}", record.full.as_deref().unwrap_or_default());

    if segments {
        println!();
        for segment in store.segments(kind, id)? {
            println!("{}", segment);
        }
    }
    Ok(())
}

fn print_field(name: &str, value: Option<&str>) {
    println!("{:>10}: {}", name.cyan(), value.unwrap_or("-"));
}

fn set_reference(store: &dyn Store, kind: RecordKind, id: i64, reference: String) -> Result<()> {
    let mut record: Record = store.get_record(kind, id)?;
    if let Err(e) = record.set_reference(reference) {
        eprintln!("{}: {}", "Not scored".yellow(), e);
    }
    let record = store.update_record(&record)?;

    match record.wer {
        Some(wer) => println!("{} {}: WER {:.2}", kind, id, wer),
        None => println!("{} {}: reference saved", kind, id),
    }
    Ok(())
}
