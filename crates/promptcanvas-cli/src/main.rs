use std::io::{self, ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use promptcanvas_contracts::chat::{parse_command, ChatCommand, CHAT_HELP_COMMANDS};
use promptcanvas_contracts::credentials::{looks_like_gemini_key, resolve_credential, SecretStore};
use promptcanvas_contracts::request::{AspectRatio, ProviderId, QualityTier, Style};
use promptcanvas_contracts::result::{ErrorKind, GenerationResult};
use promptcanvas_contracts::settings::{AppSettings, HarmCategory, SafetyPolicy};
use promptcanvas_engine::images;
use promptcanvas_engine::{BlockingTransport, Orchestrator, SessionContext};

#[derive(Debug, Parser)]
#[command(name = "promptcanvas", version, about = "Prompt-enhanced image generation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate one image (or concept text) and exit.
    Generate(GenerateArgs),
    /// Check that the configured key reaches the provider.
    Check(CheckArgs),
    /// Interactive session with slash commands.
    Chat(ChatArgs),
}

#[derive(Debug, Args)]
struct AccessArgs {
    #[arg(long, default_value = "native")]
    provider: String,
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long)]
    secrets: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct OptionArgs {
    #[arg(long, default_value = "natural")]
    style: String,
    #[arg(long, default_value = "standard")]
    quality: String,
    #[arg(long, default_value = "1:1")]
    aspect: String,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    prompt: String,
    #[command(flatten)]
    options: OptionArgs,
    #[command(flatten)]
    access: AccessArgs,
    /// Image to edit instead of generating from scratch.
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    relax_safety: Option<String>,
}

#[derive(Debug, Parser)]
struct CheckArgs {
    #[command(flatten)]
    access: AccessArgs,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[command(flatten)]
    options: OptionArgs,
    #[command(flatten)]
    access: AccessArgs,
    /// Directory for `/save` without a path.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    relax_safety: Option<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("promptcanvas error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Check(args) => run_check(args),
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
    }
}

fn load_settings(relax_safety: Option<&str>) -> Result<AppSettings> {
    let mut settings = AppSettings::from_env()?;
    if let Some(raw) = relax_safety {
        let Some(category) = HarmCategory::parse(raw) else {
            bail!("unknown harm category {raw:?}");
        };
        settings.safety_policy = SafetyPolicy::relax(category);
    }
    Ok(settings)
}

fn parse_provider(raw: &str) -> Result<ProviderId> {
    match ProviderId::parse(raw) {
        Some(provider) => Ok(provider),
        None => bail!(
            "unknown provider {raw:?}; expected one of {}",
            ProviderId::ALL
                .iter()
                .map(ProviderId::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn secret_store(path: Option<&Path>) -> SecretStore {
    match path {
        Some(path) => SecretStore::load(path),
        None => SecretStore::from_env(),
    }
}

fn attach_credential(
    session: &mut SessionContext,
    provider: ProviderId,
    override_key: Option<&str>,
    store: &SecretStore,
) {
    let resolved = resolve_credential(provider, override_key, store);
    if let Some(resolved) = resolved.as_ref() {
        log::debug!(
            "using {} key from {}",
            provider.display_name(),
            resolved.source.as_str()
        );
        let gemini_backed = matches!(provider, ProviderId::Native | ProviderId::Conceptual);
        if gemini_backed && !looks_like_gemini_key(resolved.credential.expose()) {
            log::warn!("the configured key does not look like a Google AI Studio key");
        }
    }
    session.set_credential(resolved);
}

fn apply_options(session: &mut SessionContext, options: &OptionArgs, provider: ProviderId) {
    session.ui.style = Style::from_selection(&options.style);
    session.ui.quality = QualityTier::from_selection(&options.quality);
    session.ui.aspect_ratio = AspectRatio::from_selection(&options.aspect);
    session.ui.provider = provider;
}

fn new_orchestrator(settings: AppSettings) -> Orchestrator {
    Orchestrator::new(settings, Arc::new(BlockingTransport::new()))
}

fn download_key(session: &SessionContext) -> String {
    session
        .ledger()
        .last()
        .map(|turn| turn.sequence().to_string())
        .unwrap_or_else(|| "0".to_string())
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let settings = load_settings(args.relax_safety.as_deref())?;
    let provider = parse_provider(&args.access.provider)?;
    let store = secret_store(args.access.secrets.as_deref());
    let orchestrator = new_orchestrator(settings);

    let mut session = orchestrator.new_session();
    if let Some(events) = args.events.as_ref() {
        session = session.with_event_log(events);
    }
    attach_credential(
        &mut session,
        provider,
        args.access.api_key.as_deref(),
        &store,
    );
    apply_options(&mut session, &args.options, provider);
    if let Some(input) = args.input.as_deref() {
        session.ui.pending_image = Some(images::read_upload(input, orchestrator.settings())?);
    }

    let request = session.ui.request_for(&args.prompt);
    match orchestrator.submit(&mut session, &request) {
        GenerationResult::Image(image) => {
            let saved = images::save_png(
                &image,
                args.out.as_deref(),
                Path::new("."),
                &download_key(&session),
            )?;
            println!("{}", saved.display());
            Ok(0)
        }
        GenerationResult::Text(text) => {
            println!("{text}");
            Ok(0)
        }
        GenerationResult::Failure(failure) => {
            eprintln!("{}: {failure}", failure.kind);
            Ok(if failure.kind.is_transient() { 2 } else { 1 })
        }
    }
}

fn run_check(args: CheckArgs) -> Result<i32> {
    let settings = load_settings(None)?;
    let provider = parse_provider(&args.access.provider)?;
    let store = secret_store(args.access.secrets.as_deref());
    let orchestrator = new_orchestrator(settings);

    let mut session = orchestrator.new_session();
    session.ui.provider = provider;
    attach_credential(
        &mut session,
        provider,
        args.access.api_key.as_deref(),
        &store,
    );
    if session.credential().is_none() {
        println!(
            "{}: no key configured (set {})",
            provider.display_name(),
            provider.credential_env_vars().join(" or ")
        );
        return Ok(1);
    }
    if orchestrator.check_connection(&mut session) {
        println!("{}: connected", provider.display_name());
        Ok(0)
    } else {
        println!("{}: unreachable", provider.display_name());
        Ok(1)
    }
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let settings = load_settings(args.relax_safety.as_deref())?;
    let mut provider = parse_provider(&args.access.provider)?;
    let store = secret_store(args.access.secrets.as_deref());
    let orchestrator = new_orchestrator(settings);
    let mut override_key = args.access.api_key.clone();

    let mut session = orchestrator.new_session();
    if let Some(events) = args.events.as_ref() {
        session = session.with_event_log(events);
    }
    attach_credential(&mut session, provider, override_key.as_deref(), &store);
    apply_options(&mut session, &args.options, provider);

    println!("promptcanvas chat started. Type /help for commands.");
    if session.credential().is_none() {
        println!(
            "No key configured for {}; use /key <value> or set {}.",
            provider.display_name(),
            provider.credential_env_vars().join(" or ")
        );
    }

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == IoErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        match parse_command(&line) {
            ChatCommand::Noop => {}
            ChatCommand::Generate(text) => {
                let request = session.ui.request_for(&text);
                print_result(&orchestrator.submit(&mut session, &request));
            }
            ChatCommand::SetStyle(raw) => {
                if !raw.is_empty() {
                    session.ui.style = Style::from_selection(&raw);
                }
                println!("Style: {}", session.ui.style);
            }
            ChatCommand::SetQuality(raw) => {
                if !raw.is_empty() {
                    session.ui.quality = QualityTier::from_selection(&raw);
                }
                println!("Quality: {}", session.ui.quality);
            }
            ChatCommand::SetAspect(raw) => {
                if !raw.is_empty() {
                    session.ui.aspect_ratio = AspectRatio::from_selection(&raw);
                }
                println!("Aspect ratio: {}", session.ui.aspect_ratio.ratio());
            }
            ChatCommand::SetProvider(raw) => {
                if raw.is_empty() {
                    println!("Provider: {}", provider.display_name());
                    continue;
                }
                match parse_provider(&raw) {
                    Ok(next) => {
                        provider = next;
                        session.ui.provider = next;
                        attach_credential(&mut session, provider, override_key.as_deref(), &store);
                        println!("Provider: {}", provider.display_name());
                    }
                    Err(err) => println!("{err:#}"),
                }
            }
            ChatCommand::SetKey(raw) => {
                override_key = Some(raw).filter(|value| !value.trim().is_empty());
                attach_credential(&mut session, provider, override_key.as_deref(), &store);
                match session.credential_source() {
                    Some(source) => println!("Key set ({}).", source.as_str()),
                    None => println!("No key configured; generation is disabled."),
                }
            }
            ChatCommand::Edit(Some(path)) => {
                match images::read_upload(Path::new(&path), orchestrator.settings()) {
                    Ok(image) => {
                        println!("Editing {path} ({} bytes).", image.len());
                        session.ui.pending_image = Some(image);
                    }
                    Err(err) => println!("Upload rejected: {err:#}"),
                }
            }
            ChatCommand::Edit(None) => {
                session.ui.pending_image = None;
                println!("Input image cleared.");
            }
            ChatCommand::Save(path) => {
                let Some(image) = session.latest_image() else {
                    println!("No image to save yet.");
                    continue;
                };
                match images::save_png(
                    image,
                    path.as_deref().map(Path::new),
                    &args.out_dir,
                    &download_key(&session),
                ) {
                    Ok(saved) => println!("Saved {}", saved.display()),
                    Err(err) => println!("Save failed: {err:#}"),
                }
            }
            ChatCommand::Check => {
                if orchestrator.check_connection(&mut session) {
                    println!("{}: connected", provider.display_name());
                } else {
                    println!("{}: unreachable", provider.display_name());
                }
            }
            ChatCommand::History => print_history(&session),
            ChatCommand::Clear => {
                orchestrator.clear_conversation(&mut session);
                println!("Conversation cleared.");
            }
            ChatCommand::Help => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
                println!(
                    "Styles: {}",
                    Style::ALL
                        .iter()
                        .map(Style::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                println!(
                    "Providers: {}",
                    ProviderId::ALL
                        .iter()
                        .map(ProviderId::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            ChatCommand::Unknown { command, .. } => {
                println!("Unknown command /{command}. Type /help for commands.");
            }
        }
    }
    Ok(())
}

fn print_result(result: &GenerationResult) {
    match result {
        GenerationResult::Image(image) => {
            println!(
                "Generated {} image ({} bytes). Use /save [path] to export it.",
                image.mime_type,
                image.len()
            );
        }
        GenerationResult::Text(text) => println!("{text}"),
        GenerationResult::Failure(failure) if failure.kind == ErrorKind::ModelWarmingUp => {
            println!("Error: {failure}. Try again in a few seconds.");
        }
        GenerationResult::Failure(failure) => println!("Error: {failure}"),
    }
}

fn print_history(session: &SessionContext) {
    if session.ledger().is_empty() {
        println!("(no messages)");
        return;
    }
    for turn in session.ledger().iter() {
        let attachment = turn
            .image()
            .map(|image| format!(" [image {} bytes]", image.len()))
            .unwrap_or_default();
        println!(
            "#{} {}: {}{attachment}",
            turn.sequence(),
            turn.role().as_str(),
            turn.text()
        );
    }
}
