use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, SecondsFormat};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use sketchyz_contracts::gallery::{GalleryItem, GalleryStore};
use sketchyz_contracts::image_data::ImageData;
use sketchyz_contracts::quota::{GenerationQuota, JsonScalarStore};
use sketchyz_contracts::session::{parse_intent, Intent, SESSION_HELP_COMMANDS};
use sketchyz_contracts::styles::StyleCatalog;
use sketchyz_engine::camera::{CameraDevice, NoCamera, StillImageCamera};
use sketchyz_engine::config::EngineConfig;
use sketchyz_engine::errors::TransitionError;
use sketchyz_engine::export::{OutboxShareSheet, ShareOutcome};
use sketchyz_engine::{Controller, Screen};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "sketchyz", version, about = "Turn drawings into styled art")]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,
    #[command(subcommand)]
    command: Command,
}

/// Overrides applied on top of the environment configuration. Flags win over
/// the matching `SKETCHYZ_*` variables.
#[derive(Debug, Default, Args)]
struct EngineArgs {
    #[arg(long, global = true, env = "SKETCHYZ_HOME")]
    data_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    dryrun: bool,
    #[arg(long, global = true, env = "GEMINI_API_BASE")]
    api_base: Option<String>,
    #[arg(long, global = true, env = "SKETCHYZ_VISION_MODEL")]
    vision_model: Option<String>,
    #[arg(long, global = true, env = "SKETCHYZ_BRAIN_MODEL")]
    brain_model: Option<String>,
    #[arg(long, global = true, env = "SKETCHYZ_PRIMARY_IMAGE_MODEL")]
    primary_model: Option<String>,
    #[arg(long, global = true, env = "SKETCHYZ_FALLBACK_IMAGE_MODEL")]
    fallback_model: Option<String>,
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Style one drawing and write the PNG.
    Style(StyleArgs),
    #[command(subcommand)]
    Gallery(GalleryCommand),
    /// List the available styles.
    Styles,
    #[command(subcommand)]
    Quota(QuotaCommand),
    /// Interactive session driven by slash commands.
    Session(SessionArgs),
}

#[derive(Debug, Parser)]
struct StyleArgs {
    image: PathBuf,
    #[arg(long)]
    style: String,
    #[arg(long)]
    context: Option<String>,
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    save: bool,
}

#[derive(Debug, Subcommand)]
enum GalleryCommand {
    List,
    Show { id: String },
    Delete { id: String },
    Export {
        id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum QuotaCommand {
    Show,
    Reset,
}

#[derive(Debug, Parser)]
struct SessionArgs {
    /// Image file served as the live camera feed.
    #[arg(long)]
    camera_feed: Option<PathBuf>,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("sketchyz error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SKETCHYZ_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = engine_config(&cli.engine, EngineConfig::from_env());
    match cli.command {
        Command::Style(args) => run_style(&config, args),
        Command::Gallery(command) => run_gallery(&config, command),
        Command::Styles => {
            print_styles(&StyleCatalog::default());
            Ok(0)
        }
        Command::Quota(command) => run_quota(&config, command),
        Command::Session(args) => {
            run_session(&config, args)?;
            Ok(0)
        }
    }
}

fn engine_config(args: &EngineArgs, mut config: EngineConfig) -> EngineConfig {
    if let Some(dir) = args.data_dir.clone() {
        config.data_dir = dir;
    }
    if args.dryrun {
        config.dryrun = true;
    }
    if let Some(base) = args.api_base.clone() {
        config.api_base = base;
    }
    if let Some(model) = args.vision_model.clone() {
        config.models.vision = model;
    }
    if let Some(model) = args.brain_model.clone() {
        config.models.brain = model;
    }
    if let Some(model) = args.primary_model.clone() {
        config.models.primary_image = model;
    }
    if let Some(model) = args.fallback_model.clone() {
        config.models.fallback_image = model;
    }
    if let Some(secs) = args.timeout_secs {
        config.request_timeout = Duration::from_secs(secs.clamp(15, 300));
    }
    config
}

fn new_controller(config: &EngineConfig, camera: Box<dyn CameraDevice>) -> Controller {
    let session_id = Uuid::new_v4().to_string();
    Controller::from_config(
        config,
        &session_id,
        camera,
        Box::new(OutboxShareSheet::new(config.outbox_dir())),
    )
}

fn run_style(config: &EngineConfig, args: StyleArgs) -> Result<i32> {
    let mut controller = new_controller(config, Box::new(NoCamera));
    controller.start()?;
    if controller.screen() != Screen::CameraChoice {
        bail!(feedback_text(&controller).unwrap_or_else(|| "could not start".to_string()));
    }
    controller.upload_image(ImageData::from_path(&args.image)?)?;
    if let Some(context) = args.context.as_deref() {
        controller.set_context_input(context)?;
    }
    controller.accept_context()?;
    controller.select_style(&args.style)?;
    if controller.screen() != Screen::Result {
        bail!(feedback_text(&controller).unwrap_or_else(|| "generation failed".to_string()));
    }
    let path = controller.download_result(args.out.as_deref())?;
    if let Some(result) = controller.state().result.as_ref() {
        println!("{}", result.message);
    }
    println!("Wrote {}", path.display());
    if args.save {
        controller.save_to_gallery()?;
        if let Some(notice) = controller.state().notice.as_deref() {
            eprintln!("{notice}");
            return Ok(1);
        }
        println!("Saved to gallery");
    }
    Ok(0)
}

fn run_gallery(config: &EngineConfig, command: GalleryCommand) -> Result<i32> {
    let store = GalleryStore::new(config.gallery_path());
    match command {
        GalleryCommand::List => {
            let items = store.try_list()?;
            if items.is_empty() {
                println!("Gallery is empty");
            }
            for item in &items {
                println!(
                    "{}  {}  {:<10}  {}",
                    item.id,
                    format_timestamp(item.timestamp),
                    item.style_id,
                    item.message
                );
            }
        }
        GalleryCommand::Show { id } => {
            let Some(item) = store.get(&id) else {
                bail!("no gallery item {id}");
            };
            print_gallery_item(&item);
        }
        GalleryCommand::Delete { id } => {
            if store.delete(&id)? {
                println!("Deleted {id}");
            } else {
                println!("No gallery item {id}");
                return Ok(1);
            }
        }
        GalleryCommand::Export { id, out } => {
            let mut controller = new_controller(config, Box::new(NoCamera));
            controller.open_gallery()?;
            let path = controller.download_gallery_item(&id, out.as_deref())?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(0)
}

fn print_gallery_item(item: &GalleryItem) {
    let size = |data_url: &str| {
        ImageData::from_data_url(data_url)
            .map(|image| format!("{} ({} bytes)", image.mime_type, image.bytes.len()))
            .unwrap_or_else(|_| "unreadable".to_string())
    };
    println!("id:       {}", item.id);
    println!("saved:    {}", format_timestamp(item.timestamp));
    println!("style:    {}", item.style_id);
    println!("message:  {}", item.message);
    println!("original: {}", size(&item.original_image));
    println!("styled:   {}", size(&item.styled_image));
}

fn run_quota(config: &EngineConfig, command: QuotaCommand) -> Result<i32> {
    let quota = GenerationQuota::new(
        Box::new(JsonScalarStore::new(config.local_storage_path())),
        config.max_generations,
    );
    match command {
        QuotaCommand::Show => {
            println!(
                "{} of {} generations used ({} left)",
                quota.used(),
                quota.limit(),
                quota.remaining()
            );
        }
        QuotaCommand::Reset => {
            quota.reset()?;
            println!("Credits refilled: {} generations available", quota.limit());
        }
    }
    Ok(0)
}

fn print_styles(catalog: &StyleCatalog) {
    for style in catalog.list() {
        println!("{:<11} {} {}", style.id, style.icon, style.name);
    }
}

fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|time| time.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| millis.to_string())
}

fn feedback_text(controller: &Controller) -> Option<String> {
    let state = controller.state();
    state.error.clone().or_else(|| state.notice.clone())
}

fn run_session(config: &EngineConfig, args: SessionArgs) -> Result<()> {
    let camera: Box<dyn CameraDevice> = match args.camera_feed {
        Some(path) => Box::new(StillImageCamera::new(path)),
        None => Box::new(NoCamera),
    };
    let mut controller = new_controller(config, camera);
    let stdin = io::stdin();
    let mut line = String::new();

    println!("Sketchyz session started. Type /help for commands.");
    print_screen(&controller);

    loop {
        print!("[{}]> ", controller.screen());
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        let intent = parse_intent(input);
        if intent.action == "noop" {
            continue;
        }
        if intent.action == "quit" {
            break;
        }

        let before = controller.screen();
        if let Err(err) = dispatch(&mut controller, &intent) {
            match err.downcast_ref::<TransitionError>() {
                Some(transition) => println!("Can't do that now: {transition}"),
                None => println!("Error: {err:#}"),
            }
        }
        if loading_action(&intent.action) {
            for message in &controller.state().loading_history {
                println!("  {message}");
            }
        }
        if let Some(text) = feedback_text(&controller) {
            println!("{text}");
            controller.clear_feedback();
        }
        if controller.screen() != before {
            print_screen(&controller);
        }
    }
    Ok(())
}

fn loading_action(action: &str) -> bool {
    matches!(
        action,
        "accept_context" | "analyze" | "select_style" | "regenerate" | "text"
    )
}

fn dispatch(controller: &mut Controller, intent: &Intent) -> Result<()> {
    match intent.action.as_str() {
        "help" => println!("Commands: {}", SESSION_HELP_COMMANDS.join(" ")),
        "select_key" => {
            controller.open_select_key()?;
            println!("Key selected");
        }
        "start" => controller.start()?,
        "start_live_camera" => controller.start_live_camera()?,
        "toggle_camera" => {
            controller.toggle_camera()?;
            println!("Camera facing {}", controller.state().facing);
        }
        "capture_photo" => {
            controller.capture_photo()?;
            if controller.screen() == Screen::LiveCamera {
                println!("No frame yet, try /snap again");
            }
        }
        "upload_image" => {
            let Some(path) = intent.arg_str("path") else {
                bail!("/upload requires a path");
            };
            controller.upload_image(ImageData::from_path(&PathBuf::from(path))?)?;
        }
        "set_context" => {
            controller.set_context_input(intent.arg_str("text").unwrap_or_default())?;
        }
        "accept_context" => controller.accept_context()?,
        "analyze" => controller.analyze()?,
        "select_style" => {
            let Some(id) = intent.arg_str("id") else {
                bail!("/style requires a style id (see /styles)");
            };
            controller.select_style(id)?;
        }
        "regenerate" => controller.regenerate()?,
        "set_prompt" => {
            controller.set_prompt(intent.arg_str("text").unwrap_or_default())?;
            println!("Prompt: {}", controller.state().current_prompt);
        }
        "switch_style" => {
            let Some(id) = intent.arg_str("id") else {
                bail!("/switch requires a style id (see /styles)");
            };
            controller.switch_style(id)?;
            println!("Prompt: {}", controller.state().current_prompt);
        }
        "set_iterate" => {
            let Some(enabled) = intent.command_args.get("enabled").and_then(Value::as_bool)
            else {
                bail!("/iterate expects on or off");
            };
            controller.set_use_result_as_input(enabled)?;
            println!(
                "Next regeneration edits the {}",
                if enabled { "last result" } else { "original drawing" }
            );
        }
        "save" => {
            controller.save_to_gallery()?;
            if controller.state().has_saved {
                println!("Saved to gallery");
            }
        }
        "open_gallery" => controller.open_gallery()?,
        "resume" => match intent.arg_str("id") {
            Some(id) => controller.resume_from_gallery(id)?,
            None => controller.resume_result()?,
        },
        "delete_item" => {
            let Some(id) = intent.arg_str("id") else {
                bail!("/delete requires a gallery id");
            };
            controller.delete_gallery_item(id)?;
            print_gallery(controller);
        }
        "download" => {
            let dir = intent.arg_str("path").map(PathBuf::from);
            let path = controller.download_result(dir.as_deref())?;
            println!("Wrote {}", path.display());
        }
        "share" => match controller.share_result()? {
            Some(ShareOutcome {
                location: Some(location),
            }) => println!("Shared to {}", location.display()),
            Some(ShareOutcome { location: None }) => println!("Shared"),
            None => {}
        },
        "back" => controller.back()?,
        "reset" => controller.reset(),
        "refill_credits" => {
            controller.refill_credits()?;
            println!("Credits refilled");
        }
        "status" => print_status(controller),
        "list_styles" => print_styles(controller.catalog()),
        "text" => {
            if controller.screen() != Screen::ContextInput {
                println!("Unknown input; type /help for commands");
                return Ok(());
            }
            controller.set_context_input(intent.text.as_deref().unwrap_or_default())?;
            controller.accept_context()?;
        }
        _ => println!("Unknown command: {}", intent.raw.trim()),
    }
    Ok(())
}

fn print_screen(controller: &Controller) {
    let state = controller.state();
    match state.screen {
        Screen::Welcome => {
            println!("Welcome to Sketchyz! /start to begin.");
            if !state.has_api_key {
                println!("Pick a key with /key first.");
            }
        }
        Screen::CameraChoice => println!("/live to use the camera or /upload <path>."),
        Screen::LiveCamera => println!("Camera on ({}). /snap, /flip or /back.", state.facing),
        Screen::ContextInput => {
            println!("What did you draw? Type it, or /go to let the robot guess.")
        }
        Screen::Analyzing | Screen::Processing => {}
        Screen::StyleSelect => {
            println!("Looks like a {}! Pick a style:", state.drawing_subject);
            print_styles(controller.catalog());
        }
        Screen::Result => {
            if let Some(result) = state.result.as_ref() {
                println!(
                    "{} [{}] {} ({} bytes)",
                    result.message,
                    controller.catalog().display_name(&result.style_id),
                    result.styled_image.mime_type,
                    result.styled_image.bytes.len()
                );
            }
            println!("Prompt: {}", state.current_prompt);
            println!("/save /download /share /prompt /regen /switch /iterate /reset");
        }
        Screen::Gallery => print_gallery(controller),
    }
}

fn print_gallery(controller: &Controller) {
    let items = &controller.state().gallery_items;
    if items.is_empty() {
        println!("Gallery is empty");
        return;
    }
    for item in items {
        println!(
            "{}  {}  {}",
            item.id,
            format_timestamp(item.timestamp),
            controller.catalog().display_name(&item.style_id)
        );
    }
    println!("/resume <id> /delete <id> /back");
}

fn print_status(controller: &Controller) {
    let state = controller.state();
    let quota = controller.quota();
    println!("screen:    {}", state.screen);
    println!("key:       {}", if state.has_api_key { "selected" } else { "missing" });
    println!("subject:   {}", state.drawing_subject);
    println!("style:     {}", state.selected_style.as_deref().unwrap_or("-"));
    println!("prompt:    {}", state.current_prompt);
    println!("iterate:   {}", state.use_result_as_input);
    println!("saved:     {}", state.has_saved);
    println!("camera:    {}", if controller.camera_active() { "on" } else { "off" });
    println!("quota:     {}/{}", quota.used(), quota.limit());
}
