use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing_subscriber::filter::EnvFilter;

use brawlcast::collab::{DynVoteSource, HttpPollApi};
use brawlcast::config::{AppConfig, ConfigOverrides, StoreBackend};
use brawlcast::stream::{ControlServer, SessionDeps, StoreCombatSource};
use brawlcast::{
    CombatEngine, CombatState, DynStore, MemoryStore, RgbFrame, SharedClock, StreamRegistry,
    SystemClock, TickCoordinator, ViewerServer, VoteWatcher,
};

#[derive(Parser, Debug)]
#[command(name = "brawlcast", version)]
struct Cli {
    /// JSON config file. Missing keys take their defaults.
    #[arg(long, global = true, env = "BRAWLCAST_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: OverrideArgs,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug)]
struct OverrideArgs {
    /// Use the redis store at this URL.
    #[arg(long, global = true, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Poll service base URL.
    #[arg(long, global = true, env = "POLL_API_URL")]
    poll_api_url: Option<String>,

    /// Ingest base URL; the stream key is appended.
    #[arg(long, global = true, env = "RTMP_URL")]
    rtmp_url: Option<String>,

    /// Viewer WebSocket bind address.
    #[arg(long, global = true, env = "VIEWER_ADDR")]
    viewer_addr: Option<String>,

    /// Stream control bind address.
    #[arg(long, global = true, env = "CONTROL_ADDR")]
    control_addr: Option<String>,

    /// Stream key to start in addition to the configured targets.
    #[arg(long, global = true, env = "STREAM_KEY")]
    stream_key: Option<String>,
}

impl From<OverrideArgs> for ConfigOverrides {
    fn from(a: OverrideArgs) -> Self {
        Self {
            redis_url: a.redis_url,
            poll_api_url: a.poll_api_url,
            rtmp_url: a.rtmp_url,
            viewer_addr: a.viewer_addr,
            control_addr: a.control_addr,
            stream_key: a.stream_key,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the coordinator, vote watcher, viewer channel and stream targets until ctrl-c.
    Serve,
    /// Render one frame at output resolution as a PNG.
    Frame(FrameArgs),
    /// Print the encoder command line for a stream key.
    Args,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Combat state JSON to render. Defaults to a fresh fight.
    #[arg(long)]
    state: Option<PathBuf>,

    /// Scene time in milliseconds (drives background motion).
    #[arg(long, default_value_t = 0.0)]
    time_ms: f64,
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut cfg = AppConfig::load(cli.config.as_deref()).context("loading config")?;
    cfg.apply(cli.overrides.into());
    cfg.validate().context("invalid config")?;

    match cli.cmd {
        Command::Serve => cmd_serve(cfg).await,
        Command::Frame(args) => cmd_frame(&cfg, args),
        Command::Args => cmd_args(&cfg),
    }
}

async fn open_store(cfg: &AppConfig) -> anyhow::Result<DynStore> {
    match cfg.store.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "redis")]
        StoreBackend::Redis => {
            let store = brawlcast::store::RedisStore::connect(&cfg.store.url)
                .await
                .with_context(|| format!("connecting to {}", cfg.store.url))?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis"))]
        StoreBackend::Redis => {
            anyhow::bail!("redis store requested, but this build lacks the `redis` feature")
        }
    }
}

async fn cmd_serve(cfg: AppConfig) -> anyhow::Result<()> {
    let clock: SharedClock = Arc::new(SystemClock);
    let store = open_store(&cfg).await?;
    let poll_api = HttpPollApi::new(&cfg.collab.api_base_url, cfg.collab.request_timeout())
        .context("creating poll api client")?;
    let source: DynVoteSource = Arc::new(poll_api);

    let engine = Arc::new(
        CombatEngine::new(store.clone(), clock.clone(), cfg.combat)
            .with_state_ttl(cfg.store.state_ttl()),
    );
    let coordinator = Arc::new(
        TickCoordinator::new(
            engine.clone(),
            store.clone(),
            source.clone(),
            clock.clone(),
            cfg.tick,
        )
        .with_fallback(cfg.collab.fallback_enabled),
    );
    let watcher = Arc::new(VoteWatcher::new(
        engine,
        store.clone(),
        source.clone(),
        cfg.tick.vote_refresh(),
    ));
    let viewer = ViewerServer::new(store.clone(), clock.clone());
    let listener = ViewerServer::bind(&cfg.viewer.bind_addr).await?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut tasks = Vec::new();
    {
        let rx = stop_rx.clone();
        tasks.push(tokio::spawn(async move { coordinator.run(rx).await }));
    }
    {
        let rx = stop_rx.clone();
        tasks.push(tokio::spawn(async move { watcher.run(rx).await }));
    }
    {
        let rx = stop_rx.clone();
        tasks.push(tokio::spawn(async move { viewer.serve(listener, rx).await }));
    }

    let registry = Arc::new(StreamRegistry::new(SessionDeps {
        stream: cfg.stream.clone(),
        render: cfg.render,
        source: Arc::new(StoreCombatSource::new(store.clone())),
        designs: Some(source),
        clock,
    }));
    for target in cfg.stream.targets.iter().cloned() {
        let key = target.stream_key.clone();
        match registry.start(target).await {
            Ok(outcome) => tracing::info!(stream_key = %key, ?outcome, "stream target"),
            Err(e) => tracing::error!(stream_key = %key, error = %e, "stream target failed"),
        }
    }

    if let Some(addr) = &cfg.stream.control_addr {
        let control = ControlServer::new(registry.clone());
        let listener = ControlServer::bind(addr).await?;
        let rx = stop_rx.clone();
        tasks.push(tokio::spawn(async move { control.serve(listener, rx).await }));
    }

    tracing::info!(viewer = %cfg.viewer.bind_addr, "brawlcast running");
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutting down");

    registry.stop_all().await;
    let _ = stop_tx.send(true);
    for task in tasks {
        task.await.context("background task panicked")?;
    }
    Ok(())
}

fn cmd_frame(cfg: &AppConfig, args: FrameArgs) -> anyhow::Result<()> {
    let state = match &args.state {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read state '{}'", path.display()))?;
            CombatState::from_json(&raw).with_context(|| "parse combat state JSON")?
        }
        None => CombatState::new("preview", cfg.combat.default_timer_secs, 0),
    };

    let mut renderer = cfg.render.build();
    renderer.sync(&state, state.last_update);
    let enc = &cfg.stream.encoder;
    let mut frame = RgbFrame::new(enc.width, enc.height);
    frame.fill_from(renderer.render(args.time_ms))?;
    let img = frame
        .to_image()
        .context("frame buffer does not match its dimensions")?;

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    img.save_with_format(&args.out, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_args(cfg: &AppConfig) -> anyhow::Result<()> {
    let key = cfg
        .stream
        .targets
        .first()
        .map(|t| t.stream_key.as_str())
        .unwrap_or("preview");
    println!("{}", cfg.stream.encoder.command_line(key));
    Ok(())
}
