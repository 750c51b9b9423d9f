mod viewport;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use starfall_core::{
    CivilDate, Connection, DAYS_FOUND_KEY, KeyValueStore, MemoryKv, Millis, OverlayFrame,
    RevealPhase, ScreenPosition, Session, reveal_groups,
};
use starfall_store::{DB_FILE, MapConfig, StarfallConfig, Store, resolve_base_dir};

use crate::viewport::Viewport;

#[derive(Parser)]
#[command(name = "starfall", about = "Find the daily points, then reveal the constellation")]
struct Cli {
    /// Config file (defaults to <data dir>/starfall.toml, then the built-in map)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pretend today is this date (YYYY-MM-DD)
    #[arg(long, global = true, value_parser = parse_date)]
    today: Option<CivilDate>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show discovery progress
    Status,

    /// Record found days
    Find {
        #[arg(required = true)]
        days: Vec<u32>,
    },

    /// Point towards the day that can be found next
    Hint {
        /// Pointer x in viewport pixels (defaults to the middle)
        #[arg(long, allow_negative_numbers = true)]
        x: Option<f64>,
        /// Pointer y in viewport pixels (defaults to the middle)
        #[arg(long, allow_negative_numbers = true)]
        y: Option<f64>,
    },

    /// Where the day-number label of a found marker is drawn
    Label { day: u32 },

    /// Run the whole reveal instantly and print the constellation
    Reveal {
        /// Show the hidden image once built
        #[arg(long)]
        overlay: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Play the reveal in real time, then return to the map
    Play {
        /// Time multiplier
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
        /// How long to stay on the finished constellation (ms)
        #[arg(long, default_value_t = 3000)]
        hold_ms: u64,
        /// Show the hidden image once built
        #[arg(long)]
        overlay: bool,
    },

    /// Discover every day in a random order and check the constellation is unchanged
    Simulate {
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Forget every found day
    Reset,

    /// List the configured points
    Catalog,
}

fn parse_date(s: &str) -> std::result::Result<CivilDate, String> {
    let parts: Vec<&str> = s.split('-').collect();
    let [y, m, d] = parts.as_slice() else {
        return Err(format!("expected YYYY-MM-DD, got '{s}'"));
    };
    let year = y.parse::<i64>().map_err(|e| format!("bad year '{y}': {e}"))?;
    let month = m.parse::<u32>().map_err(|e| format!("bad month '{m}': {e}"))?;
    let day = d.parse::<u32>().map_err(|e| format!("bad day '{d}': {e}"))?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(format!("no such date '{s}'"));
    }
    Ok(CivilDate::new(year, month, day))
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

/// A session bound to its map, plus where its config came from.
struct App<S> {
    session: Session<S>,
    viewport: Viewport,
    map: MapConfig,
    config_source: Option<PathBuf>,
}

impl<S: KeyValueStore> App<S> {
    fn new(
        config: &StarfallConfig,
        source: Option<PathBuf>,
        backend: S,
        today: CivilDate,
    ) -> Result<Self> {
        let catalog = config.catalog().context("invalid point catalog")?;
        let session = Session::new(catalog, config.settings(), backend, today)
            .context("invalid overlay anchors")?;
        let map = config.map.clone();
        let mut viewport = Viewport::new(map.center(), map.zoom, map.width, map.height);
        viewport.sync(&session);
        Ok(Self {
            session,
            viewport,
            map,
            config_source: source,
        })
    }

    fn sync(&mut self) {
        self.viewport.sync(&self.session);
    }

    /// Fire tasks in deadline order until `until` is reached or nothing is left.
    fn drive(&mut self, now: &mut Millis, until: RevealPhase) {
        while self.session.phase() != until {
            let Some(deadline) = self.session.next_deadline() else {
                break;
            };
            *now = deadline;
            self.session.advance(deadline, &mut self.viewport);
        }
    }

    /// Run reveal and build back to back on a virtual clock.
    fn run_to_built(&mut self) -> Result<Millis> {
        let mut now = 0;
        if !self.session.request_reveal(now, &mut self.viewport) {
            bail!("{}", not_ready(&self.session));
        }
        self.drive(&mut now, RevealPhase::Starry);
        if self.session.phase() != RevealPhase::Starry {
            bail!("reveal aborted: some markers have no screen position");
        }
        self.session.request_build(now);
        self.drive(&mut now, RevealPhase::Built);
        Ok(now)
    }
}

fn not_ready<S: KeyValueStore>(session: &Session<S>) -> String {
    let progress = session.progress();
    format!(
        "found {} of {} days; find every day before the reveal",
        progress.found, progress.total
    )
}

fn load_config(cli: &Cli, base_dir: &Path) -> Result<(StarfallConfig, Option<PathBuf>)> {
    StarfallConfig::load(cli.config.as_deref(), base_dir).context("failed to load configuration")
}

fn open_app(cli: &Cli) -> Result<App<Store>> {
    let base_dir = resolve_base_dir();
    let (config, source) = load_config(cli, &base_dir)?;
    let db_path = base_dir.join(DB_FILE);
    let store = Store::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    let today = cli.today.unwrap_or_else(CivilDate::today);
    App::new(&config, source, store, today)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Status => cmd_status(&cli),
        Commands::Find { days } => cmd_find(&cli, days),
        Commands::Hint { x, y } => cmd_hint(&cli, *x, *y),
        Commands::Label { day } => cmd_label(&cli, *day),
        Commands::Reveal { overlay, json } => cmd_reveal(&cli, *overlay, *json),
        Commands::Play {
            speed,
            hold_ms,
            overlay,
        } => cmd_play(&cli, *speed, *hold_ms, *overlay).await,
        Commands::Simulate { seed } => cmd_simulate(&cli, *seed),
        Commands::Reset => cmd_reset(&cli),
        Commands::Catalog => cmd_catalog(&cli),
    }
}

fn format_days<'a>(days: impl IntoIterator<Item = &'a u32>) -> String {
    let list: Vec<String> = days.into_iter().map(u32::to_string).collect();
    if list.is_empty() {
        "-".to_string()
    } else {
        list.join(" ")
    }
}

fn cmd_status(cli: &Cli) -> Result<()> {
    let app = open_app(cli)?;
    let session = &app.session;
    let season = session.settings().season;
    let progress = session.progress();

    println!(
        "config:     {}",
        app.config_source
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "built-in".to_string())
    );
    println!(
        "season:     {}-{:02}, open through day {}",
        season.year,
        season.month,
        session.available_through()
    );
    println!(
        "found:      {} of {} ({} in catalog)",
        progress.found, progress.available, progress.total
    );
    println!("days:       {}", format_days(session.discovered_days()));
    if let Some(at) = session
        .discovery()
        .backend()
        .updated_at(DAYS_FOUND_KEY)
        .context("failed to read discovery timestamp")?
    {
        println!("updated:    {at} UTC");
    }
    match session.findable_day() {
        Some(day) => println!("next:       day {day}"),
        None if progress.found == progress.total => println!("next:       ready to reveal"),
        None => println!("next:       come back tomorrow"),
    }
    Ok(())
}

fn cmd_find(cli: &Cli, days: &[u32]) -> Result<()> {
    let mut app = open_app(cli)?;
    for &day in days {
        if app.session.mark_discovered(day) {
            println!("found day {day}");
        } else if !app.session.catalog().contains(day) {
            println!("day {day} is not on the map");
        } else {
            println!("day {day} has not opened yet");
        }
    }
    let progress = app.session.progress();
    println!("found {} of {}", progress.found, progress.available);
    if progress.found == progress.total {
        println!("every day found; run `starfall reveal`");
    }
    Ok(())
}

fn cmd_hint(cli: &Cli, x: Option<f64>, y: Option<f64>) -> Result<()> {
    let mut app = open_app(cli)?;
    let pointer = ScreenPosition::new(
        x.unwrap_or(app.map.width as f64 / 2.0),
        y.unwrap_or(app.map.height as f64 / 2.0),
    );
    app.session.set_help_mode(true);
    match app.session.pointer_moved(pointer, &app.viewport) {
        Some(target) => println!(
            "day {} is that way: {:.1}° from ({:.0}, {:.0})",
            target.day, target.angle_deg, pointer.x, pointer.y
        ),
        None => println!("nothing to find right now"),
    }
    Ok(())
}

fn cmd_label(cli: &Cli, day: u32) -> Result<()> {
    let app = open_app(cli)?;
    match app.session.marker_label(day, &app.viewport) {
        Some(label) => println!(
            "day {} label at ({:.1}, {:.1})",
            label.day, label.left, label.top
        ),
        None => println!("day {day} has no marker on the map"),
    }
    Ok(())
}

#[derive(Serialize)]
struct RevealReport {
    phase: RevealPhase,
    finished_at_ms: Millis,
    stars: usize,
    groups: usize,
    connections: Vec<Connection>,
    overlay: Option<OverlayFrame>,
}

fn print_connection(c: &Connection) {
    println!(
        "  #{:<3} day {:>2} -> day {:>2}  {:>8.1}px  {:>7.1}°",
        c.sequence_index, c.from_day, c.to_day, c.length_px, c.angle_deg
    );
}

fn cmd_reveal(cli: &Cli, overlay: bool, json: bool) -> Result<()> {
    let mut app = open_app(cli)?;
    let finished_at_ms = app.run_to_built()?;
    if overlay {
        app.session.toggle_overlay();
    }

    let session = &app.session;
    let report = RevealReport {
        phase: session.phase(),
        finished_at_ms,
        stars: session.stars().len(),
        groups: reveal_groups(session.connections()).len(),
        connections: session.connections().to_vec(),
        overlay: session.overlay_frame(),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize reveal")?
        );
        return Ok(());
    }

    println!("phase:      {}", report.phase);
    println!("stars:      {}", report.stars);
    println!("groups:     {}", report.groups);
    println!("built at:   {}ms", report.finished_at_ms);
    println!("connections:");
    for c in &report.connections {
        print_connection(c);
    }
    if let Some(frame) = report.overlay {
        println!(
            "overlay:    left={:.1} top={:.1} height={:.1}",
            frame.left, frame.top, frame.height
        );
    }
    Ok(())
}

async fn cmd_play(cli: &Cli, speed: f64, hold_ms: u64, overlay: bool) -> Result<()> {
    if !(speed.is_finite() && speed > 0.0) {
        bail!("--speed must be a positive number");
    }
    let mut app = open_app(cli)?;
    let started = tokio::time::Instant::now();
    let clock = || (started.elapsed().as_secs_f64() * 1000.0 * speed) as Millis;

    let mut now = clock();
    if !app.session.request_reveal(now, &mut app.viewport) {
        bail!("{}", not_ready(&app.session));
    }

    let mut shown_phase = None;
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut build_at = 0;
    let mut groups_printed = 0;
    let mut reset_at = None;
    let step = app.session.settings().timing.step_interval_ms;

    loop {
        let phase = app.session.phase();
        if shown_phase != Some(phase) {
            println!("[{now:>6}ms] {phase}");
            shown_phase = Some(phase);
        }

        match phase {
            RevealPhase::Starry if groups.is_empty() => {
                groups = reveal_groups(app.session.connections());
                build_at = now;
                app.session.request_build(now);
                continue;
            }
            RevealPhase::Building | RevealPhase::Built => {
                let connections = app.session.connections();
                while groups_printed < groups.len()
                    && build_at + step * groups_printed as u64 <= now
                {
                    for &i in &groups[groups_printed] {
                        print_connection(&connections[i]);
                    }
                    groups_printed += 1;
                }
                if phase == RevealPhase::Built && reset_at.is_none() {
                    if overlay
                        && app.session.toggle_overlay()
                        && let Some(frame) = app.session.overlay_frame()
                    {
                        println!(
                            "overlay: left={:.1} top={:.1} height={:.1}",
                            frame.left, frame.top, frame.height
                        );
                    }
                    reset_at = Some(now + hold_ms);
                }
            }
            RevealPhase::Mapped => break,
            _ => {}
        }

        let deadline = app
            .session
            .next_deadline()
            .or(reset_at.filter(|_| phase == RevealPhase::Built));
        let Some(deadline) = deadline else {
            break;
        };

        let wait = deadline.saturating_sub(clock()) as f64 / speed;
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs_f64(wait / 1000.0)) => {
                now = deadline.max(clock());
            }
            _ = tokio::signal::ctrl_c() => {
                now = clock();
                if !app.session.request_reset(now, &mut app.viewport) {
                    println!("interrupted");
                    break;
                }
                continue;
            }
        }

        if phase == RevealPhase::Built && reset_at.is_some_and(|at| now >= at) {
            app.session.request_reset(now, &mut app.viewport);
        }
        app.session.advance(now, &mut app.viewport);
    }

    println!(
        "map opacity {:.0}, interactive {}",
        app.viewport.opacity(),
        app.viewport.interactive()
    );
    Ok(())
}

fn cmd_simulate(cli: &Cli, seed: Option<u64>) -> Result<()> {
    let (config, source) = load_config(cli, &resolve_base_dir())?;
    let after_season = CivilDate::new(config.season.year + 1, 1, 1);
    let mut rng = match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_os_rng(),
    };

    let mut shuffled = App::new(&config, source.clone(), MemoryKv::new(), after_season)?;
    let mut order: Vec<u32> = shuffled.session.catalog().days().collect();
    order.shuffle(&mut rng);
    for &day in &order {
        shuffled.session.mark_discovered(day);
    }
    shuffled.sync();
    shuffled.run_to_built()?;

    let mut ascending = App::new(&config, source, MemoryKv::new(), after_season)?;
    let days: Vec<u32> = ascending.session.catalog().days().collect();
    for day in days {
        ascending.session.mark_discovered(day);
    }
    ascending.sync();
    ascending.run_to_built()?;

    let same = shuffled.session.connections() == ascending.session.connections();
    println!("order:      {}", format_days(&order));
    println!("connections: {}", shuffled.session.connections().len());
    println!("same as day order: {same}");
    if !same {
        bail!("constellation depends on discovery order");
    }
    Ok(())
}

fn cmd_reset(cli: &Cli) -> Result<()> {
    let mut app = open_app(cli)?;
    let count = app.session.discovered_days().len();
    if !app.session.forget_all() {
        bail!("cannot forget progress during a reveal");
    }
    println!("forgot {count} found days");
    Ok(())
}

fn cmd_catalog(cli: &Cli) -> Result<()> {
    let app = open_app(cli)?;
    let session = &app.session;
    let center = session.settings().center;
    let found = session.discovered_days();

    println!("day  edge  branch        lat        lon  found");
    for point in session.catalog().points() {
        let coord = point.placement.resolve(center);
        println!(
            "{:>3}  {:>4}  {:>6}  {:>9.5}  {:>9.5}  {}",
            point.day,
            point.edge_index,
            point
                .branch_index
                .map(|b| b.to_string())
                .unwrap_or_else(|| "-".to_string()),
            coord.lat,
            coord.lon,
            if found.contains(&point.day) { "*" } else { "" }
        );
    }
    Ok(())
}
