use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use cover_2048::config::Config;
use cover_2048::engine::{Score, Tile};
use cover_2048::input;
use cover_2048::policy::Greedy;
use cover_2048::session::{GameSession, SessionConfig, Status};
use cover_2048::store::{BestScoreStore, JsonFileStore};
use cover_2048::trace::{self, Run, RunRecorder};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "cover-2048", version, about = "Play, auto-play and replay 2048 games")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug, Default)]
struct GameOpts {
    /// Board size (N for an N×N grid)
    #[arg(long)]
    size: Option<usize>,
    /// Winning tile
    #[arg(long)]
    target: Option<Tile>,
    /// RNG seed for reproducible games
    #[arg(long)]
    seed: Option<u64>,
    /// JSON file holding the best score
    #[arg(long, value_name = "FILE")]
    best_file: Option<PathBuf>,
    /// Directory to write run traces into
    #[arg(long, value_name = "DIR")]
    trace_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play interactively: w/a/s/d, h/j/k/l or up/down/left/right, then Enter.
    /// `c` keeps playing after a win, `n` starts a new game, `q` quits.
    Play {
        #[command(flatten)]
        opts: GameOpts,
    },
    /// Play games with the greedy policy in parallel and print a summary
    Auto {
        #[command(flatten)]
        opts: GameOpts,
        /// Number of games
        #[arg(long, default_value_t = 100)]
        games: u32,
        /// Per-game move cap
        #[arg(long)]
        max_moves: Option<u32>,
        /// Hide the progress bar
        #[arg(long)]
        quiet: bool,
    },
    /// Print a recorded run
    Replay {
        /// Trace file written by `play` or `auto`
        file: PathBuf,
        /// Check that every step follows the engine rules
        #[arg(long)]
        verify: bool,
        /// Print every grid, not just the last one
        #[arg(long)]
        all: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Play { opts } => {
            let cfg = resolve_config(cli.config.as_deref(), &opts)?;
            run_play(&cfg)
        }
        Command::Auto { opts, games, max_moves, quiet } => {
            let cfg = resolve_config(cli.config.as_deref(), &opts)?;
            run_auto(&cfg, games, max_moves, quiet)
        }
        Command::Replay { file, verify, all } => run_replay(&file, verify, all),
    }
}

fn resolve_config(path: Option<&Path>, opts: &GameOpts) -> anyhow::Result<Config> {
    let mut cfg = match path {
        Some(p) => Config::from_toml(p).with_context(|| format!("loading {}", p.display()))?,
        None => Config::default(),
    };
    if let Some(size) = opts.size {
        cfg.size = size;
    }
    if let Some(target) = opts.target {
        cfg.target = target;
    }
    if opts.seed.is_some() {
        cfg.seed = opts.seed;
    }
    if opts.best_file.is_some() {
        cfg.best_score_file = opts.best_file.clone();
    }
    if opts.trace_dir.is_some() {
        cfg.trace_dir = opts.trace_dir.clone();
    }
    cfg.validate()?;
    Ok(cfg)
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

fn run_play(cfg: &Config) -> anyhow::Result<()> {
    let mut store = cfg.best_score_file.as_ref().map(JsonFileStore::new);
    let best = match &store {
        Some(s) => s.load().unwrap_or_else(|e| {
            warn!("could not read best score from {}: {}", s.path().display(), e);
            0
        }),
        None => 0,
    };
    let mut saved_best = best;
    let mut games_played: u64 = 0;
    let mut session = GameSession::new(cfg.session(), best, make_rng(cfg.seed));
    let mut recorder = RunRecorder::new(session.grid(), Some("play".to_string()));
    print_session(&session)?;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        match line.trim() {
            "" => continue,
            "q" | "quit" => break,
            "n" | "new" => {
                let score = session.score();
                session.new_game();
                let finished = std::mem::replace(&mut recorder, RunRecorder::new(session.grid(), Some("play".to_string())));
                save_trace(cfg.trace_dir.as_deref(), finished.finish(score), games_played)?;
                games_played += 1;
            }
            "c" | "continue" => {
                if !session.keep_playing() {
                    println!("Nothing to continue.");
                }
            }
            key => match input::direction_for_key(key) {
                Some(dir) => {
                    let turn = session.play(dir);
                    if turn.moved {
                        recorder.record(dir, session.grid());
                    }
                }
                None => {
                    println!("Unknown command {:?}", key);
                    continue;
                }
            },
        }
        if session.best_score() > saved_best {
            if let Some(s) = store.as_mut() {
                match s.save(session.best_score()) {
                    Ok(()) => saved_best = session.best_score(),
                    Err(e) => warn!("could not save best score: {}", e),
                }
            }
        }
        print_session(&session)?;
    }

    save_trace(cfg.trace_dir.as_deref(), recorder.finish(session.score()), games_played)?;
    Ok(())
}

fn print_session(session: &GameSession<StdRng>) -> io::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "\n{}", session.grid())?;
    writeln!(out, "Score: {} | Best: {} | Moves: {}", session.score(), session.best_score(), session.moves())?;
    match session.status() {
        Status::Won => writeln!(out, "You win! `c` to keep playing, `n` for a new game.")?,
        Status::GameOver => writeln!(out, "Game over. `n` for a new game, `q` to quit.")?,
        Status::Playing => {}
    }
    out.flush()
}

fn save_trace(dir: Option<&Path>, run: Run, tag: u64) -> anyhow::Result<()> {
    let Some(dir) = dir else { return Ok(()) };
    if run.meta.steps == 0 {
        return Ok(());
    }
    fs::create_dir_all(dir)?;
    let path = autoname(dir, run.meta.start_unix_s, tag);
    trace::write_run_to_path(&path, &run).with_context(|| format!("writing {}", path.display()))?;
    info!("wrote trace {} ({} steps)", path.display(), run.meta.steps);
    Ok(())
}

fn autoname(dir: &Path, start_unix_s: u64, tag: u64) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    dir.join(format!("run-{}-{}-{:09}.c2t", start_unix_s, tag, nanos))
}

struct GameSummary {
    score: Score,
    highest_tile: Tile,
    won: bool,
    moves: u32,
}

fn play_auto_game(cfg: SessionConfig, seed: u64, max_moves: Option<u32>) -> (GameSummary, Run) {
    let mut session = GameSession::new(cfg, 0, StdRng::seed_from_u64(seed));
    let mut policy = Greedy::new();
    let mut recorder = RunRecorder::new(session.grid(), Some(format!("greedy seed={}", seed)));
    let mut won = false;
    loop {
        if session.status() == Status::Won {
            won = true;
            session.keep_playing();
        }
        if session.status() == Status::GameOver {
            break;
        }
        if max_moves.is_some_and(|cap| session.moves() >= cap) {
            break;
        }
        let Some(dir) = policy.best_move(session.grid()) else { break };
        if session.play(dir).moved {
            recorder.record(dir, session.grid());
        }
    }
    let summary = GameSummary {
        score: session.score(),
        highest_tile: session.grid().highest_tile(),
        won,
        moves: session.moves(),
    };
    (summary, recorder.finish(session.score()))
}

fn run_auto(cfg: &Config, games: u32, max_moves: Option<u32>, quiet: bool) -> anyhow::Result<()> {
    let base_seed = cfg.seed.unwrap_or_else(rand::random);
    info!("auto: {} games, size={} target={} seed={}", games, cfg.size, cfg.target, base_seed);
    let start = Instant::now();

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(games as u64);
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} games ({eta})")?
                .progress_chars("=>-"),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    };

    let session_cfg = cfg.session();
    let trace_dir = cfg.trace_dir.as_deref();
    let summaries = (0..games)
        .into_par_iter()
        .map(|i| -> anyhow::Result<GameSummary> {
            let seed = base_seed.wrapping_add(i as u64);
            let (summary, run) = play_auto_game(session_cfg, seed, max_moves);
            save_trace(trace_dir, run, seed)?;
            pb.inc(1);
            Ok(summary)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    pb.finish_and_clear();

    if summaries.is_empty() {
        println!("No games played.");
        return Ok(());
    }
    let total_moves: u64 = summaries.iter().map(|s| s.moves as u64).sum();
    let mean_score = summaries.iter().map(|s| s.score as f64).sum::<f64>() / summaries.len() as f64;
    let top_score = summaries.iter().map(|s| s.score).max().unwrap_or(0);
    let wins = summaries.iter().filter(|s| s.won).count();
    let mut tiles: BTreeMap<Tile, usize> = BTreeMap::new();
    for s in &summaries {
        *tiles.entry(s.highest_tile).or_default() += 1;
    }
    let elapsed = start.elapsed().as_secs_f64().max(1e-6);

    println!(
        "Games: {} | moves: {} ({:.1}/sec) | mean score: {:.1} | best: {} | win rate: {:.1}%",
        summaries.len(),
        total_moves,
        total_moves as f64 / elapsed,
        mean_score,
        top_score,
        100.0 * wins as f64 / summaries.len() as f64
    );
    for (tile, count) in tiles.iter().rev() {
        println!("  highest {:>6}: {}", tile, count);
    }

    if let Some(path) = &cfg.best_score_file {
        let mut store = JsonFileStore::new(path);
        if let Err(e) = store.save(top_score) {
            warn!("could not save best score: {}", e);
        }
    }
    Ok(())
}

fn run_replay(file: &Path, verify: bool, all: bool) -> anyhow::Result<()> {
    let run = trace::parse_run_file(file).with_context(|| format!("reading {}", file.display()))?;
    let m = &run.meta;
    println!(
        "{}: {}x{} | steps: {} | score: {} | highest: {} | elapsed: {:.1}s{}",
        file.display(),
        run.size,
        run.size,
        m.steps,
        m.final_score,
        m.highest_tile,
        m.elapsed_s,
        m.label.as_deref().map(|l| format!(" | {}", l)).unwrap_or_default()
    );
    if all {
        println!("\n{}", run.states[0]);
        for (dir, grid) in run.moves.iter().zip(&run.states[1..]) {
            println!("{}\n{}", dir, grid);
        }
    } else if let Some(last) = run.final_grid() {
        println!("\n{}", last);
    }
    if verify {
        trace::verify_run(&run)?;
        println!("Verified {} steps.", m.steps);
    }
    Ok(())
}
