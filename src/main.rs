use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use env_logger::Env;
use grid_2048::config::Config;
use grid_2048::engine::{self as GameEngine, Direction, Grid};
use grid_2048::session::Session;
use grid_2048::trace::{self, Recorder, Run};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};

#[derive(Parser, Debug)]
#[command(name = "grid-2048", about = "Play, replay and soak-test 2048 in the terminal")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long, value_name = "FILE", value_parser = clap::value_parser!(PathBuf))]
    config: Option<PathBuf>,

    /// Seed for tile spawns (overrides the config file)
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Interactive game: type a direction and press enter
    Play {
        /// Write the most recent game to this trace file
        #[arg(long, value_name = "FILE")]
        record: Option<PathBuf>,
    },
    /// Check a recorded game against the engine
    Replay {
        file: PathBuf,
        /// Print every board of the game
        #[arg(long)]
        show: bool,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Play many games with uniformly random directions
    Soak {
        #[arg(long)]
        games: Option<u32>,
        /// Stop each game after this many accepted moves
        #[arg(long)]
        max_moves: Option<u64>,
        /// Write each game as a trace into this directory
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(long)]
        quiet: bool,
    },
}

#[derive(serde::Serialize)]
struct ReplaySummary<'a> {
    file: &'a Path,
    meta: &'a trace::Meta,
    replayed_score: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_toml(path)?,
        None => Config::default(),
    };
    let seed = args.seed.or(config.seed).unwrap_or_else(|| rand::thread_rng().gen());

    match args.cmd.unwrap_or(Cmd::Play { record: None }) {
        Cmd::Play { record } => run_play(&config, seed, record.as_deref()),
        Cmd::Replay { file, show, json } => run_replay(&file, show, json),
        Cmd::Soak { games, max_moves, out_dir, quiet } => {
            let games = games.unwrap_or(config.soak.games);
            let max_moves = max_moves.or(config.soak.max_moves);
            let out_dir = out_dir.or(config.trace.out_dir.clone());
            run_soak(seed, games, max_moves, out_dir.as_deref(), quiet)
        }
    }
}

const HELP: &str = "\
Moves: w/a/s/d, h/j/k/l, or up/down/left/right
Other: r = restart, q = quit";

fn run_play(config: &Config, seed: u64, record: Option<&Path>) -> anyhow::Result<()> {
    let mut game = Session::new(StdRng::seed_from_u64(seed));
    let mut recorder = Recorder::new(game.grid(), Some(seed));
    info!("new game, seed {seed}");

    if config.play.show_help {
        println!("{HELP}");
    }
    print_status(&game)?;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let cmd = line.trim();
        match cmd {
            "" => continue,
            "q" | "quit" => break,
            "r" | "restart" => {
                save_recording(record, recorder)?;
                game.restart();
                // restarts draw from the same stream, so the seed no longer reproduces the deal
                recorder = Recorder::new(game.grid(), None);
                print_status(&game)?;
                continue;
            }
            "?" | "help" => {
                println!("{HELP}");
                continue;
            }
            _ => {}
        }

        let direction: Direction = match cmd.parse() {
            Ok(d) => d,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        let outcome = game.play(direction);
        if outcome.moved {
            recorder.record(direction, outcome.score_gained, game.grid());
            print_status(&game)?;
        }
        if outcome.ended() {
            println!("\n*** Game over! Final score {} (type r to restart, q to quit) ***", game.score());
        }
    }

    save_recording(record, recorder)
}

fn print_status<R: Rng>(game: &Session<R>) -> io::Result<()> {
    println!("\n{}", game.grid());
    println!("Score: {}   High Score: {}", game.score(), game.high_score());
    io::stdout().flush()
}

fn save_recording(path: Option<&Path>, recorder: Recorder) -> anyhow::Result<()> {
    let Some(path) = path else { return Ok(()) };
    if recorder.steps() == 0 {
        return Ok(());
    }
    let run = recorder.finish(Some("grid-2048 play".to_string()));
    trace::write_run_to_path(path, &run).with_context(|| format!("writing {}", path.display()))?;
    info!("recorded {} moves to {}", run.meta.steps, path.display());
    Ok(())
}

fn run_replay(file: &Path, show: bool, json: bool) -> anyhow::Result<()> {
    let run = trace::parse_run_file(file).with_context(|| format!("reading {}", file.display()))?;
    if show {
        for (grid, dir) in run.states.iter().zip(run.moves.iter().map(Some).chain([None])) {
            print!("{grid}");
            match dir {
                Some(d) => println!("  -> {d}\n"),
                None => println!(),
            }
        }
    }
    let replayed_score = match run.verify() {
        Ok(s) => s,
        Err(e) => bail!("{} failed verification: {e}", file.display()),
    };

    if json {
        let summary = ReplaySummary { file, meta: &run.meta, replayed_score };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "{}: {} moves, score {}, highest tile {}, seed {}",
            file.display(),
            run.meta.steps,
            replayed_score,
            run.meta.highest_tile,
            run.meta.seed.map(|s| s.to_string()).unwrap_or_else(|| "unknown".to_string()),
        );
    }
    Ok(())
}

fn run_soak(seed: u64, games: u32, max_moves: Option<u64>, out_dir: Option<&Path>, quiet: bool) -> anyhow::Result<()> {
    if games == 0 {
        bail!("--games must be at least 1");
    }
    if let Some(dir) = out_dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(games as u64);
        pb.set_style(
            ProgressStyle::with_template("{spinner} {elapsed_precise} [{bar:30}] {pos}/{len} games | {msg}")?
                .progress_chars("=> "),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    };

    let mut total_score = 0u64;
    let mut best_tile = 0u32;
    for i in 0..games {
        let game_seed = seed.wrapping_add(i as u64);
        let run = soak_game(game_seed, max_moves);
        total_score += run.meta.final_score;
        best_tile = best_tile.max(run.meta.highest_tile);

        if let Some(dir) = out_dir {
            let path = dir.join(format!("game_{game_seed}.g2run"));
            trace::write_run_to_path(&path, &run).with_context(|| format!("writing {}", path.display()))?;
        }
        pb.inc(1);
        pb.set_message(format!("mean score {:.1} | best tile {best_tile}", total_score as f64 / (i + 1) as f64));
    }
    pb.finish_and_clear();

    println!(
        "Games: {games} | mean score: {:.1} | best tile: {best_tile}",
        total_score as f64 / games as f64
    );
    Ok(())
}

fn soak_game(seed: u64, max_moves: Option<u64>) -> Run {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut grid: Grid = GameEngine::new_game(&mut rng);
    let mut recorder = Recorder::new(grid, Some(seed));
    while !grid.is_terminal() {
        if max_moves.is_some_and(|limit| recorder.steps() as u64 >= limit) {
            break;
        }
        let direction = Direction::ALL[rng.gen_range(0..Direction::ALL.len())];
        let result = grid.make_move(direction, &mut rng);
        if result.moved {
            recorder.record(direction, result.score_gained, result.grid);
            grid = result.grid;
        }
    }
    recorder.finish(Some("grid-2048 soak".to_string()))
}
