use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use sweeper::{Agent, Game, GameState, Reveal, oracle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Autonomous minesweeper bot: plays proven-safe cells first, flags proven
/// mines, and guesses only when nothing can be deduced.
#[derive(Parser, Debug)]
#[command(name = "sweeper", version)]
struct Args {
    /// Number of rows.
    #[arg(long, default_value_t = 8)]
    height: usize,
    /// Number of columns.
    #[arg(long, default_value_t = 8)]
    width: usize,
    /// Number of mines on the board.
    #[arg(long, default_value_t = 8)]
    mines: usize,
    /// Seed for mine placement and guesses. Random when omitted.
    #[arg(long)]
    seed: Option<u64>,
    /// Pause between moves, to make the game watchable.
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,
    /// Cross-check every deduction with the SAT oracle.
    #[arg(long)]
    audit: bool,
    /// Print a JSON report instead of the board.
    #[arg(long)]
    json: bool,
    /// Only log warnings and errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Default, serde::Serialize)]
struct GameReport {
    height: usize,
    width: usize,
    mines: usize,
    seed: Option<u64>,
    result: Option<GameState>,
    safe_moves: usize,
    random_moves: usize,
    flags: usize,
    known_safes: usize,
    known_mines: usize,
    open_statements: usize,
    /// Forced cells the agent had not deduced at the last audit.
    missed_deductions: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let report = play(&args)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n--- Game Over ---");
        match report.result {
            Some(GameState::Won) => println!("Result: The bot won!"),
            Some(GameState::Lost) => println!("Result: The bot hit a mine and lost."),
            _ => println!("Result: The game ended unexpectedly."),
        }
        println!(
            "Moves: {} safe, {} guessed, {} flags",
            report.safe_moves, report.random_moves, report.flags
        );
    }
    Ok(())
}

fn play(args: &Args) -> anyhow::Result<GameReport> {
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut game = Game::new(args.height, args.width, args.mines, &mut rng)
        .context("invalid board configuration")?;
    let mut agent = Agent::with_bounds(game.bounds());
    let show_board = !args.json;

    let mut report = GameReport {
        height: args.height,
        width: args.width,
        mines: args.mines,
        seed: args.seed,
        ..GameReport::default()
    };

    info!(
        height = args.height,
        width = args.width,
        mines = args.mines,
        "starting game"
    );

    while game.state() == GameState::Playing {
        let point = if let Some(point) = agent.next_safe_move() {
            info!(%point, "playing safe cell");
            report.safe_moves += 1;
            point
        } else if let Some(mine) = agent.next_mine_flagging_move() {
            info!(point = %mine, "flagging mine");
            game.flag(mine)?;
            agent.record_flag(mine)?;
            report.flags += 1;
            continue;
        } else if let Some(point) = agent.next_random_move(&mut rng) {
            info!(%point, "no safe move known, guessing");
            report.random_moves += 1;
            point
        } else {
            warn!("no moves left for the bot to make");
            break;
        };

        match game.reveal(point)? {
            Reveal::Mine => {
                info!(%point, "hit a mine");
            }
            Reveal::Safe(count) => {
                agent
                    .record_observation(point, count as usize)
                    .with_context(|| format!("observing {point} with {count} adjacent mines"))?;
            }
        }

        if args.audit {
            let audit = oracle::audit(&agent, &game).context("deduction audit failed")?;
            report.missed_deductions = Some(audit.missed.len());
        }

        if show_board {
            print!("{game}");
            println!();
        }

        if args.delay_ms > 0 {
            thread::sleep(Duration::from_millis(args.delay_ms));
        }
    }

    let knowledge = agent.knowledge();
    report.result = Some(game.state());
    report.known_safes = knowledge.safes().len();
    report.known_mines = knowledge.mines().len();
    report.open_statements = knowledge.statements().len();
    Ok(report)
}
