use std::io::Write;

use clap::{Parser, Subcommand};
use connect_four_client::{
    init_logging,
    view::{render_history, render_session, validate_column, Command},
    Board, ClientConfig, Environment, GameId, GameSession, HttpApi,
};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(author, version, about = "Play Connect Four against a game server", long_about = None)]
struct Cli {
    /// Deployment whose default URLs are used.
    #[arg(long, env = "C4_ENV", default_value_t = Environment::Development)]
    env: Environment,
    #[arg(long, env = "C4_API_URL")]
    api_url: Option<String>,
    #[arg(long, env = "C4_SOCKET_URL")]
    socket_url: Option<String>,
    /// Do not follow the push-update channel.
    #[arg(long)]
    no_live: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a game and play it.
    New,
    /// Continue an existing game.
    Play { id: u64 },
    /// Print a game once and exit.
    Show { id: u64 },
    /// List every game on the server.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = ClientConfig::for_environment(cli.env);
    if let Some(url) = &cli.api_url {
        config = config.with_api_base_url(url)?;
    }
    if let Some(url) = &cli.socket_url {
        config = config.with_socket_url(url)?;
    }
    let mut session = GameSession::from_config(config)?;
    let live = !cli.no_live;

    match cli.command {
        Commands::New => {
            if session.create_game().await.is_none() {
                print!("{}", render_session(&session.state(), None));
                return Ok(());
            }
            if live {
                session.subscribe().await;
            }
            play(&mut session, live).await?;
        }
        Commands::Play { id } => {
            if live {
                session.open(GameId(id)).await;
            } else {
                session.fetch_game(GameId(id)).await;
            }
            play(&mut session, live).await?;
        }
        Commands::Show { id } => {
            session.fetch_game(GameId(id)).await;
            print!("{}", render_session(&session.state(), None));
        }
        Commands::List => {
            let games = session.fetch_games().await;
            match session.error() {
                Some(error) => println!("Error: {}", error),
                None => print!("{}", render_history(&games)),
            }
        }
    }

    session.close().await;
    Ok(())
}

/// Redraw, highlighting the piece that appeared since the last redraw.
fn redraw(session: &GameSession<HttpApi>, previous: &mut Option<Board>) {
    let state = session.state();
    let board = state.game.as_ref().map(|g| g.state.board.clone());
    let highlight = match (&board, previous.as_ref()) {
        (Some(now), Some(before)) => now.last_drop(before),
        _ => None,
    };
    println!();
    print!("{}", render_session(&state, highlight));
    print!("Column (0-6), [n]ew, [r]efresh, [l]ist, [q]uit: ");
    let _ = std::io::stdout().flush();
    *previous = board;
}

async fn play(session: &mut GameSession<HttpApi>, live: bool) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut previous = None;
    redraw(session, &mut previous);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match Command::parse(&line) {
                    Some(Command::Quit) => break,
                    Some(Command::Drop(column)) => match validate_column(&session.state(), column) {
                        Ok(column) => {
                            session.clear_error();
                            session.make_move(column).await;
                        }
                        Err(reason) => println!("{}", reason),
                    },
                    Some(Command::NewGame) => {
                        if session.create_game().await.is_some() && live {
                            session.subscribe().await;
                        }
                    }
                    Some(Command::Refresh) => {
                        if let Some(id) = session.game_id() {
                            session.fetch_game(id).await;
                        }
                    }
                    Some(Command::List) => {
                        let games = session.fetch_games().await;
                        print!("{}", render_history(&games));
                    }
                    None => println!("Unknown command: {}", line.trim()),
                }
                redraw(session, &mut previous);
            }
            update = session.next_update(), if session.is_subscribed() => {
                if update.is_some() {
                    redraw(session, &mut previous);
                }
            }
        }
    }
    Ok(())
}
