//! minimate-sync binary: utilities and explicit local/remote transfers from the command line.

use std::{fs, path::PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use minimate_sync::{
    config::AppConfig,
    dao::{
        game_store::{GameStore, local::LocalGameStore, remote},
        models::GameEntity,
    },
    dto::format_system_time,
    services::sync_service::SyncService,
    util::{
        course_id::derive_id,
        password::{self, PasswordStyle},
        profanity::contains_blocked_word,
        qr,
    },
};

#[derive(Parser)]
#[command(name = "minimate-sync")]
#[command(about = "Mini golf game store sync and client utilities")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the deterministic id of a course.
    CourseId {
        #[arg(long)]
        name: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },
    /// Suggest a password.
    Password {
        /// Pronounceable instead of fully random.
        #[arg(long)]
        memorable: bool,
        #[arg(long)]
        length: Option<usize>,
        /// Strong passwords only: leave symbols out.
        #[arg(long)]
        no_symbols: bool,
        /// Memorable passwords only: leave digits out.
        #[arg(long)]
        no_digits: bool,
    },
    /// Exit with status 1 when the text contains a blocked word.
    Screen { text: Vec<String> },
    /// Write a QR code for the text as a PBM image.
    Qr {
        text: String,
        #[arg(short, long, default_value = "qr.pbm")]
        output: PathBuf,
    },
    /// Copy local games to the remote store.
    Push { ids: Vec<String> },
    /// Copy remote games into the local store.
    Pull { ids: Vec<String> },
    /// Give the orphaned guest game to a signed-in user.
    ClaimGuest { user_id: String },
    /// Print a stored game.
    Show {
        id: String,
        /// Read from the remote store instead of the local one.
        #[arg(long)]
        remote: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    match args.command {
        Command::CourseId { name, lat, lon } => {
            println!("{}", derive_id(name.as_deref(), lat, lon));
        }
        Command::Password {
            memorable,
            length,
            no_symbols,
            no_digits,
        } => {
            let style = if memorable {
                PasswordStyle::Memorable {
                    length: length.unwrap_or(password::MEMORABLE_DEFAULT_LENGTH),
                    include_digits: !no_digits,
                }
            } else {
                PasswordStyle::Strong {
                    length: length.unwrap_or(password::STRONG_DEFAULT_LENGTH),
                    use_symbols: !no_symbols,
                }
            };
            println!("{}", password::generate(style));
        }
        Command::Screen { text } => {
            if contains_blocked_word(&text.join(" ")) {
                println!("blocked");
                std::process::exit(1);
            }
            println!("ok");
        }
        Command::Qr { text, output } => {
            let bitmap = qr::render(&text);
            if bitmap.is_placeholder() {
                bail!("text does not fit in a QR code");
            }
            fs::write(&output, bitmap.to_pbm())
                .with_context(|| format!("writing {}", output.display()))?;
            info!(path = %output.display(), size = bitmap.size(), "QR code written");
        }
        Command::Push { ids } => {
            let report = sync_service().await?.push(ids).await?;
            println!("pushed {}/{} games", report.transferred, report.requested);
        }
        Command::Pull { ids } => {
            let report = sync_service().await?.pull(ids).await?;
            println!("pulled {}/{} games", report.transferred, report.requested);
        }
        Command::ClaimGuest { user_id } => {
            let game = sync_service().await?.claim_guest_game(&user_id).await?;
            println!("claimed guest game {} for {}", game.id, user_id);
        }
        Command::Show { id, remote } => {
            let config = AppConfig::load();
            let store: Box<dyn GameStore> = if remote {
                Box::new(connect_remote(&config).await?)
            } else {
                Box::new(open_local(&config)?)
            };
            match store.fetch(id.clone()).await? {
                Some(game) => print_game(&game),
                None => bail!("game `{id}` not found"),
            }
        }
    }

    Ok(())
}

fn open_local(config: &AppConfig) -> anyhow::Result<LocalGameStore> {
    LocalGameStore::open(&config.local_db_path)
        .with_context(|| format!("opening {}", config.local_db_path.display()))
}

async fn connect_remote(config: &AppConfig) -> anyhow::Result<remote::RemoteGameStore> {
    remote::connect(config.remote_backend, config.delete_batch_limit)
        .await
        .with_context(|| format!("connecting the {} backend", config.remote_backend))
}

async fn sync_service() -> anyhow::Result<SyncService> {
    let config = AppConfig::load();
    let local = open_local(&config)?;
    let remote = connect_remote(&config).await?;
    Ok(SyncService::new(local, remote))
}

fn print_game(game: &GameEntity) {
    println!("{} (host {})", game.id, game.host_user_id);
    if let Some(location) = &game.location_name {
        println!("  location: {location}");
    }
    if let Some(course_id) = &game.course_id {
        println!("  course:   {course_id}");
    }
    println!("  started:  {}", format_system_time(game.started_at));
    println!(
        "  holes:    {}{}",
        game.number_of_holes,
        if game.completed { " (completed)" } else { "" }
    );
    for player in &game.players {
        println!("  {:<20} {:>4}", player.name, player.total_strokes());
    }
}

/// Configure tracing subscribers; `RUST_LOG` overrides the default `info` level.
fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
