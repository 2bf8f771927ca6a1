use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs;
use tracing_subscriber::EnvFilter;

use konspekt_core::{
    FsStore, HttpGateway, Pipeline, Provider, Reply, Settings, Transcript, Video, VideoStore,
    format_quiz_readable, format_timestamp,
};

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, Default, ValueEnum)]
enum CliProvider {
    #[default]
    Grok,
    Openai,
    Gemini,
    Local,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Grok => Provider::Grok,
            CliProvider::Openai => Provider::Openai,
            CliProvider::Gemini => Provider::Gemini,
            CliProvider::Local => Provider::Local,
        }
    }
}

#[derive(Parser)]
#[command(name = "konspekt")]
#[command(
    about = "Ask questions about videos, summarize them, and generate quizzes with AI"
)]
struct Cli {
    /// AI provider for generation
    #[arg(short, long, default_value = "grok")]
    provider: CliProvider,

    /// Store directory (defaults to the platform cache dir)
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Settings overrides as a JSON file
    #[arg(long)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a video from a transcript JSON file
    Ingest {
        /// Transcript JSON ({text, segments, language})
        transcript: PathBuf,

        /// Video title (defaults to the transcript file stem)
        #[arg(short, long)]
        title: Option<String>,

        /// Video id (defaults to a fresh UUID)
        #[arg(long)]
        id: Option<String>,

        /// Path of the original video file
        #[arg(long)]
        video_file: Option<PathBuf>,
    },

    /// Ask a question about a video
    Ask { video_id: String, query: String },

    /// Get or generate a video summary
    Summarize {
        video_id: String,

        /// Force re-generation even if a cached summary exists
        #[arg(short, long)]
        force: bool,
    },

    /// Get or generate a quiz for a video
    Quiz {
        video_id: String,

        /// Force re-generation even if a cached quiz exists
        #[arg(short, long)]
        force: bool,
    },

    /// Find the position in a video matching a query
    Goto { video_id: String, query: String },

    /// List registered videos
    List,
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Print a failed reply and exit non-zero.
fn fail(error: impl std::fmt::Debug, message: &str) -> ! {
    eprintln!(
        "{} {} {}",
        style("✗").red().bold(),
        style(format!("{error:?}")).red(),
        message
    );
    std::process::exit(1);
}

async fn ingest(
    store: &dyn VideoStore,
    transcript_path: PathBuf,
    title: Option<String>,
    id: Option<String>,
    video_file: Option<PathBuf>,
) -> Result<()> {
    let content = fs::read_to_string(&transcript_path).await?;
    let transcript: Transcript = serde_json::from_str(&content)?;

    let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let title = title.unwrap_or_else(|| {
        transcript_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.clone())
    });
    let file_size = match &video_file {
        Some(path) => fs::metadata(path).await.map(|m| m.len()).unwrap_or(0),
        None => 0,
    };
    let file_path = video_file
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();

    let video = Video {
        id: id.clone(),
        title: title.clone(),
        file_path,
        duration_secs: transcript.duration_secs(),
        file_size,
        created_at: Utc::now(),
    };
    store.put_video(video).await?;
    store.put_transcript(&id, transcript).await?;

    println!(
        "{} Ingested {} {}",
        style("✓").green().bold(),
        style(&title).cyan(),
        style(format!("(id: {id})")).dim()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let provider: Provider = cli.provider.into();

    // Validate API key early
    if let Err(e) = provider.validate_api_key() {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    let store_root = cli.store_dir.unwrap_or_else(FsStore::default_root);
    let store = Arc::new(FsStore::new(store_root));

    let settings = match &cli.settings {
        Some(path) => serde_json::from_str(&fs::read_to_string(path).await?)?,
        None => Settings::default(),
    };

    println!(
        "\n{}  {}\n",
        style("konspekt").cyan().bold(),
        style("Video Study Assistant").dim()
    );

    match cli.command {
        Command::Ingest {
            transcript,
            title,
            id,
            video_file,
        } => {
            ingest(store.as_ref(), transcript, title, id, video_file).await?;
            return Ok(());
        }
        Command::List => {
            let videos = store.list_videos().await?;
            if videos.is_empty() {
                println!("{}", style("No videos ingested yet.").dim());
                return Ok(());
            }
            for video in videos {
                println!(
                    "{}  {}  {}",
                    style(&video.id).cyan(),
                    video.title,
                    style(format!("({})", format_timestamp(video.duration_secs))).dim()
                );
            }
            return Ok(());
        }
        command => {
            let gateway = Arc::new(HttpGateway::new(provider.clone()));
            let pipeline = Pipeline::new(store, gateway, settings);

            match command {
                Command::Ask { video_id, query } => {
                    let spinner = create_spinner("Thinking...");
                    let reply = pipeline.qa.answer_question(&video_id, &query).await;
                    match reply {
                        Reply::Success {
                            payload,
                            regenerated,
                            ..
                        } => {
                            spinner.finish_with_message(format!(
                                "{} Answered{}",
                                style("✓").green().bold(),
                                if regenerated {
                                    String::new()
                                } else {
                                    format!(" {}", style("(cached)").dim())
                                }
                            ));
                            println!("\n{}", payload.answer);
                        }
                        Reply::Failure { error, message, .. } => {
                            spinner.finish_and_clear();
                            fail(error, &message);
                        }
                    }
                }
                Command::Summarize { video_id, force } => {
                    let spinner = create_spinner(&format!(
                        "Summarizing with {}...",
                        provider.name()
                    ));
                    let reply = pipeline.summary.get_summary(&video_id, force).await;
                    match reply {
                        Reply::Success {
                            payload,
                            regenerated,
                            ..
                        } => {
                            spinner.finish_with_message(format!(
                                "{} Summary ready{}",
                                style("✓").green().bold(),
                                if regenerated {
                                    String::new()
                                } else {
                                    format!(" {}", style("(cached)").dim())
                                }
                            ));
                            println!("\n{}", payload.summary);
                        }
                        Reply::Failure { error, message, .. } => {
                            spinner.finish_and_clear();
                            fail(error, &message);
                        }
                    }
                }
                Command::Quiz { video_id, force } => {
                    let spinner = create_spinner(&format!(
                        "Generating quiz with {}...",
                        provider.name()
                    ));
                    let reply = pipeline.quiz.get_quiz(&video_id, force).await;
                    match reply {
                        Reply::Success { payload, .. } => {
                            spinner.finish_with_message(format!(
                                "{} Quiz ready ({} questions)",
                                style("✓").green().bold(),
                                payload.questions.len()
                            ));
                            println!("{}", style("─".repeat(60)).dim());
                            println!("{}", format_quiz_readable(&payload.questions));
                        }
                        Reply::Failure { error, message, .. } => {
                            spinner.finish_and_clear();
                            fail(error, &message);
                        }
                    }
                }
                Command::Goto { video_id, query } => {
                    let spinner = create_spinner("Locating...");
                    let reply = pipeline.navigation.navigate(&video_id, &query).await;
                    match reply {
                        Reply::Success { payload, .. } => {
                            spinner.finish_with_message(format!(
                                "{} {}",
                                style("✓").green().bold(),
                                style(&payload.point.timestamp).yellow()
                            ));
                            println!("\n{}", payload.point.reason);
                        }
                        Reply::Failure { error, message, .. } => {
                            spinner.finish_and_clear();
                            fail(error, &message);
                        }
                    }
                }
                Command::Ingest { .. } | Command::List => unreachable!(),
            }
        }
    }

    Ok(())
}
