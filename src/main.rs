//! skill-atlas CLI: query the skill graph and chat with the learning assistant.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use skill_atlas::agent::chain::FallbackChain;
use skill_atlas::agent::classify::{SkillMatcher, classify};
use skill_atlas::chat::{ChatRequest, ChatResponse, ChatService};
use skill_atlas::config::AtlasConfig;
use skill_atlas::highlight::{ElementView, PathHighlighter, RetryPolicy, Settlement};
use skill_atlas::paths::AtlasPaths;
use skill_atlas::session::ChatSession;
use skill_atlas::skill::elements;
use skill_atlas::skill::{Skill, SkillGraph, find_learning_path};
use skill_atlas::track::TrackStore;
use skill_atlas::track::launch::{
    HttpTrackApi, LaunchOutcome, LearningLauncher, StoreTrackApi, TrackApi,
};
use skill_atlas::track::local::LocalTrackStore;

#[derive(Parser)]
#[command(name = "atlas", version, about = "Learning paths over a skill prerequisite graph")]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/skill-atlas/config.toml).
    #[arg(long, global = true, env = "ATLAS_CONFIG")]
    config: Option<PathBuf>,

    /// Root all state under this directory instead of the XDG locations.
    #[arg(long, global = true, env = "ATLAS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List skills in roadmap order.
    Skills {
        /// Only skills whose name contains this text.
        #[arg(long)]
        search: Option<String>,
    },

    /// Show one skill with its prerequisites and next skills.
    Skill {
        /// Skill id or name.
        name_or_id: String,
    },

    /// Find a learning path between two skills.
    Path {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Print the path as JSON with visualisation edges.
        #[arg(long)]
        json: bool,
    },

    /// Classify a chat message without answering it.
    Classify {
        message: String,
    },

    /// Print visualisation elements as JSON.
    Elements {
        /// Levelled layout instead of the flat one.
        #[arg(long)]
        progression: bool,
    },

    /// Ask the assistant a question.
    Ask {
        message: String,

        /// Send to a running atlasd (including any URL prefix) instead of answering locally.
        #[arg(long)]
        server: Option<String>,

        /// Save the returned route as a learning track.
        #[arg(long)]
        start_learning: bool,

        /// Auth token for the server; offline it is the local user id.
        #[arg(long, env = "ATLAS_TOKEN")]
        token: Option<String>,
    },

    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let paths = match &cli.data_dir {
        Some(dir) => AtlasPaths::rooted(dir),
        None => AtlasPaths::resolve()?,
    };
    let config_file = cli.config.clone().unwrap_or_else(|| paths.config_file());
    let config = AtlasConfig::resolve(&config_file)?;
    let load_graph = || SkillGraph::load(config.graph.catalog.as_deref());

    match cli.command {
        Commands::Skills { search } => {
            let graph = load_graph()?;
            let skills = match &search {
                Some(q) => graph.search(q),
                None => graph.all_skills(),
            };
            if skills.is_empty() {
                println!("No skills found.");
            } else {
                println!("Skills ({}):", skills.len());
                for skill in &skills {
                    println!("  {:>3}. {} / {}", skill.order_index, skill.name, skill.id);
                }
            }
        }

        Commands::Skill { name_or_id } => {
            let graph = Arc::new(load_graph()?);
            let skill = graph.resolve(&name_or_id)?;
            let service = ChatService::new(FallbackChain::new(Duration::ZERO), graph.clone());
            let details = service.skill_details(&skill.id)?;
            println!("{} / {}", details.name, details.id);
            println!("  {}", details.description);
            let names = |skills: &[Skill]| {
                skills.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", ")
            };
            println!(
                "  prerequisites ({}): {}",
                details.total_prerequisites,
                names(&details.prerequisites)
            );
            println!(
                "  next skills ({}): {}",
                details.total_next_skills,
                names(&details.next_skills)
            );
        }

        Commands::Path { from, to, json } => {
            let graph = load_graph()?;
            match find_learning_path(&graph, &from, &to, config.graph.max_hops)? {
                Some(path) if json => {
                    let out = serde_json::json!({
                        "path": path.skills,
                        "edges": path.edges(),
                        "strategy": path.strategy,
                    });
                    println!("{}", serde_json::to_string_pretty(&out).into_diagnostic()?);
                }
                Some(path) => {
                    println!(
                        "Learning path ({} steps, {:?}):",
                        path.skills.len().saturating_sub(1),
                        path.strategy
                    );
                    for (i, skill) in path.skills.iter().enumerate() {
                        println!("  {}. {}", i + 1, skill.name);
                    }
                }
                None => println!("No learning path from \"{from}\" to \"{to}\"."),
            }
        }

        Commands::Classify { message } => {
            let graph = load_graph()?;
            let matcher = SkillMatcher::new(&graph);
            let result = classify(&graph, &matcher, &message);
            println!("category: {}", result.category);
            if let Some(start) = &result.start {
                println!("start:    {}", start.name);
            }
            if let Some(target) = &result.target {
                println!("target:   {}", target.name);
            }
        }

        Commands::Elements { progression } => {
            let graph = load_graph()?;
            let json = if progression {
                serde_json::to_string_pretty(&elements::progression(&graph))
            } else {
                serde_json::to_string_pretty(&elements::flat(&graph))
            };
            println!("{}", json.into_diagnostic()?);
        }

        Commands::Ask {
            message,
            server,
            start_learning,
            token,
        } => {
            let history_file = paths.chat_history_file();
            let mut session = ChatSession::load(&history_file).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "discarding unreadable chat history");
                ChatSession::new()
            });
            let text = session.begin_send(&message)?;
            let user_id = token.clone().unwrap_or_else(|| "local".to_string());

            let graph = Arc::new(load_graph()?);
            let response = match &server {
                Some(base) => match ask_server(base, &text, token.as_deref()).await {
                    Ok(resp) => resp,
                    Err(e) => {
                        session.fail_send("Sorry, the server could not be reached.");
                        session.save(&history_file)?;
                        return Err(e);
                    }
                },
                None => {
                    let service = ChatService::from_config(&config, graph.clone())?;
                    service
                        .chat(&ChatRequest {
                            message: text,
                            user_id: Some(user_id.clone()),
                        })
                        .await
                }
            };

            let outcome = session.receive(&response);
            println!("{}", response.ai_response);

            if outcome.highlight {
                preview_highlight(&graph, &response).await;
            }

            if start_learning {
                let path = session
                    .current_path()
                    .map(|p| p.path.clone())
                    .unwrap_or_default();
                if !outcome.offer_start_learning || path.is_empty() {
                    println!("\nNo route to start learning from.");
                } else {
                    let prefix = config.server.url_prefix.clone();
                    let outcome = match &server {
                        Some(base) => {
                            let api = HttpTrackApi::new(base, token.clone())?;
                            launch(api, &prefix, &path).await
                        }
                        None => {
                            paths.ensure_dirs()?;
                            let store: Arc<dyn TrackStore> =
                                Arc::new(LocalTrackStore::open(&paths.tracks_dir())?);
                            let api = StoreTrackApi::new(store, &user_id, &config.tracks.secret);
                            launch(api, &prefix, &path).await
                        }
                    };
                    report_launch(outcome);
                }
            }

            session.save(&history_file)?;
        }

        Commands::Config => {
            println!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

async fn ask_server(base: &str, message: &str, token: Option<&str>) -> Result<ChatResponse> {
    let url = format!("{}/api/general/chat", base.trim_end_matches('/'));
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(180))
        .build()
        .into_diagnostic()?;
    let mut req = http.post(&url).json(&serde_json::json!({ "message": message }));
    if let Some(token) = token {
        req = req.bearer_auth(token);
    }
    let resp = req.send().await.into_diagnostic()?;
    if !resp.status().is_success() {
        miette::bail!("server answered {} for {url}", resp.status());
    }
    resp.json().await.into_diagnostic()
}

/// Show which roadmap elements the route would light up.
async fn preview_highlight(graph: &SkillGraph, response: &ChatResponse) {
    let view = ElementView::from_elements(&elements::flat(graph).elements);
    let policy = RetryPolicy {
        max_attempts: 1,
        step: Duration::ZERO,
    };
    let mut highlighter = PathHighlighter::new(view, policy);
    let report = highlighter.run_response(response).await;
    if report.settlement == Settlement::Highlighted {
        println!(
            "\nHighlighted {} skills and {} connections on the roadmap.",
            report.highlighted_nodes.len(),
            report.highlighted_edges.len()
        );
        if !report.skipped_nodes.is_empty() {
            let skipped: Vec<&str> = report.skipped_nodes.iter().map(|s| s.as_str()).collect();
            println!("Not on the roadmap: {}", skipped.join(", "));
        }
    }
}

async fn launch<A: TrackApi>(
    api: A,
    prefix: &str,
    path: &[Skill],
) -> LaunchOutcome {
    LearningLauncher::new(api, prefix).launch(path).await
}

fn report_launch(outcome: LaunchOutcome) {
    match outcome {
        LaunchOutcome::Navigate {
            url,
            notice,
            track_id,
        } => {
            if let Some(notice) = notice {
                println!("\n{notice}");
            }
            if let Some(id) = track_id {
                println!("\nLearning track saved: {id}");
            }
            println!("Open: {url}");
        }
        LaunchOutcome::AlreadyPending => println!("\nA learning track is already being saved."),
        LaunchOutcome::Invalid(e) => println!("\nCannot start learning: {e}"),
    }
}
