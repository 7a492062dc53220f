use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use docmodel::prelude::*;
use docmodel_playground::{
    Course, PlaygroundConfig,
    logging::{LogFormat, init_logging},
    scenario::{self, CourseListing},
};

#[derive(Debug, Parser)]
#[command(name = "docmodel-playground", version, about = "Create, query, update and remove courses")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store endpoint, e.g. `mongodb://localhost/playground` or `memory://playground`.
    #[arg(long, env = "DOCMODEL_URI", global = true)]
    uri: Option<String>,

    #[arg(long, env = "DOCMODEL_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a course.
    Create(CreateArgs),
    /// List courses, sorted by name.
    List(ListArgs),
    /// Show one course.
    Show { id: String },
    /// Load a course, set its author and publish it, revalidating on save.
    Publish {
        id: String,
        #[arg(long, default_value = "Another author")]
        author: String,
    },
    /// Publish every unpublished course without validation.
    PublishAll,
    /// Set a course's author, publish it and print the result.
    Reassign {
        id: String,
        #[arg(long)]
        author: String,
    },
    /// Delete a course and every unpublished course.
    Remove { id: String },
    /// Run every operation in turn.
    Demo,
}

#[derive(Debug, Args)]
struct CreateArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    category: String,
    #[arg(long)]
    author: Option<String>,
    #[arg(long = "tag")]
    tags: Vec<String>,
    #[arg(long)]
    published: bool,
    #[arg(long)]
    price: Option<f64>,
}

#[derive(Debug, Args)]
struct ListArgs {
    #[arg(long)]
    author: Option<String>,
    #[arg(long)]
    published: Option<bool>,
    #[arg(long, default_value_t = 1)]
    page: usize,
    #[arg(long, default_value_t = 10)]
    per_page: usize,
    /// Only show names and tags.
    #[arg(long)]
    summary: bool,
}

impl From<CreateArgs> for Course {
    fn from(args: CreateArgs) -> Self {
        Course {
            id: None,
            name: args.name,
            category: args.category,
            author: args.author,
            tags: args.tags,
            date: None,
            is_published: args.published,
            price: args.price,
        }
    }
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(store: &DynDocumentStore, command: Command) -> Result<()> {
    match command {
        Command::Create(args) => print(&scenario::create_course(store, args.into()).await?),
        Command::List(args) => {
            let listing = CourseListing {
                author: args.author,
                published: args.published,
                page: PaginationParams::new(args.page, args.per_page),
                summary: args.summary,
            };
            print(&scenario::list_courses(store, &listing).await?)
        },
        Command::Show { id } => print(&scenario::show_course(store, &id).await?),
        Command::Publish { id, author } => print(&scenario::publish_course(store, &id, &author).await?),
        Command::PublishAll => print(&scenario::publish_all(store).await?),
        Command::Reassign { id, author } => print(&scenario::reassign_course(store, &id, &author).await?),
        Command::Remove { id } => print(&scenario::remove_course(store, &id).await?),
        Command::Demo => print(&scenario::demo(store).await?),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PlaygroundConfig::from_toml_file(path)?,
        None => PlaygroundConfig::default(),
    };
    if let Some(uri) = cli.uri {
        config.uri = uri;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    init_logging(config.logging.format, &config.logging.level)?;

    let store = docmodel::connect_with(&config.uri, config.connect_options())
        .await
        .with_context(|| "Could not connect to the document store")?;

    let result = run(&store, cli.command.unwrap_or(Command::Demo)).await;

    store.shutdown().await?;

    result
}
