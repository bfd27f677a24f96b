use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use outline_mcp_core::client::OutlineClient;
use outline_mcp_core::config::{default_config_path, load_config, resolve_client_config};
use outline_mcp_core::error::OutlineError;
use outline_mcp_core::models::{
    CreateCollectionRequest, CreateDocumentRequest, SearchDocumentsRequest, UpdateDocumentRequest,
};
use outline_mcp_core::server::serve;
use outline_mcp_core::transport::CancelToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "outline_mcp=info,outline_mcp_core=info";
const VERBOSE_LOG_FILTER: &str = "outline_mcp=debug,outline_mcp_core=debug";

#[derive(Debug, Parser)]
#[command(
    name = "outline-mcp",
    version,
    about = "Outline wiki client and stdio tool server"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Enable debug logging on stderr")]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(name = "list-collections")]
    ListCollections,
    #[command(name = "create-collection")]
    CreateCollection(CreateCollectionArgs),
    Search(SearchArgs),
    Get(GetArgs),
    Create(CreateArgs),
    Update(UpdateArgs),
    Delete(DeleteArgs),
    Revisions(RevisionsArgs),
    Revision(RevisionArgs),
    Restore(RestoreArgs),
    #[command(about = "Resolve configuration and verify connectivity")]
    Check,
    #[command(about = "Serve the tool catalog as JSON-RPC over stdin/stdout")]
    Serve,
}

#[derive(Debug, Args)]
struct CreateCollectionArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long, help = "Emoji icon")]
    icon: Option<String>,
    #[arg(long, help = "Hex color such as #4E5C6E")]
    color: Option<String>,
    #[arg(long, help = "read or read_write")]
    permission: Option<String>,
}

#[derive(Debug, Args)]
struct SearchArgs {
    #[arg(long)]
    query: String,
    #[arg(long)]
    collection_id: Option<String>,
    #[arg(long, help = "Maximum results (clamped to 1..=100)")]
    limit: Option<i64>,
    #[arg(long)]
    include_archived: bool,
}

#[derive(Debug, Args)]
struct GetArgs {
    #[arg(long)]
    id: String,
}

#[derive(Debug, Args)]
struct CreateArgs {
    #[arg(long)]
    title: String,
    #[arg(long, help = "Markdown content")]
    text: String,
    #[arg(long)]
    collection_id: String,
    #[arg(long)]
    parent_id: Option<String>,
    #[arg(long)]
    icon: Option<String>,
    #[arg(long)]
    color: Option<String>,
    #[arg(long, help = "Leave the document unpublished")]
    draft: bool,
}

#[derive(Debug, Args)]
struct UpdateArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    text: Option<String>,
    #[arg(long, help = "Append text instead of replacing it")]
    append: bool,
}

#[derive(Debug, Args)]
struct DeleteArgs {
    #[arg(long)]
    id: String,
    #[arg(long, help = "Delete permanently instead of moving to trash")]
    permanent: bool,
}

#[derive(Debug, Args)]
struct RevisionsArgs {
    #[arg(long)]
    document_id: String,
}

#[derive(Debug, Args)]
struct RevisionArgs {
    #[arg(long)]
    id: String,
}

#[derive(Debug, Args)]
struct RestoreArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    revision_id: String,
    #[arg(long)]
    collection_id: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();
    init_tracing(cli.verbose);

    let Some(command) = cli.command else {
        let mut command = Cli::command();
        command.print_help()?;
        println!();
        return Ok(());
    };

    let client = build_client(cli.config)?;
    let cancel = CancelToken::new();
    match command {
        Commands::ListCollections => run_list_collections(&client, &cancel),
        Commands::CreateCollection(args) => run_create_collection(&client, args, &cancel),
        Commands::Search(args) => run_search(&client, args, &cancel),
        Commands::Get(args) => run_get(&client, args, &cancel),
        Commands::Create(args) => run_create(&client, args, &cancel),
        Commands::Update(args) => run_update(&client, args, &cancel),
        Commands::Delete(args) => run_delete(&client, args, &cancel),
        Commands::Revisions(args) => run_revisions(&client, args, &cancel),
        Commands::Revision(args) => run_revision(&client, args, &cancel),
        Commands::Restore(args) => run_restore(&client, args, &cancel),
        Commands::Check => run_check(&client, &cancel),
        Commands::Serve => {
            let stdin = io::stdin();
            serve(&client, stdin.lock(), io::stdout().lock())
        }
    }
}

/// Logs go to stderr; stdout carries command output and protocol frames.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn build_client(config_path: Option<PathBuf>) -> Result<OutlineClient> {
    let config_path = config_path.unwrap_or_else(default_config_path);
    let config = load_config(&config_path)?;
    let resolved = resolve_client_config(&config)?;
    tracing::debug!(
        base_url = %resolved.base_url,
        timeout_ms = resolved.timeout.as_millis() as u64,
        "resolved client configuration"
    );
    OutlineClient::new(resolved).context("failed to construct Outline client")
}

/// Print the hint line for a client failure and lift it into `anyhow`.
fn report(error: OutlineError) -> anyhow::Error {
    if let Some(fields) = error.field_errors() {
        for (field, messages) in fields {
            for message in messages {
                eprintln!("  - {field}: {message}");
            }
        }
    }
    if let Some(retry_after) = error.retry_after() {
        eprintln!("retry_after: {retry_after}s");
    }
    if let Some(hint) = error.hint() {
        eprintln!("hint: {hint}");
    }
    anyhow::Error::new(error)
}

fn run_list_collections(client: &OutlineClient, cancel: &CancelToken) -> Result<()> {
    let collections = client.list_collections(cancel).map_err(report)?;
    println!("collections: {}", collections.len());
    for collection in collections {
        println!("  - {} | {}", collection.id, collection.name);
    }
    Ok(())
}

fn run_create_collection(
    client: &OutlineClient,
    args: CreateCollectionArgs,
    cancel: &CancelToken,
) -> Result<()> {
    let request = CreateCollectionRequest {
        name: args.name,
        description: args.description,
        icon: args.icon,
        color: args.color,
        permission: args.permission,
        sharing: None,
    };
    let collection = client.create_collection(&request, cancel).map_err(report)?;
    println!("created collection");
    println!("id: {}", collection.id);
    println!("name: {}", collection.name);
    println!(
        "permission: {}",
        collection.permission.as_deref().unwrap_or("<none>")
    );
    println!("url: {}/collection/{}", client.base_url(), collection.id);
    Ok(())
}

fn run_search(client: &OutlineClient, args: SearchArgs, cancel: &CancelToken) -> Result<()> {
    let mut request = SearchDocumentsRequest::new(args.query);
    request.collection_id = args.collection_id;
    request.include_archived = Some(args.include_archived);
    if args.limit.is_some() {
        request.limit = args.limit;
    }
    let results = client.search_documents(request, cancel).map_err(report)?;
    println!("results: {}", results.len());
    for result in results {
        println!(
            "  - {:.3} | {} | {}",
            result.ranking, result.document.id, result.document.title
        );
    }
    Ok(())
}

fn run_get(client: &OutlineClient, args: GetArgs, cancel: &CancelToken) -> Result<()> {
    let document = client.get_document(&args.id, cancel).map_err(report)?;
    println!("id: {}", document.id);
    println!("title: {}", document.title);
    println!(
        "collection_id: {}",
        document.collection_id.as_deref().unwrap_or("<none>")
    );
    println!("revision: {}", document.revision);
    println!(
        "updated_at: {}",
        document
            .updated_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "<unknown>".to_string())
    );
    println!();
    println!("{}", document.text);
    Ok(())
}

fn run_create(client: &OutlineClient, args: CreateArgs, cancel: &CancelToken) -> Result<()> {
    let request = CreateDocumentRequest {
        title: args.title,
        text: args.text,
        collection_id: args.collection_id,
        parent_document_id: args.parent_id,
        publish: Some(!args.draft),
        icon: args.icon,
        color: args.color,
        ..CreateDocumentRequest::default()
    };
    let document = client.create_document(&request, cancel).map_err(report)?;
    println!("created document");
    println!("id: {}", document.id);
    println!("title: {}", document.title);
    println!("published: {}", document.published_at.is_some());
    if let Some(url_id) = &document.url_id {
        println!("url: {}/doc/{url_id}", client.base_url());
    }
    Ok(())
}

fn run_update(client: &OutlineClient, args: UpdateArgs, cancel: &CancelToken) -> Result<()> {
    let request = UpdateDocumentRequest {
        title: args.title,
        text: args.text,
        append: args.append.then_some(true),
        ..UpdateDocumentRequest::default()
    };
    let document = client
        .update_document(&args.id, &request, cancel)
        .map_err(report)?;
    println!("updated document");
    println!("id: {}", document.id);
    println!("title: {}", document.title);
    println!("revision: {}", document.revision);
    Ok(())
}

fn run_delete(client: &OutlineClient, args: DeleteArgs, cancel: &CancelToken) -> Result<()> {
    client
        .try_delete_document(&args.id, args.permanent, cancel)
        .map_err(report)?;
    println!("deleted document");
    println!("id: {}", args.id);
    println!("permanent: {}", args.permanent);
    Ok(())
}

fn run_revisions(client: &OutlineClient, args: RevisionsArgs, cancel: &CancelToken) -> Result<()> {
    let revisions = client
        .list_revisions(&args.document_id, cancel)
        .map_err(report)?;
    println!("document_id: {}", args.document_id);
    println!("revisions: {}", revisions.len());
    for revision in revisions {
        let created_at = revision
            .created_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "<unknown>".to_string());
        let author = revision
            .created_by
            .as_ref()
            .map(|user| user.name.as_str())
            .unwrap_or("<unknown>");
        println!("  - {} | {created_at} | {author}", revision.id);
    }
    Ok(())
}

fn run_revision(client: &OutlineClient, args: RevisionArgs, cancel: &CancelToken) -> Result<()> {
    let revision = client.get_revision(&args.id, cancel).map_err(report)?;
    println!("id: {}", revision.id);
    println!("document_id: {}", revision.document_id);
    println!("title: {}", revision.title.as_deref().unwrap_or("<none>"));
    println!();
    println!("{}", revision.text.as_deref().unwrap_or_default());
    Ok(())
}

fn run_restore(client: &OutlineClient, args: RestoreArgs, cancel: &CancelToken) -> Result<()> {
    let document = client
        .restore_document(
            &args.id,
            &args.revision_id,
            args.collection_id.as_deref(),
            cancel,
        )
        .map_err(report)?;
    println!("restored document");
    println!("id: {}", document.id);
    println!("revision_id: {}", args.revision_id);
    println!("revision: {}", document.revision);
    Ok(())
}

fn run_check(client: &OutlineClient, cancel: &CancelToken) -> Result<()> {
    let collections = client.list_collections(cancel).map_err(report)?;
    println!("outline check");
    println!("base_url: {}", client.base_url());
    println!("credentials: ok");
    println!("collections: {}", collections.len());
    Ok(())
}
