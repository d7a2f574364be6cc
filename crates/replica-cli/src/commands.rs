use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::json;

use replica_store::{EngineKind, EventFilter, Origin, ReplicaStore, StoreConfig, StoreEvent};
use replica_types::{Body, Change, Node, Resolution};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = store_config(&cli)?;
    let format = cli.format;

    match cli.command {
        Command::Clean => return cmd_clean(&config).await,
        Command::Config => return cmd_config(&config),
        command => {
            let store = ReplicaStore::open(config.clone())
                .await
                .with_context(|| format!("opening store {:?}", config.name))?;
            let result = run_on_store(&store, command, format).await;
            store.close().await?;
            result
        }
    }
}

/// Configuration file first, then command-line overrides.
fn store_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => StoreConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    if let Some(name) = &cli.name {
        config.name = name.clone();
    }
    if cli.memory {
        config.engine = EngineKind::Memory;
    }
    Ok(config)
}

async fn run_on_store(
    store: &ReplicaStore,
    command: Command,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match command {
        Command::Get(args) => cmd_get(store, &args.path, format).await,
        Command::Put(args) => cmd_put(store, args).await,
        Command::Delete(args) => cmd_delete(store, args).await,
        Command::Ls(args) => cmd_ls(store, &args.path, format).await,
        Command::Revision(args) => cmd_revision(store, args.action, format).await,
        Command::Changes(args) => {
            let changes = match args.prefix {
                Some(prefix) => store.changes_below(&prefix).await?,
                None => store.changes().await?,
            };
            print_changes(&changes, format)
        }
        Command::ClearChange(args) => {
            if store.clear_change(&args.path).await? {
                println!("{} Cleared change at {}", "✓".green(), args.path.bold());
            } else {
                println!("No change pending at {}", args.path.bold());
            }
            Ok(())
        }
        Command::Conflicts => print_changes(&store.conflicts().await?, format),
        Command::Resolve(args) => cmd_resolve(store, args).await,
        Command::Dump => cmd_dump(store, format).await,
        Command::Reset => {
            store.reset().await?;
            println!("{} Store {} reset", "✓".green().bold(), store.config().name.bold());
            Ok(())
        }
        Command::Clean | Command::Config => unreachable!("handled before opening"),
    }
}

async fn cmd_get(store: &ReplicaStore, path: &str, format: OutputFormat) -> anyhow::Result<()> {
    let Some(node) = store.get(path).await? else {
        bail!("nothing stored at {path}");
    };
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&node)?);
        return Ok(());
    }
    match &node {
        Node::Document(doc) => {
            println!("{}  {}", path.bold(), doc.content_type.as_deref().unwrap_or("-").cyan());
            if let Some(revision) = &doc.revision {
                println!("  Revision: {}", revision.yellow());
            }
            match &doc.body {
                Some(Body::Text(text)) => println!("{text}"),
                Some(Body::Binary(bytes)) => println!("{}", format!("<{} bytes>", bytes.len()).dimmed()),
                None => println!("{}", "(placeholder)".dimmed()),
            }
        }
        Node::Directory(dir) => {
            println!("{}  {}", path.bold(), "directory".cyan());
            if let Some(revision) = node.revision() {
                println!("  Revision: {}", revision.yellow());
            }
            for child in dir.children() {
                println!("  {child}");
            }
        }
    }
    Ok(())
}

async fn cmd_put(store: &ReplicaStore, args: PutArgs) -> anyhow::Result<()> {
    let body = match (args.content, &args.file) {
        (Some(text), _) => Body::from(text),
        (None, Some(file)) => {
            let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
            match String::from_utf8(bytes) {
                Ok(text) => Body::from(text),
                Err(e) => Body::from(e.into_bytes()),
            }
        }
        (None, None) => bail!("put needs inline content or --file"),
    };
    let size = body.len();
    let origin = if args.remote { Origin::Remote } else { Origin::Local };
    let previous = store.put(&args.path, body, &args.content_type, origin).await?;
    let verb = if previous.is_some() { "Updated" } else { "Created" };
    println!(
        "{} {} {} ({} bytes, {})",
        "✓".green(),
        verb,
        args.path.bold(),
        size,
        origin
    );
    Ok(())
}

async fn cmd_delete(store: &ReplicaStore, args: DeleteArgs) -> anyhow::Result<()> {
    let origin = if args.remote { Origin::Remote } else { Origin::Local };
    match store.delete(&args.path, origin).await? {
        Some(_) => println!("{} Deleted {}", "✓".green(), args.path.bold()),
        None => println!("{} was not stored", args.path.bold()),
    }
    Ok(())
}

async fn cmd_ls(store: &ReplicaStore, path: &str, format: OutputFormat) -> anyhow::Result<()> {
    let children = store.list(path).await?;
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&children)?);
    } else if children.is_empty() {
        println!("{}", "(empty)".dimmed());
    } else {
        for child in children {
            if child.ends_with('/') {
                println!("{}", child.blue().bold());
            } else {
                println!("{child}");
            }
        }
    }
    Ok(())
}

async fn cmd_revision(
    store: &ReplicaStore,
    action: RevisionAction,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match action {
        RevisionAction::Get { path } => {
            let revision = store.get_revision(&path).await?;
            match (format, revision) {
                (OutputFormat::Json, revision) => println!("{}", json!({ "path": path, "revision": revision })),
                (OutputFormat::Text, Some(revision)) => println!("{}", revision.yellow()),
                (OutputFormat::Text, None) => println!("{}", "(none)".dimmed()),
            }
        }
        RevisionAction::Set { path, revision } => {
            store.set_revision(&path, &revision).await?;
            println!("{} {} at {}", "✓".green(), revision.yellow(), path.bold());
        }
        RevisionAction::Forget { paths } => {
            store.forget_revisions(&paths).await?;
            println!("{} Forgot {} revision(s)", "✓".green(), paths.len());
        }
    }
    Ok(())
}

async fn cmd_resolve(store: &ReplicaStore, args: ResolveArgs) -> anyhow::Result<()> {
    let resolution: Resolution = args.resolution.parse()?;
    store.resolve(&args.path, resolution).await?;
    println!("{} {} resolved as {}", "✓".green(), args.path.bold(), resolution.to_string().yellow());
    Ok(())
}

async fn cmd_dump(store: &ReplicaStore, format: OutputFormat) -> anyhow::Result<()> {
    let mut events = store.fire_initial(EventFilter::all()).await?;
    let mut seen = 0;
    while let Some(event) = events.recv().await {
        let StoreEvent::Change(event) = event else {
            continue;
        };
        seen += 1;
        let size = event.new_value.as_ref().map_or(0, Body::len);
        let content_type = event.new_content_type.as_deref().unwrap_or("-");
        match format {
            OutputFormat::Json => println!(
                "{}",
                json!({ "path": event.path.as_str(), "content_type": content_type, "size": size })
            ),
            OutputFormat::Text => println!(
                "{}  {}  {}",
                event.path.as_str().bold(),
                content_type.cyan(),
                format!("{size} bytes").dimmed()
            ),
        }
    }
    if format == OutputFormat::Text {
        println!("{} {seen} document(s)", "✓".green());
    }
    Ok(())
}

async fn cmd_clean(config: &StoreConfig) -> anyhow::Result<()> {
    ReplicaStore::clean(config).await?;
    println!("{} Store {} cleaned", "✓".green().bold(), config.name.bold());
    Ok(())
}

fn cmd_config(config: &StoreConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}

fn print_changes(changes: &[Change], format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(changes)?);
        return Ok(());
    }
    if changes.is_empty() {
        println!("No pending changes.");
        return Ok(());
    }
    for change in changes {
        let action = change
            .action
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".into());
        print!("{} {}", format!("{action:<8}").green(), change.path.as_str().bold());
        if let Some(conflict) = &change.conflict {
            let state = match conflict.resolution {
                Some(resolution) => format!("resolved: {resolution}").yellow(),
                None => "conflict".red().bold(),
            };
            print!("  [{state}]");
        }
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn flags_override_config_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "name = \"docs\"\nroot = \"/srv\"\nmax_commit_retries = 4\n").unwrap();
        let path = file.path().to_str().unwrap();

        let cli = Cli::try_parse_from(["replica", "-c", path, "--name", "other", "changes"]).unwrap();
        let config = store_config(&cli).unwrap();
        assert_eq!(config.name, "other");
        assert_eq!(config.root, std::path::PathBuf::from("/srv"));
        assert_eq!(config.max_commit_retries, 4);
        assert_eq!(config.engine, EngineKind::File);
    }

    #[test]
    fn memory_flag_selects_engine() {
        let cli = Cli::try_parse_from(["replica", "--memory", "dump"]).unwrap();
        assert_eq!(store_config(&cli).unwrap().engine, EngineKind::Memory);
    }

    #[tokio::test]
    async fn commands_run_against_a_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap();
        let run = |args: &[&str]| {
            let mut argv = vec!["replica", "--root", root, "--name", "cli-test"];
            argv.extend_from_slice(args);
            Cli::try_parse_from(argv).unwrap()
        };

        run_command(run(&["put", "notes/a", "hello"])).await.unwrap();
        run_command(run(&["revision", "set", "notes/a", "r1"])).await.unwrap();
        run_command(run(&["ls", "notes/"])).await.unwrap();
        run_command(run(&["dump"])).await.unwrap();

        let store = ReplicaStore::open(store_config(&run(&["changes"])).unwrap())
            .await
            .unwrap();
        assert_eq!(store.get_revision("notes/a").await.unwrap().as_deref(), Some("r1"));
        assert_eq!(store.changes().await.unwrap().len(), 1);
        store.close().await.unwrap();

        run_command(run(&["clear-change", "notes/a"])).await.unwrap();
        assert!(run_command(run(&["resolve", "notes/a", "local"])).await.is_err());

        let store = ReplicaStore::open(store_config(&run(&["conflicts"])).unwrap())
            .await
            .unwrap();
        store
            .set_conflict("notes/a", replica_types::ConflictAttributes::default())
            .await
            .unwrap();
        store.close().await.unwrap();
        assert!(run_command(run(&["resolve", "notes/a", "sideways"])).await.is_err());
        run_command(run(&["resolve", "notes/a", "remote"])).await.unwrap();
        let store = ReplicaStore::open(store_config(&run(&["conflicts"])).unwrap())
            .await
            .unwrap();
        let conflicts = store.conflicts().await.unwrap();
        assert_eq!(
            conflicts[0].conflict.as_ref().unwrap().resolution,
            Some(Resolution::Remote)
        );
        store.close().await.unwrap();

        run_command(run(&["clean"])).await.unwrap();
        assert!(run_command(run(&["get", "notes/a"])).await.is_err());
    }
}
