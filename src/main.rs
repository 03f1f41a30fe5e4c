//! lexkv binary: discovery and administration tooling for local stores.

mod cli;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command, MetaCommand};
use colored::Colorize;
use lexkv::{Kind, LocalKv, OpenOptions, discover, fetch};
use std::io::Write;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let base = cli.base.clone();

    match cli.command {
        Command::List {
            schema,
            counts,
            json,
        } => cmd_list(base, schema, counts, json),
        Command::Info { store, json } => cmd_info(base, &store, json),
        Command::Get {
            store,
            key,
            key_kind,
        } => cmd_get(base, &store, &key, &key_kind),
        Command::Put {
            store,
            key,
            value,
            key_kind,
            value_kind,
            describe,
        } => cmd_put(base, &store, &key, &value, &key_kind, &value_kind, describe),
        Command::Delete {
            store,
            key,
            key_kind,
        } => cmd_delete(base, &store, &key, &key_kind),
        Command::Meta { command } => cmd_meta(base, command),
        Command::Vacuum { store } => cmd_vacuum(base, &store),
        Command::Truncate { store, no_vacuum } => cmd_truncate(base, &store, no_vacuum),
        Command::Fetch {
            store,
            url,
            force,
            out,
        } => cmd_fetch(base, &store, &url, force, out),
    }
}

fn rw_options(base: Option<PathBuf>) -> OpenOptions {
    OpenOptions {
        base_dir: base,
        ..OpenOptions::default()
    }
}

fn ro_options(base: Option<PathBuf>) -> OpenOptions {
    OpenOptions {
        read_only: true,
        base_dir: base,
        ..OpenOptions::default()
    }
}

fn parse_typed(kind_name: &str, raw: &str) -> anyhow::Result<(Kind, lexkv::Value)> {
    let kind: Kind = kind_name.parse()?;
    let value = match kind {
        Kind::Text | Kind::Any => lexkv::Value::Text(raw.to_string()),
        Kind::Bytes => lexkv::Value::Bytes(raw.as_bytes().to_vec()),
        Kind::Integer => lexkv::Value::Integer(
            raw.parse::<i64>()
                .with_context(|| format!("'{raw}' is not an integer"))?,
        ),
        Kind::Float => lexkv::Value::Float(
            raw.parse::<f64>()
                .with_context(|| format!("'{raw}' is not a float"))?,
        ),
    };
    Ok((kind, value))
}

fn print_value(value: &lexkv::Value) -> anyhow::Result<()> {
    match value {
        lexkv::Value::Text(s) => println!("{s}"),
        lexkv::Value::Bytes(b) => std::io::stdout().write_all(b)?,
        lexkv::Value::Integer(i) => println!("{i}"),
        lexkv::Value::Float(f) => println!("{f}"),
    }
    Ok(())
}

fn cmd_list(
    base: Option<PathBuf>,
    schema: bool,
    counts: bool,
    json: bool,
) -> anyhow::Result<()> {
    let infos = discover::list_stores(base.as_deref(), schema, counts)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }
    if infos.is_empty() {
        println!("No stores found.");
        return Ok(());
    }
    for info in infos {
        let mut line = format!("{}  {}", info.name.bold(), human_size(info.size_bytes));
        if let Some(n) = info.item_count {
            line.push_str(&format!("  {n} records"));
        }
        if let Some(desc) = &info.description {
            line.push_str(&format!("  {}", desc.dimmed()));
        }
        println!("{line}");
    }
    Ok(())
}

fn cmd_info(base: Option<PathBuf>, store: &str, json: bool) -> anyhow::Result<()> {
    let kv = LocalKv::open_with(store, Kind::Any, Kind::Any, &ro_options(base))?;
    let path = kv.path().map(|p| p.to_path_buf()).unwrap_or_default();
    let len = kv.len()?;
    let size = kv.size_bytes()?;
    let waste = kv.estimate_waste()?;
    let description = kv.get_meta_opt("description")?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "path": path,
                "records": len,
                "size_bytes": size,
                "waste_bytes": waste,
                "description": description,
            })
        );
        return Ok(());
    }
    println!("{}: {}", "path".bold(), path.display());
    println!("{}: {}", "records".bold(), len);
    println!("{}: {}", "size".bold(), human_size(size));
    println!("{}: {}", "reclaimable".bold(), human_size(waste));
    if let Some(desc) = description {
        println!("{}: {}", "description".bold(), desc);
    }
    Ok(())
}

fn cmd_get(
    base: Option<PathBuf>,
    store: &str,
    key: &str,
    key_kind: &str,
) -> anyhow::Result<()> {
    let (kind, key) = parse_typed(key_kind, key)?;
    let kv = LocalKv::open_with(store, kind, Kind::Any, &ro_options(base))?;
    let value = kv.get(key)?;
    print_value(&value)
}

fn cmd_put(
    base: Option<PathBuf>,
    store: &str,
    key: &str,
    value: &str,
    key_kind: &str,
    value_kind: &str,
    describe: Option<String>,
) -> anyhow::Result<()> {
    let (kk, key) = parse_typed(key_kind, key)?;
    let (vk, value) = parse_typed(value_kind, value)?;
    let mut kv = LocalKv::open_with(store, kk, vk, &rw_options(base))?;
    kv.put(key, value, true)?;
    if let Some(desc) = describe {
        kv.put_meta("description", &desc)?;
    }
    Ok(())
}

fn cmd_delete(
    base: Option<PathBuf>,
    store: &str,
    key: &str,
    key_kind: &str,
) -> anyhow::Result<()> {
    let (kind, key) = parse_typed(key_kind, key)?;
    let mut kv = LocalKv::open_with(store, kind, Kind::Any, &rw_options(base))?;
    kv.delete(key, true)?;
    Ok(())
}

fn cmd_meta(base: Option<PathBuf>, command: MetaCommand) -> anyhow::Result<()> {
    match command {
        MetaCommand::Get { store, key } => {
            let kv = LocalKv::open_with(&store, Kind::Any, Kind::Any, &ro_options(base))?;
            println!("{}", kv.get_meta(&key)?);
        }
        MetaCommand::Set { store, key, value } => {
            let mut kv = LocalKv::open_with(&store, Kind::Any, Kind::Any, &rw_options(base))?;
            kv.put_meta(&key, &value)?;
        }
        MetaCommand::Del { store, key } => {
            let mut kv = LocalKv::open_with(&store, Kind::Any, Kind::Any, &rw_options(base))?;
            kv.delete_meta(&key)?;
        }
    }
    Ok(())
}

fn cmd_vacuum(base: Option<PathBuf>, store: &str) -> anyhow::Result<()> {
    let mut kv = LocalKv::open_with(store, Kind::Any, Kind::Any, &rw_options(base))?;
    let before = kv.size_bytes()?;
    kv.vacuum()?;
    let after = kv.size_bytes()?;
    println!(
        "Vacuumed: {} -> {}",
        human_size(before),
        human_size(after).green()
    );
    Ok(())
}

fn cmd_truncate(base: Option<PathBuf>, store: &str, no_vacuum: bool) -> anyhow::Result<()> {
    let mut kv = LocalKv::open_with(store, Kind::Any, Kind::Any, &rw_options(base))?;
    let before = kv.len()?;
    kv.truncate(!no_vacuum)?;
    println!("Deleted {before} records.");
    Ok(())
}

fn cmd_fetch(
    base: Option<PathBuf>,
    store: &str,
    url: &str,
    force: bool,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut kv = LocalKv::open_with(store, Kind::Text, Kind::Bytes, &rw_options(base))?;
    let http = fetch::HttpDownloader::new()?;
    let (body, from_cache) = fetch::cached_fetch(&mut kv, &http, url, force)?;
    let provenance = if from_cache {
        "from cache".green()
    } else {
        "downloaded".yellow()
    };
    eprintln!("{url}: {provenance} ({} bytes)", body.len());
    match out {
        Some(path) => std::fs::write(&path, &body)
            .with_context(|| format!("writing {}", path.display()))?,
        None => std::io::stdout().write_all(&body)?,
    }
    Ok(())
}

fn human_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
