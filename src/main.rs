use anyhow::{Context, Result};
use clap::Parser;
use rssfeed::config::{validate_feed_id, Config, FeedConfig};
use rssfeed::feed::{fetch_all, HttpSource};
use rssfeed::render::FeedFormatter;
use rssfeed::util::HostPolicy;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the default config file path (~/.config/rssfeed/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("rssfeed")
        .join("config.toml"))
}

/// Write `content` to a sibling temp file, then rename it over `dst`.
fn atomic_write(dst: &Path, content: &[u8]) -> Result<()> {
    let temp_path = dst.with_extension(format!("tmp.{}", std::process::id()));
    let written = std::fs::File::create(&temp_path)
        .and_then(|mut file| {
            file.write_all(content)?;
            file.sync_all()
        })
        .and_then(|()| std::fs::rename(&temp_path, dst));

    if let Err(e) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e).with_context(|| format!("Cannot write document to '{}'", dst.display()));
    }
    Ok(())
}

/// Parse an `ID=URL` pair given with `--feed`.
fn parse_feed_arg(s: &str) -> Result<FeedConfig, String> {
    let (id, url) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID=URL, got '{s}'"))?;
    validate_feed_id(id).map_err(|e| e.to_string())?;
    if url.trim().is_empty() {
        return Err(format!("feed '{id}' has an empty url"));
    }
    Ok(FeedConfig {
        id: id.to_string(),
        url: url.to_string(),
    })
}

#[derive(Parser, Debug)]
#[command(
    name = "rssfeed",
    about = "Typeset recent RSS/Atom entries as a ConTeXt document"
)]
struct Args {
    /// Config file (default: ~/.config/rssfeed/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Keep entries at most this many days old (fractions allowed)
    #[arg(long, value_name = "DAYS")]
    age: Option<f64>,

    /// Document title
    #[arg(long)]
    title: Option<String>,

    /// Write the document here instead of stdout
    #[arg(long, short, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Additional feed as ID=URL (repeatable; replaces a config feed with the same id)
    #[arg(long = "feed", value_name = "ID=URL", value_parser = parse_feed_arg)]
    feeds: Vec<FeedConfig>,
}

/// Merge command-line overrides into the loaded configuration.
fn apply_args(mut config: Config, args: Args) -> Result<Config> {
    if let Some(age) = args.age {
        config.age_days = age;
    }
    if let Some(title) = args.title {
        config.title = title;
    }
    if let Some(output) = args.output {
        config.output = Some(output);
    }
    for feed in args.feeds {
        match config.feeds.iter_mut().find(|f| f.id == feed.id) {
            Some(existing) => existing.url = feed.url,
            None => config.feeds.push(feed),
        }
    }
    config.validate().context("Invalid command-line options")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr so stdout can carry the document
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let config = apply_args(config, args)?;

    if config.feeds.is_empty() {
        eprintln!("Error: No feeds configured.");
        eprintln!();
        eprintln!("Add [[feeds]] tables to {}, or pass:", config_path.display());
        eprintln!("  rssfeed --feed rust=https://blog.rust-lang.org/feed.xml");
        std::process::exit(1);
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!("rssfeed/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let host_policy = if config.allow_private_hosts {
        HostPolicy::AllowPrivate
    } else {
        HostPolicy::PublicOnly
    };
    let source = HttpSource::new(client)
        .with_timeout(Duration::from_secs(config.timeout_secs))
        .with_max_bytes(config.max_feed_bytes)
        .with_host_policy(host_policy);

    let collection = fetch_all(
        &source,
        config
            .feeds
            .iter()
            .map(|f| (f.id.as_str(), f.url.as_str())),
        config.age_days,
    )
    .await;

    tracing::info!(
        feeds = collection.len(),
        entries = collection.entry_count(),
        "Formatting document"
    );
    let document = FeedFormatter::new(&collection).format(&config.title);

    match &config.output {
        Some(path) => {
            atomic_write(path, document.as_bytes())?;
            tracing::info!(path = %path.display(), "Wrote document");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(document.as_bytes())
                .context("Failed to write document to stdout")?;
            stdout.flush().context("Failed to flush stdout")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feed_arg() {
        let feed = parse_feed_arg("rust=https://blog.rust-lang.org/feed.xml?a=b").unwrap();
        assert_eq!(feed.id, "rust");
        assert_eq!(feed.url, "https://blog.rust-lang.org/feed.xml?a=b");

        assert!(parse_feed_arg("no-separator").is_err());
        assert!(parse_feed_arg("bad id=https://example.com").is_err());
        assert!(parse_feed_arg("id=").is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let config = Config::parse(
            "title = \"From file\"\n[[feeds]]\nid = \"a\"\nurl = \"https://a.example/feed\"\n",
        )
        .unwrap();
        let args = Args::parse_from([
            "rssfeed",
            "--age",
            "3.5",
            "--feed",
            "a=https://a.example/other",
            "--feed",
            "b=https://b.example/feed",
        ]);

        let merged = apply_args(config, args).unwrap();
        assert_eq!(merged.title, "From file");
        assert_eq!(merged.age_days, 3.5);
        let feeds: Vec<(&str, &str)> = merged
            .feeds
            .iter()
            .map(|f| (f.id.as_str(), f.url.as_str()))
            .collect();
        assert_eq!(
            feeds,
            vec![
                ("a", "https://a.example/other"),
                ("b", "https://b.example/feed")
            ]
        );
    }

    #[test]
    fn test_negative_cli_age_rejected() {
        let args = Args::parse_from(["rssfeed", "--age=-2"]);
        assert!(apply_args(Config::default(), args).is_err());
    }

    #[test]
    fn test_atomic_write_replaces_file() {
        let dir = std::env::temp_dir().join("rssfeed_main_test_atomic_write");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("feeds.tex");

        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_atomic_write_reports_missing_directory() {
        let path = std::env::temp_dir()
            .join("rssfeed_main_test_no_such_dir")
            .join("feeds.tex");

        let err = atomic_write(&path, b"doc").unwrap_err();
        assert!(err.to_string().contains("Cannot write document"));
        assert!(!path.exists());
    }
}
