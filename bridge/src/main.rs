// Operator CLI for recording rules

use clap::{Parser, Subcommand};
use log::info;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use bridge::{
    KeyValueStore, KurecConfig, MeilisearchClient, MemoryKvStore, OgpImageProxy,
    RuleStoreWriter, SearchRequest,
};
use rule_engine::{IndividualRule, RuleListParser, SearchQueryState};

#[derive(Parser)]
#[command(name = "kurec-rules")]
#[command(about = "Manage KuRec recording rules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use an in-memory store instead of NATS (dry run)
    #[arg(long, global = true)]
    memory: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Append a search-based recording rule
    Add {
        /// Free-text query
        #[arg(short, long, default_value = "")]
        query: String,

        /// Facet selection, repeatable (e.g. 放送局=NHK総合)
        #[arg(short, long, value_parser = parse_facet)]
        facet: Vec<(String, String)>,

        /// Store as an ignore rule
        #[arg(long)]
        ignore: bool,
    },

    /// Append a rule for one program
    AddIndividual {
        #[arg(long)]
        program_id: i64,

        #[arg(long)]
        service_id: i64,

        /// Store as an ignore rule
        #[arg(long)]
        ignore: bool,
    },

    /// Print the stored rules
    List {
        /// List per-program rules instead
        #[arg(long)]
        individual: bool,
    },

    /// Preview the programs a rule would match
    Search {
        #[arg(short, long, default_value = "")]
        query: String,

        #[arg(short, long, value_parser = parse_facet)]
        facet: Vec<(String, String)>,

        #[arg(long, default_value = "20")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Save a stored thumbnail to a file
    Ogp {
        /// SHA-1 hex of the image URL
        hash: String,

        #[arg(short, long)]
        output: PathBuf,
    },
}

fn parse_facet(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((attribute, value)) if !attribute.is_empty() && !value.is_empty() => {
            Ok((attribute.to_string(), value.to_string()))
        }
        _ => Err(format!("expected ATTRIBUTE=VALUE, got {:?}", raw)),
    }
}

fn query_state(query: String, facets: Vec<(String, String)>) -> SearchQueryState {
    let mut state = SearchQueryState::default();
    state.set_free_text(query);
    for (attribute, value) in facets {
        state.select(attribute, value);
    }
    state
}

fn open_store(config: &KurecConfig, memory: bool) -> Arc<dyn KeyValueStore> {
    if memory {
        info!("Using in-memory store");
        return Arc::new(MemoryKvStore::new());
    }
    nats_store(config)
}

#[cfg(feature = "nats")]
fn nats_store(config: &KurecConfig) -> Arc<dyn KeyValueStore> {
    Arc::new(bridge::NatsKvStore::new(config.nats.url.clone()))
}

#[cfg(not(feature = "nats"))]
fn nats_store(_config: &KurecConfig) -> Arc<dyn KeyValueStore> {
    log::warn!("Built without NATS support, falling back to in-memory store");
    Arc::new(MemoryKvStore::new())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = KurecConfig::load()?;
    let store = open_store(&config, cli.memory);

    match cli.command {
        Commands::Add {
            query,
            facet,
            ignore,
        } => {
            let rule = query_state(query, facet).to_canonical().into_rule(ignore);
            let writer = RuleStoreWriter::new(store, &config);
            let outcome = writer.try_append_rule(rule.clone()).await?;
            info!(
                "Stored rule {} in {} attempt(s)",
                rule.id, outcome.attempts
            );
            println!("{}", serde_json::to_string_pretty(&rule)?);
        }

        Commands::AddIndividual {
            program_id,
            service_id,
            ignore,
        } => {
            let rule = if ignore {
                IndividualRule::ignore(program_id, service_id)
            } else {
                IndividualRule::record(program_id, service_id)
            };
            let writer = RuleStoreWriter::new(store, &config);
            writer.try_append_individual_rule(rule).await?;
            println!("{}", serde_json::to_string_pretty(&rule)?);
        }

        Commands::List { individual } => {
            let writer = RuleStoreWriter::new(store, &config);
            if individual {
                let rules = writer.list_individual_rules().await?;
                println!("{}", RuleListParser::to_json(&rules)?);
            } else {
                for rule in writer.list_rules().await?.iter() {
                    println!("{}", rule.describe());
                }
            }
        }

        Commands::Search {
            query,
            facet,
            limit,
            offset,
        } => {
            let canonical = query_state(query, facet).to_canonical();
            let client = MeilisearchClient::new(&config)?;
            let page = client
                .search(&SearchRequest::new(&canonical).page(limit, offset))
                .await?;
            let zone = rule_engine::jst();
            for hit in &page.hits {
                println!("{}  {}", hit.summary_line(&zone), hit.title);
            }
            info!(
                "{} of ~{} hits in {} ms",
                page.hits.len(),
                page.estimated_total_hits,
                page.processing_time_ms
            );
        }

        Commands::Ogp { hash, output } => {
            let proxy = OgpImageProxy::new(store, &config);
            let image = proxy.fetch(&hash).await?;
            tokio::fs::write(&output, &image.bytes).await?;
            info!(
                "Wrote {} bytes ({}) to {}",
                image.bytes.len(),
                image.content_type,
                output.display()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_facet() {
        assert_eq!(
            parse_facet("放送局=NHK総合"),
            Ok(("放送局".to_string(), "NHK総合".to_string()))
        );
        assert_eq!(
            parse_facet("ジャンル=a=b"),
            Ok(("ジャンル".to_string(), "a=b".to_string()))
        );
        assert!(parse_facet("放送局").is_err());
        assert!(parse_facet("=NHK").is_err());
    }

    #[test]
    fn test_query_state_from_flags() {
        let state = query_state(
            "anime".to_string(),
            vec![("放送局".to_string(), "NHK".to_string())],
        );
        let canonical = state.to_canonical();
        assert_eq!(canonical.query, "anime");
        assert_eq!(canonical.filter, "( 放送局 IN [ \"NHK\" ] )");
    }

    #[test]
    fn test_cli_parses_add() {
        let cli = Cli::try_parse_from([
            "kurec-rules",
            "--memory",
            "add",
            "-q",
            "anime",
            "-f",
            "ジャンル=アニメ／特撮",
            "--ignore",
        ])
        .unwrap();
        assert!(cli.memory);
        match cli.command {
            Commands::Add { query, facet, ignore } => {
                assert_eq!(query, "anime");
                assert_eq!(facet.len(), 1);
                assert!(ignore);
            }
            _ => panic!("expected add"),
        }
    }
}
