// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Profilegraph CLI
//!
//! Ingest conversation transcripts into a subject's knowledge graph and run
//! graph queries against it.

mod config;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use config::{AppConfig, LogConfig, StorageBackend};
use profilegraph_core::{EdgeType, EntityType};
use profilegraph_ingest::{
    ExtractionOracle, HttpExtractionOracle, KnowledgeGraphService, StaticExtractionOracle,
    SubjectContext, TranscriptContext,
};
use profilegraph_query::{Direction, EntityQuery, OrderBy};
use profilegraph_storage::{DocumentStore, FileStore, InMemoryStore};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "profilegraph")]
#[command(author, version, about = "Subject knowledge graphs built from conversations", long_about = None)]
struct Cli {
    /// Path to configuration file (TOML)
    #[arg(short, long, env = "PROFILEGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory (overrides config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Storage backend: memory or file (overrides config file)
    #[arg(long)]
    store: Option<String>,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Subject the command operates on
    #[arg(short, long, global = true, default_value = "default")]
    subject: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and apply one transcript window
    Ingest {
        /// Conversation id
        #[arg(long)]
        conversation: String,

        /// Transcript file with `speaker: text` lines
        #[arg(long)]
        transcript: Option<PathBuf>,

        /// Use a recorded extraction (JSON) instead of calling the oracle
        #[arg(long)]
        extraction: Option<PathBuf>,

        /// Age level passed to the oracle
        #[arg(long, default_value = "elementary")]
        age_level: String,

        /// Observation time (RFC 3339), defaults to now
        #[arg(long)]
        observed_at: Option<String>,
    },

    /// Show the subject summary
    Summary,

    /// List entities
    Entities {
        /// topic, skill, interest, concept or personality_trait
        #[arg(long = "type")]
        entity_type: Option<String>,

        #[arg(long)]
        category: Option<String>,

        /// strength, mention_count, conversation_count, last_observed_at or name
        #[arg(long, default_value = "strength")]
        order_by: String,

        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Show one entity
    Entity {
        entity_id: String,
    },

    /// Direct neighbours of an entity
    Neighbors {
        entity_id: String,

        #[arg(long)]
        edge_type: Option<String>,

        /// outgoing, incoming or both
        #[arg(long, default_value = "both")]
        direction: String,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Entities reachable within a number of hops
    Related {
        entity_id: String,

        #[arg(long, default_value = "2")]
        max_depth: usize,

        /// Edge types to follow (repeatable)
        #[arg(long = "edge-type")]
        edge_types: Vec<String>,

        #[arg(long, default_value = "0.0")]
        min_weight: f64,
    },

    /// Groups of co-occurring interests
    Clusters {
        #[arg(long, default_value = "2")]
        min_size: usize,

        #[arg(long)]
        category: Option<String>,
    },

    /// Prerequisites of a skill, roots first
    Prereqs {
        skill_id: String,
    },

    /// Learning path between two skills
    Path {
        start_id: String,
        target_id: String,
    },

    /// Compact neighbourhood of seed entities
    Subgraph {
        /// Seed entity ids
        #[arg(required = true)]
        seeds: Vec<String>,

        #[arg(long)]
        max_entities: Option<usize>,

        #[arg(long)]
        depth: Option<usize>,

        #[arg(long)]
        min_weight: Option<f64>,
    },

    /// Observation log of the subject
    Observations {
        /// Only this conversation
        #[arg(long)]
        conversation: Option<String>,
    },
}

fn init_tracing(log: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_new(&log.filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("profilegraph=info"));

    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_edge_type(s: &str) -> Result<EdgeType> {
    EdgeType::parse(s).with_context(|| format!("Unknown edge type: {}", s))
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(InMemoryStore::new()),
        StorageBackend::File => Arc::new(
            FileStore::open(&config.storage.data_dir)
                .await
                .with_context(|| {
                    format!("Failed to open store at {}", config.storage.data_dir.display())
                })?,
        ),
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = dir;
    }
    if let Some(store) = &cli.store {
        config.storage.backend = StorageBackend::parse(store)
            .with_context(|| format!("Unknown storage backend: {}", store))?;
    }
    if cli.log_json {
        config.log.json = true;
    }
    config.validate()?;

    init_tracing(&config.log);

    let store = open_store(&config).await?;
    let subject = cli.subject;

    // Only `ingest` talks to the oracle
    let oracle: Arc<dyn ExtractionOracle> = match &cli.command {
        Commands::Ingest {
            extraction: Some(path),
            ..
        } => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read extraction {}", path.display()))?;
            Arc::new(StaticExtractionOracle::new(raw))
        }
        _ => Arc::new(HttpExtractionOracle::new(config.oracle.clone())),
    };

    let service = KnowledgeGraphService::new(store, oracle, config.engine.clone())?;

    match cli.command {
        Commands::Ingest {
            conversation,
            transcript,
            extraction: _,
            age_level,
            observed_at,
        } => {
            let transcript = match transcript {
                Some(path) => TranscriptContext::from_lines(
                    &std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read transcript {}", path.display()))?,
                ),
                None => TranscriptContext::default(),
            };
            let observed_at = match observed_at {
                Some(ts) => DateTime::parse_from_rfc3339(&ts)
                    .with_context(|| format!("Invalid --observed-at: {}", ts))?
                    .with_timezone(&Utc),
                None => Utc::now(),
            };

            let context = SubjectContext::new(subject.as_str()).with_age_level(age_level);
            let report = service
                .ingest_with(&context, &conversation, &transcript, observed_at)
                .await?;
            info!(
                subject = %subject,
                observation = %report.observation_id,
                replayed = report.replayed,
                "Ingestion complete"
            );
            print_json(&report)?;
        }

        Commands::Summary => {
            print_json(service.get_summary(&subject).await?.as_ref())?;
        }

        Commands::Entities {
            entity_type,
            category,
            order_by,
            limit,
        } => {
            let mut query = EntityQuery::default().limit(limit).order_by(
                OrderBy::parse(&order_by).with_context(|| format!("Unknown order: {}", order_by))?,
            );
            if let Some(t) = entity_type {
                query.entity_type =
                    Some(EntityType::parse(&t).with_context(|| format!("Unknown entity type: {}", t))?);
            }
            if let Some(category) = category {
                query = query.category(category);
            }
            print_json(&service.get_entities(&subject, &query).await?)?;
        }

        Commands::Entity { entity_id } => {
            print_json(&service.get_entity(&subject, &entity_id).await?)?;
        }

        Commands::Neighbors {
            entity_id,
            edge_type,
            direction,
            limit,
        } => {
            let edge_type = edge_type.as_deref().map(parse_edge_type).transpose()?;
            let direction = Direction::parse(&direction)
                .with_context(|| format!("Unknown direction: {}", direction))?;
            print_json(
                &service
                    .get_neighbors(&subject, &entity_id, edge_type, direction, limit)
                    .await?,
            )?;
        }

        Commands::Related {
            entity_id,
            max_depth,
            edge_types,
            min_weight,
        } => {
            let edge_types = edge_types
                .iter()
                .map(|s| parse_edge_type(s))
                .collect::<Result<Vec<_>>>()?;
            let filter = (!edge_types.is_empty()).then_some(edge_types.as_slice());
            print_json(
                &service
                    .get_related_entities(&subject, &entity_id, max_depth, filter, min_weight)
                    .await?,
            )?;
        }

        Commands::Clusters { min_size, category } => {
            print_json(
                &service
                    .find_interest_clusters(&subject, min_size, category.as_deref())
                    .await?,
            )?;
        }

        Commands::Prereqs { skill_id } => {
            print_json(&service.get_prerequisite_chain(&subject, &skill_id).await?)?;
        }

        Commands::Path {
            start_id,
            target_id,
        } => {
            print_json(
                &service
                    .find_learning_path(&subject, &start_id, &target_id)
                    .await?,
            )?;
        }

        Commands::Subgraph {
            seeds,
            max_entities,
            depth,
            min_weight,
        } => {
            print_json(
                &service
                    .extract_context_subgraph(&subject, &seeds, max_entities, depth, min_weight)
                    .await?,
            )?;
        }

        Commands::Observations { conversation } => {
            let observations = match conversation {
                Some(conversation) => {
                    service
                        .conversation_observations(&subject, &conversation)
                        .await?
                }
                None => service.list_observations(&subject).await?,
            };
            print_json(&observations)?;
        }
    }

    service.shutdown();
    Ok(())
}
