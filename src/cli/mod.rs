//! Command-line interface for dataapi
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading (file, environment, URI, flags)
//! - Running one command against the service and printing the result

pub mod completion;

use bson::{Bson, Document};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use serde_json::{Value, json};
use std::path::PathBuf;

use crate::client::{
    BulkInsertOptions, BulkInsertResult, Client, CreateCollectionOptions, FindOptions,
    FindOneOptions, VectorMetric, VectorOptions,
};
use crate::codec;
use crate::config::uri::parse_uri;
use crate::config::{Config, LogLevel};
use crate::error::{ConfigError, Result};
use crate::formatter::JsonFormatter;

/// Command-line client for document collections served over a JSON API
#[derive(Parser, Debug)]
#[command(name = "dataapi", version, about = "Document collection client over a JSON API")]
pub struct CliArgs {
    /// Connection URI, e.g. http://localhost:8181/v1/my_keyspace?applicationToken=...
    #[arg(long, value_name = "URI")]
    pub uri: Option<String>,

    /// Application token (overrides the URI and config file)
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Keyspace to use (overrides the URI and config file)
    #[arg(short = 'k', long, value_name = "NAME")]
    pub keyspace: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Use pooled HTTP/1.1 connections instead of an HTTP/2 session
    #[arg(long)]
    pub http1: bool,

    /// Per-request timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Disable colored output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Only log errors
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (log request and response bodies)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for dataapi
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the collections of the keyspace
    Collections {
        /// Include creation options
        #[arg(long)]
        full: bool,
    },

    /// Create a collection
    CreateCollection {
        name: String,

        /// Vector dimension, enables vector search
        #[arg(long)]
        dimension: Option<u32>,

        /// Similarity metric (cosine, euclidean, dot_product)
        #[arg(long, default_value = "cosine", requires = "dimension")]
        metric: String,
    },

    /// Drop a collection
    DropCollection { name: String },

    /// Find documents
    Find {
        collection: String,

        /// Filter as JSON
        #[arg(default_value = "{}")]
        filter: String,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        skip: Option<usize>,

        /// Sort as JSON, e.g. '{"age": -1}'
        #[arg(long)]
        sort: Option<String>,

        /// Projection as JSON
        #[arg(long)]
        projection: Option<String>,
    },

    /// Find the first matching document
    FindOne {
        collection: String,

        #[arg(default_value = "{}")]
        filter: String,
    },

    /// Insert a JSON document or an array of documents
    Insert {
        collection: String,
        documents: String,

        /// Stop at the first failure
        #[arg(long)]
        ordered: bool,

        /// Concurrent insert requests for arrays
        #[arg(long)]
        parallel: Option<usize>,
    },

    /// Count matching documents
    Count {
        collection: String,

        #[arg(default_value = "{}")]
        filter: String,
    },

    /// Delete every matching document
    Delete { collection: String, filter: String },

    /// Generate shell completion script
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration
        #[arg(long)]
        validate: bool,
    },
}

/// CLI interface handler
pub struct CliInterface {
    args: CliArgs,
    config: Config,
}

impl CliInterface {
    /// Parse arguments and load the effective configuration
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Config file, then `DATAAPI_*` variables, then flags
    fn load_config(args: &CliArgs) -> Result<Config> {
        let file = Config::load_from_file(args.config_file.as_deref())?;
        let mut config = file.merge(&Config::from_env()?);
        Self::apply_args_to_config(&mut config, args)?;
        Ok(config)
    }

    fn apply_args_to_config(config: &mut Config, args: &CliArgs) -> Result<()> {
        if let Some(uri) = &args.uri {
            config.apply_uri(parse_uri(uri)?);
        }

        let conn = &mut config.connection;
        if let Some(token) = &args.token {
            conn.token = token.clone();
        }
        if let Some(keyspace) = &args.keyspace {
            conn.keyspace = keyspace.clone();
        }
        if args.http1 {
            conn.use_http2 = false;
        }
        if let Some(timeout) = args.timeout_ms {
            conn.timeout_ms = timeout;
        }

        if args.pretty {
            config.display.pretty = true;
        }
        if args.no_color {
            config.display.color_output = false;
        }

        config.logging.level = if args.very_verbose {
            LogLevel::Wire
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Run the selected subcommand and print its output
    pub async fn run(&self) -> Result<()> {
        match &self.args.command {
            Commands::Completion { shell } => {
                completion::generate_completion(*shell);
                Ok(())
            }
            Commands::Config { show, validate } => self.handle_config_command(*show, *validate),
            command => {
                let client = Client::new(self.config.connection.clone())?;
                let result = self.execute(&client, command).await;
                client.close();
                println!("{}", self.formatter().format_value(&result?)?);
                Ok(())
            }
        }
    }

    fn formatter(&self) -> JsonFormatter {
        JsonFormatter::from_config(&self.config.display)
    }

    /// Execute a data command and return its output as JSON
    async fn execute(&self, client: &Client, command: &Commands) -> Result<Value> {
        let db = client.default_db();

        let output = match command {
            Commands::Collections { full } => {
                let infos = db.list_collections(!full).await?;
                let items = infos
                    .into_iter()
                    .map(|info| {
                        if *full {
                            json!({ "name": info.name, "options": codec::document_to_wire(&info.options) })
                        } else {
                            json!(info.name)
                        }
                    })
                    .collect();
                Value::Array(items)
            }
            Commands::CreateCollection {
                name,
                dimension,
                metric,
            } => {
                let vector = match dimension {
                    Some(dimension) => Some(VectorOptions {
                        dimension: *dimension,
                        metric: metric.parse::<VectorMetric>()?,
                        service: None,
                    }),
                    None => None,
                };
                let options = CreateCollectionOptions {
                    vector,
                    indexing: None,
                };
                db.create_collection(name, options).await?;
                json!({ "ok": 1 })
            }
            Commands::DropCollection { name } => {
                json!({ "ok": i32::from(db.drop_collection(name).await?) })
            }
            Commands::Find {
                collection,
                filter,
                limit,
                skip,
                sort,
                projection,
            } => {
                let options = FindOptions {
                    sort: sort.as_deref().map(parse_document).transpose()?,
                    projection: projection.as_deref().map(parse_document).transpose()?,
                    limit: *limit,
                    skip: *skip,
                    ..FindOptions::default()
                };
                let mut cursor = db.collection(collection).find(parse_document(filter)?, options);
                let documents = cursor.to_array().await?;
                Value::Array(documents.iter().map(codec::document_to_wire).collect())
            }
            Commands::FindOne { collection, filter } => db
                .collection(collection)
                .find_one(parse_document(filter)?, FindOneOptions::default())
                .await?
                .map(|doc| codec::document_to_wire(&doc))
                .unwrap_or(Value::Null),
            Commands::Insert {
                collection,
                documents,
                ordered,
                parallel,
            } => {
                let collection = db.collection(collection);
                match parse_json(documents)? {
                    Bson::Document(document) => {
                        let result = collection.insert_one(document).await?;
                        json!({ "insertedId": codec::to_wire(&result.inserted_id) })
                    }
                    Bson::Array(items) => {
                        let documents = items
                            .into_iter()
                            .map(into_document)
                            .collect::<Result<Vec<_>>>()?;
                        let options = BulkInsertOptions {
                            ordered: *ordered,
                            parallel: *parallel,
                            max_time_ms: None,
                        };
                        bulk_result_json(&collection.insert_many_bulk(documents, options).await?)
                    }
                    other => return Err(invalid_json("documents", &other)),
                }
            }
            Commands::Count { collection, filter } => {
                let count = db
                    .collection(collection)
                    .count_documents(parse_document(filter)?)
                    .await?;
                json!({ "count": count })
            }
            Commands::Delete { collection, filter } => {
                let result = db
                    .collection(collection)
                    .delete_many_bulk(parse_document(filter)?)
                    .await?;
                json!({ "deletedCount": result.deleted_count })
            }
            Commands::Completion { .. } | Commands::Config { .. } => Value::Null,
        };
        Ok(output)
    }

    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            match self.config.validate() {
                Ok(()) => println!("Configuration is valid"),
                Err(e) => println!("Configuration is invalid: {e}"),
            }
        }

        if show {
            let path = self
                .args
                .config_file
                .clone()
                .unwrap_or_else(Config::default_path);
            println!("# Configuration file: {}", path.display());
            let mut shown = self.config.clone();
            if !shown.connection.token.is_empty() {
                shown.connection.token = "***".to_string();
            }
            println!("{}", shown.to_toml()?);
        }

        Ok(())
    }
}

/* ========================= Argument parsing ========================= */

/// Parse a JSON argument, accepting the wire forms of extended types
/// (`{"$date": ...}`, `{"$uuid": ...}`, ...).
pub fn parse_json(raw: &str) -> Result<Bson> {
    let value: Value = serde_json::from_str(raw).map_err(|e| ConfigError::InvalidValue {
        field: "json".to_string(),
        value: format!("{raw} ({e})"),
    })?;
    Ok(codec::from_wire(&value))
}

/// Parse a JSON argument that must be an object
pub fn parse_document(raw: &str) -> Result<Document> {
    into_document(parse_json(raw)?)
}

fn into_document(value: Bson) -> Result<Document> {
    match value {
        Bson::Document(document) => Ok(document),
        other => Err(invalid_json("document", &other)),
    }
}

fn invalid_json(field: &str, value: &Bson) -> crate::error::DataApiError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: codec::to_wire(value).to_string(),
    }
    .into()
}

fn bulk_result_json(result: &BulkInsertResult) -> Value {
    json!({
        "insertedCount": result.inserted_count,
        "insertedIds": result.inserted_ids.iter().map(codec::to_wire).collect::<Vec<_>>(),
        "failedCount": result.failed_count,
        "failedInserts": result
            .failed_inserts
            .iter()
            .map(|f| json!({ "document": codec::document_to_wire(&f.document), "errors": f.errors }))
            .collect::<Vec<_>>(),
    })
}
