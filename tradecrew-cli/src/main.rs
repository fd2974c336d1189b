//! tradecrew-cli: operator CLI for the tradecrew server
//!
//! Talks to the HTTP API, so it works against any running instance.
//!
//! # Subcommands
//! - `prune-quotes`                : deprecate every expired quote now
//! - `stats`                       : memory store row counts
//! - `search <query> [filters]`    : hybrid retrieval, prints the context block
//! - `queue-stats`                 : job queue counts
//! - `status`                      : server health

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:3001";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "tradecrew-cli", version, about = "tradecrew memory and job queue CLI")]
struct Cli {
    /// tradecrew HTTP server URL (overrides TRADECREW_HTTP_URL env var)
    #[arg(long, env = "TRADECREW_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Bearer token for the /memory and /jobs routes
    #[arg(long, env = "TRADECREW_API_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Deprecate all quotes whose validity window has closed
    PruneQuotes,

    /// Show memory store counts
    Stats,

    /// Hybrid search across quotes, knowledge, relations and user history
    Search {
        /// Free-text query
        query: String,

        /// Destination country code (e.g. DE)
        #[arg(long)]
        country: Option<String>,

        /// Shipping route (e.g. CN-DE)
        #[arg(long)]
        route: Option<String>,

        /// Product type used for the relationship lookup
        #[arg(long)]
        product_type: Option<String>,

        /// Include this user's conversation history
        #[arg(long)]
        user: Option<String>,

        /// Per-section result cap
        #[arg(short = 'n', long)]
        limit: Option<i64>,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Show job queue counts
    QueueStats,

    /// Show server health
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryStats {
    pub quotes_total: i64,
    pub quotes_active: i64,
    pub quotes_deprecated: i64,
    pub quotes_expired_pending: i64,
    pub knowledge_total: i64,
    pub knowledge_active: i64,
    pub conversations: i64,
    pub relations: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QueueStats {
    pub available: bool,
    pub waiting: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HybridResponse {
    pub factual: Vec<serde_json::Value>,
    pub semantic: Vec<serde_json::Value>,
    pub graph: Vec<serde_json::Value>,
    pub user: Vec<serde_json::Value>,
    pub context: String,
}

// ============================================================================
// Output formatting
// ============================================================================

pub fn format_stats(s: &MemoryStats) -> String {
    [
        format!(
            "Quotes:        {} total, {} active, {} deprecated",
            s.quotes_total, s.quotes_active, s.quotes_deprecated
        ),
        format!("Expired (pending prune): {}", s.quotes_expired_pending),
        format!(
            "Knowledge:     {} total, {} active",
            s.knowledge_total, s.knowledge_active
        ),
        format!("Conversations: {}", s.conversations),
        format!("Relations:     {}", s.relations),
    ]
    .join("\n")
}

pub fn format_queue_stats(q: &QueueStats) -> String {
    if !q.available {
        return "Queue: unavailable (jobs run synchronously)".to_string();
    }
    format!(
        "Queue: available\nWaiting:   {}\nActive:    {}\nCompleted: {}\nFailed:    {}",
        q.waiting, q.active, q.completed, q.failed
    )
}

pub fn format_hybrid(query: &str, r: &HybridResponse) -> String {
    let header = format!(
        "{} quotes, {} knowledge, {} relations, {} user memories",
        r.factual.len(),
        r.semantic.len(),
        r.graph.len(),
        r.user.len()
    );
    if r.context.trim().is_empty() {
        return format!("{header}\nNo results found for: {query}");
    }
    format!("{header}\n\n{}", r.context)
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

struct Api {
    client: reqwest::blocking::Client,
    server: String,
    token: Option<String>,
}

impl Api {
    fn new(server: &str, token: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            server: server.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    fn get(&self, path: &str) -> reqwest::blocking::RequestBuilder {
        self.authorize(self.client.get(format!("{}{}", self.server, path)))
    }

    fn post(&self, path: &str) -> reqwest::blocking::RequestBuilder {
        self.authorize(self.client.post(format!("{}{}", self.server, path)))
    }

    fn authorize(&self, req: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    /// Send and decode, exiting with a message on transport or HTTP errors.
    fn send<T: for<'de> Deserialize<'de>>(&self, req: reqwest::blocking::RequestBuilder) -> T {
        let resp = match req.send() {
            Ok(r) => r,
            Err(e) => {
                eprintln!("tradecrew-cli: connection failed to {}: {}", self.server, e);
                std::process::exit(1);
            }
        };

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            eprintln!("tradecrew-cli: server returned {}: {}", status, body);
            std::process::exit(1);
        }

        match resp.json() {
            Ok(v) => v,
            Err(e) => {
                eprintln!("tradecrew-cli: failed to parse response: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn do_prune(api: &Api) -> anyhow::Result<()> {
    let body: serde_json::Value = api.send(api.post("/memory/quotes/prune"));
    println!("Pruned {} expired quotes", body["pruned"].as_u64().unwrap_or(0));
    Ok(())
}

fn do_stats(api: &Api) -> anyhow::Result<()> {
    let stats: MemoryStats = api.send(api.get("/memory/stats"));
    println!("{}", format_stats(&stats));
    Ok(())
}

fn do_queue_stats(api: &Api) -> anyhow::Result<()> {
    let stats: QueueStats = api.send(api.get("/jobs/queue/stats"));
    println!("{}", format_queue_stats(&stats));
    Ok(())
}

fn do_search(api: &Api, query: &str, body: serde_json::Value, json_output: bool) -> anyhow::Result<()> {
    let raw: serde_json::Value = api.send(api.post("/memory/search/hybrid").json(&body));

    if json_output {
        println!("{}", serde_json::to_string_pretty(&raw)?);
        return Ok(());
    }

    let resp: HybridResponse = serde_json::from_value(raw)?;
    println!("{}", format_hybrid(query, &resp));
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(api: &Api) -> anyhow::Result<()> {
    let url = format!("{}/health", api.server);
    match api.client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("tradecrew server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:          {}", body["version"].as_str().unwrap_or("?"));
            println!("Environment:      {}", body["environment"].as_str().unwrap_or("?"));
            println!(
                "Job queue:        {}",
                if body["queue"].as_bool().unwrap_or(false) { "connected" } else { "offline" }
            );
        }
        Ok(r) => {
            eprintln!("tradecrew-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("tradecrew-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();

    let result = Api::new(&cli.server, cli.token).and_then(|api| match cli.command {
        Commands::PruneQuotes => do_prune(&api),
        Commands::Stats => do_stats(&api),
        Commands::QueueStats => do_queue_stats(&api),
        Commands::Status => do_status(&api),
        Commands::Search {
            query,
            country,
            route,
            product_type,
            user,
            limit,
            json,
        } => {
            let body = serde_json::json!({
                "query": query,
                "country": country,
                "route": route,
                "productType": product_type,
                "userId": user,
                "limit": limit,
            });
            do_search(&api, &query, body, json)
        }
    });

    if let Err(e) = result {
        eprintln!("tradecrew-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // TEST 1: stats output lists every count
    // ========================================================================
    #[test]
    fn test_format_stats() {
        let stats: MemoryStats = serde_json::from_value(serde_json::json!({
            "quotesTotal": 12,
            "quotesActive": 7,
            "quotesDeprecated": 5,
            "quotesExpiredPending": 2,
            "knowledgeTotal": 4,
            "knowledgeActive": 3,
            "conversations": 9,
            "relations": 21
        }))
        .unwrap();

        let out = format_stats(&stats);
        assert!(out.contains("12 total, 7 active, 5 deprecated"));
        assert!(out.contains("Expired (pending prune): 2"));
        assert!(out.contains("Relations:     21"));
    }

    // ========================================================================
    // TEST 2: a disabled queue is reported as such
    // ========================================================================
    #[test]
    fn test_format_queue_stats_unavailable() {
        let stats = QueueStats::default();
        assert_eq!(
            format_queue_stats(&stats),
            "Queue: unavailable (jobs run synchronously)"
        );

        let stats = QueueStats {
            available: true,
            waiting: 3,
            failed: 1,
            ..Default::default()
        };
        let out = format_queue_stats(&stats);
        assert!(out.contains("Waiting:   3"));
        assert!(out.contains("Failed:    1"));
    }

    // ========================================================================
    // TEST 3: hybrid output prints the context, or a no-results line
    // ========================================================================
    #[test]
    fn test_format_hybrid() {
        let resp: HybridResponse = serde_json::from_value(serde_json::json!({
            "factual": [{"id": "q1"}],
            "semantic": [],
            "graph": [],
            "user": [],
            "context": "## Supplier quotes\n- LED strip"
        }))
        .unwrap();
        let out = format_hybrid("led", &resp);
        assert!(out.starts_with("1 quotes, 0 knowledge"));
        assert!(out.ends_with("## Supplier quotes\n- LED strip"));

        let empty = HybridResponse::default();
        assert!(format_hybrid("nothing", &empty).contains("No results found for: nothing"));
    }

    // ========================================================================
    // TEST 4: blank tokens are not sent
    // ========================================================================
    #[test]
    fn test_api_drops_blank_token() {
        let api = Api::new("http://localhost:3001/", Some("  ".to_string())).unwrap();
        assert!(api.token.is_none());
        assert_eq!(api.server, "http://localhost:3001");
    }
}
