//! SQLite Node - example node answering query requests.
//!
//! This example demonstrates:
//! - Declaring input and output attributes
//! - Required-input validation (an empty input gets `error = "empty"`)
//! - Driving the request loop with a `NodeHandler`
//!
//! # Running
//!
//! The host spawns the node with its identity and port:
//!
//! ```text
//! sqlite_node <uid> <port>
//! ```

use clap::Parser;
use skyalt_node::handler::{HandlerResult, NodeHandler};
use skyalt_node::runtime::build_runtime;
use skyalt_node::{AttrId, AttributeRegistry, NodeClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Example SkyAlt node.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Identity assigned by the host
    uid: String,

    /// Port the host listens on
    port: String,
}

/// Runs `query` against the database in `file` and returns `rows`.
struct QueryNode {
    file: AttrId,
    query: AttrId,
    rows: AttrId,
}

impl NodeHandler for QueryNode {
    fn required_inputs(&self) -> Vec<AttrId> {
        vec![self.file, self.query]
    }

    fn process(&mut self, attrs: &mut AttributeRegistry) -> HandlerResult {
        tracing::info!(
            "Query {:?} on {:?}",
            attrs[self.query].value,
            attrs[self.file].value
        );

        // TODO: open the SQLite file and execute the query
        let rows = serde_json::json!([{}, {}]);
        attrs[self.rows].value = rows.to_string();
        Ok(())
    }
}

async fn serve(cli: Cli) -> skyalt_node::Result<()> {
    let mut client: NodeClient = NodeClient::new();
    let mut node = QueryNode {
        file: client.add_attr("file", ""),
        query: client.add_attr("query", ""),
        rows: client.add_output("rows", "[]"),
    };

    client.start(&cli.uid, &cli.port).await?;
    let result = client.run(&mut node).await;
    client.close().await;
    result
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(_) => {
            println!("Need 2 arguments: uid, port");
            std::process::exit(-1);
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let rt = match build_runtime() {
        Ok(rt) => rt,
        Err(e) => {
            println!("Runtime setup failed: {}", e);
            std::process::exit(-1);
        }
    };

    if let Err(e) = rt.block_on(serve(cli)) {
        tracing::error!("Node stopped: {}", e);
        std::process::exit(1);
    }
}
