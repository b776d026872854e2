//! Agent CLI: one process per tenant instance, configured via `JWT_SECRET`
//! and `PROXY_URL` (spec.md §6) plus the pinned CA and method arguments on
//! the command line. Mirrors the subcommand-per-operation shape of the
//! teacher's `node/src/cli.rs`.

use std::path::PathBuf;

use anyhow::Context;
use argh::FromArgs;
use gwclient::{AgentConfig, TokenCache, Transport};
use serde_json::{json, Value};

/// Call the gateway as a single tenant agent.
#[derive(FromArgs)]
pub struct Args {
    /// this agent's tenant identifier
    #[argh(option)]
    pub tenant: String,

    /// the backend target to call, e.g. `a` for `/mcp/a`
    #[argh(option)]
    pub target: String,

    /// path to the single pinned root certificate (PEM)
    #[argh(option)]
    pub ca_cert: PathBuf,

    /// fall back to system trust anchors if `--ca-cert` can't be loaded.
    /// Defaults to false -- spec.md §4.2's strict posture.
    #[argh(switch)]
    pub allow_system_trust_fallback: bool,

    /// load `JWT_SECRET` and `PROXY_URL` from a `.env` file first; local
    /// development only
    #[argh(switch)]
    pub dotenv: bool,

    #[argh(subcommand)]
    pub method: Method,
}

#[derive(FromArgs)]
#[argh(subcommand)]
pub enum Method {
    Insert(InsertArgs),
    Update(UpdateArgs),
    Select(SelectArgs),
}

/// `insert(name, value)`
#[derive(FromArgs)]
#[argh(subcommand, name = "insert")]
pub struct InsertArgs {
    #[argh(positional)]
    pub name: String,
    #[argh(positional)]
    pub value: String,
}

/// `update(id, value)`
#[derive(FromArgs)]
#[argh(subcommand, name = "update")]
pub struct UpdateArgs {
    #[argh(positional)]
    pub id: u64,
    #[argh(positional)]
    pub value: String,
}

/// `select()` or `select(id)`
#[derive(FromArgs)]
#[argh(subcommand, name = "select")]
pub struct SelectArgs {
    #[argh(positional)]
    pub id: Option<u64>,
}

impl Method {
    fn into_wire(self) -> (&'static str, Value) {
        match self {
            Method::Insert(args) => {
                ("insert", json!({ "name": args.name, "value": args.value }))
            }
            Method::Update(args) => {
                ("update", json!({ "id": args.id, "value": args.value }))
            }
            Method::Select(args) => match args.id {
                Some(id) => ("select", json!({ "id": id })),
                None => ("select", json!({})),
            },
        }
    }
}

impl Args {
    pub fn run(self) -> anyhow::Result<()> {
        if self.dotenv {
            let _ = dotenvy::dotenv();
        }

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        rt.block_on(self.call())
    }

    async fn call(self) -> anyhow::Result<()> {
        let config = AgentConfig::from_env(
            self.tenant.clone(),
            self.target.clone(),
            self.ca_cert.clone(),
            self.allow_system_trust_fallback,
        )
        .context("failed to load agent configuration from the environment")?;

        let root_cert_pem = std::fs::read(&config.ca_path)
            .with_context(|| format!("failed to read {}", config.ca_path.display()))?;
        let client = Transport::build_pinned_client(
            &root_cert_pem,
            config.allow_system_trust_fallback,
        )
        .context("failed to build pinned TLS client")?;

        let token_cache = TokenCache::new(config.tenant, config.jwt_secret);
        let transport =
            Transport::new(client, config.proxy_url, config.target, token_cache);

        let (method, params) = self.method.into_wire();
        let result = transport
            .send(method, params)
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;

        println!("{}", serde_json::to_string_pretty(&result)?);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn insert_maps_to_worker_wire_shape() {
        let (method, params) = Method::Insert(InsertArgs {
            name: "n".to_owned(),
            value: "v".to_owned(),
        })
        .into_wire();
        assert_eq!(method, "insert");
        assert_eq!(params, json!({"name": "n", "value": "v"}));
    }

    #[test]
    fn select_without_id_omits_it() {
        let (method, params) = Method::Select(SelectArgs { id: None }).into_wire();
        assert_eq!(method, "select");
        assert_eq!(params, json!({}));
    }

    #[test]
    fn select_with_id_includes_it() {
        let (method, params) = Method::Select(SelectArgs { id: Some(7) }).into_wire();
        assert_eq!(method, "select");
        assert_eq!(params, json!({"id": 7}));
    }

    #[test]
    fn update_maps_to_worker_wire_shape() {
        let (method, params) = Method::Update(UpdateArgs {
            id: 3,
            value: "v2".to_owned(),
        })
        .into_wire();
        assert_eq!(method, "update");
        assert_eq!(params, json!({"id": 3, "value": "v2"}));
    }
}
