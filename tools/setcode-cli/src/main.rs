use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use setcode_encoder::{
    assemble, authorization::authorization_rlp, authorization_signing_hash, build_authorization,
    convert::encode_hex, Account, Assembled, BuildFlow, BuildStatus, NetworkCapabilities, Plan,
    TxCall, TxFields,
};
use setcode_types::{CallStep, ChainScope};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod output;

use config::{load_networks, select_network, NetworkConfig};

/// Build EIP-7702 authorizations and relayed set-code transactions offline.
///
/// Output is JSON on stdout; logs go to stderr (`RUST_LOG` overrides the `info` default).
/// Nothing is broadcast: feed `raw` to `eth_sendRawTransaction` yourself.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// JSON file with network presets (array of `{name, chain_id, delegate, ...}`).
    #[arg(long, env = "SETCODE_NETWORKS", global = true)]
    networks: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign an authorization tuple.
    Authorize(AuthorizeArgs),
    /// Compile a call plan into delegate call data.
    Plan(PlanArgs),
    /// Sign an authorization and wrap it in a relayed set-code transaction.
    Transaction(TransactionArgs),
}

#[derive(Args, Debug)]
struct NetworkArgs {
    /// Network name or chain id.
    #[arg(long, default_value = "sepolia")]
    network: String,

    /// Delegate contract; defaults to the network's configured delegate.
    #[arg(long)]
    delegate: Option<String>,

    /// Sign for every chain (chain id 0) instead of the selected network only.
    #[arg(long)]
    any_chain: bool,
}

#[derive(Args, Debug)]
struct AuthorityKeyArgs {
    /// Private key of the account being delegated (hex string, 0x...).
    #[arg(long, env = "AUTHORITY_KEY", hide_env_values = true, conflicts_with = "authority_key_path")]
    authority_key: Option<String>,

    /// Path to a file containing the authority private key.
    #[arg(long, env = "AUTHORITY_KEY_PATH", conflicts_with = "authority_key")]
    authority_key_path: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct AuthorizeArgs {
    #[command(flatten)]
    network: NetworkArgs,

    #[command(flatten)]
    key: AuthorityKeyArgs,

    /// Current transaction count of the authority.
    #[arg(long)]
    nonce: u64,
}

#[derive(Args, Debug)]
struct PlanArgs {
    #[command(flatten)]
    network: NetworkArgs,

    /// JSON array of call steps.
    #[arg(long)]
    plan: PathBuf,
}

#[derive(Args, Debug)]
struct TransactionArgs {
    #[command(flatten)]
    network: NetworkArgs,

    #[command(flatten)]
    key: AuthorityKeyArgs,

    /// Private key of the account paying for the transaction; defaults to the authority.
    #[arg(long, env = "RELAYER_KEY", hide_env_values = true, conflicts_with = "relayer_key_path")]
    relayer_key: Option<String>,

    /// Path to a file containing the relayer private key.
    #[arg(long, env = "RELAYER_KEY_PATH", conflicts_with = "relayer_key")]
    relayer_key_path: Option<PathBuf>,

    /// Transaction count of the relayer.
    #[arg(long)]
    tx_nonce: u64,

    /// Transaction count of the authority. Required unless the authority relays for itself,
    /// in which case it is `tx_nonce + 1`.
    #[arg(long)]
    auth_nonce: Option<u64>,

    /// Optional JSON array of call steps to run after delegation.
    #[arg(long)]
    plan: Option<PathBuf>,

    /// Also write the result (with a `built_at` timestamp) to this file.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    let networks = load_networks(cli.networks.as_deref())?;

    match cli.command {
        Command::Authorize(args) => output::emit(authorize(&args, &networks)?, None),
        Command::Plan(args) => output::emit(plan(&args, &networks)?, None),
        Command::Transaction(args) => {
            let result = transaction(&args, &networks)?;
            output::emit(result, args.out.as_deref())
        }
    }
}

fn authorize(args: &AuthorizeArgs, networks: &[NetworkConfig]) -> Result<Value> {
    let network = select_network(networks, &args.network.network)?;
    let delegate = resolve_delegate(&args.network, &network)?;
    let authority = load_key(
        args.key.authority_key.as_deref(),
        args.key.authority_key_path.as_deref(),
        "authority",
    )?;

    let auth = build_authorization(&authority, scope(&args.network, &network), &delegate, args.nonce)
        .context("failed building authorization")?;
    let hash = authorization_signing_hash(&auth.inner)?;
    let rlp = authorization_rlp(&auth.inner)?;
    info!(authority = %authority.address(), network = %network.name, "authorization signed");

    Ok(json!({
        "network": network.name,
        "authority": authority.address(),
        "rlp": encode_hex(rlp),
        "signingHash": hash,
        "authorization": auth,
    }))
}

fn plan(args: &PlanArgs, networks: &[NetworkConfig]) -> Result<Value> {
    let network = select_network(networks, &args.network.network)?;
    let delegate = resolve_delegate(&args.network, &network)?;
    let plan = read_plan(&args.plan)?;
    let compiled = plan
        .compile(delegate.parse().context("invalid delegate address")?)
        .context("invalid call plan")?;

    Ok(json!({
        "data": compiled.data,
        "value": compiled.value.to_string(),
        "steps": compiled.steps,
        "kinds": plan.enabled_kinds().iter().map(ToString::to_string).collect::<Vec<_>>(),
    }))
}

fn transaction(args: &TransactionArgs, networks: &[NetworkConfig]) -> Result<Value> {
    let mut flow = BuildFlow::new();
    let result = build_signed(args, networks, &mut flow);
    if let Err(err) = &result {
        flow.fail(format!("{err:#}"));
        warn!(path = ?flow.history(), "transaction build failed");
    }
    result
}

fn build_signed(
    args: &TransactionArgs,
    networks: &[NetworkConfig],
    flow: &mut BuildFlow,
) -> Result<Value> {
    flow.transition(BuildStatus::Validating)?;
    let network = select_network(networks, &args.network.network)?;
    let delegate = resolve_delegate(&args.network, &network)?;
    let plan = args.plan.as_deref().map(read_plan).transpose()?;
    let compiled = match &plan {
        Some(plan) => plan
            .compile(delegate.parse().context("invalid delegate address")?)
            .context("invalid call plan")?,
        None => Default::default(),
    };

    let authority = load_key(
        args.key.authority_key.as_deref(),
        args.key.authority_key_path.as_deref(),
        "authority",
    )?;
    let relayer = match (args.relayer_key.as_deref(), args.relayer_key_path.as_deref()) {
        (None, None) => None,
        (inline, path) => Some(load_key(inline, path, "relayer")?),
    };
    let sender = relayer.as_ref().unwrap_or(&authority);
    let auth_nonce = match args.auth_nonce {
        Some(nonce) => nonce,
        None if sender.address() == authority.address() => args
            .tx_nonce
            .checked_add(1)
            .ok_or_else(|| anyhow!("tx nonce {} has no successor", args.tx_nonce))?,
        None => return Err(anyhow!("--auth-nonce is required when a separate relayer pays")),
    };

    flow.transition(BuildStatus::Signing)?;
    let auth = build_authorization(&authority, scope(&args.network, &network), &delegate, auth_nonce)
        .context("failed building authorization")?;
    let fees = network.fees();
    let fields = TxFields {
        chain_id: network.chain_id,
        nonce: args.tx_nonce,
        max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
        max_fee_per_gas: fees.max_fee_per_gas,
        gas_limit: fees.gas_limit,
        access_list: Vec::new(),
    };
    let call = TxCall::with_plan(authority.address(), auth.address(), compiled);
    let assembled = assemble(
        NetworkCapabilities { supports_set_code: network.supports_set_code },
        sender,
        fields,
        &call,
        vec![auth],
    )
    .context("failed assembling transaction")?;
    let raw = assembled.encode()?;
    let hash = assembled.tx_hash()?;
    flow.transition(BuildStatus::Succeeded)?;

    let (tx_type, to, value, data) = match &assembled {
        Assembled::SetCode(tx) => ("0x04", tx.to, tx.value, tx.data.clone()),
        Assembled::Fallback { transfer, .. } => {
            ("0x02", transfer.to, transfer.value, transfer.data.clone())
        }
    };
    info!(%hash, tx_type, sender = %sender.address(), "transaction built");

    Ok(json!({
        "network": network.name,
        "chainId": network.chain_id,
        "type": tx_type,
        "authority": authority.address(),
        "sender": sender.address(),
        "nonce": args.tx_nonce,
        "to": to,
        "value": value.to_string(),
        "data": data,
        "authorization": auth,
        "raw": raw,
        "hash": hash,
        "fallback": assembled.fallback_reason(),
        "status": flow.status().as_str(),
    }))
}

fn scope(args: &NetworkArgs, network: &NetworkConfig) -> ChainScope {
    if args.any_chain {
        ChainScope::AnyChain
    } else {
        ChainScope::Chain(network.chain_id)
    }
}

fn resolve_delegate(args: &NetworkArgs, network: &NetworkConfig) -> Result<String> {
    match (&args.delegate, network.delegate) {
        (Some(flag), _) => Ok(flag.clone()),
        (None, Some(configured)) => Ok(configured.to_string()),
        (None, None) => Err(anyhow!(
            "no delegate configured for {}: pass --delegate or add one to the networks file",
            network.name
        )),
    }
}

fn load_key(inline: Option<&str>, path: Option<&Path>, role: &str) -> Result<Account> {
    let hex = match (inline, path) {
        (Some(key), _) => key.trim().to_string(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("failed reading {role} key file {}", path.display()))?
            .trim()
            .to_string(),
        (None, None) => {
            let upper = role.to_uppercase();
            return Err(anyhow!(
                "missing {role} key: provide --{role}-key or --{role}-key-path (or set {upper}_KEY/{upper}_KEY_PATH)"
            ));
        }
    };
    Account::from_hex(&hex).with_context(|| format!("invalid {role} key"))
}

fn read_plan(path: &Path) -> Result<Plan> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading plan {}", path.display()))?;
    let steps: Vec<CallStep> = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing plan {}", path.display()))?;
    Ok(Plan::from_steps(steps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use setcode_encoder::{FallbackTransfer, TransactionEnvelope};
    use std::io::Write;

    const RELAYER: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const AUTHORITY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
    const DELEGATE: &str = "0x63c0c19a282a1b52b07dd5a65b58948a07dae32b";

    fn network_args(network: &str) -> NetworkArgs {
        NetworkArgs { network: network.to_string(), delegate: Some(DELEGATE.to_string()), any_chain: false }
    }

    fn key_args(key: &str) -> AuthorityKeyArgs {
        AuthorityKeyArgs { authority_key: Some(key.to_string()), authority_key_path: None }
    }

    fn transaction_args(network: &str) -> TransactionArgs {
        TransactionArgs {
            network: network_args(network),
            key: key_args(AUTHORITY),
            relayer_key: Some(RELAYER.to_string()),
            relayer_key_path: None,
            tx_nonce: 5,
            auth_nonce: Some(2),
            plan: None,
            out: None,
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn key_flags_conflict() {
        let err = Cli::try_parse_from([
            "setcode",
            "authorize",
            "--nonce",
            "0",
            "--authority-key",
            AUTHORITY,
            "--authority-key-path",
            "key.txt",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn authorize_emits_signed_tuple() {
        let args = AuthorizeArgs { network: network_args("bsc"), key: key_args(AUTHORITY), nonce: 3 };
        let value = authorize(&args, &config::builtin_networks()).unwrap();
        assert_eq!(value["network"], "bsc");
        assert_eq!(value["authorization"]["chainId"], 56);
        assert_eq!(value["authorization"]["nonce"], 3);
        assert!(value["rlp"].as_str().unwrap().starts_with("0xd738"));
    }

    #[test]
    fn missing_delegate_is_reported() {
        let mut args = AuthorizeArgs { network: network_args("bsc"), key: key_args(AUTHORITY), nonce: 0 };
        args.network.delegate = None;
        let err = authorize(&args, &config::builtin_networks()).unwrap_err();
        assert!(err.to_string().contains("no delegate configured"));
    }

    #[test]
    fn plan_file_compiles() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"kind":"SweepNative","target":"0x1111111111111111111111111111111111111111"}},
                {{"kind":"SendValue","target":"0x1111111111111111111111111111111111111111","amount":"0x64"}}]"#
        )
        .unwrap();
        let args = PlanArgs { network: network_args("sepolia"), plan: file.path().to_path_buf() };
        let value = plan(&args, &config::builtin_networks()).unwrap();
        assert_eq!(value["steps"], 2);
        assert_eq!(value["value"], "100");
    }

    #[test]
    fn transaction_builds_relayed_envelope() {
        let value = transaction(&transaction_args("sepolia"), &config::builtin_networks()).unwrap();
        assert_eq!(value["type"], "0x04");
        assert_eq!(value["status"], "succeeded");
        assert!(value["fallback"].is_null());

        let raw: alloy_primitives::Bytes = serde_json::from_value(value["raw"].clone()).unwrap();
        let envelope = TransactionEnvelope::decode(&raw).unwrap();
        assert_eq!(envelope.nonce, 5);
        assert_eq!(envelope.chain_id, 11_155_111);
        assert_eq!(envelope.authorization_list[0].nonce(), 2);
        assert_eq!(
            envelope.recover_sender().unwrap(),
            Account::from_hex(RELAYER).unwrap().address()
        );
    }

    #[test]
    fn transaction_uses_network_fees() {
        let mut networks = config::builtin_networks();
        networks[1].max_fee_per_gas = 42_000_000_000;
        networks[1].max_priority_fee_per_gas = 3_000_000_000;
        networks[1].gas_limit = 250_000;
        let fees = networks[1].fees();

        let value = transaction(&transaction_args(&networks[1].name), &networks).unwrap();
        let raw: alloy_primitives::Bytes = serde_json::from_value(value["raw"].clone()).unwrap();
        let envelope = TransactionEnvelope::decode(&raw).unwrap();
        assert_eq!(envelope.max_fee_per_gas, fees.max_fee_per_gas);
        assert_eq!(envelope.max_priority_fee_per_gas, fees.max_priority_fee_per_gas);
        assert_eq!(envelope.gas_limit, fees.gas_limit);
    }

    #[test]
    fn self_relayed_transaction_bumps_authorization_nonce() {
        let mut args = transaction_args("sepolia");
        args.relayer_key = None;
        args.auth_nonce = None;
        let value = transaction(&args, &config::builtin_networks()).unwrap();
        assert_eq!(value["authorization"]["nonce"], 6);

        args.relayer_key = Some(RELAYER.to_string());
        assert!(transaction(&args, &config::builtin_networks()).is_err());
    }

    #[test]
    fn unsupported_network_falls_back_visibly() {
        let mut networks = config::builtin_networks();
        networks[0].supports_set_code = false;
        let name = networks[0].name.clone();

        let value = transaction(&transaction_args(&name), &networks).unwrap();
        assert_eq!(value["type"], "0x02");
        assert!(value["fallback"].as_str().unwrap().contains("does not accept"));
        let raw: alloy_primitives::Bytes = serde_json::from_value(value["raw"].clone()).unwrap();
        assert!(FallbackTransfer::decode(&raw).is_ok());
    }
}
