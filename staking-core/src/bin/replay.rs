//! Staking replay binary
//!
//! Replays a JSON block log against a snapshot and prints the resulting
//! snapshot and its state root.
//!
//! ```text
//! staking-replay <snapshot.json> <blocks.json>
//! ```

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use staking_core::{ChainContext, Config, Staking, StakingState, Transaction, VotingPowerTable};
use tracing::{info, info_span, warn};

/// Chain view plus staking state
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    height: u64,
    #[serde(default)]
    validators: VotingPowerTable,
    #[serde(default)]
    state: StakingState,
}

/// One block of wire transactions
#[derive(Debug, Deserialize)]
struct BlockLog {
    height: u64,
    #[serde(default)]
    txs: Vec<serde_json::Value>,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let usage = "usage: staking-replay <snapshot.json> <blocks.json>";
    let snapshot_path = args.next().context(usage)?;
    let blocks_path = args.next().context(usage)?;

    // Load configuration
    let config = if let Ok(config_path) = std::env::var("STAKING_CONFIG") {
        info!("Loading config from: {}", config_path);
        Config::from_file(&config_path)?
    } else {
        Config::from_env()?
    };
    let span = info_span!("replay", service = %config.service_name);
    let _guard = span.enter();
    info!(unbonding_period = config.unbonding_period, "Starting staking replay");

    let staking = Staking::new(config)?;

    let snapshot: Snapshot = serde_json::from_str(
        &std::fs::read_to_string(&snapshot_path)
            .with_context(|| format!("reading {}", snapshot_path))?,
    )
    .with_context(|| format!("parsing {}", snapshot_path))?;
    let blocks: Vec<BlockLog> = serde_json::from_str(
        &std::fs::read_to_string(&blocks_path)
            .with_context(|| format!("reading {}", blocks_path))?,
    )
    .with_context(|| format!("parsing {}", blocks_path))?;

    let mut chain = ChainContext {
        height: snapshot.height,
        validators: snapshot.validators,
    };
    let mut state = snapshot.state;

    for block in blocks {
        if block.height < chain.height {
            bail!(
                "block height {} is behind chain height {}",
                block.height,
                chain.height
            );
        }
        chain.height = block.height;

        let mut committed = 0usize;
        for raw in &block.txs {
            let bytes = serde_json::to_vec(raw)?;
            let result = Transaction::from_json(&bytes)
                .and_then(|tx| staking.execute_transaction(&tx, &mut state, &mut chain));
            match result {
                Ok(()) => committed += 1,
                Err(rejection) => warn!(
                    height = chain.height,
                    code = rejection.code(),
                    "skipping transaction: {}",
                    rejection
                ),
            }
        }

        let payouts = staking
            .on_block(&mut state, &chain)
            .with_context(|| format!("processing block {}", chain.height))?;
        info!(
            height = chain.height,
            txs = block.txs.len(),
            committed,
            payouts = payouts.len(),
            "block applied"
        );
    }

    let root = state.state_root()?;
    let snapshot = Snapshot {
        height: chain.height,
        validators: chain.validators,
        state,
    };
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    info!(state_root = %hex::encode(root), "replay finished");

    Ok(())
}
