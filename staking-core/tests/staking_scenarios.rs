//! End-to-end staking scenarios with signed transactions
//!
//! Exercises the full path a host drives: wire parsing, ed25519
//! authorization, atomic execution, and end-of-block maturity.

use staking_core::{
    AccountKind, ChainContext, Config, Input, InputSource, KeyPair, Output, OutputTarget, Rejection,
    Staking, StakingState, Transaction, ValidatorId,
};

const PERIOD: u64 = 50;

fn staking() -> Staking {
    Staking::new(Config {
        unbonding_period: PERIOD,
        ..Config::default()
    })
    .unwrap()
}

fn validator() -> ValidatorId {
    ValidatorId::new("A1B2C3")
}

fn signed_bond(keypair: &KeyPair, sequence: u64, amount: u64) -> Transaction {
    let address = keypair.address();
    let mut tx = Transaction {
        inputs: vec![Input {
            source: InputSource::Unbonded,
            kind: AccountKind::Ed25519,
            address: address.clone(),
            amount,
            sequence,
            pubkey: vec![],
            signature: vec![],
        }],
        outputs: vec![Output {
            target: OutputTarget::Bond {
                validator: validator(),
            },
            kind: AccountKind::Ed25519,
            address,
            amount,
        }],
    };
    keypair.sign_transaction(&mut tx).unwrap();
    tx
}

fn signed_unbond(keypair: &KeyPair, sequence: u64, amount: u64) -> Transaction {
    let address = keypair.address();
    let mut tx = Transaction {
        inputs: vec![Input {
            source: InputSource::Bonded {
                validator: validator(),
            },
            kind: AccountKind::Ed25519,
            address: address.clone(),
            amount,
            sequence,
            pubkey: vec![],
            signature: vec![],
        }],
        outputs: vec![Output {
            target: OutputTarget::Unbond {
                validator: validator(),
            },
            kind: AccountKind::Ed25519,
            address,
            amount,
        }],
    };
    keypair.sign_transaction(&mut tx).unwrap();
    tx
}

#[test]
fn test_signed_bond_and_unbond_lifecycle() {
    let staking = staking();
    let delegator = KeyPair::from_seed(&[7u8; 32]);
    let mut state = StakingState::from_genesis([(delegator.address(), 1_000_000)]).unwrap();
    let mut chain = ChainContext::new(100);

    staking
        .execute_transaction(&signed_bond(&delegator, 0, 1_000_000), &mut state, &mut chain)
        .unwrap();
    assert_eq!(chain.validators.get(&validator()), 1_000_000);

    chain.height = 120;
    staking
        .execute_transaction(&signed_unbond(&delegator, 0, 400_000), &mut state, &mut chain)
        .unwrap();
    assert_eq!(chain.validators.get(&validator()), 600_000);
    assert_eq!(state.unbonding.front().unwrap().maturity_height, 120 + PERIOD);

    // Nothing moves until maturity
    for height in 121..120 + PERIOD {
        chain.height = height;
        assert!(staking.on_block(&mut state, &chain).unwrap().is_empty());
    }

    chain.height = 120 + PERIOD;
    let payouts = staking.on_block(&mut state, &chain).unwrap();
    assert_eq!(payouts.len(), 1);
    assert_eq!(state.unbonded.balance(&delegator.address()), 400_000);

    let pool = state.bonded.get(&validator()).unwrap();
    assert_eq!((pool.balance, pool.shares), (600_000, 600_000));
    assert_eq!(chain.validators.get(&validator()), pool.balance);
}

#[test]
fn test_replayed_bond_is_rejected() {
    let staking = staking();
    let delegator = KeyPair::from_seed(&[7u8; 32]);
    let mut state = StakingState::from_genesis([(delegator.address(), 1_000)]).unwrap();
    let mut chain = ChainContext::new(1);

    let tx = signed_bond(&delegator, 0, 100);
    staking.execute_transaction(&tx, &mut state, &mut chain).unwrap();

    let err = staking
        .execute_transaction(&tx, &mut state, &mut chain)
        .unwrap_err();
    assert!(matches!(err, Rejection::InvalidSequence { expected: 1, actual: 0, .. }));
    assert_eq!(state.unbonded.balance(&delegator.address()), 900);
}

#[test]
fn test_unbond_signed_by_other_key_is_rejected() {
    let staking = staking();
    let delegator = KeyPair::from_seed(&[7u8; 32]);
    let thief = KeyPair::from_seed(&[8u8; 32]);
    let mut state = StakingState::from_genesis([(delegator.address(), 1_000)]).unwrap();
    let mut chain = ChainContext::new(1);
    staking
        .execute_transaction(&signed_bond(&delegator, 0, 1_000), &mut state, &mut chain)
        .unwrap();

    // thief tries to withdraw the delegator's stake to the delegator's own address
    let mut tx = signed_unbond(&delegator, 0, 500);
    tx.inputs[0].pubkey = thief.public_key().to_vec();
    let sighash = tx.sighash().unwrap();
    tx.inputs[0].signature = thief.sign(&sighash).to_vec();

    let before = state.clone();
    let err = staking
        .execute_transaction(&tx, &mut state, &mut chain)
        .unwrap_err();
    assert_eq!(err.code(), 4);
    assert_eq!(state, before);
    assert_eq!(chain.validators.get(&validator()), 1_000);
}

#[test]
fn test_wire_transaction_round() {
    let staking = staking();
    let delegator = KeyPair::from_seed(&[9u8; 32]);
    let mut state = StakingState::from_genesis([(delegator.address(), 5_000)]).unwrap();
    let mut chain = ChainContext::new(1);

    let signed = signed_bond(&delegator, 0, 2_500);
    let json = format!(
        r#"{{
            "inputs": [{{"type": "ed25519", "amount": 2500, "address": "{address}",
                         "sequence": 0, "pubkey": "{pubkey}", "signature": "{signature}",
                         "unbonded": true}}],
            "outputs": [{{"type": "ed25519", "amount": 2500, "address": "{address}",
                          "validatorPubkey": "A1B2C3", "bond": true}}]
        }}"#,
        address = delegator.address(),
        pubkey = hex::encode(&signed.inputs[0].pubkey),
        signature = hex::encode(&signed.inputs[0].signature),
    );

    let tx = Transaction::from_json(json.as_bytes()).unwrap();
    assert_eq!(tx, signed);
    staking.execute_transaction(&tx, &mut state, &mut chain).unwrap();

    let pool = state.bonded.get(&ValidatorId::new("a1b2c3")).unwrap();
    assert_eq!(pool.delegators.balance(&delegator.address()), 2_500);
}

#[test]
fn test_multiple_validators_keep_voting_power_separate() {
    let staking = staking();
    let alice = KeyPair::from_seed(&[1u8; 32]);
    let mut state = StakingState::from_genesis([(alice.address(), 3_000)]).unwrap();
    let mut chain = ChainContext::new(1);
    let v2 = ValidatorId::new("ffee");

    let mut tx = signed_bond(&alice, 0, 3_000);
    tx.outputs[0].amount = 1_000;
    tx.outputs.push(Output {
        target: OutputTarget::Bond {
            validator: v2.clone(),
        },
        kind: AccountKind::Ed25519,
        address: alice.address(),
        amount: 2_000,
    });
    alice.sign_transaction(&mut tx).unwrap();
    staking.execute_transaction(&tx, &mut state, &mut chain).unwrap();

    assert_eq!(chain.validators.get(&validator()), 1_000);
    assert_eq!(chain.validators.get(&v2), 2_000);
    for (id, pool) in state.bonded.iter() {
        assert_eq!(chain.validators.get(id), pool.balance);
    }
    assert_eq!(state.total_value(), 3_000);
    assert_eq!(state.unbonded.balance(&alice.address()), 0);
}

#[test]
fn test_state_root_is_deterministic_across_replicas() {
    let delegator = KeyPair::from_seed(&[3u8; 32]);
    let run = || {
        let staking = staking();
        let mut state = StakingState::from_genesis([(delegator.address(), 10_000)]).unwrap();
        let mut chain = ChainContext::new(1);
        staking
            .execute_transaction(&signed_bond(&delegator, 0, 7_000), &mut state, &mut chain)
            .unwrap();
        staking
            .execute_transaction(&signed_unbond(&delegator, 0, 3_000), &mut state, &mut chain)
            .unwrap();
        chain.height += PERIOD;
        staking.on_block(&mut state, &chain).unwrap();
        state.state_root().unwrap()
    };

    assert_eq!(run(), run());
}

#[test]
fn test_dust_unbond_after_reward_keeps_voting_power() {
    let staking = staking();
    let delegator = KeyPair::from_seed(&[5u8; 32]);
    let mut state = StakingState::from_genesis([(delegator.address(), 1_000)]).unwrap();
    let mut chain = ChainContext::new(1);
    staking
        .execute_transaction(&signed_bond(&delegator, 0, 1_000), &mut state, &mut chain)
        .unwrap();
    state
        .bonded
        .apply_reward(&validator(), 1_000, &mut chain.validators)
        .unwrap();

    for _ in 0..10 {
        let err = staking
            .execute_transaction(&signed_unbond(&delegator, 0, 1), &mut state, &mut chain)
            .unwrap_err();
        assert_eq!(err.code(), 1);
    }
    assert!(state.unbonding.is_empty());

    chain.height += PERIOD;
    staking.on_block(&mut state, &chain).unwrap();
    let pool = state.bonded.get(&validator()).unwrap();
    assert_eq!(chain.validators.get(&validator()), pool.balance);
    assert_eq!(pool.balance, 2_000);
}
