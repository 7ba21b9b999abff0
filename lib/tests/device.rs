// Copyright (c) 2022-2023 The MobileCoin Foundation

use std::collections::BTreeMap;
use std::time::Duration;

use serde_cbor::Value;

use hw_resolver::{types::*, Connection, Error, Jade};

mod helpers;
use helpers::{mock, response_frame, Reply};

fn version_result(version: &str) -> Value {
    let mut m = BTreeMap::new();
    m.insert(
        Value::Text("JADE_VERSION".into()),
        Value::Text(version.into()),
    );
    m.insert(
        Value::Text("BOARD_TYPE".into()),
        Value::Text("JADE_V1.1".into()),
    );
    m.insert(Value::Text("JADE_HAS_PIN".into()), Value::Bool(true));
    Value::Map(m)
}

fn liquid_tx() -> UnsignedTransaction {
    UnsignedTransaction {
        version: 2,
        inputs: vec![TransactionInput {
            txhash: hex::encode([0xaa; 32]),
            pt_idx: 0,
            sequence: 0xffffffff,
            address_type: AddressType::Csv,
            prevout_script: vec![0x51],
            satoshi: 5000,
            user_path: vec![1, 2],
            confidential: true,
            value_commitment: Some(vec![0x08; 33]),
        }],
        outputs: vec![
            // Fee output stays unblinded
            TransactionOutput {
                satoshi: 100,
                ..Default::default()
            },
            TransactionOutput {
                satoshi: 4900,
                blinding_key: Some(vec![0x02; 33]),
                ..Default::default()
            },
        ],
        ..Default::default()
    }
}

#[tokio::test]
async fn version_info_and_entropy() -> anyhow::Result<()> {
    helpers::setup();

    let (dev, handle) = mock();
    handle.expect("get_version_info", Reply::Result(version_result("0.1.48")));
    handle.expect("add_entropy", Reply::Result(Value::Bool(true)));

    let jade = Jade::new(Connection::new(dev));

    let info = jade.version_info().await?;
    assert_eq!(info.version, "0.1.48");
    assert!(info.has_swap_support());

    jade.add_entropy(vec![0x42; 32]).await?;
    assert_eq!(handle.remaining(), 0);
    Ok(())
}

#[tokio::test]
async fn xpubs_one_round_trip_per_path() -> anyhow::Result<()> {
    helpers::setup();

    let (dev, handle) = mock();
    handle.expect("get_xpub", Reply::Result(Value::Text("tpubFirst".into())));
    handle.expect("get_xpub", Reply::Result(Value::Text("tpubSecond".into())));

    let jade = Jade::new(Connection::new(dev));
    let xpubs = jade
        .xpubs(Network::Testnet, &[vec![], vec![2147483692, 2147483649]])
        .await?;

    assert_eq!(xpubs, vec!["tpubFirst", "tpubSecond"]);
    Ok(())
}

#[tokio::test]
async fn multisig_receive_address() -> anyhow::Result<()> {
    helpers::setup();

    let (dev, handle) = mock();
    handle.expect(
        "get_receive_address",
        Reply::Result(Value::Text("2NFHMw7GbqVQhRZwehdJzowRsZds4mTNZ4x".into())),
    );

    let jade = Jade::new(Connection::new(dev));
    let address = jade
        .receive_address(&ReceiveAddressRequest {
            network: Network::Testnet,
            multisig: true,
            path: vec![1, 245],
            recovery_xpub: None,
            subaccount: Some(0),
            address_type: Some(AddressType::Csv),
            csv_blocks: 25920,
        })
        .await?;

    assert!(address.starts_with("2N"));
    Ok(())
}

#[tokio::test]
async fn singlesig_address_requires_descriptor_variant() {
    helpers::setup();

    let (dev, handle) = mock();
    let jade = Jade::new(Connection::new(dev));

    // Csv has no singlesig descriptor
    let r = jade
        .receive_address(&ReceiveAddressRequest {
            network: Network::Testnet,
            multisig: false,
            path: vec![2147483732, 2147483649, 2147483648, 0, 1],
            recovery_xpub: None,
            subaccount: None,
            address_type: Some(AddressType::Csv),
            csv_blocks: 0,
        })
        .await;

    assert!(matches!(r, Err(Error::InvalidArgument(_))));
    assert_eq!(handle.writes(), 0);
}

fn reversed(v: &[u8]) -> Vec<u8> {
    v.iter().rev().copied().collect()
}

#[tokio::test]
async fn blinding_factors_combined_call() -> anyhow::Result<()> {
    helpers::setup();

    let (dev, handle) = mock();
    handle.expect("get_version_info", Reply::Result(version_result("0.1.48")));

    // The device answers in its own byte order; the session expects the
    // blinders reversed
    let abf_dev: Vec<u8> = (0x00..0x20).collect();
    let vbf_dev: Vec<u8> = (0x40..0x60).collect();
    let mut both = abf_dev.clone();
    both.extend_from_slice(&vbf_dev);
    handle.expect("get_blinding_factor", Reply::Result(Value::Bytes(both)));

    let jade = Jade::new(Connection::new(dev));
    let factors = jade.blinding_factors(&liquid_tx()).await?;

    assert_eq!(factors.asset_blinders, vec![vec![], reversed(&abf_dev)]);
    assert_eq!(factors.amount_blinders, vec![vec![], reversed(&vbf_dev)]);
    Ok(())
}

#[tokio::test]
async fn blinding_factors_split_on_old_firmware() -> anyhow::Result<()> {
    helpers::setup();

    let (dev, handle) = mock();
    handle.expect("get_version_info", Reply::Result(version_result("0.1.47")));

    let abf_dev: Vec<u8> = (0x00..0x20).collect();
    let vbf_dev: Vec<u8> = (0x40..0x60).collect();
    handle.expect(
        "get_blinding_factor",
        Reply::Result(Value::Bytes(abf_dev.clone())),
    );
    handle.expect(
        "get_blinding_factor",
        Reply::Result(Value::Bytes(vbf_dev.clone())),
    );

    let jade = Jade::new(Connection::new(dev));
    let factors = jade.blinding_factors(&liquid_tx()).await?;

    assert_eq!(factors.asset_blinders[1], reversed(&abf_dev));
    assert_eq!(factors.amount_blinders[1], reversed(&vbf_dev));
    Ok(())
}

#[tokio::test]
async fn master_blinding_key_fetch() -> anyhow::Result<()> {
    helpers::setup();

    let (dev, handle) = mock();
    handle.expect(
        "get_master_blinding_key",
        Reply::Result(Value::Bytes(vec![0x5e; 32])),
    );

    let jade = Jade::new(Connection::new(dev));
    let key = jade.master_blinding_key(false).await?;
    assert_eq!(key, vec![0x5e; 32]);
    Ok(())
}

#[tokio::test]
async fn cancellation_discards_the_late_frame() -> anyhow::Result<()> {
    helpers::setup();

    let (dev, handle) = mock();
    // First request goes unanswered until after cancellation
    handle.expect("sign_message", Reply::Silence);

    let jade = Jade::new(Connection::new(dev));
    let token = jade.cancel_token();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
    });

    let r = jade
        .sign_message(&SignMessageRequest {
            path: vec![0],
            message: "hello".to_string(),
            use_ae_protocol: false,
            ae: None,
        })
        .await;
    assert!(matches!(r, Err(Error::Cancelled)));

    // The stale answer to request 1 surfaces ahead of the next response;
    // it must be dropped silently, not corrupt the next operation
    handle.push_read(response_frame(1, Some(Value::Text("late".into())), None));
    handle.expect("get_version_info", Reply::Result(version_result("0.1.48")));

    let info = jade.version_info().await?;
    assert_eq!(info.version, "0.1.48");
    Ok(())
}

#[tokio::test]
async fn timed_out_request_does_not_poison_the_next_operation() -> anyhow::Result<()> {
    helpers::setup();

    let (dev, handle) = mock();
    handle.expect("sign_message", Reply::Silence);

    let conn = Connection::new(dev)
        .with_timeouts(Duration::from_millis(50), Duration::from_millis(50));
    let jade = Jade::new(conn);

    let r = jade
        .sign_message(&SignMessageRequest {
            path: vec![0],
            message: "hello".to_string(),
            use_ae_protocol: false,
            ae: None,
        })
        .await;
    assert!(matches!(r, Err(Error::DeviceUnreachable(_))));

    // The device was still thinking; its answer to the abandoned request
    // arrives before the next response and must be dropped
    handle.push_read(response_frame(1, Some(Value::Text("late".into())), None));
    handle.expect("get_version_info", Reply::Result(version_result("0.1.48")));

    let info = jade.version_info().await?;
    assert_eq!(info.version, "0.1.48");
    Ok(())
}
