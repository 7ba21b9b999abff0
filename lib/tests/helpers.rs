// Copyright (c) 2022-2023 The MobileCoin Foundation

#![allow(unused)]

use std::{
    collections::{BTreeMap, VecDeque},
    str::FromStr,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use log::LevelFilter;
use serde_cbor::Value;
use simplelog::SimpleLogger;

use hw_resolver::{Transport, TransportError};

// Setup logging from the LOG_LEVEL env var
pub fn setup() {
    let log_level = match std::env::var("LOG_LEVEL").map(|v| LevelFilter::from_str(&v)) {
        Ok(Ok(l)) => l,
        _ => LevelFilter::Debug,
    };

    let _ = SimpleLogger::init(log_level, simplelog::Config::default());
}

/// Scripted reply to one expected request
pub enum Reply {
    /// Answer with a result payload
    Result(Value),
    /// Answer with an RPC error
    Error(i32, &'static str),
    /// Swallow the request without answering
    Silence,
    /// Fail the write and drop the connection
    Disconnect,
}

struct Expect {
    method: &'static str,
    reply: Reply,
}

struct Inner {
    expect: VecDeque<Expect>,
    reads: VecDeque<Vec<u8>>,
    writes: Vec<Value>,
    connected: bool,
}

/// Scripting / inspection handle to a [MockDevice]
#[derive(Clone)]
pub struct MockHandle {
    inner: Arc<Mutex<Inner>>,
}

#[allow(unused)]
impl MockHandle {
    /// Queue the reply for the next expected request
    pub fn expect(&self, method: &'static str, reply: Reply) {
        self.inner
            .lock()
            .unwrap()
            .expect
            .push_back(Expect { method, reply });
    }

    /// Queue a raw frame ahead of the scripted replies
    pub fn push_read(&self, frame: Vec<u8>) {
        self.inner.lock().unwrap().reads.push_back(frame);
    }

    /// Number of request frames the device has seen
    pub fn writes(&self) -> usize {
        self.inner.lock().unwrap().writes.len()
    }

    /// Sequence of request method names the device has seen
    pub fn methods(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .writes
            .iter()
            .map(|v| text_field(v, "method").expect("request without method"))
            .collect()
    }

    /// Drop the connection out from under the resolver
    pub fn disconnect(&self) {
        self.inner.lock().unwrap().connected = false;
    }

    /// Number of scripted replies not yet consumed
    pub fn remaining(&self) -> usize {
        self.inner.lock().unwrap().expect.len()
    }
}

/// CBOR-RPC device double driven by a script of expected requests
pub struct MockDevice {
    inner: Arc<Mutex<Inner>>,
}

pub fn mock() -> (MockDevice, MockHandle) {
    let inner = Arc::new(Mutex::new(Inner {
        expect: VecDeque::new(),
        reads: VecDeque::new(),
        writes: vec![],
        connected: true,
    }));
    (
        MockDevice {
            inner: inner.clone(),
        },
        MockHandle { inner },
    )
}

#[async_trait]
impl Transport for MockDevice {
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.connected {
            return Err(TransportError::Disconnected);
        }

        let v: Value =
            serde_cbor::from_slice(data).map_err(|e| TransportError::Io(e.to_string()))?;
        let id = int_field(&v, "id").expect("request without id");
        let method = text_field(&v, "method").expect("request without method");
        inner.writes.push(v);

        let e = inner
            .expect
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected request: {method}"));
        assert_eq!(e.method, method, "request out of order");

        match e.reply {
            Reply::Result(r) => {
                let frame = response_frame(id, Some(r), None);
                inner.reads.push_back(frame);
            }
            Reply::Error(code, message) => {
                let frame = response_frame(id, None, Some((code, message)));
                inner.reads.push_back(frame);
            }
            Reply::Silence => (),
            Reply::Disconnect => {
                inner.connected = false;
                return Err(TransportError::Disconnected);
            }
        }

        Ok(())
    }

    async fn read(&mut self) -> Result<Vec<u8>, TransportError> {
        loop {
            {
                let mut inner = self.inner.lock().unwrap();
                if let Some(frame) = inner.reads.pop_front() {
                    return Ok(frame);
                }
                if !inner.connected {
                    return Err(TransportError::Disconnected);
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn is_connected(&self) -> bool {
        self.inner.lock().unwrap().connected
    }
}

/// Build an `{id, result}` / `{id, error}` response frame
pub fn response_frame(id: u32, result: Option<Value>, error: Option<(i32, &str)>) -> Vec<u8> {
    let mut m = BTreeMap::new();
    m.insert(Value::Text("id".into()), Value::Integer(id as i128));
    if let Some(r) = result {
        m.insert(Value::Text("result".into()), r);
    }
    if let Some((code, message)) = error {
        let mut e = BTreeMap::new();
        e.insert(Value::Text("code".into()), Value::Integer(code as i128));
        e.insert(Value::Text("message".into()), Value::Text(message.into()));
        m.insert(Value::Text("error".into()), Value::Map(e));
    }
    serde_cbor::to_vec(&Value::Map(m)).expect("frame encode failed")
}

fn text_field(v: &Value, key: &str) -> Option<String> {
    match v {
        Value::Map(m) => match m.get(&Value::Text(key.to_string())) {
            Some(Value::Text(s)) => Some(s.clone()),
            _ => None,
        },
        _ => None,
    }
}

fn int_field(v: &Value, key: &str) -> Option<u32> {
    match v {
        Value::Map(m) => match m.get(&Value::Text(key.to_string())) {
            Some(Value::Integer(n)) => u32::try_from(*n).ok(),
            _ => None,
        },
        _ => None,
    }
}

/// APDU device double, a queue of `(expected prefix, reply frame)` pairs
pub struct RawMock {
    script: VecDeque<(Vec<u8>, Vec<u8>)>,
    reads: VecDeque<Vec<u8>>,
    pub writes: usize,
}

#[allow(unused)]
impl RawMock {
    pub fn new(script: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        Self {
            script: script.into(),
            reads: VecDeque::new(),
            writes: 0,
        }
    }
}

#[async_trait]
impl Transport for RawMock {
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.writes += 1;
        let (prefix, reply) = self
            .script
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected frame: {}", hex::encode(data)));
        assert!(
            data.starts_with(&prefix),
            "frame {} does not match expected prefix {}",
            hex::encode(data),
            hex::encode(&prefix)
        );
        self.reads.push_back(reply);
        Ok(())
    }

    async fn read(&mut self) -> Result<Vec<u8>, TransportError> {
        self.reads.pop_front().ok_or(TransportError::Disconnected)
    }
}
