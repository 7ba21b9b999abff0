// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Transport abstraction and the single-flight device connection
//!
//! The resolver depends only on a framed byte channel: write one opaque
//! message, read one opaque message, report connectivity. BLE / USB framing
//! is the transport implementor's concern.
//!
//! [Connection] wraps a transport in the per-session FIFO queue: a single
//! logical operation holds the connection for all of its round-trips, so two
//! concurrent signing operations against the same device can never interleave
//! their exchange ordering.

use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use log::{debug, trace};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{watch, Mutex, MutexGuard};

use hw_wire::{Method, Request, Response, ResponseHeader};

use crate::Error;

/// Default timeout for round-trips answered without user interaction
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for round-trips pending on-device confirmation
pub const DEFAULT_USER_TIMEOUT: Duration = Duration::from_secs(120);

/// Transport error type
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Channel closed or device unpaired
    #[error("device disconnected")]
    Disconnected,

    /// No response frame within the bounded wait
    #[error("timeout awaiting device response")]
    Timeout,

    /// Underlying channel failure
    #[error("transport failure: {0}")]
    Io(String),
}

/// Framed byte channel to a signing device
#[async_trait]
pub trait Transport: Send {
    /// Write one framed message to the device
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Read one framed message from the device
    async fn read(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Report connection state
    fn is_connected(&self) -> bool {
        true
    }
}

/// Caller-side cancellation handle for an in-flight operation
///
/// Cancelling leaves the transport connected; the current operation resolves
/// as [Error::Cancelled] at its next suspension point and any response frame
/// that later arrives for one of its request ids is discarded silently.
#[derive(Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }
}

impl CancelToken {
    /// Request cancellation of the current operation
    pub fn cancel(&self) {
        // send_replace updates the value even when no waiter is subscribed
        self.tx.send_replace(true);
    }

    /// Check whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Rearm the token at the start of a new operation
    pub(crate) fn reset(&self) {
        self.tx.send_replace(false);
    }

    /// Suspend until cancellation is requested
    pub(crate) async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Token dropped without cancelling, park forever
                futures::future::pending::<()>().await;
            }
        }
    }
}

/// Exclusive connection to a signing device
///
/// Holds the transport behind a [Mutex] so all requests pass through one
/// FIFO queue, allocates monotonic request ids, and tracks cancelled ids so
/// stale frames can be dropped.
pub struct Connection<T: Transport> {
    state: Arc<Mutex<ConnectionState<T>>>,
    request_timeout: Duration,
    user_timeout: Duration,
}

impl<T: Transport> Clone for Connection<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            request_timeout: self.request_timeout,
            user_timeout: self.user_timeout,
        }
    }
}

impl<T: Transport> Connection<T> {
    /// Create a connection over the provided transport
    pub fn new(t: T) -> Self {
        Self {
            state: Arc::new(Mutex::new(ConnectionState {
                t,
                next_id: 1,
                cancelled: HashSet::new(),
            })),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_timeout: DEFAULT_USER_TIMEOUT,
        }
    }

    /// Override the round-trip timeouts
    pub fn with_timeouts(mut self, request: Duration, user: Duration) -> Self {
        self.request_timeout = request;
        self.user_timeout = user;
        self
    }

    /// Timeout for round-trips answered without user interaction
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Timeout for round-trips pending on-device confirmation
    pub fn user_timeout(&self) -> Duration {
        self.user_timeout
    }

    /// Take the connection for an operation, entering the FIFO queue
    pub(crate) async fn lock(&self) -> MutexGuard<'_, ConnectionState<T>> {
        self.state.lock().await
    }
}

/// Transport state guarded by the connection lock
pub(crate) struct ConnectionState<T: Transport> {
    t: T,
    next_id: u32,
    cancelled: HashSet<u32>,
}

impl<T: Transport> ConnectionState<T> {
    /// Allocate the next request id, unique and monotonic for the
    /// connection lifetime
    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Mark a request id as cancelled so its response frame is dropped
    pub(crate) fn mark_cancelled(&mut self, id: u32) {
        self.cancelled.insert(id);
    }

    /// Write an encoded request frame without awaiting the reply, returning
    /// the allocated request id
    pub(crate) async fn post<P: Serialize>(
        &mut self,
        method: Method,
        params: P,
    ) -> Result<u32, Error> {
        let id = self.alloc_id();
        let frame = Request::new(id, method, params).encode()?;
        self.send(method, id, &frame).await?;
        Ok(id)
    }

    /// Write a parameterless request frame without awaiting the reply
    pub(crate) async fn post_bare(&mut self, method: Method) -> Result<u32, Error> {
        let id = self.alloc_id();
        let frame = Request::bare(id, method).encode()?;
        self.send(method, id, &frame).await?;
        Ok(id)
    }

    async fn send(&mut self, method: Method, id: u32, frame: &[u8]) -> Result<(), Error> {
        if !self.t.is_connected() {
            return Err(Error::DeviceUnreachable(TransportError::Disconnected));
        }

        debug!("=> {method} id={id} ({} bytes)", frame.len());
        trace!("=> {}", hex::encode(frame));

        self.t.write(frame).await.map_err(Error::from)
    }

    /// Await the result frame for a previously posted request
    ///
    /// Frames whose id is marked cancelled are discarded silently; a frame
    /// for any other id is a protocol error. Any failure to resolve the
    /// request (cancellation, timeout, device error) marks the pending id so
    /// a frame the device produces later is dropped rather than misread as
    /// the answer to a subsequent request.
    pub(crate) async fn recv_result<R: DeserializeOwned>(
        &mut self,
        id: u32,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<R, Error> {
        let r = self.read_result(id, timeout, cancel).await;
        if r.is_err() {
            self.cancelled.insert(id);
        }
        r
    }

    async fn read_result<R: DeserializeOwned>(
        &mut self,
        id: u32,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<R, Error> {
        loop {
            let frame = tokio::select! {
                r = tokio::time::timeout(timeout, self.t.read()) => r??,
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            };

            trace!("<= {}", hex::encode(&frame));

            let hdr = ResponseHeader::decode(&frame)?;
            if self.cancelled.remove(&hdr.id) {
                debug!("dropping response for cancelled request id={}", hdr.id);
                continue;
            }
            if hdr.id != id {
                return Err(Error::Protocol(format!(
                    "response id {} does not answer request {id}",
                    hdr.id
                )));
            }
            if let Some(e) = hdr.error {
                debug!("<= id={id} error: {e}");
                return Err(Error::from(e));
            }

            let resp: Response<R> = Response::decode(&frame)?;
            debug!("<= id={id} ok");

            return match resp.result {
                Some(r) => Ok(r),
                None => Err(Error::Protocol(format!("empty result for request {id}"))),
            };
        }
    }

    /// Execute one request / response round-trip
    pub(crate) async fn request<P: Serialize, R: DeserializeOwned>(
        &mut self,
        method: Method,
        params: P,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<R, Error> {
        let id = self.post(method, params).await?;
        self.recv_result(id, timeout, cancel).await
    }

    /// Execute one parameterless round-trip
    pub(crate) async fn request_bare<R: DeserializeOwned>(
        &mut self,
        method: Method,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<R, Error> {
        let id = self.post_bare(method).await?;
        self.recv_result(id, timeout, cancel).await
    }

    /// Raw frame exchange for device families with their own framing (APDU)
    pub(crate) async fn transfer(
        &mut self,
        data: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, Error> {
        if !self.t.is_connected() {
            return Err(Error::DeviceUnreachable(TransportError::Disconnected));
        }

        trace!("=> {}", hex::encode(data));
        self.t.write(data).await?;

        let frame = tokio::time::timeout(timeout, self.t.read()).await??;
        trace!("<= {}", hex::encode(&frame));

        Ok(frame)
    }
}
