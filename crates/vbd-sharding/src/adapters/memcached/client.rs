//! Binary protocol node client.
//!
//! One TCP stream per node. Requests are strictly sequential: the stream
//! sits behind an async mutex and every request waits for its own response.

use super::codec::{
    add_extras, collection_key, feature, hello_features, parse_hello_features, sasl_plain,
    status, Opcode, Request, Response, ResponseHeader, HEADER_LEN,
};
use crate::domain::{
    AddOutcome, ConnectionConfig, DeleteOutcome, Document, GetOutcome, LocatorError,
    NodeAddress, ShardIndex, TopologyDescriptor, DEFAULT_COLLECTION,
};
use crate::ports::outbound::{NodeClient, NodeConnector};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const AGENT: &str = concat!("vbucket-doctor/", env!("CARGO_PKG_VERSION"));

/// Opens binary protocol sessions.
#[derive(Clone, Debug, Default)]
pub struct MemcachedConnector;

impl MemcachedConnector {
    /// Create a connector.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NodeConnector for MemcachedConnector {
    async fn connect(
        &self,
        address: &NodeAddress,
        config: &ConnectionConfig,
    ) -> Result<Arc<dyn NodeClient>, LocatorError> {
        if config.tls {
            return Err(LocatorError::Unsupported(
                "TLS transport is not available in the binary protocol adapter".to_string(),
            ));
        }

        let timeout = Duration::from_secs(config.timeout_secs);
        let host = address.host.trim_start_matches('[').trim_end_matches(']');
        let stream = tokio::time::timeout(timeout, TcpStream::connect((host, address.port)))
            .await
            .map_err(|_| LocatorError::Connection {
                address: address.to_string(),
                reason: format!("connect timed out after {}s", config.timeout_secs),
            })?
            .map_err(|e| LocatorError::Connection {
                address: address.to_string(),
                reason: e.to_string(),
            })?;
        stream.set_nodelay(true)?;

        let client = MemcachedNodeClient {
            address: address.clone(),
            timeout_secs: config.timeout_secs,
            wire: Mutex::new(Wire {
                stream,
                next_opaque: 1,
            }),
            collections: parking_lot::Mutex::new(HashMap::new()),
            collections_enabled: AtomicBool::new(false),
            broken: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        };
        client.handshake(config).await?;

        info!(node = %address, bucket = %config.bucket, "[vbd] Session established");
        Ok(Arc::new(client))
    }
}

struct Wire {
    stream: TcpStream,
    next_opaque: u32,
}

/// Authenticated, bucket-scoped session to one node.
pub struct MemcachedNodeClient {
    address: NodeAddress,
    timeout_secs: u64,
    wire: Mutex<Wire>,
    /// collection path -> collection id
    collections: parking_lot::Mutex<HashMap<String, u32>>,
    /// COLLECTIONS granted by HELLO; keys carry the LEB128 prefix only then
    collections_enabled: AtomicBool,
    /// set after a transport or framing failure; the stream is out of step
    broken: AtomicBool,
    closed: AtomicBool,
}

impl MemcachedNodeClient {
    async fn handshake(&self, config: &ConnectionConfig) -> Result<(), LocatorError> {
        let mut hello = Request::new(Opcode::Hello);
        hello.key = AGENT.as_bytes().to_vec();
        hello.value = hello_features(&[
            feature::XERROR,
            feature::SELECT_BUCKET,
            feature::JSON,
            feature::COLLECTIONS,
        ]);
        let response = self.execute(hello).await?;
        if response.status() != status::SUCCESS {
            return Err(self.status_error(&response));
        }
        let granted = parse_hello_features(&response.value);
        let collections = granted.contains(&feature::COLLECTIONS);
        self.collections_enabled.store(collections, Ordering::SeqCst);
        debug!(node = %self.address, ?granted, collections, "[vbd] Features negotiated");

        let mut auth = Request::new(Opcode::SaslAuth);
        auth.key = b"PLAIN".to_vec();
        auth.value = sasl_plain(&config.username, &config.password);
        let response = self.execute(auth).await?;
        if response.status() != status::SUCCESS {
            return Err(LocatorError::Authentication {
                address: self.address.to_string(),
                reason: response.error_message(),
            });
        }

        let mut select = Request::new(Opcode::SelectBucket);
        select.key = config.bucket.as_bytes().to_vec();
        let response = self.execute(select).await?;
        if response.status() != status::SUCCESS {
            return Err(LocatorError::Authentication {
                address: self.address.to_string(),
                reason: format!(
                    "cannot select bucket {:?}: {}",
                    config.bucket,
                    response.error_message()
                ),
            });
        }

        debug!(node = %self.address, "[vbd] Handshake complete");
        Ok(())
    }

    /// Send one request and wait for its response.
    ///
    /// A timeout or transport failure leaves the stream out of step with
    /// its responses, so the session is shut down and every later request
    /// fails fast.
    async fn execute(&self, mut request: Request) -> Result<Response, LocatorError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(LocatorError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                format!(
                    "session to {} is unusable after an earlier transport failure",
                    self.address
                ),
            )));
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(LocatorError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                format!("session to {} is closed", self.address),
            )));
        }

        let timeout = Duration::from_secs(self.timeout_secs);
        let exchanged = tokio::time::timeout(timeout, self.exchange(&mut request)).await;
        match exchanged {
            Ok(Ok(response)) => Ok(response),
            // rejected before anything reached the wire
            Ok(Err(e @ LocatorError::InvalidInput(_))) => Err(e),
            Ok(Err(e)) => {
                self.mark_broken(&e.to_string()).await;
                Err(e)
            }
            Err(_) => {
                let e = LocatorError::Timeout(self.timeout_secs);
                self.mark_broken(&e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn exchange(&self, request: &mut Request) -> Result<Response, LocatorError> {
        let mut wire = self.wire.lock().await;
        request.opaque = wire.next_opaque;
        wire.next_opaque = wire.next_opaque.wrapping_add(1);

        let frame = request.encode()?;
        wire.stream.write_all(&frame).await?;

        let mut header = [0u8; HEADER_LEN];
        wire.stream.read_exact(&mut header).await?;
        let header = ResponseHeader::decode(&header)?;
        let mut body = vec![0u8; header.body_len as usize];
        wire.stream.read_exact(&mut body).await?;

        if header.opaque != request.opaque || header.opcode != request.opcode {
            return Err(LocatorError::Protocol {
                status: header.status,
                message: format!(
                    "response for opcode 0x{:02x}/opaque {} while waiting for 0x{:02x}/{}",
                    header.opcode, header.opaque, request.opcode, request.opaque
                ),
            });
        }
        Response::from_parts(header, body)
    }

    /// Take the session out of service after a failed exchange.
    async fn mark_broken(&self, reason: &str) {
        if self.broken.swap(true, Ordering::SeqCst) {
            return;
        }
        warn!(node = %self.address, reason, "[vbd] Session unusable, shutting it down");
        self.closed.store(true, Ordering::SeqCst);
        let mut wire = self.wire.lock().await;
        if let Err(e) = wire.stream.shutdown().await {
            debug!(node = %self.address, error = %e, "[vbd] Shutdown after failure");
        }
    }

    fn status_error(&self, response: &Response) -> LocatorError {
        match response.status() {
            status::AUTH_ERROR | status::NO_ACCESS => LocatorError::Authentication {
                address: self.address.to_string(),
                reason: response.error_message(),
            },
            code => LocatorError::Protocol {
                status: code,
                message: response.error_message(),
            },
        }
    }

    async fn collection_id(&self, collection: &str) -> Result<u32, LocatorError> {
        if collection.is_empty() || collection == DEFAULT_COLLECTION {
            return Ok(0);
        }
        let cached = self.collections.lock().get(collection).copied();
        if let Some(id) = cached {
            return Ok(id);
        }

        let mut request = Request::new(Opcode::GetCollectionId);
        request.key = collection.as_bytes().to_vec();
        let response = self.execute(request).await?;
        if response.status() != status::SUCCESS {
            return Err(self.status_error(&response));
        }
        let id = match response.extras.get(8..12) {
            Some(&[a, b, c, d]) => u32::from_be_bytes([a, b, c, d]),
            _ => {
                return Err(LocatorError::Protocol {
                    status: response.status(),
                    message: format!("collection id response with {} extras", response.extras.len()),
                })
            }
        };

        debug!(node = %self.address, collection, id, "[vbd] Resolved collection");
        self.collections.lock().insert(collection.to_string(), id);
        Ok(id)
    }

    async fn key_request(
        &self,
        opcode: Opcode,
        id: &str,
        collection: &str,
        shard: ShardIndex,
    ) -> Result<Request, LocatorError> {
        let key = if self.collections_enabled.load(Ordering::SeqCst) {
            let collection_id = self.collection_id(collection).await?;
            collection_key(collection_id, id.as_bytes())
        } else if collection.is_empty() || collection == DEFAULT_COLLECTION {
            id.as_bytes().to_vec()
        } else {
            return Err(LocatorError::Unsupported(format!(
                "{} did not negotiate collections; cannot address {collection:?}",
                self.address
            )));
        };

        let mut request = Request::new(opcode);
        request.vbucket = shard;
        request.key = key;
        Ok(request)
    }
}

#[async_trait]
impl NodeClient for MemcachedNodeClient {
    fn address(&self) -> &NodeAddress {
        &self.address
    }

    async fn get_topology(&self) -> Result<TopologyDescriptor, LocatorError> {
        let response = self.execute(Request::new(Opcode::GetClusterConfig)).await?;
        if response.status() != status::SUCCESS {
            return Err(self.status_error(&response));
        }
        TopologyDescriptor::from_json(&response.value)
    }

    async fn get(
        &self,
        id: &str,
        collection: &str,
        shard: ShardIndex,
    ) -> Result<GetOutcome, LocatorError> {
        let request = self.key_request(Opcode::Get, id, collection, shard).await?;
        let response = self.execute(request).await?;
        match response.status() {
            status::SUCCESS => Ok(GetOutcome::Found(Document {
                flags: response.flags(),
                cas: response.header.cas,
                datatype: response.header.datatype,
                value: response.value,
            })),
            status::KEY_ENOENT => Ok(GetOutcome::NotFound),
            _ => Err(self.status_error(&response)),
        }
    }

    async fn add(
        &self,
        id: &str,
        collection: &str,
        shard: ShardIndex,
        value: &[u8],
        flags: u32,
        datatype: u8,
    ) -> Result<AddOutcome, LocatorError> {
        let mut request = self.key_request(Opcode::Add, id, collection, shard).await?;
        request.extras = add_extras(flags);
        request.datatype = datatype;
        request.value = value.to_vec();

        let response = self.execute(request).await?;
        match response.status() {
            status::SUCCESS => Ok(AddOutcome::Created {
                cas: response.header.cas,
            }),
            status::KEY_EEXISTS => Ok(AddOutcome::AlreadyExists),
            _ => Err(self.status_error(&response)),
        }
    }

    async fn delete(
        &self,
        id: &str,
        collection: &str,
        shard: ShardIndex,
        cas: u64,
    ) -> Result<DeleteOutcome, LocatorError> {
        let mut request = self.key_request(Opcode::Delete, id, collection, shard).await?;
        request.cas = cas;

        let response = self.execute(request).await?;
        match response.status() {
            status::SUCCESS => Ok(DeleteOutcome::Deleted),
            status::KEY_EEXISTS => Ok(DeleteOutcome::Conflict),
            status::KEY_ENOENT => Ok(DeleteOutcome::NotFound),
            _ => Err(self.status_error(&response)),
        }
    }

    async fn close(&self) -> Result<(), LocatorError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!(node = %self.address, "[vbd] Closing session");
        let mut wire = self.wire.lock().await;
        wire.stream.shutdown().await?;
        Ok(())
    }
}
