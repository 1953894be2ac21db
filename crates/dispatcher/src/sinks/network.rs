//! NetworkSink - UDP pair metadata stream for an external renderer

use contracts::{ContractError, PairSink, SynchronizedPair};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, instrument, trace};

use crate::record::PairRecord;

/// Largest UDP payload over IPv4
const MAX_DATAGRAM: usize = 65507;

#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    pub addr: SocketAddr,
    /// Records larger than this are rejected
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    /// `addr` (required) and `max_packet_size` (default 65000)
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;
        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{addr_str}': {e}"))?;

        let max_packet_size = match params.get("max_packet_size") {
            None => 65000,
            Some(value) => value
                .parse::<usize>()
                .map_err(|e| format!("invalid max_packet_size '{value}': {e}"))?,
        };
        if max_packet_size == 0 || max_packet_size > MAX_DATAGRAM {
            return Err(format!(
                "max_packet_size must be in 1..={MAX_DATAGRAM}, got {max_packet_size}"
            ));
        }

        Ok(Self {
            addr,
            max_packet_size,
        })
    }
}

/// Sends one JSON [`PairRecord`] datagram per pair
///
/// Delivery is best-effort: send errors are logged, not returned.
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    socket: Option<UdpSocket>,
}

impl NetworkSink {
    #[instrument(name = "network_sink_new", skip(name, config), fields(target = %config.addr))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let bind: SocketAddr = if config.addr.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(config.addr).await?;
        debug!(sink = %name, target = %config.addr, "NetworkSink connected");

        Ok(Self {
            name,
            config,
            socket: Some(socket),
        })
    }

    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NetworkSinkConfig::from_params(params)
            .map_err(|e| ContractError::sink_write(&name, e))?;
        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::sink_write(&name, e.to_string()))
    }

    fn encode(&self, pair: &SynchronizedPair) -> Result<Vec<u8>, ContractError> {
        let data = serde_json::to_vec(&PairRecord::from(pair))
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        if data.len() > self.config.max_packet_size {
            return Err(ContractError::sink_write(
                &self.name,
                format!(
                    "record of {} bytes exceeds max packet size {}",
                    data.len(),
                    self.config.max_packet_size
                ),
            ));
        }
        Ok(data)
    }
}

impl PairSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_write",
        skip(self, pair),
        fields(sink = %self.name, pair_id = pair.pair_id)
    )]
    async fn write(&mut self, pair: &SynchronizedPair) -> Result<(), ContractError> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| ContractError::sink_write(&self.name, "socket closed"))?;
        let data = self.encode(pair)?;
        match socket.send(&data).await {
            Ok(sent) => trace!(sink = %self.name, bytes = sent, "Sent"),
            // Nobody listening yet is normal for a renderer stream
            Err(e) => debug!(sink = %self.name, error = %e, "UDP send failed"),
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        debug!(sink = %self.name, "NetworkSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::sample_pair;

    #[test]
    fn config_parsing() {
        let mut params = HashMap::new();
        assert!(NetworkSinkConfig::from_params(&params).is_err());

        params.insert("addr".to_string(), "127.0.0.1:9999".to_string());
        let config = NetworkSinkConfig::from_params(&params).unwrap();
        assert_eq!(config.addr.port(), 9999);
        assert_eq!(config.max_packet_size, 65000);

        params.insert("max_packet_size".to_string(), "70000".to_string());
        assert!(NetworkSinkConfig::from_params(&params).is_err());
    }

    #[tokio::test]
    async fn delivers_records_to_listener() {
        let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = NetworkSinkConfig {
            addr: listener.local_addr().unwrap(),
            max_packet_size: 65000,
        };
        let mut sink = NetworkSink::new("renderer", config).await.unwrap();
        sink.write(&sample_pair(7, 2.0)).await.unwrap();

        let mut buf = vec![0u8; 2048];
        let len = tokio::time::timeout(std::time::Duration::from_secs(1), listener.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let record: PairRecord = serde_json::from_slice(&buf[..len]).unwrap();
        assert_eq!(record.pair_id, 7);

        sink.close().await.unwrap();
        assert!(sink.write(&sample_pair(8, 2.1)).await.is_err());
    }

    #[tokio::test]
    async fn oversized_record_rejected() {
        let config = NetworkSinkConfig {
            addr: "127.0.0.1:19998".parse().unwrap(),
            max_packet_size: 16,
        };
        let mut sink = NetworkSink::new("tiny", config).await.unwrap();
        assert!(sink.write(&sample_pair(1, 0.0)).await.is_err());
    }
}
