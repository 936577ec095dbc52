//! Request-reply clients for the external evaluation endpoints.
//!
//! Two services sit outside the engine:
//!
//! - the **priors service** answers a state tensor with action logits plus a
//!   scalar value (one endpoint per player);
//! - the **sample sink** receives `(state tensor, policy tensor)` pairs from
//!   stochastic self-play decisions.
//!
//! Both speak the same minimal wire format: a 4-byte little-endian length
//! prefix followed by the payload, one connection per request. Tensors are
//! packed as little-endian `f32`. The sink acknowledges every message with
//! the two bytes `{0x04, 0x02}`; anything else is an error.
//!
//! The endpoint string `"0"` disables a client, in which case callers fall
//! back to flat priors and the problem's own scalar value.

use std::io::{Read, Write};
use std::net::TcpStream;

use thiserror::Error;
use tracing::trace;

/// Acknowledgement bytes expected from the sample sink.
pub const ACK: [u8; 2] = [0x04, 0x02];

/// Endpoint sentinel meaning "no service configured".
pub const DISABLED_ENDPOINT: &str = "0";

/// Errors raised while talking to an evaluation endpoint.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("endpoint i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed reply: expected {expected} floats, got {got}")]
    BadReply { expected: usize, got: usize },

    #[error("sink rejected sample, acknowledgement was {0:?}")]
    BadAck(Vec<u8>),
}

fn send_frame(stream: &mut TcpStream, payload: &[u8]) -> Result<(), ClientError> {
    stream.write_all(&(payload.len() as u32).to_le_bytes())?;
    stream.write_all(payload)?;
    stream.flush()?;
    Ok(())
}

fn recv_frame(stream: &mut TcpStream) -> Result<Vec<u8>, ClientError> {
    let mut len = [0u8; 4];
    stream.read_exact(&mut len)?;
    let mut payload = vec![0u8; u32::from_le_bytes(len) as usize];
    stream.read_exact(&mut payload)?;
    Ok(payload)
}

fn floats_to_bytes(data: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(data.len() * 4);
    for value in data {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn bytes_to_floats(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

/// Client for the priors/value service of one player.
#[derive(Debug, Clone)]
pub struct PriorsClient {
    endpoint: String,
}

impl PriorsClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    /// True when the endpoint is the `"0"` sentinel and no network call
    /// should be made.
    pub fn is_disabled(&self) -> bool {
        self.endpoint == DISABLED_ENDPOINT
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send a state tensor, receive `priors_len` logits plus one scalar
    /// value. The logits are unnormalized; apply
    /// [`softmax_over_legal`] with the problem's action-to-index mapping.
    pub fn infer(&self, state: &[f32], priors_len: usize) -> Result<(Vec<f32>, f32), ClientError> {
        let mut stream = TcpStream::connect(&self.endpoint)?;
        send_frame(&mut stream, &floats_to_bytes(state))?;
        let reply = recv_frame(&mut stream)?;
        let floats = bytes_to_floats(&reply).ok_or(ClientError::BadReply {
            expected: priors_len + 1,
            got: reply.len(),
        })?;
        if floats.len() != priors_len + 1 {
            return Err(ClientError::BadReply {
                expected: priors_len + 1,
                got: floats.len(),
            });
        }
        trace!(endpoint = %self.endpoint, len = floats.len(), "priors reply received");
        let value = floats[priors_len];
        let logits = floats[..priors_len].to_vec();
        Ok((logits, value))
    }
}

/// Softmax restricted to the logits of legal actions.
///
/// `indices` maps each legal action to its slot in the logit vector; the
/// result is one probability per legal action, in the same order.
pub fn softmax_over_legal(logits: &[f32], indices: &[usize]) -> Vec<f64> {
    let mut probs: Vec<f64> = indices
        .iter()
        .map(|&i| f64::from(logits[i]).exp())
        .collect();
    let sum: f64 = probs.iter().sum();
    if sum > 0.0 {
        for p in &mut probs {
            *p /= sum;
        }
    }
    probs
}

/// Client for the self-play sample sink.
#[derive(Debug, Clone)]
pub struct SampleSink {
    endpoint: String,
}

impl SampleSink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.endpoint == DISABLED_ENDPOINT
    }

    /// Store one self-play sample: the state tensor, then the policy
    /// tensor, as two separate messages on one connection. Each must be
    /// acknowledged with [`ACK`].
    pub fn store_sample(&self, state: &[f32], policy: &[f32]) -> Result<(), ClientError> {
        let mut stream = TcpStream::connect(&self.endpoint)?;
        for tensor in [state, policy] {
            send_frame(&mut stream, &floats_to_bytes(tensor))?;
            let reply = recv_frame(&mut stream)?;
            if reply.as_slice() != ACK {
                return Err(ClientError::BadAck(reply));
            }
        }
        trace!(endpoint = %self.endpoint, "sample stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    /// Serve exactly one connection with the given per-message replies.
    fn serve_once(replies: Vec<Vec<u8>>) -> (String, thread::JoinHandle<Vec<Vec<u8>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            for reply in replies {
                let payload = recv_frame(&mut stream).unwrap();
                received.push(payload);
                send_frame(&mut stream, &reply).unwrap();
            }
            received
        });
        (endpoint, handle)
    }

    #[test]
    fn infer_splits_logits_and_value() {
        let reply = floats_to_bytes(&[0.1, 0.2, 0.3, 0.75]);
        let (endpoint, handle) = serve_once(vec![reply]);

        let client = PriorsClient::new(endpoint);
        let (logits, value) = client.infer(&[1.0, 2.0], 3).unwrap();

        assert_eq!(logits, vec![0.1, 0.2, 0.3]);
        assert!((value - 0.75).abs() < 1e-6);

        let received = handle.join().unwrap();
        assert_eq!(received[0], floats_to_bytes(&[1.0, 2.0]));
    }

    #[test]
    fn infer_rejects_short_reply() {
        let reply = floats_to_bytes(&[0.1, 0.2]);
        let (endpoint, handle) = serve_once(vec![reply]);

        let client = PriorsClient::new(endpoint);
        let err = client.infer(&[1.0], 3).unwrap_err();
        assert!(matches!(
            err,
            ClientError::BadReply {
                expected: 4,
                got: 2
            }
        ));
        handle.join().unwrap();
    }

    #[test]
    fn disabled_endpoint_is_recognized() {
        assert!(PriorsClient::new("0").is_disabled());
        assert!(!PriorsClient::new("127.0.0.1:5555").is_disabled());
        assert!(SampleSink::new("0").is_disabled());
    }

    #[test]
    fn sink_sends_two_acknowledged_messages() {
        let (endpoint, handle) = serve_once(vec![ACK.to_vec(), ACK.to_vec()]);

        let sink = SampleSink::new(endpoint);
        sink.store_sample(&[1.0, 2.0], &[0.5, 0.5]).unwrap();

        let received = handle.join().unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0], floats_to_bytes(&[1.0, 2.0]));
        assert_eq!(received[1], floats_to_bytes(&[0.5, 0.5]));
    }

    #[test]
    fn sink_fails_on_bad_acknowledgement() {
        let (endpoint, handle) = serve_once(vec![vec![0x00, 0x01]]);

        let sink = SampleSink::new(endpoint);
        let err = sink.store_sample(&[1.0], &[1.0]).unwrap_err();
        assert!(matches!(err, ClientError::BadAck(bytes) if bytes == vec![0x00, 0x01]));
        handle.join().unwrap();
    }

    #[test]
    fn softmax_normalizes_over_legal_subset() {
        let logits = vec![0.0, 1.0, 2.0, -1.0];
        let probs = softmax_over_legal(&logits, &[1, 2]);

        assert_eq!(probs.len(), 2);
        let sum: f64 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(probs[1] > probs[0]);
    }
}
