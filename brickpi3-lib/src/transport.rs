//! Full-duplex SPI transfer abstraction.
//!
//! The driver never opens a bus itself. Anything that can clock out a frame
//! and return the same number of bytes clocked in can drive a board: a
//! spidev handle, a userspace bit-banger, or a scripted fake in tests.

use bytes::Bytes;
use std::io;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One SPI transaction at a time: send `data`, receive `data.len()` bytes.
///
/// Implementations must not retry. Errors surface as
/// [`BrickPiError::Transport`](crate::BrickPiError::Transport).
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn transfer(&mut self, data: &[u8]) -> io::Result<Bytes>;
}

impl<T: Transport> Transport for &mut T {
    async fn transfer(&mut self, data: &[u8]) -> io::Result<Bytes> {
        (**self).transfer(data).await
    }
}

/// A transport shared by several boards on one bus.
///
/// Each transfer holds the lock for its duration, so frames from different
/// boards never interleave.
#[derive(Debug)]
pub struct SharedTransport<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> SharedTransport<T> {
    pub fn new(transport: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(transport)),
        }
    }

    /// Run `f` with exclusive access to the underlying transport.
    pub async fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.lock().await;
        f(&mut guard)
    }
}

impl<T> Clone for SharedTransport<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> Transport for SharedTransport<T> {
    async fn transfer(&mut self, data: &[u8]) -> io::Result<Bytes> {
        self.inner.lock().await.transfer(data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo {
        calls: usize,
    }

    impl Transport for Echo {
        async fn transfer(&mut self, data: &[u8]) -> io::Result<Bytes> {
            self.calls += 1;
            Ok(Bytes::copy_from_slice(data))
        }
    }

    #[tokio::test]
    async fn test_shared_transport_serializes_calls() {
        let shared = SharedTransport::new(Echo { calls: 0 });
        let mut a = shared.clone();
        let mut b = shared.clone();
        let (ra, rb) = tokio::join!(a.transfer(&[1, 2]), b.transfer(&[3]));
        assert_eq!(ra.unwrap().as_ref(), &[1, 2]);
        assert_eq!(rb.unwrap().as_ref(), &[3]);
        assert_eq!(shared.with_lock(|t| t.calls).await, 2);
    }
}
