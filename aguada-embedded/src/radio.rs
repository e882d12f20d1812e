use aguada_api::MacAddress;

/// Link metadata reported alongside every received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxMetadata {
    /// Sender's link address, when the transport exposes it
    pub source: Option<MacAddress>,
    /// Received signal strength (dBm); 0 when the transport cannot measure it
    pub rssi: i8,
}

impl RxMetadata {
    pub fn new(source: Option<MacAddress>, rssi: i8) -> Self {
        Self { source, rssi }
    }
}

/// Connectionless, unacknowledged frame transmission.
#[allow(async_fn_in_trait)]
pub trait RadioLink {
    type Error: core::fmt::Debug;

    /// Hand one frame to the radio. `Ok` means the frame left the node, not that anyone
    /// received it.
    async fn send(&mut self, destination: MacAddress, frame: &[u8]) -> Result<(), Self::Error>;
}

/// Receive half of a transport that has to be polled for frames.
#[allow(async_fn_in_trait)]
pub trait RadioReceiver {
    type Error: core::fmt::Debug;

    /// Wait for the next frame, returning its length and link metadata.
    async fn receive(&mut self, buffer: &mut [u8]) -> Result<(usize, RxMetadata), Self::Error>;
}

/// Callback invoked from the receive path for every frame.
///
/// Runs in the radio driver's context, so implementations must return promptly and
/// must never block.
pub trait FrameSink {
    fn on_receive(&self, frame: &[u8], meta: RxMetadata);
}

/// Pumps frames from a polled receiver into a sink until the receiver fails.
pub async fn pump_frames<R, S>(receiver: &mut R, sink: &S) -> R::Error
where
    R: RadioReceiver,
    S: FrameSink + ?Sized,
{
    let mut buffer = [0u8; 64];

    loop {
        match receiver.receive(&mut buffer).await {
            Ok((len, meta)) => sink.on_receive(&buffer[..len.min(buffer.len())], meta),
            Err(e) => {
                log::error!("Radio receive failed: {:?}", e);
                return e;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::collections::VecDeque;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    use super::*;

    struct ScriptedReceiver {
        frames: VecDeque<Vec<u8>>,
    }

    impl RadioReceiver for ScriptedReceiver {
        type Error = &'static str;

        async fn receive(
            &mut self,
            buffer: &mut [u8],
        ) -> Result<(usize, RxMetadata), Self::Error> {
            let frame = self.frames.pop_front().ok_or("closed")?;
            buffer[..frame.len()].copy_from_slice(&frame);
            Ok((frame.len(), RxMetadata::new(None, -50)))
        }
    }

    #[derive(Default)]
    struct Recorder {
        frames: RefCell<Vec<(Vec<u8>, i8)>>,
    }

    impl FrameSink for Recorder {
        fn on_receive(&self, frame: &[u8], meta: RxMetadata) {
            self.frames.borrow_mut().push((frame.to_vec(), meta.rssi));
        }
    }

    #[tokio::test]
    async fn test_pump_delivers_frames_until_receiver_fails() {
        let mut receiver = ScriptedReceiver {
            frames: [alloc::vec![1u8, 2, 3], alloc::vec![4u8; 12]]
                .into_iter()
                .collect(),
        };
        let recorder = Recorder::default();

        let error = pump_frames(&mut receiver, &recorder).await;

        assert_eq!(error, "closed");
        let frames = recorder.frames.borrow();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], (alloc::vec![1, 2, 3], -50));
        assert_eq!(frames[1].0.len(), 12);
    }
}
