//! Async read loop and serialized writer over the process streams.

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::codec::{FrameDecoder, encode_frame};
use crate::protocol::IncomingMessage;

const READ_CHUNK_BYTES: usize = 64 * 1024;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Serializes outgoing messages onto a single stream.
///
/// Each message is written as one header + body buffer while holding the lock, so
/// concurrent handler completions never interleave their bytes.
pub struct MessageWriter {
    inner: Mutex<BoxedWriter>,
}

impl MessageWriter {
    pub fn new(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            inner: Mutex::new(Box::new(writer)),
        }
    }

    pub async fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<()> {
        let frame = encode_frame(message)?;
        let mut writer = self.inner.lock().await;
        writer.write_all(&frame).await.context("writing frame")?;
        writer.flush().await.context("flushing frame")?;
        Ok(())
    }
}

/// Read framed messages until EOF, handing each decoded message to `on_message`.
///
/// Framing and decoding errors are logged and the offending message is dropped; only
/// I/O errors on the stream end the loop with `Err`.
pub async fn read_messages<R, F>(mut reader: R, mut on_message: F) -> Result<()>
where
    R: AsyncRead + Unpin,
    F: FnMut(IncomingMessage),
{
    let mut decoder = FrameDecoder::new();
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];

    loop {
        let read = reader
            .read(&mut chunk)
            .await
            .context("reading from input stream")?;
        if read == 0 {
            if decoder.buffered_len() > 0 {
                tracing::debug!(
                    "input closed with {} unconsumed bytes",
                    decoder.buffered_len()
                );
            }
            return Ok(());
        }

        decoder.extend(&chunk[..read]);
        loop {
            match decoder.next_frame() {
                Ok(Some(body)) => match IncomingMessage::parse(body) {
                    Ok(message) => {
                        tracing::trace!("received {}", message.method());
                        on_message(message);
                    }
                    Err(e) => tracing::error!("{e}"),
                },
                Ok(None) => break,
                Err(e) => tracing::error!("{e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    fn frame(body: &str) -> Vec<u8> {
        format!("Content-Length: {}\r\n\r\n{body}", body.len()).into_bytes()
    }

    #[tokio::test]
    async fn test_read_messages_skips_corrupt_frames() {
        let mut input = frame(r#"{"id":1,"method":"build/initialize"}"#);
        input.extend(frame("{not json"));
        input.extend(frame(r#"{"method":"build/initialized"}"#));

        let mut methods = Vec::new();
        read_messages(input.as_slice(), |msg| {
            methods.push((msg.method().to_string(), msg.is_notification()));
        })
        .await
        .unwrap();

        assert_eq!(
            methods,
            vec![
                ("build/initialize".to_string(), false),
                ("build/initialized".to_string(), true),
            ]
        );
    }

    #[tokio::test]
    async fn test_read_messages_across_small_writes() {
        let (mut client, server) = tokio::io::duplex(8);
        let bytes = frame(r#"{"id":"q","method":"workspace/buildTargets"}"#);
        let writer = tokio::spawn(async move {
            for piece in bytes.chunks(3) {
                client.write_all(piece).await.unwrap();
            }
        });

        let mut received = Vec::new();
        read_messages(server, |msg| received.push(msg)).await.unwrap();
        writer.await.unwrap();

        assert_eq!(received.len(), 1);
        assert_eq!(received[0].method(), "workspace/buildTargets");
    }

    #[tokio::test]
    async fn test_concurrent_sends_do_not_interleave() {
        let (client, mut server) = tokio::io::duplex(1024 * 1024);
        let writer = Arc::new(MessageWriter::new(client));

        let mut tasks = Vec::new();
        for i in 0..16 {
            let writer = writer.clone();
            tasks.push(tokio::spawn(async move {
                let payload = serde_json::json!({"id": i, "result": "x".repeat(4096)});
                writer.send(&payload).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        drop(writer);

        let mut raw = Vec::new();
        server.read_to_end(&mut raw).await.unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.extend(&raw);
        let mut count = 0;
        while let Some(body) = decoder.next_frame().unwrap() {
            let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(value["result"].as_str().unwrap().len(), 4096);
            count += 1;
        }
        assert_eq!(count, 16);
    }
}
