use tokio::io::AsyncRead;
use tokio_stream::StreamExt;
use tokio_util::bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, FramedRead};

/// Decodes a byte stream into text frames
///
/// Multi-byte sequences split across reads are held back until complete.
/// Invalid sequences decode to U+FFFD instead of failing the stream.
struct LossyUtf8Codec;

impl Decoder for LossyUtf8Codec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        match std::str::from_utf8(src) {
            Ok(s) => {
                let out = s.to_owned();
                src.clear();
                Ok(Some(out))
            }
            Err(e) => {
                let valid = e.valid_up_to();
                let take = match e.error_len() {
                    // incomplete trailing sequence, wait for more bytes
                    None if valid == 0 => return Ok(None),
                    None => valid,
                    Some(bad) => valid + bad,
                };
                let out = String::from_utf8_lossy(&src[..take]).into_owned();
                src.advance(take);
                Ok(Some(out))
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        let out = String::from_utf8_lossy(buf).into_owned();
        buf.clear();
        Ok(Some(out))
    }
}

/// Read `reader` to exhaustion, appending decoded text to `out`
///
/// On a read error the text decoded so far stays in `out`.
pub async fn drain<R: AsyncRead + Unpin>(reader: R, out: &mut String) -> std::io::Result<()> {
    let mut frames = FramedRead::with_capacity(reader, LossyUtf8Codec, 8 * 1024);
    while let Some(frame) = frames.next().await {
        out.push_str(&frame?);
    }
    Ok(())
}
