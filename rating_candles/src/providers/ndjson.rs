//! Splits a stream of byte chunks into newline-delimited records.

use futures::{Stream, StreamExt, stream};

struct LineState<S> {
    inner: S,
    buf: Vec<u8>,
    done: bool,
}

/// Yields each non-blank line of `chunks` without its `\n` / `\r\n` terminator.
///
/// A final line without a terminator is still yielded. After the inner stream
/// yields an error, that error is passed on and the stream ends.
pub fn lines<S, B, E>(chunks: S) -> impl Stream<Item = Result<Vec<u8>, E>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
{
    let state = LineState {
        inner: chunks,
        buf: Vec::new(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(pos) = st.buf.iter().position(|b| *b == b'\n') {
                let rest = st.buf.split_off(pos + 1);
                let mut line = std::mem::replace(&mut st.buf, rest);
                line.truncate(pos);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if is_blank(&line) {
                    continue;
                }
                return Some((Ok(line), st));
            }

            if st.done {
                let line = std::mem::take(&mut st.buf);
                if is_blank(&line) {
                    return None;
                }
                return Some((Ok(line), st));
            }

            match st.inner.next().await {
                Some(Ok(chunk)) => st.buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    st.done = true;
                    st.buf.clear();
                    return Some((Err(e), st));
                }
                None => st.done = true,
            }
        }
    })
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}
