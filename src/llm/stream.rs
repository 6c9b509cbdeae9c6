//! Decoding of Ollama's newline-delimited JSON responses.
//!
//! Network chunks do not line up with JSON objects, so bytes are buffered
//! until a full line is available. Lines are split on raw bytes before UTF-8
//! decoding so multi-byte characters cut across chunks survive.

use super::{LlmError, PullProgress};
use serde::Deserialize;

/// Accumulates bytes and hands out complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete line, without its terminator.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buf.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
        line.pop();
        Some(line)
    }

    /// Whatever is left after the body ended without a final newline.
    pub fn take_rest(&mut self) -> Option<Vec<u8>> {
        if self.buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

fn line_str(line: &[u8]) -> Result<&str, LlmError> {
    std::str::from_utf8(line)
        .map(str::trim)
        .map_err(|e| LlmError::Stream(format!("invalid UTF-8 in response: {}", e)))
}

/// Turns `/api/generate` stream bytes into text fragments.
#[derive(Debug, Default)]
pub struct FragmentDecoder {
    lines: LineBuffer,
    done: bool,
}

impl FragmentDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a network chunk and collect the fragments it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, LlmError> {
        let mut fragments = Vec::new();
        if self.done {
            return Ok(fragments);
        }
        self.lines.push(chunk);
        while let Some(line) = self.lines.next_line() {
            if let Some(fragment) = self.decode_line(&line)? {
                fragments.push(fragment);
            }
            if self.done {
                break;
            }
        }
        Ok(fragments)
    }

    /// Flush a trailing line left unterminated at end of body.
    pub fn finish(&mut self) -> Result<Option<String>, LlmError> {
        if self.done {
            return Ok(None);
        }
        match self.lines.take_rest() {
            Some(rest) => self.decode_line(&rest),
            None => Ok(None),
        }
    }

    /// Whether the server sent its final `done` object.
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn decode_line(&mut self, line: &[u8]) -> Result<Option<String>, LlmError> {
        let text = line_str(line)?;
        if text.is_empty() {
            return Ok(None);
        }
        let chunk: GenerateChunk = serde_json::from_str(text)?;
        if let Some(error) = chunk.error {
            return Err(LlmError::Stream(error));
        }
        if chunk.done {
            self.done = true;
        }
        if chunk.response.is_empty() {
            Ok(None)
        } else {
            Ok(Some(chunk.response))
        }
    }
}

/// Parse one `/api/pull` progress line. Blank lines yield `None`.
pub fn decode_pull_line(line: &[u8]) -> Result<Option<PullProgress>, LlmError> {
    let text = line_str(line)?;
    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(text)?))
}

/// Turns `/api/pull` stream bytes into progress updates and tracks how the
/// pull ended.
#[derive(Debug, Default)]
pub struct PullDecoder {
    lines: LineBuffer,
    last_status: String,
    failure: Option<String>,
}

impl PullDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a network chunk and collect the updates it completes. Decoding
    /// stops at the first line that carries an `error`.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<PullProgress>, LlmError> {
        let mut updates = Vec::new();
        if self.failure.is_some() {
            return Ok(updates);
        }
        self.lines.push(chunk);
        while let Some(line) = self.lines.next_line() {
            if let Some(update) = self.decode_line(&line)? {
                updates.push(update);
            }
            if self.failure.is_some() {
                break;
            }
        }
        Ok(updates)
    }

    /// Flush a trailing line left unterminated at end of body.
    pub fn finish(&mut self) -> Result<Option<PullProgress>, LlmError> {
        if self.failure.is_some() {
            return Ok(None);
        }
        match self.lines.take_rest() {
            Some(rest) => self.decode_line(&rest),
            None => Ok(None),
        }
    }

    /// Error reported by the server, if any.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Status of the last progress line seen.
    pub fn last_status(&self) -> &str {
        &self.last_status
    }

    /// True once the server reported `success` and no error.
    pub fn succeeded(&self) -> bool {
        self.failure.is_none() && self.last_status == "success"
    }

    fn decode_line(&mut self, line: &[u8]) -> Result<Option<PullProgress>, LlmError> {
        let Some(update) = decode_pull_line(line)? else {
            return Ok(None);
        };
        if let Some(error) = update.error {
            self.failure = Some(error);
            return Ok(None);
        }
        self.last_status = update.status.clone();
        Ok(Some(update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = concat!(
        "{\"model\":\"llama3\",\"response\":\"Write a \",\"done\":false}\n",
        "{\"model\":\"llama3\",\"response\":\"détaillé \",\"done\":false}\n",
        "{\"model\":\"llama3\",\"response\":\"haiku ✨\",\"done\":false}\n",
        "{\"model\":\"llama3\",\"response\":\"\",\"done\":true,\"eval_count\":12}\n",
    );
    const TEXT: &str = "Write a détaillé haiku ✨";

    fn decode_in_chunks(body: &[u8], chunk_size: usize) -> String {
        let mut decoder = FragmentDecoder::new();
        let mut out = String::new();
        for chunk in body.chunks(chunk_size) {
            for fragment in decoder.push(chunk).unwrap() {
                out.push_str(&fragment);
            }
        }
        if let Some(rest) = decoder.finish().unwrap() {
            out.push_str(&rest);
        }
        out
    }

    #[test]
    fn test_fragments_concatenate_to_full_text() {
        for size in [1, 2, 3, 7, 16, BODY.len()] {
            assert_eq!(decode_in_chunks(BODY.as_bytes(), size), TEXT, "chunk size {}", size);
        }
    }

    #[test]
    fn test_fragments_arrive_in_order() {
        let mut decoder = FragmentDecoder::new();
        let fragments = decoder.push(BODY.as_bytes()).unwrap();
        assert_eq!(fragments, vec!["Write a ", "détaillé ", "haiku ✨"]);
        assert!(decoder.is_done());
    }

    #[test]
    fn test_unterminated_last_line() {
        let body = "{\"response\":\"a\"}\n{\"response\":\"b\"}";
        assert_eq!(decode_in_chunks(body.as_bytes(), 4), "ab");
    }

    #[test]
    fn test_nothing_after_done() {
        let body = "{\"response\":\"x\",\"done\":true}\n{\"response\":\"late\"}\n";
        assert_eq!(decode_in_chunks(body.as_bytes(), 5), "x");
    }

    #[test]
    fn test_error_line_fails_stream() {
        let mut decoder = FragmentDecoder::new();
        let err = decoder
            .push(b"{\"response\":\"par\"}\n{\"error\":\"model crashed\"}\n")
            .unwrap_err();
        assert!(matches!(err, LlmError::Stream(msg) if msg == "model crashed"));
    }

    #[test]
    fn test_garbage_line_is_json_error() {
        let mut decoder = FragmentDecoder::new();
        assert!(matches!(decoder.push(b"not json\n"), Err(LlmError::Json(_))));
    }

    #[test]
    fn test_decode_pull_line() {
        let progress = decode_pull_line(
            b"{\"status\":\"pulling abc\",\"digest\":\"sha256:abc\",\"total\":100,\"completed\":40}",
        )
        .unwrap()
        .unwrap();
        assert_eq!(progress.status, "pulling abc");
        assert_eq!(progress.total, Some(100));
        assert_eq!(progress.completed, Some(40));
        assert!(decode_pull_line(b"   ").unwrap().is_none());
    }

    fn pull_in_chunks(body: &str, chunk_size: usize) -> (PullDecoder, Vec<String>) {
        let mut decoder = PullDecoder::new();
        let mut statuses = Vec::new();
        for chunk in body.as_bytes().chunks(chunk_size) {
            for update in decoder.push(chunk).unwrap() {
                statuses.push(update.status);
            }
        }
        if let Some(update) = decoder.finish().unwrap() {
            statuses.push(update.status);
        }
        (decoder, statuses)
    }

    #[test]
    fn test_pull_success() {
        let body = concat!(
            "{\"status\":\"pulling manifest\"}\n",
            "{\"status\":\"pulling abc\",\"total\":10,\"completed\":10}\n",
            "{\"status\":\"verifying sha256 digest\"}\n",
            "{\"status\":\"success\"}",
        );
        for size in [1, 5, body.len()] {
            let (decoder, statuses) = pull_in_chunks(body, size);
            assert!(decoder.succeeded(), "chunk size {}", size);
            assert_eq!(statuses.len(), 4);
            assert_eq!(decoder.last_status(), "success");
        }
    }

    #[test]
    fn test_pull_error_line_fails() {
        let body = concat!(
            "{\"status\":\"pulling manifest\"}\n",
            "{\"error\":\"pull model manifest: file does not exist\"}\n",
            "{\"status\":\"success\"}\n",
        );
        let (decoder, statuses) = pull_in_chunks(body, 7);
        assert!(!decoder.succeeded());
        assert_eq!(decoder.failure(), Some("pull model manifest: file does not exist"));
        assert_eq!(statuses, vec!["pulling manifest"]);
    }

    #[test]
    fn test_pull_ending_without_success_fails() {
        let body = "{\"status\":\"pulling manifest\"}\n{\"status\":\"pulling abc\",\"completed\":3}\n";
        let (decoder, _) = pull_in_chunks(body, 4);
        assert!(decoder.failure().is_none());
        assert!(!decoder.succeeded());
        assert_eq!(decoder.last_status(), "pulling abc");
    }
}
