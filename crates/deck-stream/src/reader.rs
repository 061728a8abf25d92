//! Token stream reader: accumulates chunks and re-runs the extractor.

use crate::error::GenerateError;
use crate::extract::{Extraction, extract};
use futures::{Stream, StreamExt};

/// What the UI sees after every chunk.
pub type StreamProgress = Extraction;

/// Accumulation buffer for one generation stream. Only ever grows.
#[derive(Debug, Clone, Default)]
pub struct StreamReader {
    buffer: String,
    chunks: usize,
}

impl StreamReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
        self.chunks += 1;
    }

    /// Push a chunk and extract from the whole buffer.
    pub fn push_and_extract(&mut self, chunk: &str) -> StreamProgress {
        self.push(chunk);
        extract(&self.buffer)
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// Drain `stream`, reporting progress after every non-empty chunk.
    ///
    /// Dropping the returned future stops consumption; everything already
    /// reported stays valid. A stream error ends consumption and is returned.
    pub async fn consume<S, F>(&mut self, stream: S, mut on_progress: F) -> Result<(), GenerateError>
    where
        S: Stream<Item = Result<String, GenerateError>>,
        F: FnMut(&StreamProgress),
    {
        let mut stream = std::pin::pin!(stream);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if chunk.is_empty() {
                continue;
            }
            let progress = self.push_and_extract(&chunk);
            log::debug!(
                "chunk {}: {} bytes buffered, {} slides complete",
                self.chunks,
                self.buffer.len(),
                progress.complete_slides.len()
            );
            on_progress(&progress);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn reports_after_every_chunk() {
        let chunks = [r#"{"slides":[{"title":"A","#, r#""content":"<div>x</div>"}"#, "]}", ""];
        let stream = stream::iter(chunks.iter().map(|c| Ok(c.to_string())));
        let mut reader = StreamReader::new();
        let mut seen = Vec::new();
        reader
            .consume(stream, |p| seen.push(p.complete_slides.len()))
            .await
            .unwrap();
        assert_eq!(seen, vec![0, 1, 1]);
        assert_eq!(reader.chunk_count(), 3);
        assert_eq!(reader.as_str(), chunks.concat());
    }

    #[tokio::test]
    async fn stream_error_stops_consumption() {
        let items = vec![
            Ok(r#"{"slides":[{"title":"A","content":"a"}"#.to_string()),
            Err(GenerateError::Backend("connection reset".into())),
            Ok("]}".to_string()),
        ];
        let mut reader = StreamReader::new();
        let mut last = StreamProgress::default();
        let result = reader
            .consume(stream::iter(items), |p| last = p.clone())
            .await;
        assert!(matches!(result, Err(GenerateError::Backend(_))));
        assert_eq!(last.complete_slides.len(), 1);
        assert!(!reader.as_str().ends_with("]}"));
    }
}
