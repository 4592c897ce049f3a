//! Text-to-speech with an on-disk MP3 cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::SpeechError;

/// Longest text the Google endpoint accepts in one request.
const MAX_CHUNK_CHARS: usize = 100;

const GOOGLE_TTS_ENDPOINT: &str = "https://translate.google.com/translate_tts";

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + 'static {
    /// MP3 audio for `text`.
    async fn synthesize(&self, text: &str) -> Result<Bytes, SpeechError>;
}

/// Google Translate's public TTS endpoint. Long input is split into chunks
/// and the MP3 frames are concatenated.
#[derive(Debug, Clone)]
pub struct GoogleTts {
    client: reqwest::Client,
    endpoint: String,
    language: String,
}

impl GoogleTts {
    pub fn new(client: reqwest::Client, language: impl Into<String>) -> Self {
        Self { client, endpoint: GOOGLE_TTS_ENDPOINT.to_owned(), language: language.into() }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn fetch_chunk(&self, chunk: &str, index: usize, total: usize) -> Result<Bytes, SpeechError> {
        let (idx, total, textlen) = (index.to_string(), total.to_string(), chunk.chars().count().to_string());
        let url = reqwest::Url::parse_with_params(
            &self.endpoint,
            [
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", self.language.as_str()),
                ("q", chunk),
                ("idx", idx.as_str()),
                ("total", total.as_str()),
                ("textlen", textlen.as_str()),
            ],
        )
        .map_err(|e| SpeechError::InvalidEndpoint(e.to_string()))?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SpeechError::Status(status.as_u16()));
        }
        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(&self, text: &str) -> Result<Bytes, SpeechError> {
        let chunks = chunk_text(text, MAX_CHUNK_CHARS);
        let mut audio = BytesMut::new();
        for (index, chunk) in chunks.iter().enumerate() {
            audio.extend_from_slice(&self.fetch_chunk(chunk, index, chunks.len()).await?);
        }
        debug!(chunks = chunks.len(), bytes = audio.len(), "speech synthesized");
        Ok(audio.freeze())
    }
}

/// Split `text` into pieces of at most `max_chars` characters, preferring
/// sentence ends, then word boundaries.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        let current_len = current.chars().count();
        if !current.is_empty() && current_len + 1 + word_len > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if word_len > max_chars {
            // Hard split of a single overlong token.
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
        if word.ends_with(['.', '!', '?']) && current.chars().count() * 2 > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Caches synthesized audio as `<dir>/<sha256(text)>.mp3`.
pub struct CachedSpeech {
    inner: Arc<dyn SpeechSynthesizer>,
    dir: PathBuf,
}

impl CachedSpeech {
    pub fn new(inner: Arc<dyn SpeechSynthesizer>, dir: impl Into<PathBuf>) -> Self {
        Self { inner, dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, text: &str) -> PathBuf {
        let digest = Sha256::digest(text.as_bytes());
        self.dir.join(format!("{}.mp3", hex::encode(digest)))
    }

    pub async fn speak(&self, text: &str) -> Result<Bytes, SpeechError> {
        let path = self.path_for(text);
        match tokio::fs::read(&path).await {
            Ok(audio) => {
                debug!(path = %path.display(), "speech cache hit");
                return Ok(Bytes::from(audio));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let audio = self.inner.synthesize(text).await?;
        tokio::fs::create_dir_all(&self.dir).await?;
        // Write then rename so a concurrent reader never sees a partial file.
        let partial = path.with_extension(format!("mp3.{}.part", uuid::Uuid::new_v4()));
        tokio::fs::write(&partial, &audio).await?;
        tokio::fs::rename(&partial, &path).await?;
        info!(path = %path.display(), bytes = audio.len(), "speech cached");
        Ok(audio)
    }
}

impl std::fmt::Debug for CachedSpeech {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CachedSpeech({})", self.dir.display())
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingSynth {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SpeechSynthesizer for CountingSynth {
        async fn synthesize(&self, text: &str) -> Result<Bytes, SpeechError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from(format!("ID3{text}")))
        }
    }

    #[test]
    fn chunks_respect_the_limit() {
        let text = "The tenant shall pay rent on or before the fifth day of every month. ".repeat(5);
        let chunks = chunk_text(&text, MAX_CHUNK_CHARS);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_CHUNK_CHARS));
        assert_eq!(chunks.join(" "), text.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    #[test]
    fn overlong_token_is_hard_split() {
        let chunks = chunk_text(&"x".repeat(250), 100);
        assert_eq!(chunks.iter().map(|c| c.len()).collect::<Vec<_>>(), vec![100, 100, 50]);
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let synth = Arc::new(CountingSynth::default());
        let speech = CachedSpeech::new(synth.clone(), dir.path().join("tts"));

        let first = speech.speak("Notice period is one month.").await.unwrap();
        let second = speech.speak("Notice period is one month.").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(synth.calls.load(Ordering::SeqCst), 1);

        speech.speak("Different text.").await.unwrap();
        assert_eq!(synth.calls.load(Ordering::SeqCst), 2);
        assert_eq!(std::fs::read_dir(dir.path().join("tts")).unwrap().count(), 2);
    }
}
