//! External provider contracts.
//!
//! No production network client ships in this crate — these are the seams
//! a real deployment wires concrete LLM/image/TTS/object-storage clients
//! into. The in-memory mocks here back the crate's own tests and the
//! scenario tests under `tests/`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub cost_cents: i64,
}

#[derive(Debug, Clone)]
pub struct TextGeneration {
    pub text: String,
    pub usage: Usage,
}

#[derive(Debug, Clone)]
pub struct ImageGeneration {
    pub bytes: Vec<u8>,
    pub usage: Usage,
}

#[derive(Debug, Clone)]
pub struct VisionInspection {
    pub has_text: bool,
    pub slop_patterns: Vec<String>,
}

/// LLM text generation: every creative phase but `cover` and `finalize`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<TextGeneration, String>;
}

/// Cover image generation. `seed` drives the rejection-retry variation
/// (color palette index, scale hint) — see `cover`.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, seed: u64) -> Result<ImageGeneration, String>;
}

/// Cover quality gate.
#[async_trait]
pub trait VisionInspector: Send + Sync {
    async fn inspect(&self, image: &[u8]) -> Result<VisionInspection, String>;
}

/// Optional audio synthesis (draft/polished text to speech).
#[async_trait]
pub trait TtsSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, String>;
}

/// Persistent object storage for cover images and audio renders; Checkpoint
/// payloads store only the returned location string.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, String>;
    async fn get(&self, location: &str) -> Result<Vec<u8>, String>;
}

/// The bundle a `JobController` holds; swap any field for a real client.
pub struct ProviderBundle {
    pub text: Box<dyn TextGenerator>,
    pub image: Box<dyn ImageGenerator>,
    pub vision: Box<dyn VisionInspector>,
    pub tts: Box<dyn TtsSynthesizer>,
    pub objects: Box<dyn ObjectStore>,
}

/// Deterministic mock text generator for tests: echoes a canned payload
/// shaped to whichever phase name appears in the prompt, so scenario tests
/// don't need a real LLM to exercise the full pipeline.
#[derive(Debug, Default)]
pub struct MockTextGenerator {
    pub canned_response: Option<String>,
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<TextGeneration, String> {
        let text = self
            .canned_response
            .clone()
            .unwrap_or_else(|| format!("generated response for: {}", &prompt[..prompt.len().min(40)]));
        Ok(TextGeneration {
            text,
            usage: Usage { tokens_in: prompt.len() as i64 / 4, tokens_out: 64, cost_cents: 1 },
        })
    }
}

/// Scripted text generator for scenario tests: returns each entry of
/// `script` in order on successive calls, then repeats the last entry
/// forever. An `Err(msg)` entry where `msg` starts with `"policy:"` is a
/// fatal content-policy refusal, `"capacity:"` a fatal quota/auth failure;
/// any other `Err` is a retriable failure (rate limit, timeout).
#[derive(Debug)]
pub struct ScriptedTextGenerator {
    script: Vec<Result<String, String>>,
    calls: Mutex<usize>,
}

impl ScriptedTextGenerator {
    pub fn new(script: Vec<Result<String, String>>) -> Self {
        Self { script, calls: Mutex::new(0) }
    }
}

#[async_trait]
impl TextGenerator for ScriptedTextGenerator {
    async fn generate(&self, _prompt: &str) -> Result<TextGeneration, String> {
        let mut calls = self.calls.lock().unwrap();
        let this_call = *calls;
        *calls += 1;
        let idx = this_call.min(self.script.len().saturating_sub(1));
        match &self.script[idx] {
            Ok(text) => Ok(TextGeneration { text: text.clone(), usage: Usage::default() }),
            Err(msg) => Err(msg.clone()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MockImageGenerator;

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn generate(&self, _prompt: &str, seed: u64) -> Result<ImageGeneration, String> {
        Ok(ImageGeneration { bytes: vec![seed as u8; 16], usage: Usage { tokens_in: 0, tokens_out: 0, cost_cents: 5 } })
    }
}

/// Rejects a configurable number of leading calls (`reject_first_n`) with
/// `has_text: true`, then accepts — backs the cover-rejection-loop test.
#[derive(Debug)]
pub struct MockVisionInspector {
    pub reject_first_n: usize,
    calls: Mutex<usize>,
}

impl MockVisionInspector {
    pub fn new(reject_first_n: usize) -> Self {
        Self { reject_first_n, calls: Mutex::new(0) }
    }
}

#[async_trait]
impl VisionInspector for MockVisionInspector {
    async fn inspect(&self, _image: &[u8]) -> Result<VisionInspection, String> {
        let mut calls = self.calls.lock().unwrap();
        let this_call = *calls;
        *calls += 1;
        if this_call < self.reject_first_n {
            Ok(VisionInspection { has_text: true, slop_patterns: vec![] })
        } else {
            Ok(VisionInspection { has_text: false, slop_patterns: vec![] })
        }
    }
}

#[derive(Debug, Default)]
pub struct MockTtsSynthesizer;

#[async_trait]
impl TtsSynthesizer for MockTtsSynthesizer {
    async fn synthesize(&self, text: &str, _voice_id: &str) -> Result<Vec<u8>, String> {
        Ok(text.as_bytes().to_vec())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, String> {
        let location = format!("memory://{key}");
        self.objects.lock().unwrap().insert(location.clone(), bytes);
        Ok(location)
    }

    async fn get(&self, location: &str) -> Result<Vec<u8>, String> {
        self.objects
            .lock()
            .unwrap()
            .get(location)
            .cloned()
            .ok_or_else(|| format!("no object at {location}"))
    }
}
