//! Model backend factories and credential rotation.
//!
//! The crate never talks to a chat-completion backend itself; it only selects
//! one by name. A `ModelFactory` is a deferred, repeatable constructor for a
//! client configuration, and the `ModelCatalog` maps selector names to
//! factories. Lookup is deliberately lazy: a bad selector in a crew document
//! or an invocation override is only reported when the factory is actually
//! invoked, never during settings merge.
//!
//! Backends that meter per-key (Groq, here) draw their credential from a
//! shared round-robin pool so repeated creations spread load across keys.

use crate::error::{CrewError, Result};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Which provider a client configuration targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Groq-hosted open models.
    Groq,
    /// OpenAI chat models.
    OpenAi,
    /// Anthropic Claude models.
    Anthropic,
}

/// A fully-selected client configuration, ready for the execution engine to
/// turn into a live client.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatModel {
    /// The provider to construct a client for.
    pub backend: Backend,
    /// Provider-specific model identifier.
    pub model: String,
    /// API key drawn from a rotating pool, when the backend uses one.
    /// `None` means the engine resolves credentials from its environment.
    pub api_key: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Deferred, repeatable construction of a client configuration.
pub trait ModelFactory: Send + Sync {
    /// Produce a fresh client configuration.
    fn create(&self) -> Result<ChatModel>;
}

/// Round-robin pool of API keys.
///
/// `next_key` returns the front key and moves it to the back, so successive
/// calls cycle through the pool. Clones share the same pool.
#[derive(Debug, Clone, Default)]
pub struct KeyRotator {
    keys: Arc<Mutex<VecDeque<String>>>,
}

impl KeyRotator {
    /// Create a rotator over the given keys.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: Arc::new(Mutex::new(keys.into_iter().map(Into::into).collect())),
        }
    }

    /// Take the next key from the pool, rotating it to the back.
    ///
    /// Returns `None` when the pool is empty.
    pub fn next_key(&self) -> Option<String> {
        let mut keys = self.keys.lock().expect("key pool lock poisoned");
        let key = keys.pop_front()?;
        keys.push_back(key.clone());
        Some(key)
    }

    /// Number of keys in the pool.
    pub fn len(&self) -> usize {
        self.keys.lock().expect("key pool lock poisoned").len()
    }

    /// Whether the pool has no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Factory for Groq-hosted models, drawing keys from a shared rotator.
#[derive(Debug, Clone)]
pub struct GroqFactory {
    model: String,
    temperature: f32,
    rotator: KeyRotator,
}

impl GroqFactory {
    /// Create a factory for the given Groq model id.
    pub fn new(model: impl Into<String>, temperature: f32, rotator: KeyRotator) -> Self {
        Self {
            model: model.into(),
            temperature,
            rotator,
        }
    }
}

impl ModelFactory for GroqFactory {
    fn create(&self) -> Result<ChatModel> {
        Ok(ChatModel {
            backend: Backend::Groq,
            model: self.model.clone(),
            api_key: self.rotator.next_key(),
            temperature: self.temperature,
        })
    }
}

/// Factory for backends whose credentials the engine resolves itself.
#[derive(Debug, Clone)]
pub struct EnvCredentialFactory {
    backend: Backend,
    model: String,
    temperature: f32,
}

impl EnvCredentialFactory {
    /// Create a factory for the given backend and model id.
    pub fn new(backend: Backend, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            backend,
            model: model.into(),
            temperature,
        }
    }
}

impl ModelFactory for EnvCredentialFactory {
    fn create(&self) -> Result<ChatModel> {
        Ok(ChatModel {
            backend: self.backend,
            model: self.model.clone(),
            api_key: None,
            temperature: self.temperature,
        })
    }
}

/// Name-indexed store of model factories.
pub struct ModelCatalog {
    factories: BTreeMap<String, Box<dyn ModelFactory>>,
}

impl ModelCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// A catalog with the built-in selectors registered.
    ///
    /// Groq selectors share one rotator over `groq_keys`; OpenAI and
    /// Anthropic selectors leave credential resolution to the engine.
    pub fn with_builtins<I, S>(groq_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rotator = KeyRotator::new(groq_keys);
        let mut catalog = Self::new();

        catalog.register(
            "groq-8b",
            GroqFactory::new("llama3-8b-8192", 0.2, rotator.clone()),
        );
        catalog.register(
            "groq-70b",
            GroqFactory::new("llama3-70b-8192", 1.0, rotator.clone()),
        );
        catalog.register(
            "mixtral",
            GroqFactory::new("mixtral-8x7b-32768", 0.3, rotator.clone()),
        );
        catalog.register("gemma", GroqFactory::new("gemma-7b-it", 0.3, rotator));

        catalog.register(
            "gpt-4o",
            EnvCredentialFactory::new(Backend::OpenAi, "gpt-4o", 0.3),
        );
        catalog.register(
            "gpt-4o-mini",
            EnvCredentialFactory::new(Backend::OpenAi, "gpt-4o-mini", 0.3),
        );
        catalog.register(
            "gpt-3.5-turbo",
            EnvCredentialFactory::new(Backend::OpenAi, "gpt-3.5-turbo-0125", 0.3),
        );
        catalog.register(
            "claude-3-5-sonnet",
            EnvCredentialFactory::new(Backend::Anthropic, "claude-3-5-sonnet-20240620", 0.3),
        );

        catalog
    }

    /// Register a factory under a selector name, replacing any previous one.
    pub fn register(&mut self, selector: impl Into<String>, factory: impl ModelFactory + 'static) {
        self.factories.insert(selector.into(), Box::new(factory));
    }

    /// Invoke the factory registered under `selector`.
    ///
    /// Fails with `UnknownModelSelector` when no factory is registered; this
    /// is the lazy validation point for model selectors.
    pub fn create(&self, selector: &str) -> Result<ChatModel> {
        match self.factories.get(selector) {
            Some(factory) => factory.create(),
            None => Err(CrewError::UnknownModelSelector(selector.to_string())),
        }
    }

    /// Registered selector names, sorted.
    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new()
    }
}
