use anyhow::anyhow;
use std::sync::{Arc, Mutex};

use crate::data::MediaAttachment;
use crate::providers::{
    GenerationConfig, Provider, ProviderFuture, ProviderResponse, ProviderUsage,
};

pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&std::path::Path) -> R,
{
    static HOME_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
    let _guard = HOME_MUTEX
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var("HOME").ok();
    // SAFETY: HOME_MUTEX serialises every test that touches HOME.
    unsafe { std::env::set_var("HOME", dir.path()) };
    let result = func(dir.path());
    match old_home {
        Some(old) => unsafe { std::env::set_var("HOME", old) },
        None => unsafe { std::env::remove_var("HOME") },
    }
    result
}

/// What a [`StubProvider`] was asked to generate.
#[derive(Debug, Clone, Default)]
pub(crate) struct StubCall {
    pub(crate) system: Vec<String>,
    pub(crate) user: Vec<String>,
    pub(crate) data_mimes: Vec<String>,
    pub(crate) generation: Option<GenerationConfig>,
}

/// Answers every request with a canned reply and records the prompts.
#[derive(Debug, Clone)]
pub(crate) struct StubProvider {
    reply: Result<String, String>,
    current: StubCall,
    calls: Arc<Mutex<Vec<StubCall>>>,
}

impl StubProvider {
    pub(crate) fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            current: StubCall::default(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            ..Self::replying("")
        }
    }

    pub(crate) fn calls(&self) -> Vec<StubCall> {
        self.calls.lock().expect("stub calls").clone()
    }
}

impl Provider for StubProvider {
    fn append_system_input(mut self, input: String) -> Self {
        self.current.system.push(input);
        self
    }

    fn append_user_input(mut self, input: String) -> Self {
        self.current.user.push(input);
        self
    }

    fn append_user_data(mut self, data: MediaAttachment) -> Self {
        self.current.data_mimes.push(data.mime);
        self
    }

    fn with_generation(mut self, config: GenerationConfig) -> Self {
        self.current.generation = Some(config);
        self
    }

    fn model_name(&self) -> &str {
        "stub-model"
    }

    fn generate(self) -> ProviderFuture {
        Box::pin(async move {
            self.calls
                .lock()
                .expect("stub calls")
                .push(self.current.clone());
            match self.reply {
                Ok(text) => Ok(ProviderResponse {
                    text,
                    model: Some("stub-model".to_string()),
                    usage: Some(ProviderUsage {
                        prompt_tokens: Some(10),
                        completion_tokens: Some(5),
                        total_tokens: Some(15),
                    }),
                }),
                Err(message) => Err(anyhow!(message)),
            }
        })
    }
}
