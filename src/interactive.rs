//! Line-oriented REPL around [`DirectionState`].
//!
//! Plain lines are run through a direction probe first (when the tool is
//! bidirectional), then translated in whatever direction the state
//! ends up in. Slash commands adjust the state between lines.

use anyhow::{Result, anyhow};
use std::io::{self, BufRead, Write};

use crate::catalog::TranslatorConfig;
use crate::direction::{
    Direction, DirectionOptions, DirectionProbe, DirectionState, HttpProbe, LocalProbe,
};
use crate::providers::Provider;
use crate::translator::{TranslationRequest, Translator};
use crate::{Config, build_translator, load_environment};

const HELP: &str = "\
/toggle            switch to the next direction (manual)
/direction <dir>   pin a direction, e.g. zh-to-en
/auto <dir>        follow a direction without leaving auto mode
/reset             back to the default direction and auto mode
/mode [name]       show or set the prompt mode
/state             show direction, mode and detection state
/help              show this list
/quit              leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Continue(String),
    Quit,
}

pub struct Session {
    tool: TranslatorConfig,
    state: DirectionState,
    probe: Box<dyn DirectionProbe>,
    mode: String,
}

impl Session {
    pub fn new(tool: TranslatorConfig, options: DirectionOptions) -> Result<Self> {
        let state = DirectionState::for_translator(&tool, options)?;
        Ok(Self {
            probe: Box::new(LocalProbe::new(tool.clone())),
            mode: tool.default_mode.clone(),
            tool,
            state,
        })
    }

    /// Swaps the in-process detector for another one, e.g. a running server.
    pub fn with_probe(mut self, probe: Box<dyn DirectionProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn state(&self) -> &DirectionState {
        &self.state
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    fn parse_direction(&self, raw: &str) -> Result<Direction> {
        self.tool.resolve_direction(raw).ok_or_else(|| {
            anyhow!(
                "unsupported direction '{}' (expected one of {})",
                raw,
                crate::translator::join_directions(&self.tool.directions)
            )
        })
    }

    fn describe(&self) -> String {
        let mut lines = vec![
            format!("tool: {}", self.tool.id),
            format!("direction: {}", self.state.active_direction()),
            format!(
                "selection: {}",
                if self.state.is_manual_direction() {
                    "manual"
                } else {
                    "auto"
                }
            ),
            format!("mode: {}", self.mode),
            format!("detected: {}", self.state.detected_language()),
        ];
        if !self.state.language_warning().is_empty() {
            lines.push(format!("warning: {}", self.state.language_warning()));
        }
        lines.join("\n")
    }

    /// Applies one slash command. Errors are reported, not fatal.
    pub fn handle_command(&mut self, input: &str) -> Outcome {
        let trimmed = input.trim();
        let (command, arg) = match trimmed.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (trimmed, ""),
        };
        let message = match command {
            "/quit" | "/exit" => return Outcome::Quit,
            "/help" => HELP.to_string(),
            "/state" => self.describe(),
            "/toggle" => {
                self.state.toggle_direction();
                format!("direction: {} (manual)", self.state.active_direction())
            }
            "/reset" => {
                self.state.reset_direction();
                format!("direction: {} (auto)", self.state.active_direction())
            }
            "/direction" | "/auto" => match self.parse_direction(arg) {
                Ok(direction) => {
                    if command == "/direction" {
                        self.state.set_manual_direction(&direction);
                        format!("direction: {} (manual)", direction)
                    } else {
                        self.state.set_auto_direction(&direction);
                        format!("direction: {} (auto)", direction)
                    }
                }
                Err(err) => format!("error: {}", err),
            },
            "/mode" if arg.is_empty() => format!(
                "mode: {} (available: {})",
                self.mode,
                self.tool.mode_names().join(", ")
            ),
            "/mode" => {
                if self.tool.mode(arg).is_some() {
                    self.mode = arg.to_string();
                    format!("mode set to {}", arg)
                } else {
                    format!(
                        "error: unknown mode '{}' (available: {})",
                        arg,
                        self.tool.mode_names().join(", ")
                    )
                }
            }
            _ => format!("error: unknown command '{}' (try /help)", command),
        };
        Outcome::Continue(message)
    }

    /// Detects (for bidirectional tools) and translates one line.
    pub async fn translate_line<P: Provider>(
        &mut self,
        line: &str,
        translator: &Translator<P>,
    ) -> Result<String> {
        let mut notes = Vec::new();
        if self.tool.supports_detection() {
            let summary = self.state.run_language_detection(line, self.probe.as_ref()).await;
            if !self.state.language_warning().is_empty() {
                notes.push(format!("warning: {}", self.state.language_warning()));
            }
            notes.push(format!(
                "[{} · {} · {:.0}%]",
                summary.detected_input_language,
                summary.detected_direction,
                summary.confidence * 100.0
            ));
        }

        let request = TranslationRequest {
            mode: Some(self.mode.clone()),
            direction: Some(self.state.active_direction().to_string()),
            ..TranslationRequest::text(line)
        };
        let result = translator.translate(request, &self.tool).await?;
        notes.push(result.translated);
        Ok(notes.join("\n"))
    }
}

/// `api_base` points detection at a running `vibetrans serve` instead of
/// the local heuristic.
pub async fn run_interactive(config: &Config, tool: &str, api_base: Option<&str>) -> Result<()> {
    let (settings, catalog) = load_environment(config)?;
    let tool = catalog
        .get(tool)
        .cloned()
        .ok_or_else(|| anyhow!("unknown translator '{}'", tool))?;
    let translator = build_translator(config, &settings)?;
    let route = tool.id.clone();
    let mut session = Session::new(tool, settings.direction_options())?;
    if let Some(api_base) = api_base {
        tracing::debug!(api_base, "using remote language detection");
        session = session.with_probe(Box::new(HttpProbe::new(api_base, &route)));
    }

    println!("{}. Type /help for commands, /quit to leave.", session.tool.name);
    let stdin = io::stdin();
    let mut stdin_lock = stdin.lock();
    let mut line = String::new();
    loop {
        line.clear();
        print!("{}> ", session.state.active_direction());
        io::stdout().flush()?;
        if stdin_lock.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.starts_with('/') {
            match session.handle_command(input) {
                Outcome::Quit => break,
                Outcome::Continue(message) => println!("{}", message),
            }
            continue;
        }
        match session.translate_line(input, &translator).await {
            Ok(output) => println!("{}", output),
            Err(err) => eprintln!("error: {:#}", err),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::queue::{QueueConfig, RequestQueue};
    use crate::test_util::StubProvider;
    use std::sync::Arc;

    fn session(id: &str) -> Session {
        let tool = Catalog::builtin().unwrap().get(id).unwrap().clone();
        Session::new(tool, DirectionOptions::default()).unwrap()
    }

    #[test]
    fn toggle_and_reset() {
        let mut session = session("chinese-english-translator");
        assert_eq!(
            session.handle_command("/toggle"),
            Outcome::Continue("direction: en-to-zh (manual)".to_string())
        );
        assert!(session.state().is_manual_direction());
        assert_eq!(
            session.handle_command("/reset"),
            Outcome::Continue("direction: zh-to-en (auto)".to_string())
        );
        assert!(!session.state().is_manual_direction());
        assert_eq!(session.handle_command("/quit"), Outcome::Quit);
    }

    #[test]
    fn help_lists_every_command() {
        let mut session = session("chinese-english-translator");
        let Outcome::Continue(help) = session.handle_command("/help") else {
            panic!("expected a message");
        };
        for command in [
            "/toggle", "/direction", "/auto", "/reset", "/mode", "/state", "/help", "/quit",
        ] {
            assert!(help.contains(command), "help lacks {}", command);
        }
    }

    #[test]
    fn direction_accepts_aliases_and_rejects_unknown() {
        let mut session = session("aramaic-translator");
        assert_eq!(
            session.handle_command("/direction toEnglish"),
            Outcome::Continue("direction: arc-to-en (manual)".to_string())
        );
        let Outcome::Continue(message) = session.handle_command("/auto fr-to-en") else {
            panic!("expected a message");
        };
        assert!(message.starts_with("error: unsupported direction 'fr-to-en'"));
    }

    #[test]
    fn mode_must_exist() {
        let mut session = session("chinese-english-translator");
        assert_eq!(
            session.handle_command("/mode legal"),
            Outcome::Continue("mode set to legal".to_string())
        );
        assert_eq!(session.mode(), "legal");
        let Outcome::Continue(message) = session.handle_command("/mode poetic") else {
            panic!("expected a message");
        };
        assert!(message.starts_with("error: unknown mode"));
        assert_eq!(session.mode(), "legal");
    }

    #[tokio::test]
    async fn lines_are_detected_then_translated() {
        let stub = StubProvider::replying("你好");
        let translator = Translator::new(
            stub.clone(),
            Arc::new(RequestQueue::new(QueueConfig::default())),
        );
        let mut session = session("chinese-english-translator");
        let output = session
            .translate_line("Hello, how are you today?", &translator)
            .await
            .unwrap();
        assert_eq!(output, "[english · en-to-zh · 100%]\n你好");
        assert_eq!(session.state().active_direction().to_string(), "en-to-zh");
        assert!(stub.calls()[0].user[0].contains("English text to Chinese"));
    }

    #[tokio::test]
    async fn remote_probe_drives_direction() {
        use httpmock::prelude::*;

        let server = MockServer::start_async().await;
        let detect = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/chinese-english-translator")
                    .json_body_partial(r#"{"detectOnly": true}"#);
                then.status(200).json_body(serde_json::json!({
                    "detectedDirection": "en-to-zh",
                    "detectedInputLanguage": "english",
                    "confidence": 0.8
                }));
            })
            .await;
        let stub = StubProvider::replying("早上好");
        let translator = Translator::new(
            stub.clone(),
            Arc::new(RequestQueue::new(QueueConfig::default())),
        );
        let mut session = session("chinese-english-translator").with_probe(Box::new(
            HttpProbe::new(&server.base_url(), "chinese-english-translator"),
        ));
        let output = session
            .translate_line("Good morning", &translator)
            .await
            .unwrap();
        detect.assert_async().await;
        assert_eq!(output, "[english · en-to-zh · 80%]\n早上好");
    }
}
