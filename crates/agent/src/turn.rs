//! Turn orchestration.
//!
//! [`TurnRunner::stream`] runs one full turn in a background task and hands
//! back a channel of [`TurnEvent`]s. Every turn ends with exactly one
//! `Done` event, including all failure paths, so consumers never hang.

use crate::gate::{DecisionGate, GateTemplates};
use crate::prompt::{image_prompt_request, PromptAssembly};
use crate::web::fetch_web_context;
use chrono::Utc;
use hearth_core::{
    ImageRenderer, Inference, MemoryEntry, SearchProvider, TurnEvent,
    GenerateRequest,
};
use hearth_memory::{artifact_url, new_image_filename, EntryPatch, MemoryStore, StoreLimits};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const EVENT_BUFFER: usize = 32;
const IMAGE_PLACEHOLDER: &str = "Generating image...";
const IMAGE_DONE: &str = "[Image generated.]";

fn model_failure_message(e: &dyn std::fmt::Display) -> String {
    format!(
        "The model request failed ({e}). Try a smaller or different image, \
         or check that Ollama is running."
    )
}

/// One incoming question with its attachments.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    pub question: String,
    /// Caller-supplied context (session facts, preferences) for the prompt.
    pub extra_context: Option<String>,
    /// Base64-encoded images, data-URL prefix already stripped.
    pub images: Vec<String>,
    /// Text summaries of `images`, produced by [`crate::describe_images`].
    pub image_context: Option<String>,
}

impl TurnRequest {
    pub fn question(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }
}

/// Shared orchestrator settings.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Root directory holding per-persona folders.
    pub personas_root: PathBuf,
    /// Memory size caps.
    pub limits: StoreLimits,
    /// Classification prompt templates.
    pub templates: GateTemplates,
}

/// Orchestrates turns against a set of collaborators. Cheap to clone.
#[derive(Clone)]
pub struct TurnRunner {
    inference: Arc<dyn Inference>,
    search: Option<Arc<dyn SearchProvider>>,
    renderer: Arc<dyn ImageRenderer>,
    gate: DecisionGate,
    config: Arc<TurnConfig>,
}

impl TurnRunner {
    pub fn new(
        inference: Arc<dyn Inference>,
        search: Option<Arc<dyn SearchProvider>>,
        renderer: Arc<dyn ImageRenderer>,
        config: TurnConfig,
    ) -> Self {
        let gate = DecisionGate::new(inference.clone(), config.templates.clone());
        Self {
            inference,
            search,
            renderer,
            gate,
            config: Arc::new(config),
        }
    }

    /// Run one turn in the background and stream its events.
    pub fn stream(
        &self,
        persona: hearth_core::Persona,
        request: TurnRequest,
    ) -> mpsc::Receiver<TurnEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let runner = self.clone();
        tokio::spawn(async move {
            runner.run_turn(persona, request, tx).await;
        });
        rx
    }

    /// Run one turn to completion and return `(answer_text, sources)`.
    pub async fn answer(
        &self,
        persona: hearth_core::Persona,
        request: TurnRequest,
    ) -> (String, Vec<String>) {
        let mut rx = self.stream(persona, request);
        let mut parts = String::new();
        while let Some(event) = rx.recv().await {
            match event {
                TurnEvent::Token { content } => parts.push_str(&content),
                TurnEvent::Done {
                    sources,
                    final_text,
                    ..
                } => {
                    let text = final_text.unwrap_or_else(|| parts.trim().to_string());
                    return (text, sources);
                }
                _ => {}
            }
        }
        (parts.trim().to_string(), Vec::new())
    }

    async fn run_turn(
        &self,
        persona: hearth_core::Persona,
        request: TurnRequest,
        tx: mpsc::Sender<TurnEvent>,
    ) {
        let store = MemoryStore::new(
            &persona.memory_path,
            &self.config.personas_root,
            self.config.limits,
        );

        let mut user_entry = MemoryEntry::user(&request.question);
        user_entry.image_context = request.image_context.clone();
        let user_id = match store.append(user_entry).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Failed to persist user entry");
                send_done(&tx, done_error(vec![], None, None, None, e.to_string())).await;
                return;
            }
        };

        let memory = match store.load_all().await {
            Ok(memory) => memory,
            Err(e) => {
                error!(error = %e, "Failed to load memory");
                send_done(
                    &tx,
                    done_error(vec![], None, Some(user_id), None, e.to_string()),
                )
                .await;
                return;
            }
        };

        let mut assembly = PromptAssembly::new(&request.question, memory);
        assembly.system_prompt = Some(persona.system_prompt.clone());
        assembly.extra_context = request.extra_context.clone();

        // Only consult the gate when the answer could actually change: no
        // fresh images attached and some past entry carries a summary.
        if persona.decisions.prior_image_context
            && request.images.is_empty()
            && assembly.memory.iter().any(|e| e.image_context.is_some())
        {
            match self
                .gate
                .needs_prior_image_context(&request.question, &persona.decision_model)
                .await
            {
                Ok(include) => assembly.include_memory_image_context = include,
                Err(e) => {
                    self.fail_classification(&tx, &user_id, e).await;
                    return;
                }
            }
        }

        let mut assistant = MemoryEntry::assistant(&persona.name);

        if persona.decisions.web_search
            && let Some(search) = &self.search
        {
            match self
                .gate
                .needs_web_search(&request.question, &persona.decision_model)
                .await
            {
                Ok(true) => {
                    info!("Searching the web");
                    if tx.send(TurnEvent::Searching).await.is_err() {
                        return;
                    }
                    let (context, sources) =
                        fetch_web_context(search.as_ref(), &request.question).await;
                    if let Some(context) = context {
                        assistant.web_context = Some(context.clone());
                        assistant.sources = sources.clone();
                        assembly.web_context = Some(context);
                        assembly.sources = sources;
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    self.fail_classification(&tx, &user_id, e).await;
                    return;
                }
            }
        }

        if persona.decisions.image_generation {
            match self
                .gate
                .needs_image_generation(&request.question, &persona.decision_model)
                .await
            {
                Ok(true) => {
                    self.image_branch(&persona, &request, &assembly, assistant, &store, &user_id, &tx)
                        .await;
                    return;
                }
                Ok(false) => {}
                Err(e) => {
                    self.fail_classification(&tx, &user_id, e).await;
                    return;
                }
            }
        }

        // Main generation.
        let model = if request.images.is_empty() {
            persona.model.clone()
        } else {
            persona.vision_model.clone()
        };
        let generate = GenerateRequest {
            model,
            prompt: assembly.build(),
            images: request.images.clone(),
            think: true,
        };
        let mut fragments = match self.inference.stream(generate).await {
            Ok(rx) => rx,
            Err(e) => {
                self.fail_generation(&tx, &store, assistant, &user_id, e).await;
                return;
            }
        };

        let mut full = String::new();
        while let Some(item) = fragments.recv().await {
            match item {
                Ok(fragment) => {
                    if let Some(thinking) = fragment.thinking
                        && !thinking.is_empty()
                        && tx
                            .send(TurnEvent::Thinking { content: thinking })
                            .await
                            .is_err()
                    {
                        return;
                    }
                    if let Some(token) = fragment.response
                        && !token.is_empty()
                    {
                        full.push_str(&token);
                        if tx.send(TurnEvent::Token { content: token }).await.is_err() {
                            return;
                        }
                    }
                    if fragment.done {
                        break;
                    }
                }
                Err(e) => {
                    self.fail_generation(&tx, &store, assistant, &user_id, e).await;
                    return;
                }
            }
        }

        assistant.content = full.trim().to_string();
        let sources = assembly.sources.clone();
        let assistant_id = match store.append(assistant).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "Failed to persist assistant entry");
                None
            }
        };
        send_done(
            &tx,
            TurnEvent::Done {
                sources,
                final_text: None,
                user_id: Some(user_id),
                assistant_id,
                error: None,
                image_generating: false,
            },
        )
        .await;
    }

    /// Image generation branch: author an image prompt with the main model,
    /// persist a placeholder entry, kick off rendering in the background,
    /// and close the stream.
    #[allow(clippy::too_many_arguments)]
    async fn image_branch(
        &self,
        persona: &hearth_core::Persona,
        request: &TurnRequest,
        assembly: &PromptAssembly,
        mut assistant: MemoryEntry,
        store: &MemoryStore,
        user_id: &str,
        tx: &mpsc::Sender<TurnEvent>,
    ) {
        let authoring = GenerateRequest {
            model: persona.model.clone(),
            prompt: image_prompt_request(&assembly.memory_context(), &request.question),
            images: Vec::new(),
            think: true,
        };
        let mut fragments = match self.inference.stream(authoring).await {
            Ok(rx) => rx,
            Err(e) => {
                self.fail_generation(tx, store, assistant, user_id, e).await;
                return;
            }
        };

        // Authored prompt text is also surfaced to the client as thinking;
        // reasoning fragments are surfaced but never become the prompt.
        let mut image_prompt = String::new();
        while let Some(item) = fragments.recv().await {
            match item {
                Ok(fragment) => {
                    if let Some(thinking) = fragment.thinking
                        && !thinking.is_empty()
                        && tx
                            .send(TurnEvent::Thinking { content: thinking })
                            .await
                            .is_err()
                    {
                        return;
                    }
                    if let Some(token) = fragment.response
                        && !token.is_empty()
                    {
                        image_prompt.push_str(&token);
                        if tx
                            .send(TurnEvent::Thinking { content: token })
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    if fragment.done {
                        break;
                    }
                }
                Err(e) => {
                    self.fail_generation(tx, store, assistant, user_id, e).await;
                    return;
                }
            }
        }
        let image_prompt = image_prompt.trim().to_string();

        if tx
            .send(TurnEvent::Thinking {
                content: format!("\n\n{IMAGE_PLACEHOLDER}\n"),
            })
            .await
            .is_err()
        {
            return;
        }

        let filename = new_image_filename(Utc::now());
        let images_dir = self
            .config
            .personas_root
            .join(&persona.id)
            .join("images");
        let save_path = images_dir.join(&filename);
        let image_url = artifact_url(&persona.id, &filename);

        // The artifact directory must exist before the placeholder points
        // into it; a bad artifact root fails the turn here, not later in
        // the background job.
        if let Err(e) = tokio::fs::create_dir_all(&images_dir).await {
            error!(error = %e, dir = %images_dir.display(), "Failed to create image directory");
            let message = format!("Generation failed: {e}");
            assistant.content = message.clone();
            let assistant_id = match store.append(assistant).await {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(error = %e, "Failed to persist failure entry");
                    None
                }
            };
            send_done(
                tx,
                TurnEvent::Done {
                    sources: Vec::new(),
                    final_text: Some(message),
                    user_id: Some(user_id.to_string()),
                    assistant_id,
                    error: Some(e.to_string()),
                    image_generating: false,
                },
            )
            .await;
            return;
        }

        assistant.content = IMAGE_PLACEHOLDER.to_string();
        assistant.generated_image_prompt = Some(image_prompt.clone());
        assistant.generated_image_path = Some(image_url);
        let assistant_id = match store.append(assistant).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Failed to persist image placeholder entry");
                send_done(
                    tx,
                    done_error(vec![], None, Some(user_id.to_string()), None, e.to_string()),
                )
                .await;
                return;
            }
        };

        let renderer = self.renderer.clone();
        let store = store.clone();
        let entry_id = assistant_id.clone();
        tokio::spawn(async move {
            let result = renderer.render(&image_prompt, &save_path).await;
            let patch = match result {
                Ok(()) => {
                    info!(path = %save_path.display(), "Image generated");
                    EntryPatch {
                        content: Some(IMAGE_DONE.to_string()),
                        ..Default::default()
                    }
                }
                Err(e) => {
                    error!(error = %e, "Image generation failed");
                    EntryPatch {
                        content: Some(format!("Generation failed: {e}")),
                        generated_image_path: Some(None),
                        ..Default::default()
                    }
                }
            };
            if let Err(e) = store.update(&entry_id, patch).await {
                error!(error = %e, "Failed to record image generation outcome");
            }
        });

        send_done(
            tx,
            TurnEvent::Done {
                sources: Vec::new(),
                final_text: Some(IMAGE_PLACEHOLDER.to_string()),
                user_id: Some(user_id.to_string()),
                assistant_id: Some(assistant_id),
                error: None,
                image_generating: true,
            },
        )
        .await;
    }

    /// A decision gate failed: end the turn without persisting an assistant
    /// entry, since no answer was ever attempted.
    async fn fail_classification(
        &self,
        tx: &mpsc::Sender<TurnEvent>,
        user_id: &str,
        e: hearth_core::InferenceError,
    ) {
        error!(error = %e, "Decision classification failed");
        send_done(
            tx,
            TurnEvent::Done {
                sources: Vec::new(),
                final_text: Some(model_failure_message(&e)),
                user_id: Some(user_id.to_string()),
                assistant_id: None,
                error: Some(e.to_string()),
                image_generating: false,
            },
        )
        .await;
    }

    /// The answer (or image prompt) generation failed: persist the failure
    /// text as the assistant's reply, then end the turn.
    async fn fail_generation(
        &self,
        tx: &mpsc::Sender<TurnEvent>,
        store: &MemoryStore,
        mut assistant: MemoryEntry,
        user_id: &str,
        e: hearth_core::InferenceError,
    ) {
        error!(error = %e, "Model request failed");
        let message = model_failure_message(&e);
        assistant.content = message.clone();
        let assistant_id = match store.append(assistant).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "Failed to persist failure entry");
                None
            }
        };
        send_done(
            tx,
            TurnEvent::Done {
                sources: Vec::new(),
                final_text: Some(message),
                user_id: Some(user_id.to_string()),
                assistant_id,
                error: Some(e.to_string()),
                image_generating: false,
            },
        )
        .await;
    }
}

fn done_error(
    sources: Vec<String>,
    final_text: Option<String>,
    user_id: Option<String>,
    assistant_id: Option<String>,
    error: String,
) -> TurnEvent {
    TurnEvent::Done {
        sources,
        final_text,
        user_id,
        assistant_id,
        error: Some(error),
        image_generating: false,
    }
}

async fn send_done(tx: &mpsc::Sender<TurnEvent>, event: TurnEvent) {
    if tx.send(event).await.is_err() {
        warn!("Turn consumer went away before the done event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hearth_core::{
        DecisionToggles, InferenceError, Persona, RenderError, SearchError, SearchHit,
        StreamFragment,
    };
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Inference double: pops scripted replies for `generate` and scripted
    /// fragment lists for `stream`, recording every prompt it sees.
    struct Scripted {
        replies: Mutex<VecDeque<Result<String, InferenceError>>>,
        streams: Mutex<VecDeque<Vec<Result<StreamFragment, InferenceError>>>>,
        prompts: Mutex<Vec<(String, String)>>,
    }

    impl Scripted {
        fn new(
            replies: Vec<Result<String, InferenceError>>,
            streams: Vec<Vec<Result<StreamFragment, InferenceError>>>,
        ) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                streams: Mutex::new(streams.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Inference for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, request: GenerateRequest) -> Result<String, InferenceError> {
            self.prompts
                .lock()
                .unwrap()
                .push((request.model, request.prompt));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok("NO".to_string()))
        }

        async fn stream(
            &self,
            request: GenerateRequest,
        ) -> Result<mpsc::Receiver<Result<StreamFragment, InferenceError>>, InferenceError>
        {
            self.prompts
                .lock()
                .unwrap()
                .push((request.model, request.prompt));
            let script = self
                .streams
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected stream request");
            let (tx, rx) = mpsc::channel(16);
            tokio::spawn(async move {
                for item in script {
                    if tx.send(item).await.is_err() {
                        break;
                    }
                }
            });
            Ok(rx)
        }
    }

    struct NoSearch;

    #[async_trait]
    impl SearchProvider for NoSearch {
        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchHit>, SearchError> {
            Ok(vec![SearchHit {
                title: "t".into(),
                url: Some("https://a.example".into()),
                snippet: Some("snippet text".into()),
            }])
        }
    }

    /// Renderer double that writes a marker file, or fails.
    struct FileRenderer {
        fail: bool,
    }

    #[async_trait]
    impl ImageRenderer for FileRenderer {
        async fn render(&self, _prompt: &str, output: &Path) -> Result<(), RenderError> {
            if self.fail {
                return Err(RenderError::Unreachable("connection refused".into()));
            }
            tokio::fs::write(output, b"png").await.map_err(RenderError::Write)
        }
    }

    fn fragment(thinking: Option<&str>, response: Option<&str>, done: bool) -> StreamFragment {
        StreamFragment {
            thinking: thinking.map(Into::into),
            response: response.map(Into::into),
            done,
        }
    }

    fn persona(dir: &TempDir) -> Persona {
        Persona {
            id: "sage".into(),
            name: "Sage".into(),
            system_prompt: "You are Sage.".into(),
            decision_model: "decider".into(),
            model: "main".into(),
            vision_model: "vision".into(),
            memory_path: dir.path().join("personas/sage/memory.json"),
            decisions: DecisionToggles::default(),
        }
    }

    fn runner(
        dir: &TempDir,
        inference: Scripted,
        search: bool,
        renderer: FileRenderer,
    ) -> TurnRunner {
        TurnRunner::new(
            Arc::new(inference),
            search.then(|| Arc::new(NoSearch) as Arc<dyn SearchProvider>),
            Arc::new(renderer),
            TurnConfig {
                personas_root: dir.path().join("personas"),
                limits: StoreLimits::default(),
                templates: GateTemplates::default(),
            },
        )
    }

    async fn drain(mut rx: mpsc::Receiver<TurnEvent>) -> Vec<TurnEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn store_for(dir: &TempDir) -> MemoryStore {
        MemoryStore::new(
            dir.path().join("personas/sage/memory.json"),
            dir.path().join("personas"),
            StoreLimits::default(),
        )
    }

    #[tokio::test]
    async fn plain_turn_streams_tokens_and_persists_both_sides() {
        let dir = TempDir::new().unwrap();
        // Gates: web -> NO, image -> NO; then the main stream.
        let inference = Scripted::new(
            vec![Ok("NO".into()), Ok("NO".into())],
            vec![vec![
                Ok(fragment(Some("let me think"), None, false)),
                Ok(fragment(None, Some("Hello"), false)),
                Ok(fragment(None, Some(" world"), true)),
            ]],
        );
        let runner = runner(&dir, inference, true, FileRenderer { fail: false });

        let events = drain(runner.stream(persona(&dir), TurnRequest::question("hi"))).await;
        assert_eq!(events[0].event_type(), "thinking");
        assert_eq!(events[1].event_type(), "token");
        assert_eq!(events[2].event_type(), "token");
        match events.last().unwrap() {
            TurnEvent::Done {
                sources,
                final_text,
                user_id,
                assistant_id,
                error,
                ..
            } => {
                assert!(sources.is_empty());
                assert!(final_text.is_none());
                assert!(error.is_none());
                assert!(user_id.is_some() && assistant_id.is_some());
            }
            other => panic!("Expected done, got {other:?}"),
        }

        let entries = store_for(&dir).load_all().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].content, "hi");
        assert_eq!(entries[1].content, "Hello world");
        assert_eq!(entries[1].persona_name.as_deref(), Some("Sage"));
    }

    #[tokio::test]
    async fn web_turn_emits_searching_and_injects_snippets() {
        let dir = TempDir::new().unwrap();
        let inference = Scripted::new(
            vec![Ok("YES".into()), Ok("NO".into())],
            vec![vec![Ok(fragment(None, Some("answer"), true))]],
        );
        let runner = runner(&dir, inference, true, FileRenderer { fail: false });

        let rx = runner.stream(persona(&dir), TurnRequest::question("latest news?"));
        let events = drain(rx).await;
        assert_eq!(events[0].event_type(), "searching");
        match events.last().unwrap() {
            TurnEvent::Done { sources, .. } => {
                assert_eq!(sources, &["https://a.example"]);
            }
            other => panic!("Expected done, got {other:?}"),
        }

        let entries = store_for(&dir).load_all().await.unwrap();
        assert_eq!(entries[1].sources, vec!["https://a.example"]);
        // Snippets are transient: not persisted.
        let raw = tokio::fs::read_to_string(dir.path().join("personas/sage/memory.json"))
            .await
            .unwrap();
        assert!(!raw.contains("snippet text"));
    }

    #[tokio::test]
    async fn image_turn_persists_placeholder_then_patches_on_success() {
        let dir = TempDir::new().unwrap();
        // Gates: web -> NO, image -> YES; then the authoring stream.
        let inference = Scripted::new(
            vec![Ok("NO".into()), Ok("YES".into())],
            vec![vec![
                Ok(fragment(Some("pondering"), None, false)),
                Ok(fragment(None, Some("a watercolor fox"), true)),
            ]],
        );
        let runner = runner(&dir, inference, true, FileRenderer { fail: false });

        let events = drain(runner.stream(persona(&dir), TurnRequest::question("draw a fox"))).await;
        let thinking: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                TurnEvent::Thinking { content } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            thinking,
            vec!["pondering", "a watercolor fox", "\n\nGenerating image...\n"]
        );
        match events.last().unwrap() {
            TurnEvent::Done {
                final_text,
                image_generating,
                assistant_id,
                ..
            } => {
                assert_eq!(final_text.as_deref(), Some("Generating image..."));
                assert!(*image_generating);
                assert!(assistant_id.is_some());
            }
            other => panic!("Expected done, got {other:?}"),
        }

        // The background render patches the entry once it lands.
        let store = store_for(&dir);
        let mut patched = false;
        for _ in 0..200 {
            let entries = store.load_all().await.unwrap();
            if entries[1].content == "[Image generated.]" {
                patched = true;
                let url = entries[1].generated_image_path.as_deref().unwrap();
                assert!(url.starts_with("/personas/sage/images/"));
                assert!(url.ends_with(".png"));
                assert_eq!(
                    entries[1].generated_image_prompt.as_deref(),
                    Some("a watercolor fox")
                );
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(patched, "Background render never patched the entry");
    }

    #[tokio::test]
    async fn failed_render_records_failure_and_clears_path() {
        let dir = TempDir::new().unwrap();
        let inference = Scripted::new(
            vec![Ok("NO".into()), Ok("YES".into())],
            vec![vec![Ok(fragment(None, Some("a fox"), true))]],
        );
        let runner = runner(&dir, inference, true, FileRenderer { fail: true });

        drain(runner.stream(persona(&dir), TurnRequest::question("draw a fox"))).await;

        let store = store_for(&dir);
        let mut recorded = false;
        for _ in 0..200 {
            let entries = store.load_all().await.unwrap();
            if entries[1].content.starts_with("Generation failed:") {
                recorded = true;
                assert!(entries[1].generated_image_path.is_none());
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(recorded, "Render failure was never recorded");
    }

    #[tokio::test]
    async fn blocked_image_directory_fails_the_turn_in_the_foreground() {
        let dir = TempDir::new().unwrap();
        let persona_dir = dir.path().join("personas/sage");
        tokio::fs::create_dir_all(&persona_dir).await.unwrap();
        // A file where the artifact directory should be makes create_dir_all fail.
        tokio::fs::write(persona_dir.join("images"), b"in the way").await.unwrap();

        let inference = Scripted::new(
            vec![Ok("NO".into()), Ok("YES".into())],
            vec![vec![Ok(fragment(None, Some("a fox"), true))]],
        );
        let runner = runner(&dir, inference, true, FileRenderer { fail: false });

        let events = drain(runner.stream(persona(&dir), TurnRequest::question("draw a fox"))).await;
        match events.last().unwrap() {
            TurnEvent::Done {
                final_text,
                error,
                image_generating,
                ..
            } => {
                assert!(final_text.as_deref().unwrap().starts_with("Generation failed:"));
                assert!(error.is_some());
                assert!(!image_generating);
            }
            other => panic!("Expected done, got {other:?}"),
        }

        let entries = store_for(&dir).load_all().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[1].content.starts_with("Generation failed:"));
        assert!(entries[1].generated_image_path.is_none());
    }

    #[tokio::test]
    async fn model_failure_persists_failure_entry() {
        let dir = TempDir::new().unwrap();
        let inference = Scripted::new(
            vec![Ok("NO".into()), Ok("NO".into())],
            vec![vec![
                Ok(fragment(None, Some("par"), false)),
                Err(InferenceError::Network("connection reset".into())),
            ]],
        );
        let runner = runner(&dir, inference, true, FileRenderer { fail: false });

        let events = drain(runner.stream(persona(&dir), TurnRequest::question("hi"))).await;
        match events.last().unwrap() {
            TurnEvent::Done {
                final_text, error, ..
            } => {
                let text = final_text.as_deref().unwrap();
                assert!(text.starts_with("The model request failed ("));
                assert!(text.contains("connection reset"));
                assert!(error.is_some());
            }
            other => panic!("Expected done, got {other:?}"),
        }

        let entries = store_for(&dir).load_all().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[1].content.starts_with("The model request failed"));
    }

    #[tokio::test]
    async fn classification_failure_persists_no_assistant_entry() {
        let dir = TempDir::new().unwrap();
        let inference = Scripted::new(
            vec![Err(InferenceError::Timeout("decision model".into()))],
            vec![],
        );
        let runner = runner(&dir, inference, true, FileRenderer { fail: false });

        let events = drain(runner.stream(persona(&dir), TurnRequest::question("hi"))).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            TurnEvent::Done {
                error,
                assistant_id,
                user_id,
                ..
            } => {
                assert!(error.is_some());
                assert!(assistant_id.is_none());
                assert!(user_id.is_some());
            }
            other => panic!("Expected done, got {other:?}"),
        }
        let entries = store_for(&dir).load_all().await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn disabled_toggles_skip_their_gates() {
        let dir = TempDir::new().unwrap();
        let inference = Arc::new(Scripted::new(
            vec![],
            vec![vec![Ok(fragment(None, Some("hello"), true))]],
        ));
        let runner = TurnRunner::new(
            inference.clone(),
            None,
            Arc::new(FileRenderer { fail: false }),
            TurnConfig {
                personas_root: dir.path().join("personas"),
                limits: StoreLimits::default(),
                templates: GateTemplates::default(),
            },
        );

        let mut persona = persona(&dir);
        persona.decisions.image_generation = false;
        persona.decisions.web_search = false;

        let events = drain(runner.stream(persona, TurnRequest::question("hi"))).await;
        assert!(events.iter().all(|e| e.event_type() != "searching"));
        assert_eq!(events.last().unwrap().event_type(), "done");

        // The decision model was never consulted: the only request is the
        // main generation stream itself.
        let prompts = inference.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].0, "main");
    }

    #[tokio::test]
    async fn attached_images_switch_to_the_vision_model() {
        let dir = TempDir::new().unwrap();
        let inference = Arc::new(Scripted::new(
            vec![Ok("NO".into()), Ok("NO".into())],
            vec![vec![Ok(fragment(None, Some("a cat"), true))]],
        ));
        let runner = TurnRunner::new(
            inference.clone(),
            None,
            Arc::new(FileRenderer { fail: false }),
            TurnConfig {
                personas_root: dir.path().join("personas"),
                limits: StoreLimits::default(),
                templates: GateTemplates::default(),
            },
        );

        let request = TurnRequest {
            question: "what is this?".into(),
            images: vec!["aGVsbG8=".into()],
            image_context: Some("Image 1: a grey cat".into()),
            ..Default::default()
        };
        drain(runner.stream(persona(&dir), request)).await;

        let prompts = inference.prompts.lock().unwrap();
        let (model, prompt) = prompts.last().unwrap();
        assert_eq!(model, "vision");
        assert!(prompt.contains("[past image memory: Image 1: a grey cat]"));

        let entries = store_for(&dir).load_all().await.unwrap();
        assert_eq!(
            entries[0].image_context.as_deref(),
            Some("Image 1: a grey cat")
        );
    }

    #[tokio::test]
    async fn answer_collects_tokens_and_sources() {
        let dir = TempDir::new().unwrap();
        let inference = Scripted::new(
            vec![Ok("YES".into()), Ok("NO".into())],
            vec![vec![
                Ok(fragment(None, Some("Hello"), false)),
                Ok(fragment(None, Some(" there"), true)),
            ]],
        );
        let runner = runner(&dir, inference, true, FileRenderer { fail: false });

        let (text, sources) = runner
            .answer(persona(&dir), TurnRequest::question("latest news?"))
            .await;
        assert_eq!(text, "Hello there");
        assert_eq!(sources, vec!["https://a.example"]);
    }
}
