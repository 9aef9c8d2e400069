//! The chat turn loop.
//!
//! [`ChatTurnController::submit_message`] records the user turn, starts the
//! completion request and returns a [`TurnStream`]. The stream yields the
//! reply's fragments as they arrive and writes each one into the assistant
//! turn, so the log always holds what the user has seen so far.
//!
//! ```text
//! Idle --submit--> AwaitingResponse --first event--> Streaming --end--> Idle
//!                        |                               |
//!                        +------------ error ------------+----> Idle
//! ```

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use std::time::{Duration, Instant};

use futures_util::{Stream, StreamExt};
use tracing::{debug, error, info, info_span, warn};

use streamchat_observe::genai_attrs;

use streamchat_types::chat::{Fragment, TurnOutcome, TurnState};
use streamchat_types::config::GenerationSettings;
use streamchat_types::error::{ABANDONED_INDICATOR, TurnError};
use streamchat_types::llm::{CompletionRequest, Message, StopReason, StreamEvent, Usage};

use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::provider::LlmEventStream;
use crate::llm::token_budget::TokenBudget;

use super::session::ChatSession;

/// What a finished turn produced.
#[derive(Debug, Clone)]
pub struct TurnSummary {
    pub index: usize,
    pub outcome: TurnOutcome,
    pub content: String,
    pub fragments: usize,
    pub usage: Option<Usage>,
    pub stop_reason: Option<StopReason>,
    pub error: Option<TurnError>,
    pub elapsed: Duration,
}

/// Runs chat turns against one completion provider.
///
/// The controller holds no per-session state; many sessions can share one
/// controller behind an `Arc`.
pub struct ChatTurnController {
    provider: Arc<BoxLlmProvider>,
    settings: GenerationSettings,
    budget: TokenBudget,
}

impl ChatTurnController {
    /// Configured limits are capped at what the provider supports.
    pub fn new(provider: Arc<BoxLlmProvider>, settings: GenerationSettings) -> Self {
        let limits = TokenBudget::from_capabilities(provider.capabilities());
        let budget = TokenBudget::new(
            settings.max_context_tokens.min(limits.max_context_tokens),
            settings.max_output_tokens.min(limits.max_output_tokens),
        );
        if budget.max_output_tokens < settings.max_output_tokens {
            debug!(
                configured = settings.max_output_tokens,
                provider_max = limits.max_output_tokens,
                "Capping output tokens at the provider limit"
            );
        }
        Self {
            provider,
            settings,
            budget,
        }
    }

    pub fn provider(&self) -> &BoxLlmProvider {
        &self.provider
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Build the completion request for the session's next reply.
    ///
    /// Every closed turn is sent as context, trimmed from the oldest end to
    /// fit the context window. An in-progress assistant turn is never sent.
    pub fn build_request(&self, session: &ChatSession) -> CompletionRequest {
        let messages: Vec<Message> = session
            .log()
            .iter()
            .filter(|turn| !turn.is_open())
            .map(|turn| Message {
                role: turn.role,
                content: turn.content.clone(),
            })
            .collect();
        let system = self.settings.system_prompt.clone();
        let messages = self.budget.trim(system.as_deref(), messages);

        CompletionRequest {
            model: session.model().as_str().to_string(),
            messages,
            system,
            max_tokens: self.budget.max_output_tokens,
            temperature: self.settings.temperature,
            thinking_budget: Some(self.settings.thinking_budget),
            stream: true,
        }
    }

    /// Record `text` as a user turn and start streaming the reply.
    ///
    /// Rejections (`EmptyMessage`, `Busy`) leave the log untouched. On
    /// success the log has grown by exactly two turns: the user turn and an
    /// empty assistant placeholder that the returned stream fills in.
    pub fn submit_message<'s>(
        &self,
        session: &'s mut ChatSession,
        text: &str,
    ) -> Result<TurnStream<'s>, TurnError> {
        if text.trim().is_empty() {
            return Err(TurnError::EmptyMessage);
        }
        if !session.is_idle() {
            return Err(TurnError::Busy);
        }

        let user_index = session.log.push_user(text).map_err(|_| TurnError::Busy)?;
        let request = self.build_request(session);
        let model = request.model.clone();

        let span = info_span!(
            "chat",
            otel.name = %genai_attrs::span_name(genai_attrs::OP_CHAT, &model),
            gen_ai.operation.name = genai_attrs::OP_CHAT,
            gen_ai.provider.name = self.provider.name(),
            gen_ai.request.model = %model,
            gen_ai.request.max_tokens = request.max_tokens,
            gen_ai.request.temperature = ?request.temperature,
            gen_ai.usage.input_tokens = tracing::field::Empty,
            gen_ai.usage.output_tokens = tracing::field::Empty,
            gen_ai.response.finish_reasons = tracing::field::Empty,
            session_id = %session.id(),
        );

        let inner = {
            let _enter = span.enter();
            debug!(
                messages = request.messages.len(),
                user_index, "Starting completion request"
            );
            self.provider.stream(request)
        };

        let index = session
            .log
            .push_assistant_placeholder(model.clone())
            .map_err(|_| TurnError::Busy)?;
        session.state = TurnState::AwaitingResponse;

        Ok(TurnStream {
            session,
            inner: Some(inner),
            index,
            model,
            fragments: 0,
            usage: None,
            stop_reason: None,
            outcome: None,
            error: None,
            started: Instant::now(),
            elapsed: None,
            span,
        })
    }
}

/// Lazy, finite sequence of reply fragments for one turn.
///
/// Polling drives the completion request. Each fragment is appended to the
/// assistant turn before it is yielded. Once the sequence ends it stays
/// ended: the stream cannot be restarted.
///
/// The stream holds the session mutably, so nothing else can touch the
/// session while a reply is in flight. Dropping an unfinished stream
/// abandons the request and closes the turn as
/// [`TurnOutcome::Abandoned`].
pub struct TurnStream<'s> {
    session: &'s mut ChatSession,
    inner: Option<LlmEventStream>,
    index: usize,
    model: String,
    fragments: usize,
    usage: Option<Usage>,
    stop_reason: Option<StopReason>,
    outcome: Option<TurnOutcome>,
    error: Option<TurnError>,
    started: Instant,
    elapsed: Option<Duration>,
    span: tracing::Span,
}

impl TurnStream<'_> {
    /// Log index of the assistant turn being filled.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Log index of the user turn being answered.
    pub fn user_index(&self) -> usize {
        self.index - 1
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The assistant turn's content so far.
    pub fn content(&self) -> &str {
        self.session
            .log()
            .get(self.index)
            .map(|t| t.content.as_str())
            .unwrap_or_default()
    }

    pub fn state(&self) -> TurnState {
        self.session.state()
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }

    /// How the turn ended, once it has.
    pub fn outcome(&self) -> Option<TurnOutcome> {
        self.outcome
    }

    /// The error that ended the turn, if any.
    pub fn error(&self) -> Option<&TurnError> {
        self.error.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Drain the remaining fragments and summarize the turn.
    pub async fn finish(mut self) -> TurnSummary {
        while self.next().await.is_some() {}
        self.summary()
    }

    fn summary(&self) -> TurnSummary {
        TurnSummary {
            index: self.index,
            outcome: self.outcome.unwrap_or(TurnOutcome::Abandoned),
            content: self.content().to_string(),
            fragments: self.fragments,
            usage: self.usage,
            stop_reason: self.stop_reason,
            error: self.error.clone(),
            elapsed: self.elapsed.unwrap_or_else(|| self.started.elapsed()),
        }
    }

    fn apply(&mut self, event: StreamEvent) -> Option<Fragment> {
        match event {
            StreamEvent::Connected => None,
            StreamEvent::TextDelta { text } => {
                if text.is_empty() {
                    return None;
                }
                if let Err(e) = self.session.log.append_to_open(&text) {
                    error!(error = %e, "Dropped fragment for a closed turn");
                    return None;
                }
                self.fragments += 1;
                Some(Fragment {
                    index: self.index,
                    text,
                })
            }
            StreamEvent::MessageDelta { stop_reason } => {
                self.stop_reason = Some(stop_reason);
                None
            }
            StreamEvent::Usage(usage) => {
                self.usage = Some(usage);
                None
            }
            StreamEvent::Done => {
                self.close(None);
                None
            }
        }
    }

    /// End the turn normally (`error == None`) or with a provider error.
    fn close(&mut self, error: Option<TurnError>) {
        self.inner = None;
        let error = error.or_else(|| (self.fragments == 0).then_some(TurnError::EmptyResponse));
        let (outcome, replacement) = match &error {
            Some(err) => (
                err.outcome().unwrap_or(TurnOutcome::UpstreamError),
                Some(err.user_message()),
            ),
            None => (TurnOutcome::Complete, None),
        };
        if let Some(err) = &error {
            warn!(error = %err, fragments = self.fragments, "Turn failed");
        }
        self.error = error;
        self.finish_turn(outcome, replacement);
    }

    fn finish_turn(&mut self, outcome: TurnOutcome, replacement: Option<String>) {
        if let Err(e) = self.session.log.close_open(outcome, replacement) {
            error!(error = %e, "Could not close assistant turn");
        }
        self.session.state = TurnState::Idle;
        self.outcome = Some(outcome);
        let elapsed = self.started.elapsed();
        self.elapsed = Some(elapsed);

        if let Some(usage) = self.usage {
            self.span
                .record(genai_attrs::GEN_AI_USAGE_INPUT_TOKENS, usage.input_tokens)
                .record(genai_attrs::GEN_AI_USAGE_OUTPUT_TOKENS, usage.output_tokens);
        }
        if let Some(reason) = self.stop_reason {
            self.span.record(
                genai_attrs::GEN_AI_RESPONSE_FINISH_REASONS,
                tracing::field::display(reason),
            );
        }
        info!(
            outcome = %outcome,
            fragments = self.fragments,
            elapsed_ms = elapsed.as_millis() as u64,
            "Turn finished"
        );
    }
}

impl Stream for TurnStream<'_> {
    type Item = Fragment;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Fragment>> {
        let this = self.get_mut();
        let span = this.span.clone();
        let _enter = span.enter();

        loop {
            let Some(inner) = this.inner.as_mut() else {
                return Poll::Ready(None);
            };
            match ready!(inner.as_mut().poll_next(cx)) {
                Some(Ok(event)) => {
                    if this.session.state == TurnState::AwaitingResponse {
                        this.session.state = TurnState::Streaming;
                        debug!("Response started");
                    }
                    if let Some(fragment) = this.apply(event) {
                        return Poll::Ready(Some(fragment));
                    }
                }
                Some(Err(err)) => {
                    this.close(Some(TurnError::from(&err)));
                    return Poll::Ready(None);
                }
                None => {
                    this.close(None);
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl Drop for TurnStream<'_> {
    fn drop(&mut self) {
        if self.outcome.is_some() {
            return;
        }
        let span = self.span.clone();
        let _enter = span.enter();
        self.inner = None;
        let replacement = (self.fragments == 0).then(|| ABANDONED_INDICATOR.to_string());
        debug!(fragments = self.fragments, "Abandoning in-flight request");
        self.finish_turn(TurnOutcome::Abandoned, replacement);
    }
}

impl std::fmt::Debug for TurnStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnStream")
            .field("index", &self.index)
            .field("model", &self.model)
            .field("fragments", &self.fragments)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}
