//! Conversation adapter
//!
//! An [`Assistant`] turns one user message into one reply. [`LlmAssistant`]
//! lets the model drive the booking tools; the model's tool arguments are
//! validated by the tools themselves, so nothing it says is trusted.

use std::sync::Arc;

use async_trait::async_trait;
use cb_core::{run_agent_loop, ChatModel, Message, ToolManager};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, error, info, warn};

pub const UPSTREAM_REPLY: &str =
    "I can't reach the assistant service right now. Please try again later.";
const INTERNAL_REPLY: &str = "Sorry, something went wrong on my side. Please try again.";
const ITERATION_LIMIT_REPLY: &str =
    "I couldn't finish that request. Could you rephrase it, with the date, time and length?";

/// One side of a chat about appointments
#[async_trait]
pub trait Assistant: Send {
    /// Reply to one user turn; failures become apologetic replies
    async fn respond(&mut self, turn: &str) -> String;

    /// Forget the conversation so far
    fn reset(&mut self);

    /// Conversation so far, oldest first
    fn history(&self) -> &[Message];
}

/// Assistant backed by an LLM with the booking tools
pub struct LlmAssistant<M: ChatModel + ?Sized> {
    model: Arc<M>,
    tools: ToolManager,
    history: Vec<Message>,
    tz: Tz,
    max_iterations: usize,
}

impl<M: ChatModel + ?Sized> LlmAssistant<M> {
    pub fn new(model: Arc<M>, tools: ToolManager, tz: Tz) -> Self {
        Self {
            model,
            tools,
            history: Vec::new(),
            tz,
            max_iterations: 10,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// System prompt for a turn taken at `now`
    pub fn system_prompt(&self, now: DateTime<Utc>) -> String {
        let local = now.with_timezone(&self.tz);
        format!(
            r#"You are a friendly assistant that books appointments in the user's calendar.

Current date and time: {} ({})
User time zone: {}

How to work:
- You need a date, a start time and a length before touching the calendar. Ask for anything missing. When no length is given, assume 60 minutes.
- Pass times to tools as ISO 8601 without an offset (for example 2030-03-04T15:00); they are read in the user's time zone.
- Use check_availability before offering a slot. If it is busy, call propose_alternatives and offer those slots.
- Ask for a short title, then confirm the slot and title with the user before calling book.
- Only say an appointment is booked when book returns status "confirmed". On "conflict", offer the returned alternatives.
- If a tool returns an error, explain it plainly and ask the user for what is needed.
- Show times in the user's time zone, in a readable form.
- Politely steer unrelated questions back to calendar tasks."#,
            local.format("%A, %Y-%m-%d %H:%M"),
            local.format("%Z"),
            self.tz.name()
        )
    }
}

#[async_trait]
impl<M: ChatModel + ?Sized + 'static> Assistant for LlmAssistant<M> {
    async fn respond(&mut self, turn: &str) -> String {
        let checkpoint = self.history.len();
        self.history.push(Message::user(turn));
        let system = self.system_prompt(Utc::now());

        let result = run_agent_loop(
            &*self.model,
            &mut self.history,
            Some(&system),
            &self.tools,
            self.max_iterations,
        )
        .await;

        match result {
            Ok(result) if result.hit_iteration_limit => {
                warn!("Assistant turn hit the iteration limit");
                self.history.truncate(checkpoint);
                ITERATION_LIMIT_REPLY.to_string()
            }
            Ok(result) => {
                info!(
                    "Assistant turn: {} iterations, {} tool calls, {}/{} tokens",
                    result.iterations,
                    result.tool_calls.len(),
                    result.total_tokens.input_tokens,
                    result.total_tokens.output_tokens
                );
                for call in &result.tool_calls {
                    debug!("  tool {} (error: {})", call.name, call.is_error);
                }
                if result.final_response.trim().is_empty() {
                    "Is there anything else I can help you schedule?".to_string()
                } else {
                    result.final_response
                }
            }
            Err(e) => {
                // drop the partial turn so the next one starts clean
                self.history.truncate(checkpoint);
                if e.is_upstream() {
                    warn!("LLM request failed: {}", e);
                    UPSTREAM_REPLY.to_string()
                } else {
                    error!("Assistant turn failed: {}", e);
                    INTERNAL_REPLY.to_string()
                }
            }
        }
    }

    fn reset(&mut self) {
        self.history.clear();
    }

    fn history(&self) -> &[Message] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::IntentValidator;
    use crate::tools::register_booking_tools;
    use crate::workflow::{BookingWorkflow, WorkflowPolicy};
    use cb_calendar::InMemoryCalendar;
    use cb_core::llm::{MessagesRequest, MessagesResponse};
    use cb_core::{Error, MessageContent, Result};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records the requests it saw
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<MessagesResponse>>>,
        requests: Mutex<Vec<MessagesRequest>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<MessagesResponse>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn messages(&self, request: MessagesRequest) -> Result<MessagesResponse> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::LlmApi("script exhausted".to_string())))
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    fn reply(stop_reason: &str, content: Vec<MessageContent>) -> Result<MessagesResponse> {
        Ok(MessagesResponse {
            id: "msg".to_string(),
            content,
            model: "scripted".to_string(),
            stop_reason: stop_reason.to_string(),
            usage: None,
        })
    }

    fn text(t: &str) -> MessageContent {
        MessageContent::Text { text: t.to_string() }
    }

    fn tools() -> ToolManager {
        let calendar = Arc::new(InMemoryCalendar::new());
        let workflow = Arc::new(BookingWorkflow::new(calendar, WorkflowPolicy::default()));
        let mut manager = ToolManager::new();
        register_booking_tools(&mut manager, workflow, Arc::new(IntentValidator::new(Tz::UTC)));
        manager
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        let model = Arc::new(ScriptedModel::new(vec![
            reply(
                "tool_use",
                vec![MessageContent::ToolUse {
                    id: "t1".to_string(),
                    name: "check_availability".to_string(),
                    input: json!({"start": "2999-01-01T10:00", "end": "2999-01-01T11:00"}),
                }],
            ),
            reply("end_turn", vec![text("Sorry, that's too far ahead.")]),
        ]));
        let mut assistant = LlmAssistant::new(model.clone(), tools(), Tz::UTC);

        let answer = assistant.respond("Am I free on Jan 1 2999 at 10?").await;
        assert_eq!(answer, "Sorry, that's too far ahead.");

        // user, assistant tool_use, user tool_result, assistant text
        let history = assistant.history();
        assert_eq!(history.len(), 4);
        match &history[2].content[0] {
            MessageContent::ToolResult { is_error, content, .. } => {
                assert!(*is_error);
                assert!(content.contains("too far ahead"));
            }
            other => panic!("expected tool result, got {:?}", other),
        }

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[0].tools.as_ref().map(Vec::len), Some(3));
        assert!(requests[0].system.as_deref().unwrap_or("").contains("User time zone: UTC"));
    }

    #[tokio::test]
    async fn test_upstream_failure_says_try_later() {
        let model = Arc::new(ScriptedModel::new(vec![
            Err(Error::LlmApi("503 Service Unavailable".to_string())),
            reply("end_turn", vec![text("Hi!")]),
        ]));
        let mut assistant = LlmAssistant::new(model, tools(), Tz::UTC);

        assert_eq!(assistant.respond("hello").await, UPSTREAM_REPLY);
        assert!(assistant.history().is_empty());

        assert_eq!(assistant.respond("hello again").await, "Hi!");
        assert_eq!(assistant.history().len(), 2);

        assistant.reset();
        assert!(assistant.history().is_empty());
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let looping: Vec<_> = (0..3)
            .map(|i| {
                reply(
                    "tool_use",
                    vec![MessageContent::ToolUse {
                        id: format!("t{}", i),
                        name: "nope".to_string(),
                        input: json!({}),
                    }],
                )
            })
            .collect();
        let mut assistant =
            LlmAssistant::new(Arc::new(ScriptedModel::new(looping)), tools(), Tz::UTC)
                .with_max_iterations(2);

        assert_eq!(assistant.respond("book it").await, ITERATION_LIMIT_REPLY);
        assert!(assistant.history().is_empty());
    }

    #[test]
    fn test_system_prompt_uses_zone() {
        use chrono::TimeZone;
        let assistant = LlmAssistant::new(
            Arc::new(ScriptedModel::new(vec![])),
            ToolManager::new(),
            chrono_tz::Asia::Kolkata,
        );
        let prompt = assistant.system_prompt(Utc.with_ymd_and_hms(2030, 3, 4, 12, 0, 0).unwrap());
        assert!(prompt.contains("Monday, 2030-03-04 17:30 (IST)"));
        assert!(prompt.contains("User time zone: Asia/Kolkata"));
    }
}
