use crate::calendar::{ CalComClient, CalComConfig, CalendarApi };
use crate::cli::Args;
use crate::error::{ AgentError, Result };
use crate::functions::{ Dispatcher, FunctionCall, FunctionName, FunctionRegistry };
use crate::history::{ initialize_history_store, validate_conversation_id, HistoryStore };
use crate::llm::LlmConfig;
use crate::llm::chat::{ ChatClient, ModelMessage, ModelReply, new_client as new_chat_client };
use crate::models::chat::{ ChatMessage, Role };

use log::{ info, warn, error };
use serde_json::Value;
use std::error::Error;
use std::sync::Arc;

/// Conversation orchestrator: routes a turn either straight to the dispatcher or
/// through the model, and records the exchange.
#[derive(Clone)]
pub struct CalendarAgent {
    chat_client: Arc<dyn ChatClient>,
    dispatcher: Dispatcher,
    registry: FunctionRegistry,
    history_store: Arc<dyn HistoryStore>,
    max_function_rounds: usize,
}

impl CalendarAgent {
    pub async fn new(args: Args) -> std::result::Result<Self, Box<dyn Error + Send + Sync>> {
        let chat_config = LlmConfig::from_args(&args)?;
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={}",
            chat_config.llm_type,
            chat_config.model(),
            chat_config.endpoint()
        );

        let calendar: Arc<dyn CalendarApi> = Arc::new(
            CalComClient::new(CalComConfig::from_args(&args))?
        );
        info!("Cal.com client configured: BaseURL={}", args.calcom_api_url);

        let history_store = initialize_history_store(&args)?;

        Ok(
            Self::from_parts(
                chat_client,
                Dispatcher::new(calendar),
                history_store,
                args.function_call_rounds
            )
        )
    }

    pub fn from_parts(
        chat_client: Arc<dyn ChatClient>,
        dispatcher: Dispatcher,
        history_store: Arc<dyn HistoryStore>,
        max_function_rounds: usize
    ) -> Self {
        Self {
            chat_client,
            dispatcher,
            registry: FunctionRegistry::new(),
            history_store,
            max_function_rounds,
        }
    }

    pub fn calendar(&self) -> Arc<dyn CalendarApi> {
        self.dispatcher.calendar()
    }

    pub fn history(&self) -> Arc<dyn HistoryStore> {
        Arc::clone(&self.history_store)
    }

    /// Handles one inbound chat call. The newest non-empty user message is logged
    /// before the turn runs, the reply after it succeeds.
    pub async fn process_messages(
        &self,
        conversation_id: &str,
        messages: &[ChatMessage]
    ) -> Result<String> {
        validate_conversation_id(conversation_id)?;
        if messages.is_empty() {
            return Err(
                AgentError::InvalidRequest(
                    "Please provide at least one message in your request.".to_string()
                )
            );
        }
        info!("Processing {} messages for conversation {}", messages.len(), conversation_id);

        let latest_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .filter(|m| !m.content.trim().is_empty());
        if let Some(user_message) = latest_user {
            if
                let Err(e) = self.history_store.append(
                    conversation_id,
                    Role::User,
                    &user_message.content
                ).await
            {
                warn!("History write (user) failed: {}", e);
            }
        }

        let reply = self.respond(messages).await.map_err(|e| {
            error!("Chat turn failed for conversation {}: {}", conversation_id, e);
            e
        })?;

        if let Err(e) = self.history_store.append(conversation_id, Role::Assistant, &reply).await {
            warn!("History write (assistant) failed: {}", e);
        }

        Ok(reply)
    }

    /// Produces the reply for a turn without touching history.
    pub async fn respond(&self, messages: &[ChatMessage]) -> Result<String> {
        if let Some(last) = messages.last().filter(|m| m.role == Role::User) {
            if let Some(booking) = &last.booking {
                info!("Direct booking detected in user message, bypassing LLM.");
                return Ok(self.run_direct(FunctionName::BookMeeting, booking).await);
            }
            if let Some(filter) = &last.list_events {
                info!("Direct event listing detected in user message, bypassing LLM.");
                return Ok(self.run_direct(FunctionName::ListEvents, filter).await);
            }
        }
        self.run_model(messages).await
    }

    async fn run_direct(&self, name: FunctionName, payload: &Value) -> String {
        let arguments = match payload {
            Value::Null => "{}".to_string(),
            other => other.to_string(),
        };
        let call = FunctionCall::new(name.as_str(), arguments);
        match self.dispatcher.dispatch(&call).await {
            Ok(output) => output.render(),
            Err(e) => failure_reply(&call.name, &e),
        }
    }

    async fn run_model(&self, messages: &[ChatMessage]) -> Result<String> {
        let mut transcript: Vec<ModelMessage> = messages.iter().map(ModelMessage::from).collect();
        let mut rounds = 0;

        loop {
            let functions = if rounds < self.max_function_rounds {
                Some(self.registry.definitions())
            } else {
                None
            };

            match self.chat_client.complete(&transcript, functions).await? {
                ModelReply::Text(text) => {
                    return Ok(text);
                }
                ModelReply::FunctionCall(call) => {
                    if functions.is_none() {
                        return Err(
                            AgentError::Model(
                                format!("model requested '{}' after the function-call budget was spent", call.name)
                            )
                        );
                    }
                    rounds += 1;
                    info!("Function call detected: {} (round {})", call.name, rounds);

                    let output = match self.dispatcher.dispatch(&call).await {
                        Ok(output) => output.render(),
                        Err(e) => {
                            return Ok(failure_reply(&call.name, &e));
                        }
                    };
                    let name = call.name.clone();
                    transcript.push(ModelMessage::function_request(call));
                    transcript.push(ModelMessage::function_result(name, output));
                }
            }
        }
    }
}

/// Reply shown when a function fails, so the user sees what went wrong.
fn failure_reply(function: &str, err: &AgentError) -> String {
    let action = match function.parse::<FunctionName>() {
        Ok(FunctionName::BookMeeting) => "book your meeting",
        Ok(FunctionName::ListEvents) => "list your events",
        Ok(FunctionName::CancelEvent) => "cancel your event",
        Ok(FunctionName::RescheduleEvent) => "reschedule your event",
        Ok(FunctionName::CheckAvailability) => "check availability",
        Ok(FunctionName::CreateEventType) => "create the event type",
        Ok(FunctionName::ListEventTypes) => "list your event types",
        Err(_) => "handle that request",
    };
    format!("Sorry, I couldn't {}: {}", action, err)
}
