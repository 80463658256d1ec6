use async_trait::async_trait;
use std::sync::{ Arc, Mutex };

use crate::error::{ AgentError, Result };
use crate::functions::{ FunctionCall, FunctionDefinition };
use crate::llm::chat::{ ChatClient, ModelMessage, ModelReply };

#[derive(Clone)]
enum Scripted {
    Reply(ModelReply),
    Failure(String),
}

/// One recorded `complete` invocation.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub messages: Vec<ModelMessage>,
    pub functions: Vec<String>,
}

#[derive(Clone, Default)]
pub struct MockChatClient {
    responses: Arc<Mutex<Vec<Scripted>>>,
    call_history: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_text_response(&self, content: &str) {
        self.responses
            .lock()
            .unwrap()
            .push(Scripted::Reply(ModelReply::Text(content.to_string())));
    }

    pub fn add_function_call_response(&self, name: &str, arguments: &str) {
        self.responses
            .lock()
            .unwrap()
            .push(Scripted::Reply(ModelReply::FunctionCall(FunctionCall::new(name, arguments))));
    }

    pub fn add_error_response(&self, error_msg: &str) {
        self.responses.lock().unwrap().push(Scripted::Failure(error_msg.to_string()));
    }

    pub fn get_call_history(&self) -> Vec<RecordedCall> {
        self.call_history.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_history.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn complete(
        &self,
        messages: &[ModelMessage],
        functions: Option<&[FunctionDefinition]>
    ) -> Result<ModelReply> {
        self.call_history.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            functions: functions
                .unwrap_or_default()
                .iter()
                .map(|f| f.name.to_string())
                .collect(),
        });

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Ok(ModelReply::Text("No more mock responses configured".to_string()));
        }
        match responses.remove(0) {
            Scripted::Reply(reply) => Ok(reply),
            Scripted::Failure(msg) => Err(AgentError::Model(msg)),
        }
    }

    fn get_model(&self) -> String {
        "mock-model".to_string()
    }
}
