use serde::Serialize;
use tacops_client::{BackendApi, ChatContext, ChatReportContext, ChatRequest};
use tacops_core::{now_rfc3339, NodeKind, NodeRef, Report, TreeNode};
use tracing::warn;

const EMPTY_REPLY: &str = "I apologize, I couldn't process that request.";
const FALLBACK_PREVIEW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: String,
}

impl ChatMessage {
    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: now_rfc3339(),
        }
    }
}

/// Transcript for the selected node. Selecting a different node starts a
/// fresh transcript.
#[derive(Debug, Default)]
pub struct ChatSession {
    node: Option<NodeRef>,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn node(&self) -> Option<&NodeRef> {
        self.node.as_ref()
    }

    /// Greets the operator when `node` differs from the transcript's node.
    pub fn focus(&mut self, node: &TreeNode, report_count: usize) {
        let node_ref = NodeRef::from(node);
        if self.node.as_ref() == Some(&node_ref) {
            return;
        }
        self.node = Some(node_ref);
        self.messages = vec![ChatMessage::new(
            ChatRole::Assistant,
            welcome_message(node, report_count),
        )];
    }

    pub fn clear(&mut self) {
        self.node = None;
        self.messages.clear();
    }

    pub fn push(&mut self, role: ChatRole, content: impl Into<String>) -> &ChatMessage {
        self.messages.push(ChatMessage::new(role, content));
        &self.messages[self.messages.len() - 1]
    }
}

fn welcome_message(node: &TreeNode, report_count: usize) -> String {
    let scope = match node.kind() {
        NodeKind::Unit => "unit and its subordinates",
        NodeKind::Soldier => "soldier",
    };
    format!(
        "Hello! I'm your AI assistant for {}. I have access to {report_count} report(s) from this {scope}. How can I help you analyze the situation?",
        node.name()
    )
}

pub fn chat_request(message: &str, node: &TreeNode, reports: &[Report]) -> ChatRequest {
    ChatRequest {
        message: message.to_string(),
        context: ChatContext {
            node: node.clone(),
            reports: reports
                .iter()
                .map(|report| ChatReportContext {
                    report_type: report.report_type.clone(),
                    time: report.timestamp.clone(),
                    from: report.author_name().to_string(),
                    data: report
                        .payload()
                        .unwrap_or_else(|_| report.structured_json.clone()),
                })
                .collect(),
        },
    }
}

/// Local reply used when the chat backend cannot answer.
pub fn fallback_reply(node_name: &str, reports: &[Report]) -> String {
    let preview = reports
        .iter()
        .take(FALLBACK_PREVIEW)
        .map(|report| format!("- {}: {}", report.report_type, report.timestamp))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Based on the {} reports from {node_name}, I can help you analyze the current situation. The AI backend is not yet connected, but here's what I can see:\n\n{preview}",
        reports.len()
    )
}

/// Sends one chat message and returns the assistant's answer. Blank input
/// yields `None` without contacting the backend.
pub async fn ask(
    backend: &dyn BackendApi,
    node: &TreeNode,
    reports: &[Report],
    message: &str,
) -> Option<String> {
    if message.trim().is_empty() {
        return None;
    }
    let request = chat_request(message, node, reports);
    let reply = match backend.chat(&request).await {
        Ok(reply) if reply.response.is_empty() => EMPTY_REPLY.to_string(),
        Ok(reply) => reply.response,
        Err(err) => {
            warn!(node_id = node.id(), error = %err, "Chat backend failed, answering locally");
            fallback_reply(node.name(), reports)
        }
    };
    Some(reply)
}
