//! Bridges WebSocket connections into the agent loop.

use async_trait::async_trait;
use cclaw_agent::AgentContext;
use cclaw_gateway::WsHandler;
use cclaw_session::Session;
use std::sync::Arc;

/// Each inbound text frame is one non-streaming agent turn, keyed by the
/// connection id so concurrent clients never share history.
pub struct GatewayBridge {
    pub agent: Arc<AgentContext>,
}

#[async_trait]
impl WsHandler for GatewayBridge {
    async fn on_message(&self, conn_id: u64, text: &str) -> Option<String> {
        let key = format!("ws_{conn_id}");
        let mut session = Session::open(&self.agent.workspace, Some(&key));
        let reply = self.agent.run_turn(&mut session, text, None).await;
        (!reply.is_empty()).then_some(reply)
    }
}
