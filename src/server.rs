use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::constants::{
    LATEST_PROTOCOL_VERSION, PROMPT_KRAKEN_TICKER, SERVER_NAME, SERVER_VERSION,
    SUPPORTED_PROTOCOL_VERSIONS, TOOL_GET_TICKER,
};
use crate::error::KrakenError;
use crate::kraken::{KrakenClient, ServerConfig};
use crate::logging;
use crate::protocol::{
    CallToolParams, CallToolResult, Content, GetPromptParams, GetPromptResult, Implementation,
    InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    ListChangedCapability, ListPromptsResult, ListToolsResult, Prompt, PromptArgument,
    PromptMessage, Role, ServerCapabilities, Tool,
};

const TICKER_DESCRIPTION: &str = "Get ticker information for a trading pair from Kraken";
const PAIR_DESCRIPTION: &str = "Trading pair (e.g., BTCUSD, ETHUSD)";

/// Answers MCP requests. Transports own the framing; this owns the meaning.
pub struct KrakenServer {
    client: KrakenClient,
}

impl KrakenServer {
    pub fn new(client: KrakenClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        Ok(Self::new(KrakenClient::new(config)?))
    }

    /// Returns `None` for notifications, which never get a reply.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;

        let Some(id) = id else {
            self.handle_notification(&method);
            return None;
        };

        let response = match self.dispatch(&method, params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => {
                logging::warn(
                    "rpc.error",
                    "Request failed",
                    json!({ "method": method, "code": error.code, "message": error.message }),
                );
                JsonRpcResponse::failure(id, error)
            }
        };
        Some(response)
    }

    fn handle_notification(&self, method: &str) {
        match method {
            "notifications/initialized" => {
                logging::info_simple("rpc.initialized", "Client finished initialization")
            }
            other => logging::debug(
                "rpc.notification",
                "Ignoring notification",
                json!({ "method": other }),
            ),
        }
    }

    async fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value, JsonRpcError> {
        match method {
            "initialize" => to_result(self.initialize(parse_params(params)?)),
            "ping" => Ok(json!({})),
            "tools/list" => to_result(ListToolsResult {
                tools: vec![ticker_tool()],
            }),
            "tools/call" => to_result(self.call_tool(parse_params(params)?).await?),
            "prompts/list" => to_result(ListPromptsResult {
                prompts: vec![ticker_prompt()],
            }),
            "prompts/get" => to_result(self.get_prompt(parse_params(params)?).await?),
            other => Err(JsonRpcError::method_not_found(other)),
        }
    }

    fn initialize(&self, params: InitializeParams) -> InitializeResult {
        let protocol_version = negotiate_version(&params.protocol_version);
        logging::info(
            "rpc.initialize",
            "Client connected",
            json!({
                "client": params.client_info.as_ref().map(|info| format!("{}/{}", info.name, info.version)),
                "requested_version": params.protocol_version,
                "protocol_version": protocol_version,
            }),
        );

        InitializeResult {
            protocol_version: protocol_version.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ListChangedCapability { list_changed: true }),
                prompts: Some(ListChangedCapability { list_changed: true }),
                ..ServerCapabilities::default()
            },
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
            instructions: Some(format!(
                "Use the `{TOOL_GET_TICKER}` tool or the `{PROMPT_KRAKEN_TICKER}` prompt with a trading pair such as BTCUSD to read live Kraken market data."
            )),
        }
    }

    async fn call_tool(&self, params: CallToolParams) -> Result<CallToolResult, JsonRpcError> {
        if params.name != TOOL_GET_TICKER {
            return Err(JsonRpcError::invalid_params(format!(
                "Unknown tool: {}",
                params.name
            )));
        }

        let pair = required_pair(params.arguments.as_ref())?;
        let snapshot = self.client.fetch_ticker(pair).await?;
        logging::info(
            "tool.get_ticker",
            "Ticker served",
            json!({ "pair": snapshot.pair, "last": snapshot.last_trade.price }),
        );

        let structured = serde_json::to_value(&snapshot)
            .map_err(|err| JsonRpcError::internal(format!("failed to encode ticker: {err}")))?;
        Ok(CallToolResult {
            content: vec![Content::text(snapshot.to_text())],
            structured_content: Some(structured),
            is_error: false,
        })
    }

    async fn get_prompt(&self, params: GetPromptParams) -> Result<GetPromptResult, JsonRpcError> {
        if params.name != PROMPT_KRAKEN_TICKER {
            return Err(JsonRpcError::invalid_params(format!(
                "Unknown prompt: {}",
                params.name
            )));
        }

        let pair = required_pair(params.arguments.as_ref())?;
        let snapshot = self.client.fetch_ticker(pair).await?;
        logging::info(
            "prompt.kraken_ticker",
            "Ticker prompt rendered",
            json!({ "pair": snapshot.pair }),
        );

        Ok(GetPromptResult {
            description: snapshot.description(),
            messages: vec![PromptMessage {
                role: Role::User,
                content: Content::text(snapshot.to_text()),
            }],
        })
    }
}

impl From<KrakenError> for JsonRpcError {
    fn from(err: KrakenError) -> Self {
        match err {
            KrakenError::InvalidPair(_) => JsonRpcError::invalid_params(err.to_string()),
            other => JsonRpcError::internal(other.to_string()),
        }
    }
}

pub fn ticker_tool() -> Tool {
    Tool {
        name: TOOL_GET_TICKER.to_string(),
        description: TICKER_DESCRIPTION.to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "pair": {
                    "type": "string",
                    "description": PAIR_DESCRIPTION
                }
            },
            "required": ["pair"]
        }),
    }
}

pub fn ticker_prompt() -> Prompt {
    Prompt {
        name: PROMPT_KRAKEN_TICKER.to_string(),
        description: TICKER_DESCRIPTION.to_string(),
        arguments: vec![PromptArgument {
            name: "pair".to_string(),
            description: PAIR_DESCRIPTION.to_string(),
            required: true,
        }],
    }
}

fn negotiate_version(requested: &str) -> &'static str {
    SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .copied()
        .find(|version| *version == requested)
        .unwrap_or(LATEST_PROTOCOL_VERSION)
}

fn required_pair(arguments: Option<&Map<String, Value>>) -> Result<&str, JsonRpcError> {
    arguments
        .and_then(|args| args.get("pair"))
        .and_then(Value::as_str)
        .ok_or_else(|| JsonRpcError::invalid_params("Missing required argument: pair"))
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|err| JsonRpcError::invalid_params(format!("Invalid params: {err}")))
}

fn to_result<T: Serialize>(value: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|err| JsonRpcError::internal(format!("failed to encode result: {err}")))
}
