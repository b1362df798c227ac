use serde::{Deserialize, Serialize};

use crate::buffer_utils::{parse_sse_stream, SseLineParser};
use crate::error::Result;
use crate::traits::EventStream;

/// Decoded unit of an upstream chat-completion stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Message {
        content: String,
    },

    /// Fragment of a tool call; `id` is only present on the first fragment
    ToolCall {
        index: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments: Option<String>,
    },

    Done {
        #[serde(skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: Delta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub tool_type: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

impl ChatStreamChunk {
    /// Content and tool-call deltas of the first choice, in chunk order.
    ///
    /// `finish_reason` is not surfaced; the stream ends on `[DONE]` or EOF.
    pub fn to_stream_events(&self) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(choice) = self.choices.first() {
            if let Some(content) = &choice.delta.content {
                if !content.is_empty() {
                    events.push(StreamEvent::Message {
                        content: content.clone(),
                    });
                }
            }

            if let Some(tool_calls) = &choice.delta.tool_calls {
                for tc in tool_calls {
                    events.push(StreamEvent::ToolCall {
                        index: tc.index,
                        id: tc.id.clone().filter(|id| !id.is_empty()),
                        name: tc.function.as_ref().and_then(|f| f.name.clone()),
                        arguments: tc.function.as_ref().and_then(|f| f.arguments.clone()),
                    });
                }
            }
        }

        events
    }
}

/// Parser for `/chat/completions` stream chunks
pub struct ChatChunkParser;

impl SseLineParser for ChatChunkParser {
    fn parse_data_line(&self, data: &str) -> Result<Vec<StreamEvent>> {
        let chunk: ChatStreamChunk = serde_json::from_str(data)?;
        Ok(chunk.to_stream_events())
    }
}

pub fn parse_chat_sse_stream(response: reqwest::Response) -> EventStream {
    parse_sse_stream(response.bytes_stream(), ChatChunkParser)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::StreamExt;

    async fn collect(chunks: Vec<&'static str>) -> Vec<StreamEvent> {
        let source = futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<Bytes, std::io::Error>(Bytes::from_static(c.as_bytes()))),
        );
        parse_sse_stream(source, ChatChunkParser)
            .map(|r| r.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_content_split_across_chunks() {
        let events = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel",
            "lo\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\n",
            "data: [DONE]\n\n",
        ])
        .await;

        assert_eq!(
            events,
            vec![
                StreamEvent::Message { content: "Hello".into() },
                StreamEvent::Message { content: " there".into() },
                StreamEvent::Done { finish_reason: None },
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_and_foreign_lines_are_skipped() {
        let events = collect(vec![
            ": keep-alive\n",
            "event: ping\n",
            "data: {not json}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n",
            "data: [DONE]\n",
        ])
        .await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0], StreamEvent::Message { content: "ok".into() });
    }

    #[tokio::test]
    async fn test_tool_call_delta() {
        let events = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"type\":\"function\",\"function\":{\"name\":\"get_tasks\",\"arguments\":\"\"}}]}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{}\"}}]}}]}\n",
        ])
        .await;

        assert_eq!(
            events[0],
            StreamEvent::ToolCall {
                index: 0,
                id: Some("call_1".into()),
                name: Some("get_tasks".into()),
                arguments: Some(String::new()),
            }
        );
        assert_eq!(
            events[1],
            StreamEvent::ToolCall {
                index: 0,
                id: None,
                name: None,
                arguments: Some("{}".into()),
            }
        );
        // EOF without [DONE] still terminates
        assert_eq!(events[2], StreamEvent::Done { finish_reason: None });
    }

    #[tokio::test]
    async fn test_final_line_without_newline() {
        let events = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n",
            "data: [DONE]",
        ])
        .await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[1], StreamEvent::Done { finish_reason: None });
    }

    #[tokio::test]
    async fn test_transport_error_is_fatal() {
        let source = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ]);
        let results: Vec<_> = parse_sse_stream(source, ChatChunkParser).collect().await;

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(crate::LlmError::Stream(_))));
    }
}
