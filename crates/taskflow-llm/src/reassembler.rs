//! Reassembly of streamed deltas into forwarded text and finalized tool calls.
//!
//! Tool-call fragments are tracked per index with an explicit slot state:
//!
//! - a fragment carrying an `id` finalizes whichever slot is currently open
//!   (the same index included) and opens `Accumulating` at its own index;
//! - a fragment without an `id` extends its slot only while that slot is
//!   `Accumulating`, and is dropped otherwise;
//! - [`ToolCallReassembler::finish`] finalizes the slot still open.
//!
//! Finalization never fails. Calls with an empty name, empty arguments, or
//! arguments that are not valid JSON are logged and discarded.

use std::collections::HashMap;

use crate::streaming::StreamEvent;
use crate::types::ToolCall;

/// Tool call whose fragments are still arriving
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialToolCall {
    pub index: u32,
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl PartialToolCall {
    fn new(index: u32, id: String) -> Self {
        Self {
            index,
            id,
            ..Default::default()
        }
    }

    fn append(&mut self, name: Option<String>, arguments: Option<String>) {
        if let Some(name) = name {
            self.name.push_str(&name);
        }
        if let Some(arguments) = arguments {
            self.arguments.push_str(&arguments);
        }
    }

    /// Finalized call, or `None` when the call must not be executed
    fn into_tool_call(self) -> Option<ToolCall> {
        if self.name.is_empty() || self.arguments.is_empty() {
            tracing::warn!(
                index = self.index,
                id = %self.id,
                name = %self.name,
                "Dropping tool call with empty name or arguments"
            );
            return None;
        }

        if let Err(e) = serde_json::from_str::<serde_json::Value>(&self.arguments) {
            tracing::warn!(
                index = self.index,
                id = %self.id,
                name = %self.name,
                error = %e,
                "Dropping tool call with unparseable arguments"
            );
            return None;
        }

        Some(ToolCall::new(self.id, self.name, self.arguments))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotState {
    Empty,
    Accumulating(PartialToolCall),
    Finalized,
}

#[derive(Debug, Default)]
pub struct ToolCallReassembler {
    slots: HashMap<u32, SlotState>,
    active: Option<u32>,
    finalized: Vec<ToolCall>,
}

impl ToolCallReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, index: u32) -> &SlotState {
        self.slots.get(&index).unwrap_or(&SlotState::Empty)
    }

    pub fn push(
        &mut self,
        index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    ) {
        match id {
            Some(id) => {
                self.finalize_active();

                let mut partial = PartialToolCall::new(index, id);
                partial.append(name, arguments);
                self.slots.insert(index, SlotState::Accumulating(partial));
                self.active = Some(index);
            }
            None => match self.slots.get_mut(&index) {
                Some(SlotState::Accumulating(partial)) => partial.append(name, arguments),
                _ => {
                    tracing::debug!(index, "Dropping tool call fragment without an open slot");
                }
            },
        }
    }

    /// Finalize the open slot and return eligible calls in finalization order
    pub fn finish(mut self) -> Vec<ToolCall> {
        self.finalize_active();
        self.finalized
    }

    fn finalize_active(&mut self) {
        let Some(index) = self.active.take() else {
            return;
        };

        if let Some(SlotState::Accumulating(partial)) =
            self.slots.insert(index, SlotState::Finalized)
        {
            if let Some(call) = partial.into_tool_call() {
                self.finalized.push(call);
            }
        }
    }
}

/// Output of one upstream stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reassembled {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Splits a stream into forwardable text and the tool calls it requested
#[derive(Debug, Default)]
pub struct StreamReassembler {
    text: String,
    tool_calls: ToolCallReassembler,
}

impl StreamReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one event; returns the content fragment to forward, if any.
    pub fn push(&mut self, event: StreamEvent) -> Option<String> {
        match event {
            StreamEvent::Message { content } => {
                if content.is_empty() {
                    return None;
                }
                self.text.push_str(&content);
                Some(content)
            }
            StreamEvent::ToolCall {
                index,
                id,
                name,
                arguments,
            } => {
                self.tool_calls.push(index, id, name, arguments);
                None
            }
            StreamEvent::Done { .. } => None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn finish(self) -> Reassembled {
        Reassembled {
            text: self.text,
            tool_calls: self.tool_calls.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(index: u32, id: Option<&str>, name: Option<&str>, args: Option<&str>) -> StreamEvent {
        StreamEvent::ToolCall {
            index,
            id: id.map(String::from),
            name: name.map(String::from),
            arguments: args.map(String::from),
        }
    }

    fn text(content: &str) -> StreamEvent {
        StreamEvent::Message {
            content: content.to_string(),
        }
    }

    #[test]
    fn test_text_is_concatenated_in_order() {
        let mut r = StreamReassembler::new();
        let forwarded: Vec<String> = ["You ", "have ", "", "3 tasks"]
            .into_iter()
            .filter_map(|c| r.push(text(c)))
            .collect();

        assert_eq!(forwarded, vec!["You ", "have ", "3 tasks"]);
        let out = r.finish();
        assert_eq!(out.text, "You have 3 tasks");
        assert!(out.tool_calls.is_empty());
    }

    #[test]
    fn test_fragments_concatenate() {
        let mut r = StreamReassembler::new();
        r.push(tool(0, Some("call_1"), Some("create_"), Some("{\"title\":")));
        r.push(tool(0, None, Some("task"), Some("\"Buy milk\"")));
        r.push(tool(0, None, None, Some("}")));
        r.push(StreamEvent::Done { finish_reason: None });

        let out = r.finish();
        assert_eq!(
            out.tool_calls,
            vec![ToolCall::new("call_1", "create_task", "{\"title\":\"Buy milk\"}")]
        );
    }

    #[test]
    fn test_new_id_finalizes_previous_call() {
        let mut calls = ToolCallReassembler::new();
        calls.push(0, Some("a".into()), Some("get_tasks".into()), Some("{}".into()));
        calls.push(1, Some("b".into()), Some("delete_task".into()), Some("{\"taskId\":".into()));

        assert_eq!(calls.slot(0), &SlotState::Finalized);
        assert!(matches!(calls.slot(1), SlotState::Accumulating(_)));

        calls.push(1, None, None, Some("\"t1\"}".into()));
        let finished = calls.finish();

        assert_eq!(finished.len(), 2);
        assert_eq!(finished[0].id, "a");
        assert_eq!(finished[1].function.arguments, "{\"taskId\":\"t1\"}");
    }

    #[test]
    fn test_same_index_new_id_starts_new_call() {
        let mut calls = ToolCallReassembler::new();
        calls.push(0, Some("a".into()), Some("get_tasks".into()), Some("{}".into()));
        calls.push(0, Some("b".into()), Some("get_tasks".into()), Some("{\"limit\":5}".into()));

        let finished = calls.finish();
        assert_eq!(finished.len(), 2);
        assert_eq!(finished[1].id, "b");
        assert_eq!(finished[1].function.arguments, "{\"limit\":5}");
    }

    #[test]
    fn test_fragment_without_open_slot_is_dropped() {
        let mut calls = ToolCallReassembler::new();
        calls.push(3, None, Some("get_tasks".into()), Some("{}".into()));
        assert_eq!(calls.slot(3), &SlotState::Empty);

        calls.push(0, Some("a".into()), Some("get_tasks".into()), Some("{}".into()));
        calls.push(1, Some("b".into()), Some("complete_task".into()), Some("{}".into()));
        // slot 0 is finalized; late fragments must not reopen or alter it
        calls.push(0, None, None, Some("garbage".into()));

        let finished = calls.finish();
        assert_eq!(finished.len(), 2);
        assert_eq!(finished[0].function.arguments, "{}");
    }

    #[test]
    fn test_ineligible_calls_are_dropped() {
        let mut r = StreamReassembler::new();
        r.push(tool(0, Some("no_name"), None, Some("{}")));
        r.push(tool(1, Some("no_args"), Some("get_tasks"), None));
        r.push(tool(2, Some("bad_json"), Some("create_task"), Some("{\"title\": ")));
        r.push(tool(3, Some("ok"), Some("get_tasks"), Some("{}")));

        let out = r.finish();
        assert_eq!(out.tool_calls.len(), 1);
        assert_eq!(out.tool_calls[0].id, "ok");
    }

    #[test]
    fn test_interleaved_text_and_tools() {
        let mut r = StreamReassembler::new();
        assert_eq!(r.push(text("Let me check. ")), Some("Let me check. ".to_string()));
        assert_eq!(r.push(tool(0, Some("c"), Some("get_tasks"), Some("{}"))), None);
        assert_eq!(r.text(), "Let me check. ");

        let out = r.finish();
        assert_eq!(out.text, "Let me check. ");
        assert_eq!(out.tool_calls.len(), 1);
    }
}
