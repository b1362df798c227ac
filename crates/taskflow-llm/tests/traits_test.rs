use taskflow_llm::{ChatOptions, ChatRequest, Message, Tool, ToolChoice};
use serde_json::json;

#[test]
fn test_chat_request_creation() {
    let messages = vec![Message::user("Hello")];
    let request = ChatRequest::new("gpt-4o-mini", messages);

    assert_eq!(request.model, "gpt-4o-mini");
    assert_eq!(request.messages.len(), 1);
    assert!(request.options.tools.is_none());
}

#[test]
fn test_chat_request_with_options() {
    let options = ChatOptions::new().temperature(0.7).max_tokens(100);
    let request = ChatRequest::new("gpt-4o-mini", vec![Message::user("Hello")]).with_options(options);

    assert_eq!(request.options.temperature, Some(0.7));
    assert_eq!(request.options.max_tokens, Some(100));
}

#[test]
fn test_chat_options_builder() {
    let tools = vec![Tool::new("get_tasks", "List tasks", json!({"type": "object"}))];

    let options = ChatOptions::new()
        .temperature(0.5)
        .tools(tools.clone())
        .tool_choice(ToolChoice::auto());

    assert_eq!(options.temperature, Some(0.5));
    assert_eq!(options.tools, Some(tools));
    assert_eq!(options.tool_choice, Some(ToolChoice::auto()));
}

#[test]
fn test_chat_options_default() {
    let options = ChatOptions::default();

    assert_eq!(options.temperature, None);
    assert_eq!(options.max_tokens, None);
    assert_eq!(options.tools, None);
    assert_eq!(options.tool_choice, None);
}
