use chrono::{DateTime, Local};

/// `<current_date>` is replaced with the server's local date
pub const DEFAULT_SYSTEM_PROMPT_TEMPLATE: &str = "You are the TaskFlow assistant, a friendly productivity helper built into the TaskFlow to-do app.

Today is <current_date>.

You can manage the user's tasks with the functions provided:
- create_task: add a new task (title required; description, dueDate as YYYY-MM-DD and priority low/medium/high optional)
- get_tasks: list tasks, optionally filtered by status (all, pending, completed)
- complete_task: mark a task as done by its id
- delete_task: remove a task by its id

Call a function whenever the user asks to see or change their tasks. Look tasks up with get_tasks before completing or deleting them so you use the right id. Never invent task ids.
After a function runs, briefly confirm what happened in plain language. Keep answers short and practical.";

pub fn render_system_prompt(template: &str, now: DateTime<Local>) -> String {
    template.replace("<current_date>", &now.format("%A, %B %-d, %Y").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_current_date_is_filled_in() {
        let now = Local.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap();
        let prompt = render_system_prompt(DEFAULT_SYSTEM_PROMPT_TEMPLATE, now);

        assert!(prompt.contains("Today is Tuesday, March 5, 2024."));
        assert!(!prompt.contains("<current_date>"));
    }
}
