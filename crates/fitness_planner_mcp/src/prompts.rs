use rmcp::model::{GetPromptResult, PromptMessage, PromptMessageRole};

pub fn plan_training_week_prompt(event_id: &str, week_id: &str, focus: &str) -> GetPromptResult {
    GetPromptResult::new(vec![PromptMessage::new_text(
            PromptMessageRole::User,
            format!(
                "Help me plan {week} of my training for event {event} with a '{focus}' focus.\n\nSteps:\n1. Look up the event with get_event and the countdown with get_overview\n2. Load the plan with get_plan (it is created from a template or generated on first edit)\n3. Review the sessions already in {week} and the weeks around it\n4. Propose changes: new sessions with add_workout, edits with update_workout, removals with delete_workout\n5. Record the week's focus and notes with update_training_week\n\nProvide a structured plan with:\n- Sessions per discipline and day\n- Recovery days placement\n- Reasoning based on the training phase of the week\n\nOnly apply the changes after I approve them.",
                week = week_id,
                event = event_id,
                focus = focus
            ),
        )])
    .with_description(format!(
        "Plan {} of {} with '{}' focus",
        week_id, event_id, focus
    ))
}

pub fn race_countdown_prompt(event_name: &str, date: &str, countdown: &str) -> GetPromptResult {
    GetPromptResult::new(vec![PromptMessage::new_text(
            PromptMessageRole::User,
            format!(
                "{} is on {} ({} to go).\n\nUse get_overview and get_plan to summarize:\n1. Which training week I am in and its phase\n2. How many planned sessions are completed so far\n3. What the remaining weeks focus on\n4. One or two adjustments worth making before race day\n\nKeep it short and encouraging.",
                event_name, date, countdown
            ),
        )])
    .with_description(format!("Countdown to {} ({})", event_name, countdown))
}
