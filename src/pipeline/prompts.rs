//! Prompt templates for batch generation and follow-ups.

/// Batch prompt asking for one JSON object covering every recipient.
pub fn batch_prompt(recipients: &[String]) -> String {
    format!(
        "Generate professional investment emails in **valid JSON format only**.\n\n\
         Each email must include:\n\
         - recipient (email address)\n\
         - subject (email subject)\n\
         - body (email body)\n\n\
         Do **not** add explanations, only return JSON.\n\n\
         Recipients: {recipients}\n\n\
         Output format:\n\
         {{\n\
         \x20   \"emails\": [\n\
         \x20       {{\n\
         \x20           \"recipient\": \"email1@example.com\",\n\
         \x20           \"subject\": \"Exclusive AI Investment Opportunity\",\n\
         \x20           \"body\": \"Dear Investor, we have an amazing AI stocks opportunity...\"\n\
         \x20       }}\n\
         \x20   ]\n\
         }}",
        recipients = recipients.join(", ")
    )
}

/// Follow-up prompt over the recipient's history and their latest reply.
pub fn follow_up_prompt(history: &str, recipient: &str, reply: &str) -> String {
    let history = if history.is_empty() {
        "(no previous conversation)"
    } else {
        history
    };
    format!(
        "Based on the past conversation: {history}, generate a follow-up email reply to \
         {recipient} based on this reply: {reply}."
    )
}
