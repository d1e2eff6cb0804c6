//! Prompt templates sent to the generation service.

use std::fmt::Write as _;

/// Lists the vocabulary the output has to stick to.
#[must_use]
pub fn ontology_hint(terms: &[String]) -> String {
    if terms.is_empty() {
        String::new()
    } else {
        format!("\n\nAvailable ontology terms: {}", terms.join(", "))
    }
}

/// Tells the service why its previous answer was rejected.
#[must_use]
pub fn feedback_hint(feedback: Option<&str>) -> String {
    match feedback {
        Some(feedback) if !feedback.trim().is_empty() => format!(
            "\n\nYour previous answer was rejected: {feedback}\nFix the problem in your new answer."
        ),
        _ => String::new(),
    }
}

#[must_use]
pub fn direct(text: &str, terms: &[String], feedback: Option<&str>) -> String {
    format!(
        "Translate the following into a Prolog fact, rule or query. Only output the Prolog code.\n\
         A fact or rule must end with a period. A query must not end with a period.\n\
         Example: \"All men are mortal.\" becomes \"mortal(X) :- man(X).\"{}{}\n\n\
         Input: {text}\nOutput:",
        ontology_hint(terms),
        feedback_hint(feedback),
    )
}

#[must_use]
pub fn few_shot(text: &str, terms: &[String], feedback: Option<&str>) -> String {
    format!(
        "Translate to a Prolog fact, rule or query. Only output valid Prolog.\n\
         Do NOT include any extra text, comments, or explanations, just the Prolog.\n\
         A fact or rule must end with a single period. A query must NOT end with a period.{}{}\n\n\
         Examples:\n\
         1. \"All birds fly\" -> \"flies(X) :- bird(X).\"\n\
         2. \"Socrates is mortal\" -> \"mortal(socrates).\"\n\
         3. \"Does tweety fly?\" -> \"flies(tweety)\"\n\
         4. \"Is Tweety a bird?\" -> \"bird(tweety)\"\n\
         5. \"What is the color of the car?\" -> \"has_color(car, Color)\"\n\n\
         Input: {text}\nOutput:",
        ontology_hint(terms),
        feedback_hint(feedback),
    )
}

#[must_use]
pub fn structured(text: &str, terms: &[String], feedback: Option<&str>) -> String {
    format!(
        "Translate the following into a JSON representation of a Prolog clause.\n\
         Output ONLY valid JSON with:\n\
         - \"type\" (\"fact\", \"rule\" or \"query\")\n\
         - \"head\" with \"predicate\" and \"args\" array\n\
         - \"body\" array (for rules only) with elements having \"predicate\" and \"args\"\n\n\
         Examples:\n\
         {{\"type\":\"fact\",\"head\":{{\"predicate\":\"bird\",\"args\":[\"tweety\"]}}}}\n\
         {{\"type\":\"rule\",\"head\":{{\"predicate\":\"has_wings\",\"args\":[\"X\"]}},\"body\":[{{\"predicate\":\"bird\",\"args\":[\"X\"]}}]}}\n\
         {{\"type\":\"query\",\"head\":{{\"predicate\":\"bird\",\"args\":[\"X\"]}}}}{}{}\n\n\
         Input: {text}\nOutput:",
        ontology_hint(terms),
        feedback_hint(feedback),
    )
}

/// Inputs of one reasoning step prompt.
#[derive(Clone, Copy, Debug, Default)]
pub struct AgenticContext<'a> {
    pub task: &'a str,
    pub ontology_terms: &'a [String],
    pub program: &'a [String],
    pub previous_steps: &'a [String],
    pub bindings: &'a str,
    pub feedback: Option<&'a str>,
}

#[must_use]
pub fn agentic(context: &AgenticContext<'_>) -> String {
    let mut hints = String::new();
    if !context.program.is_empty() {
        let _ = write!(hints, "\n\nCurrent Knowledge Base:\n{}", context.program.join("\n"));
    }
    if !context.previous_steps.is_empty() {
        let _ = write!(
            hints,
            "\n\nPrevious Reasoning Steps:\n{}",
            context.previous_steps.join("\n")
        );
    }
    if !context.bindings.is_empty() {
        let _ = write!(hints, "\n\nAccumulated Bindings: {}", context.bindings);
    }
    hints.push_str(&ontology_hint(context.ontology_terms));
    if let Some(feedback) = context.feedback.filter(|feedback| !feedback.trim().is_empty()) {
        let _ = write!(hints, "\n\nResult of the last step: {feedback}");
    }

    format!(
        "You are an expert Prolog reasoner and agent. Break the task down into discrete Prolog queries or assertions, or reach a conclusion.\n\
         Your output must be a JSON object with a \"type\" field (\"query\", \"assert\", or \"conclude\") and a \"content\" field \
         (a Prolog query or clause for query/assert), or \"answer\" and \"explanation\" fields for conclude.{hints}\n\n\
         Original Task: \"{task}\"\n\n\
         Examples:\n\
         - To query: {{\"type\": \"query\", \"content\": \"can_fly(X)\"}}\n\
         - To assert: {{\"type\": \"assert\", \"content\": \"bird(tweety).\"}}\n\
         - To conclude: {{\"type\": \"conclude\", \"answer\": \"Yes, Tweety can fly.\", \"explanation\": \"Tweety is a canary and canaries are birds.\"}}\n\n\
         If you have sufficient information to answer the task, use \"conclude\" with a clear, concise answer and a brief explanation.\n\n\
         What is the next logical step to address the original task?\nOutput:",
        task = context.task,
    )
}

/// Asks for an answer grounded in the rendered knowledge graph when symbolic
/// resolution found nothing.
#[must_use]
pub fn fallback(question: &str, knowledge: &str) -> String {
    let knowledge = if knowledge.trim().is_empty() {
        "(empty)"
    } else {
        knowledge
    };
    format!(
        "The following Prolog knowledge base could not prove the query below.\n\
         Answer the question as well as you can from the knowledge base, in one or two sentences.\n\n\
         Knowledge Base:\n{knowledge}\n\nQuestion: {question}\nAnswer:"
    )
}
