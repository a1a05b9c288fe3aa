//! Homework helper: a triage agent guarded by a homework classifier, handing
//! off to a history or a math tutor.
//!
//! Runs against OpenAI when `OPENAI_API_KEY` is set, otherwise against a
//! scripted backend so the routing can be watched offline.

use std::sync::Arc;

use agents_router::config::required_env;
use agents_router::{
    Agent, AgentGuardrail, AgentsError, Handoff, MockProvider, ModelProvider, RunConfig, Runner,
    SdkConfig,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct HomeworkOutput {
    is_homework: bool,
    reasoning: String,
}

struct Question {
    kind: &'static str,
    text: &'static str,
}

const QUESTIONS: [Question; 4] = [
    Question {
        kind: "History question",
        text: "Be brief. When did Arminianism and Calvinism come about?",
    },
    Question {
        kind: "General/philosophical question",
        text: "Be brief. What is the meaning of life?",
    },
    Question {
        kind: "Math question",
        text: "Be brief. What is the value of the Golden Ratio?",
    },
    Question {
        kind: "Relationship advice",
        text: "Be brief. Can you give me some relationship advice?",
    },
];

/// Per-agent scripted backends replaying one plausible session.
struct Offline {
    guardrail: Arc<dyn ModelProvider>,
    triage: Arc<dyn ModelProvider>,
    history: Arc<dyn ModelProvider>,
    math: Arc<dyn ModelProvider>,
}

impl Offline {
    fn new() -> Self {
        let verdict = |is_homework: bool, reasoning: &str| {
            json!({"is_homework": is_homework, "reasoning": reasoning})
        };
        Self {
            guardrail: Arc::new(
                MockProvider::new("offline")
                    .with_structured(verdict(true, "A church history question."))
                    .with_structured(verdict(false, "A philosophical question, not homework."))
                    .with_structured(verdict(true, "A math question."))
                    .with_structured(verdict(false, "Personal advice, not homework.")),
            ),
            triage: Arc::new(
                MockProvider::new("offline")
                    .with_tool_call(
                        "transfer_to_history_tutor",
                        json!({"reason": "history question"}),
                    )
                    .with_tool_call("transfer_to_math_tutor", json!({"reason": "math question"})),
            ),
            history: Arc::new(MockProvider::new("offline").with_message(
                "Calvinism grew out of John Calvin's work in the 1530s-1540s; Arminianism arose \
                 around 1610 with the Remonstrants' response to it.",
            )),
            math: Arc::new(
                MockProvider::new("offline")
                    .with_message("The Golden Ratio is (1 + sqrt(5)) / 2, about 1.618."),
            ),
        }
    }
}

fn build_triage(model: &str, offline: Option<&Offline>) -> Agent {
    let with_backend = |agent: Agent, provider: Option<&Arc<dyn ModelProvider>>| match provider {
        Some(p) => agent.with_model_provider(p.clone()),
        None => agent,
    };

    let guardrail_agent = with_backend(
        Agent::simple("Guardrail check", "Check if the user is asking about homework.")
            .with_model(model)
            .with_output_type::<HomeworkOutput>(),
        offline.map(|o| &o.guardrail),
    );

    let history_tutor = with_backend(
        Agent::simple(
            "History Tutor",
            "You provide assistance with historical queries. Explain important events and context clearly.",
        )
        .with_model(model)
        .with_handoff_description("Specialist agent for historical questions"),
        offline.map(|o| &o.history),
    );

    let math_tutor = with_backend(
        Agent::simple(
            "Math Tutor",
            "You provide help with math problems. Explain your reasoning at each step and include examples",
        )
        .with_model(model)
        .with_handoff_description("Specialist agent for math questions"),
        offline.map(|o| &o.math),
    );

    // Requests that do not fit under math or history are blocked.
    let homework = AgentGuardrail::new("homework", guardrail_agent, |out: &HomeworkOutput| {
        out.is_homework
    });

    with_backend(
        Agent::simple(
            "Triage Agent",
            "You determine which agent to use based on the user's homework question",
        )
        .with_model(model)
        .with_handoff(Handoff::new(history_tutor))
        .with_handoff(Handoff::new(math_tutor))
        .with_input_guardrail(Arc::new(homework)),
        offline.map(|o| &o.triage),
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let sdk = SdkConfig::from_env();
    let offline = match required_env("OPENAI_API_KEY") {
        Ok(_) => None,
        Err(err) => {
            eprintln!("{err}\nFalling back to the scripted offline backend.\n");
            Some(Offline::new())
        }
    };
    let triage = Arc::new(build_triage(&sdk.default_model, offline.as_ref()));

    for question in QUESTIONS.iter() {
        match Runner::run(triage.clone(), question.text, RunConfig::from_sdk_config(&sdk)).await {
            Ok(result) => {
                println!("[{}] {}", result.final_agent, result.final_output_text());
            }
            Err(AgentsError::TripwireTriggered(rejection)) => {
                println!(
                    "Guardrail blocked the question '{}' of type '{}': {}",
                    question.text, question.kind, rejection.diagnostic["reasoning"]
                );
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
