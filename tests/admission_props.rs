//! Property tests for guardrail admission.

use agents_router::{
    Agent, AgentsError, FnGuardrail, GuardrailOutput, GuardrailPolicy, InputGuardrail,
    MockProvider, RunConfig, Runner,
};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn guards(setup: &[(bool, i32)]) -> Vec<Arc<dyn InputGuardrail>> {
    setup.iter()
        .enumerate()
        .map(|(i, &(trip, priority))| {
            let guard = FnGuardrail::new(format!("guard_{i}"), move |_input: &str| {
                if trip {
                    GuardrailOutput::reject(json!({"index": i}))
                } else {
                    GuardrailOutput::admit(json!({"index": i}))
                }
            })
            .with_priority(priority);
            Arc::new(guard) as Arc<dyn InputGuardrail>
        })
        .collect()
}

/// Name of the guardrail each policy must report, if any trips.
fn expected_rejection(setup: &[(bool, i32)], policy: GuardrailPolicy) -> Option<String> {
    let tripping = setup.iter().enumerate().filter(|(_, (trip, _))| *trip);
    let index = match policy {
        GuardrailPolicy::RunAll => tripping.map(|(i, _)| i).next(),
        // Highest priority wins; ties go to the earliest declared.
        GuardrailPolicy::FirstTriggered => tripping
            .fold(None::<(usize, i32)>, |best, (i, &(_, p))| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((i, p)),
            })
            .map(|(i, _)| i),
    };
    index.map(|i| format!("guard_{i}"))
}

fn run_case(
    setup: Vec<(bool, i32)>,
    policy: GuardrailPolicy,
    input: String,
) -> (Result<String, AgentsError>, usize) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async move {
        let provider = Arc::new(MockProvider::new("mock").with_message("answered"));
        let mut agent = Agent::simple("Triage Agent", "route").with_model_provider(provider.clone());
        for guard in guards(&setup) {
            agent = agent.with_input_guardrail(guard);
        }
        let outcome = Runner::run(agent, input, RunConfig::default().with_guardrail_policy(policy))
            .await
            .map(|r| r.final_output_text());
        (outcome, provider.request_count())
    })
}

fn policy() -> impl Strategy<Value = GuardrailPolicy> {
    prop_oneof![
        Just(GuardrailPolicy::FirstTriggered),
        Just(GuardrailPolicy::RunAll)
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn admitted_iff_no_guardrail_trips(
        setup in prop::collection::vec((any::<bool>(), -3i32..3), 0..6),
        policy in policy(),
        input in "[a-zA-Z ?]{0,40}",
    ) {
        let (outcome, backend_calls) = run_case(setup.clone(), policy, input);
        match expected_rejection(&setup, policy) {
            None => {
                prop_assert_eq!(outcome.ok(), Some("answered".to_string()));
                prop_assert_eq!(backend_calls, 1);
            }
            Some(expected) => {
                let err = outcome.unwrap_err();
                let rejection = err.rejection().cloned();
                prop_assert_eq!(rejection.map(|r| r.guardrail), Some(expected));
                // A rejected request never reaches the agent's backend.
                prop_assert_eq!(backend_calls, 0);
            }
        }
    }

    #[test]
    fn verdict_is_deterministic_for_identical_input(
        setup in prop::collection::vec((any::<bool>(), -3i32..3), 1..6),
        policy in policy(),
    ) {
        let first = run_case(setup.clone(), policy, "Solve 2x = 8".into()).0;
        let second = run_case(setup, policy, "Solve 2x = 8".into()).0;
        let name = |r: &Result<String, AgentsError>| match r {
            Ok(out) => Ok(out.clone()),
            Err(e) => Err(e.rejection().map(|r| r.guardrail.clone())),
        };
        prop_assert_eq!(name(&first), name(&second));
    }
}
