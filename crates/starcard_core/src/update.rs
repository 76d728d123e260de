use crate::{Effect, Msg, Phase, RunState};

/// Pure update function: applies a message to the run state and returns any effects.
///
/// `Effect::CloseStream` is emitted at most once per run, on the transition
/// into `Phase::Closed`. Messages that do not fit the current phase are ignored.
pub fn update(mut state: RunState, msg: Msg) -> (RunState, Vec<Effect>) {
    let effects = match (state.phase(), msg) {
        (Phase::Idle, Msg::Launch { total }) => {
            state.launch(total);
            Vec::new()
        }
        (Phase::Running, Msg::AllLaunched) => {
            if state.outstanding() == 0 {
                close(&mut state)
            } else {
                state.set_phase(Phase::Draining);
                Vec::new()
            }
        }
        (Phase::Running, Msg::OutcomeProduced) => {
            // Fast tasks may finish before the launch loop is done.
            state.record_outcome();
            Vec::new()
        }
        (Phase::Draining, Msg::OutcomeProduced) => {
            if state.record_outcome() && state.outstanding() == 0 {
                close(&mut state)
            } else {
                Vec::new()
            }
        }
        // Closed is terminal; anything else out of sequence is dropped.
        _ => Vec::new(),
    };

    (state, effects)
}

fn close(state: &mut RunState) -> Vec<Effect> {
    state.set_phase(Phase::Closed);
    vec![Effect::CloseStream]
}
