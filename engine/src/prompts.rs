//! Prompt construction for every model call the engine makes.
//!
//! Sampling limits live next to the wording they belong to.

use arbor_types::{PromptSpec, RejectedSolutions, State};

pub const THOUGHT_MAX_TOKENS: u32 = 1000;
pub const THOUGHT_TEMPERATURE: f32 = 0.5;
pub const SOLUTION_MAX_TOKENS: u32 = 2048;
pub const SOLUTION_TEMPERATURE: f32 = 0.0;
pub const VALUE_MAX_TOKENS: u32 = 10;
pub const VALUE_TEMPERATURE: f32 = 1.0;
pub const VOTE_MAX_TOKENS: u32 = 50;
pub const VOTE_TEMPERATURE: f32 = 1.0;

/// Observation/thought formatting appended to generation prompts.
pub const REACT_SUFFIX: &str = "Write down your observations in format 'Observation:xxxx', \
then write down your thoughts in format 'Thoughts:xxxx'.";

const THOUGHT_SYSTEM_PROMPT: &str = "\
Please follow these steps to complete the task:

1. Break down the task into minimal subtasks.
2. Use markers like '1', '2', '3' to guide the exploration of the OBJECTIVE.
3. Generate and evaluate potential next steps.
4. If a step doesn't progress towards a solution, explore another path.
5. Provide a solution for each subtask and summarize the final result.

Remember, all tasks have solutions. Keep your responses concise and complete.";

fn state_or_placeholder(state: &State) -> String {
    if state.is_blank() {
        "(no steps yet)".to_string()
    } else {
        state.render().into_owned()
    }
}

/// Prompt for one candidate next step.
#[must_use]
pub fn thought_prompt(
    initial_prompt: &str,
    state: &State,
    rejected: &RejectedSolutions,
    react: bool,
) -> PromptSpec {
    let mut user = format!(
        "(DO NOT INCLUDE THIS IN YOUR RESPONSE)\n\
         #####OBJECTIVE#####\n\
         {initial_prompt}\n\
         ###################\n\
         ###CURRENT STATE###\n\
         {state}\n\
         ###################\n\
         ###REJECTED SOLUTIONS###\n\
         {rejected}\n\
         ###################\n\
         Devise the next step toward the objective. Do not repeat the rejected solutions.",
        state = state_or_placeholder(state),
        rejected = rejected.render(),
    );
    if react {
        user.push('\n');
        user.push_str(REACT_SUFFIX);
    }

    PromptSpec::new(THOUGHT_SYSTEM_PROMPT, user)
        .with_max_tokens(THOUGHT_MAX_TOKENS)
        .with_temperature(THOUGHT_TEMPERATURE)
}

/// Prompt for the final answer built on `state`.
#[must_use]
pub fn solution_prompt(
    initial_prompt: &str,
    state: &State,
    rejected: &RejectedSolutions,
) -> PromptSpec {
    let user = format!(
        "Generate a solution that complies with the user's instructions, choosing the most \
         reliable approach that can be completed in the least time and learning from the \
         rejected solutions.\n\
         Considering the reasoning provided:\n\n\
         ###\n{state}\n###\n\n\
         Devise the best possible solution for the task: {initial_prompt}\n\
         Here are evaluated solutions that were rejected:\n\
         ###\n{rejected}\n###\n\
         Complete the task without making the same mistakes as the rejected solutions. \
         Be simple. Be direct. Provide intuitive solutions as soon as you think of them.",
        state = state_or_placeholder(state),
        rejected = rejected.render(),
    );

    PromptSpec::user(user)
        .with_max_tokens(SOLUTION_MAX_TOKENS)
        .with_temperature(SOLUTION_TEMPERATURE)
}

/// Pessimistic scoring prompt for a single state.
#[must_use]
pub fn value_prompt(initial_prompt: &str, state: &State) -> PromptSpec {
    let user = format!(
        "To achieve the following goal: '{initial_prompt}', pessimistically value the context \
         of the past solutions and more importantly the latest generated solution AS A FLOAT \
         BETWEEN 0 AND 1.\n\n\
         Past solutions:\n\n\
         {state}\n\n\
         If the solutions are not directly and concretely making fast progress toward the goal, \
         give them a lower score.\n\
         Evaluate all solutions AS A FLOAT BETWEEN 0 AND 1. DO NOT RETURN ANYTHING ELSE.",
        state = state_or_placeholder(state),
    );

    PromptSpec::user(user)
        .with_max_tokens(VALUE_MAX_TOKENS)
        .with_temperature(VALUE_TEMPERATURE)
}

/// One prompt listing every candidate; the reply should repeat the chosen one.
///
/// Each state is flattened to a single line of space-separated words, the same
/// form the reply is compared against.
#[must_use]
pub fn vote_prompt(initial_prompt: &str, states: &[State]) -> PromptSpec {
    let listing = states
        .iter()
        .map(|state| state.tokens().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n");

    let user = format!(
        "Given the following states of reasoning, one per line:\n\
         {listing}\n\n\
         Pessimistically judge which state is most likely to achieve: {initial_prompt}\n\
         Reply with that state's line copied exactly and NOTHING ELSE."
    );

    PromptSpec::user(user)
        .with_max_tokens(VOTE_MAX_TOKENS)
        .with_temperature(VOTE_TEMPERATURE)
}
