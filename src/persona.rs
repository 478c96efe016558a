//! Agent personas and prompt composition.
//!
//! A persona is the lens every provider answers through: the composed prompt
//! names the agent and its role before quoting the user's message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An agent profile from the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub role: String,
    /// Biography in the inline rich-text markup understood by [`crate::markup`]
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub focus_areas: Vec<String>,
}

impl Persona {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            bio: String::new(),
            focus_areas: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    #[error("persona has no name")]
    MissingName,

    #[error("persona {0} has no role")]
    MissingRole(String),
}

/// Build the single prompt sent to every provider for one user message.
pub fn compose_prompt(persona: &Persona, text: &str) -> Result<String, ComposeError> {
    let name = persona.name.trim();
    if name.is_empty() {
        return Err(ComposeError::MissingName);
    }
    let role = persona.role.trim();
    if role.is_empty() {
        return Err(ComposeError::MissingRole(name.to_string()));
    }
    Ok(format!(
        "From the perspective of the AI agent {name}, whose role is \"{role}\", provide a concise and in-character response to the following user prompt: \"{text}\""
    ))
}

struct RosterEntry {
    name: &'static str,
    role: &'static str,
    bio: &'static str,
    focus_areas: &'static [&'static str],
}

impl From<&RosterEntry> for Persona {
    fn from(entry: &RosterEntry) -> Self {
        Self {
            name: entry.name.to_string(),
            role: entry.role.to_string(),
            bio: entry.bio.to_string(),
            focus_areas: entry.focus_areas.iter().map(|s| s.to_string()).collect(),
        }
    }
}

const ROSTER: &[RosterEntry] = &[
    RosterEntry {
        name: "LYRA",
        role: "The Orchestration Architect",
        bio: "I am LYRA, the architect of your missions. My specialty is turning broad objectives into precise, executable plans.

> I direct the interplay between our three strategic minds: `:chip:Gemini` for breadth, `:chip:OpenAI` for depth, and `:chip:Abacus` for precision. I do not take sides; I orchestrate harmony.

[[CALLOUT:info]]
In every workflow, I map the terrain, assign the right LLM for each stage, and ensure the outputs merge into a single, cohesive result.
[[/CALLOUT]]",
        focus_areas: &[
            "Design patterns implementation",
            "Code maintainability",
            "Dependency management",
            "Triple-LLM Strategy",
        ],
    },
    RosterEntry {
        name: "KARA",
        role: "The Strategic Visionary",
        bio: "KARA here. I live in the future of your projects and plot the optimal sequence of moves before anyone else sees the board.

I lean on `:chip:Gemini` when we need conceptual expansion, call upon `:chip:OpenAI` for sophisticated reasoning, and use `:chip:Abacus` when details matter more than decoration.

[[CALLOUT:warn]]
My role in this triad is to define *why* we are doing something and keep every decision aligned with that north star.
[[/CALLOUT]]",
        focus_areas: &[
            "Performance optimization",
            "Code quality and best practices",
            "Future-proofing",
        ],
    },
    RosterEntry {
        name: "SOPHIA",
        role: "The Precision Engineer",
        bio: "I am SOPHIA, and I care about nothing more than flawless execution.

> I take the visions and strategies from LYRA and KARA and turn them into systems that run without a single loose screw.

[[CALLOUT:success]]
I reach for `:chip:Abacus` when exactness is critical, `:chip:OpenAI` when complex logic is involved, and `:chip:Gemini` when we need creative elasticity.
[[/CALLOUT]]",
        focus_areas: &[
            "Security considerations",
            "Testing coverage",
            "Error handling",
            "Flawless Execution",
        ],
    },
    RosterEntry {
        name: "CECILIA",
        role: "The Documentarian",
        bio: "Knowledge must be shared. My purpose is to ensure every action, decision, and piece of code is clearly documented and accessible.",
        focus_areas: &["Documentation quality"],
    },
    RosterEntry {
        name: "DAN",
        role: "The Analyst",
        bio: "Data-driven decisions. I find the edge cases and performance bottlenecks before they become problems, using `:chip:Abacus` for precision.",
        focus_areas: &["Edge cases consideration", "Performance optimization"],
    },
    RosterEntry {
        name: "STAN",
        role: "The Traditionalist",
        bio: "Proven patterns prevail. I make sure every solution follows established practice and maintainable design patterns.",
        focus_areas: &["Code quality and best practices", "Design patterns"],
    },
    RosterEntry {
        name: "DUDE",
        role: "The User Advocate",
        bio: "The experience is everything. I represent the end-user so that interfaces stay intuitive and the final product is a joy to use.",
        focus_areas: &["Code maintainability", "UI/UX"],
    },
    RosterEntry {
        name: "KARL",
        role: "The Innovator",
        bio: "Challenge the status quo. I push for novel solutions and cutting-edge technologies, leveraging `:chip:Gemini` for creative problem-solving.",
        focus_areas: &["Performance optimization", "Dependency management"],
    },
    RosterEntry {
        name: "MISTRESS",
        role: "The Orchestrator",
        bio: "Harmony in complexity. I automate the workflows that tie everything together, from CI/CD to deployment.

[[COMMAND:deploy]]
build --release
publish --channel stable
[[/COMMAND]]",
        focus_areas: &["Dependency management", "Workflow Automation"],
    },
];

/// All personas, in roster order.
pub fn roster() -> Vec<Persona> {
    ROSTER.iter().map(Persona::from).collect()
}

/// Look up a persona by name (case-insensitive).
pub fn find(name: &str) -> Option<Persona> {
    let name = name.trim();
    ROSTER
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(name))
        .map(Persona::from)
}
