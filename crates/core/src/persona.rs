//! Assistant personas: one instruction prompt plus one tool registry.

use crate::registry::ToolRegistry;

/// Which component opens the conversation.
///
/// Exactly one of the two fires per session: a persona that greets on enter
/// speaks as soon as the session becomes active, while a deferring persona
/// leaves the first reply to the entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreetingPolicy {
    /// The persona issues the first reply itself when the session activates.
    OnEnter,
    /// The entry point issues the greeting after starting the session.
    Deferred,
}

/// A named assistant configuration. Immutable after construction; a persona
/// takes no proactive action beyond its greeting policy.
pub struct Persona {
    name: String,
    instructions: String,
    tools: ToolRegistry,
    greeting: GreetingPolicy,
}

impl Persona {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        tools: ToolRegistry,
        greeting: GreetingPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            tools,
            greeting,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn greeting(&self) -> GreetingPolicy {
        self.greeting
    }

    /// True when the persona opens the conversation itself.
    pub fn greets_on_enter(&self) -> bool {
        self.greeting == GreetingPolicy::OnEnter
    }
}
