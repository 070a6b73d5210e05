//! Conversation-related types.

/// How much dialogue history a conversation retains.
///
/// The eviction policy is stated explicitly by the caller; the default
/// keeps every turn for the lifetime of the generator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MemoryPolicy {
    /// Keep every turn.
    #[default]
    Unbounded,
    /// Keep only the most recent `n` turns, evicting the oldest.
    Window(usize),
}

/// One exchange with the model: the filled prompt that was sent and
/// the raw text that came back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    /// The filled prompt text.
    pub input: String,
    /// The raw model output.
    pub output: String,
}

/// An ordered, append-only sequence of turns.
#[derive(Clone, Debug, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
    policy: MemoryPolicy,
}

impl Conversation {
    /// Creates an empty conversation with the given memory policy.
    #[inline]
    pub fn new(policy: MemoryPolicy) -> Self {
        Self {
            turns: Vec::new(),
            policy,
        }
    }

    /// Appends a turn, evicting the oldest turns if the policy's
    /// window is exceeded.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
        if let MemoryPolicy::Window(n) = self.policy {
            while self.turns.len() > n {
                self.turns.remove(0);
            }
        }
    }

    /// Returns the retained turns, oldest first.
    #[inline]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Returns the number of retained turns.
    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns `true` if no turns are retained.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
