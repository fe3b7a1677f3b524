/// Lifecycle of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EpisodeState {
    /// Set up, no turn dispatched yet.
    #[default]
    NotStarted,
    /// Playing the given turn.
    Running { turn: usize },
    /// Terminal; nothing is dispatched or mutated any more.
    Finished,
}
