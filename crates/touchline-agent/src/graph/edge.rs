use super::step::{NavigationDirective, StepId};

/// A declared transition out of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Source step id.
    pub from: StepId,
    pub transition: Transition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Sequential hand-off to one step.
    GoTo { to: StepId },
    /// Concurrent branches joined at a barrier step.
    FanOut {
        branches: Vec<StepId>,
        barrier: StepId,
    },
}

impl Edge {
    /// Create a sequential edge.
    pub fn goto(from: impl Into<StepId>, to: impl Into<StepId>) -> Self {
        Self {
            from: from.into(),
            transition: Transition::GoTo { to: to.into() },
        }
    }

    /// Create a fan-out edge.
    pub fn fan_out<I, S>(from: impl Into<StepId>, branches: I, barrier: impl Into<StepId>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StepId>,
    {
        Self {
            from: from.into(),
            transition: Transition::FanOut {
                branches: branches.into_iter().map(Into::into).collect(),
                barrier: barrier.into(),
            },
        }
    }

    /// Every step this edge can lead to, barrier included.
    pub fn targets(&self) -> Vec<&StepId> {
        match &self.transition {
            Transition::GoTo { to } => vec![to],
            Transition::FanOut { branches, barrier } => {
                branches.iter().chain(std::iter::once(barrier)).collect()
            }
        }
    }

    /// Whether a runtime directive is covered by this declaration.
    ///
    /// Fan-out branches compare as a set.
    pub fn permits(&self, directive: &NavigationDirective) -> bool {
        match (&self.transition, directive) {
            (Transition::GoTo { to }, NavigationDirective::GoTo(next)) => to == next,
            (
                Transition::FanOut { branches, barrier },
                NavigationDirective::FanOut {
                    branches: requested,
                    barrier: requested_barrier,
                },
            ) => {
                barrier == requested_barrier
                    && branches.len() == requested.len()
                    && requested.iter().all(|b| branches.contains(b))
            }
            _ => false,
        }
    }
}
