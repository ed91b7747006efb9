/// Alternative selection — weighted draws and the `seq`/`rseq`/`norep` policies.

use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::FxHashMap;

use crate::core::parser::TransformCall;

/// How an alternation picks its next alternative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionMode {
    /// Independent weighted draw each time.
    Weighted,
    /// `.seq()` — declared order, wrapping.
    Sequential,
    /// `.rseq()` — a shuffled permutation, reshuffled once consumed.
    Shuffled,
    /// `.norep()` — weighted, never the immediately previous pick.
    NoRepeat,
}

impl SelectionMode {
    pub fn from_name(name: &str) -> Option<SelectionMode> {
        match name {
            "seq" => Some(SelectionMode::Sequential),
            "rseq" => Some(SelectionMode::Shuffled),
            "norep" => Some(SelectionMode::NoRepeat),
            _ => None,
        }
    }

    /// The first sequencing marker in a transform chain, if any.
    pub fn from_transforms(calls: &[TransformCall]) -> SelectionMode {
        calls
            .iter()
            .find_map(|call| SelectionMode::from_name(&call.name))
            .unwrap_or(SelectionMode::Weighted)
    }

    fn tag(self) -> &'static str {
        match self {
            SelectionMode::Weighted => "weighted",
            SelectionMode::Sequential => "seq",
            SelectionMode::Shuffled => "rseq",
            SelectionMode::NoRepeat => "norep",
        }
    }
}

#[derive(Debug, Clone)]
enum SequenceState {
    Cursor(usize),
    Shuffled { order: Vec<usize>, next: usize },
    LastPick(usize),
}

/// Per-occurrence sequencing state. Occurrences are identified by a key
/// chosen by the caller (a rule name or the alternation's source text).
#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    states: FxHashMap<String, SequenceState>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick an index into `weights` under `mode`. Returns `None` only when
    /// there is nothing to pick from.
    pub fn select(
        &mut self,
        key: &str,
        mode: SelectionMode,
        weights: &[f64],
        rng: &mut StdRng,
    ) -> Option<usize> {
        let len = weights.len();
        if len == 0 {
            return None;
        }
        if len == 1 {
            return Some(0);
        }
        if mode == SelectionMode::Weighted {
            return Some(weighted_index(weights, rng));
        }

        let state_key = format!("{}:{}", mode.tag(), key);
        let picked = match mode {
            SelectionMode::Sequential => {
                let cursor = match self.states.get(&state_key) {
                    Some(SequenceState::Cursor(cursor)) => (cursor + 1) % len,
                    _ => 0,
                };
                self.states.insert(state_key, SequenceState::Cursor(cursor));
                cursor
            }
            SelectionMode::Shuffled => {
                let (order, next) = match self.states.remove(&state_key) {
                    Some(SequenceState::Shuffled { order, next })
                        if order.len() == len && next < len =>
                    {
                        (order, next)
                    }
                    _ => {
                        let mut order: Vec<usize> = (0..len).collect();
                        order.shuffle(rng);
                        (order, 0)
                    }
                };
                let picked = order[next];
                self.states.insert(
                    state_key,
                    SequenceState::Shuffled {
                        order,
                        next: next + 1,
                    },
                );
                picked
            }
            SelectionMode::NoRepeat => {
                let picked = match self.states.get(&state_key) {
                    Some(SequenceState::LastPick(last)) if *last < len => {
                        index_excluding(weights, *last, rng)
                    }
                    _ => weighted_index(weights, rng),
                };
                self.states.insert(state_key, SequenceState::LastPick(picked));
                picked
            }
            SelectionMode::Weighted => weighted_index(weights, rng),
        };
        Some(picked)
    }

    /// Drop all sequencing state.
    pub fn reset(&mut self) {
        self.states.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Weighted draw over a non-empty slice. Zero weights are never drawn unless
/// every weight is zero, in which case the draw is uniform.
pub fn weighted_index(weights: &[f64], rng: &mut StdRng) -> usize {
    match WeightedIndex::new(weights) {
        Ok(dist) => dist.sample(rng),
        Err(_) => rng.gen_range(0..weights.len()),
    }
}

fn index_excluding(weights: &[f64], excluded: usize, rng: &mut StdRng) -> usize {
    let masked: Vec<f64> = weights
        .iter()
        .enumerate()
        .map(|(i, w)| if i == excluded { 0.0 } else { *w })
        .collect();
    match WeightedIndex::new(&masked) {
        Ok(dist) => dist.sample(rng),
        Err(_) => {
            let offset = rng.gen_range(1..weights.len());
            (excluded + offset) % weights.len()
        }
    }
}
