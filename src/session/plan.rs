//! Target sequences per practice surface

use rand::seq::SliceRandom;
use rand::Rng;

const LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
/// Number signs run 0 through 10
const MAX_NUMBER: u32 = 10;

/// How a session's targets are produced
#[derive(Clone, Debug, PartialEq)]
pub enum TargetPlan {
    /// Practice one sign
    Single(String),
    /// Finger-spell a word, one target per non-space character
    Word(String),
    /// Explicit ordered list
    Fixed(Vec<String>),
    /// Random letters and numbers, shuffled together
    ModuleTest { letters: usize, numbers: usize },
}

impl TargetPlan {
    /// The module test layout: 3 letters and 2 numbers
    pub fn module_test() -> Self {
        TargetPlan::ModuleTest {
            letters: 3,
            numbers: 2,
        }
    }

    /// Number of targets `generate` yields
    pub fn len(&self) -> usize {
        match self {
            TargetPlan::Single(_) => 1,
            TargetPlan::Word(word) => word.chars().filter(|c| !c.is_whitespace()).count(),
            TargetPlan::Fixed(targets) => targets.len(),
            TargetPlan::ModuleTest { letters, numbers } => letters + numbers,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Produce the target list. Random plans draw a fresh sequence on
    /// every call.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<String> {
        match self {
            TargetPlan::Single(sign) => vec![sign.trim().to_string()],
            TargetPlan::Word(word) => word
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| c.to_string())
                .collect(),
            TargetPlan::Fixed(targets) => targets.clone(),
            TargetPlan::ModuleTest { letters, numbers } => {
                let alphabet: Vec<char> = LETTERS.chars().collect();
                let mut items = Vec::with_capacity(letters + numbers);

                for _ in 0..*letters {
                    if let Some(letter) = alphabet.choose(rng) {
                        items.push(letter.to_string());
                    }
                }
                for _ in 0..*numbers {
                    items.push(rng.gen_range(0..=MAX_NUMBER).to_string());
                }

                items.shuffle(rng);
                items
            }
        }
    }
}
