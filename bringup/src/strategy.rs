// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

//! Ordered fallback over extraction strategies. Each strategy has a cheap
//! predicate deciding whether it applies and a fallible run step. The first
//! successful run wins. If none succeed, every attempt is reported.

use std::fmt;

use tracing::debug;

type Predicate<'a, I> = Box<dyn Fn(&I) -> bool + 'a>;
type Runner<'a, I, T> = Box<dyn Fn(&I) -> Result<T, String> + 'a>;

pub struct Strategy<'a, I: ?Sized, T> {
    pub name: &'static str,
    predicate: Predicate<'a, I>,
    run: Runner<'a, I, T>,
}

impl<'a, I: ?Sized, T> Strategy<'a, I, T> {
    pub fn new(
        name: &'static str,
        predicate: impl Fn(&I) -> bool + 'a,
        run: impl Fn(&I) -> Result<T, String> + 'a,
    ) -> Self {
        Self {
            name,
            predicate: Box::new(predicate),
            run: Box::new(run),
        }
    }

    /// Chain a fallible step after a successful run. The predicate and name
    /// are kept, so a failure of `f` counts as a failure of this strategy.
    pub fn and_then<U>(self, f: impl Fn(T) -> Result<U, String> + 'a) -> Strategy<'a, I, U>
    where
        I: 'a,
        T: 'a,
    {
        let run = self.run;

        Strategy {
            name: self.name,
            predicate: self.predicate,
            run: Box::new(move |input| run(input).and_then(&f)),
        }
    }
}

impl<I: ?Sized, T> fmt::Debug for Strategy<'_, I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    /// The predicate did not hold, so the strategy never ran.
    Skipped,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attempt {
    pub strategy: &'static str,
    pub outcome: Outcome,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Succeeded => write!(f, "{}: succeeded", self.strategy),
            Outcome::Skipped => write!(f, "{}: not applicable", self.strategy),
            Outcome::Failed(reason) => write!(f, "{}: {reason}", self.strategy),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Success<T> {
    pub strategy: &'static str,
    pub value: T,
    /// Attempts made before the successful one, ending with it.
    pub attempts: Vec<Attempt>,
}

/// Every strategy was skipped or failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Exhausted {
    pub attempts: Vec<Attempt>,
}

impl Exhausted {
    /// Whether no strategy applied to the input at all.
    pub fn all_skipped(&self) -> bool {
        self.attempts.iter().all(|a| a.outcome == Outcome::Skipped)
    }
}

impl fmt::Display for Exhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attempts.is_empty() {
            return write!(f, "no strategies available");
        }

        for (i, attempt) in self.attempts.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{attempt}")?;
        }

        Ok(())
    }
}

impl std::error::Error for Exhausted {}

/// Run `strategies` in order against `input`. A strategy's run step is only
/// invoked if its predicate holds. Evaluation stops at the first success.
pub fn run_strategies<I: ?Sized, T>(
    input: &I,
    strategies: &[Strategy<'_, I, T>],
) -> Result<Success<T>, Exhausted> {
    let mut attempts = Vec::with_capacity(strategies.len());

    for strategy in strategies {
        if !(strategy.predicate)(input) {
            debug!("Strategy {}: not applicable", strategy.name);
            attempts.push(Attempt {
                strategy: strategy.name,
                outcome: Outcome::Skipped,
            });
            continue;
        }

        match (strategy.run)(input) {
            Ok(value) => {
                debug!("Strategy {}: succeeded", strategy.name);
                attempts.push(Attempt {
                    strategy: strategy.name,
                    outcome: Outcome::Succeeded,
                });

                return Ok(Success {
                    strategy: strategy.name,
                    value,
                    attempts,
                });
            }
            Err(reason) => {
                debug!("Strategy {}: failed: {reason}", strategy.name);
                attempts.push(Attempt {
                    strategy: strategy.name,
                    outcome: Outcome::Failed(reason),
                });
            }
        }
    }

    Err(Exhausted { attempts })
}
