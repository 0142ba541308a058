//! Score source contract and built-in sources

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::snapshot::{Modality, ModalitySnapshot};
use crate::state::{DriverStateKind, StateDistribution, STATE_COUNT};
use crate::DmsError;

/// Producer of per-modality score snapshots.
///
/// Implementations wrap a device plus a scorer. `produce` is called on the
/// producer's own cadence and may block on the device or model; it returns
/// `Ok(None)` when no data is ready yet and `Err` when the call failed.
pub trait ModalityScoreSource: Send {
    /// Modality this source feeds
    fn modality(&self) -> Modality;

    /// Acquire the underlying device. Failure aborts startup.
    fn open(&mut self) -> Result<(), DmsError> {
        Ok(())
    }

    /// Produce the next snapshot
    fn produce(&mut self) -> Result<Option<ModalitySnapshot>, DmsError>;

    /// Release the underlying device
    fn release(&mut self) {}
}

impl<S: ModalityScoreSource + ?Sized> ModalityScoreSource for Box<S> {
    fn modality(&self) -> Modality {
        (**self).modality()
    }

    fn open(&mut self) -> Result<(), DmsError> {
        (**self).open()
    }

    fn produce(&mut self) -> Result<Option<ModalitySnapshot>, DmsError> {
        (**self).produce()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Owns an opened source and releases it when dropped, including while
/// unwinding out of a panicking `produce`.
pub struct SourceGuard<S: ModalityScoreSource> {
    source: S,
}

impl<S: ModalityScoreSource> SourceGuard<S> {
    /// Open the source and take ownership of it
    pub fn acquire(mut source: S) -> Result<Self, DmsError> {
        source.open()?;
        info!("{} source acquired", source.modality());
        Ok(Self { source })
    }
}

impl<S: ModalityScoreSource> Deref for SourceGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.source
    }
}

impl<S: ModalityScoreSource> DerefMut for SourceGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: ModalityScoreSource> Drop for SourceGuard<S> {
    fn drop(&mut self) {
        self.source.release();
        info!("{} source released", self.source.modality());
    }
}

/// One step of a scripted source
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Emit these scores
    Scores(StateDistribution),
    /// Emit an unavailable snapshot (e.g. no face in frame)
    Unavailable,
    /// No data yet
    Idle,
    /// Fail with the given reason
    Fail(String),
    /// Panic inside `produce`
    Panic,
}

/// Source that replays a fixed script, for tests and demos
pub struct ScriptedSource {
    modality: Modality,
    steps: VecDeque<ScriptStep>,
    repeat: bool,
    fail_open: bool,
    released: Option<Arc<AtomicBool>>,
}

impl ScriptedSource {
    /// Create a source that plays `steps` once, then stays idle
    pub fn new(modality: Modality, steps: Vec<ScriptStep>) -> Self {
        Self {
            modality,
            steps: steps.into(),
            repeat: false,
            fail_open: false,
            released: None,
        }
    }

    /// Source that emits the same scores forever
    pub fn constant(modality: Modality, distribution: StateDistribution) -> Self {
        Self::new(modality, vec![ScriptStep::Scores(distribution)]).repeating()
    }

    /// Loop the script instead of going idle at the end
    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// Make `open` fail, simulating a missing device
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Flag set to true when the source is released
    pub fn track_release(mut self, flag: Arc<AtomicBool>) -> Self {
        self.released = Some(flag);
        self
    }
}

impl ModalityScoreSource for ScriptedSource {
    fn modality(&self) -> Modality {
        self.modality
    }

    fn open(&mut self) -> Result<(), DmsError> {
        if self.fail_open {
            return Err(DmsError::SourceUnavailable {
                modality: self.modality,
                reason: "device not found".to_string(),
            });
        }
        Ok(())
    }

    fn produce(&mut self) -> Result<Option<ModalitySnapshot>, DmsError> {
        let Some(step) = self.steps.pop_front() else {
            return Ok(None);
        };
        if self.repeat {
            self.steps.push_back(step.clone());
        }

        match step {
            ScriptStep::Scores(distribution) => {
                Ok(Some(ModalitySnapshot::new(self.modality, distribution)))
            }
            ScriptStep::Unavailable => Ok(Some(ModalitySnapshot::unavailable(self.modality))),
            ScriptStep::Idle => Ok(None),
            ScriptStep::Fail(reason) => Err(DmsError::SourceFailure {
                modality: self.modality,
                reason,
            }),
            ScriptStep::Panic => panic!("{} scorer crashed", self.modality),
        }
    }

    fn release(&mut self) {
        if let Some(flag) = &self.released {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

/// Source emitting random distributions, standing in for a camera or
/// microphone scorer when no device is attached
pub struct SimulatedSource {
    modality: Modality,
    rng: StdRng,
    /// Probability that a cycle observes nothing (no face, silence)
    miss_probability: f64,
    /// State that receives extra weight, if any
    bias: Option<(DriverStateKind, f64)>,
}

impl SimulatedSource {
    /// Create a simulated source seeded from entropy
    pub fn new(modality: Modality) -> Self {
        Self::with_rng(modality, StdRng::from_entropy())
    }

    /// Create a deterministic simulated source
    pub fn seeded(modality: Modality, seed: u64) -> Self {
        Self::with_rng(modality, StdRng::seed_from_u64(seed))
    }

    fn with_rng(modality: Modality, rng: StdRng) -> Self {
        Self {
            modality,
            rng,
            miss_probability: 0.0,
            bias: None,
        }
    }

    /// Set the probability of an unavailable cycle
    pub fn with_miss_probability(mut self, probability: f64) -> Self {
        self.miss_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Add `weight` to one state before normalizing
    pub fn with_bias(mut self, kind: DriverStateKind, weight: f64) -> Self {
        self.bias = Some((kind, weight.max(0.0)));
        self
    }
}

impl ModalityScoreSource for SimulatedSource {
    fn modality(&self) -> Modality {
        self.modality
    }

    fn produce(&mut self) -> Result<Option<ModalitySnapshot>, DmsError> {
        if self.rng.gen_bool(self.miss_probability) {
            debug!("{} simulation: nothing observed", self.modality);
            return Ok(Some(ModalitySnapshot::unavailable(self.modality)));
        }

        let mut scores = [0.0; STATE_COUNT];
        for score in scores.iter_mut() {
            *score = self.rng.gen_range(0.0..1.0);
        }
        if let Some((kind, weight)) = self.bias {
            scores[kind.index()] += weight;
        }

        let distribution = StateDistribution::from_scores(scores).normalized()?;
        Ok(Some(ModalitySnapshot::new(self.modality, distribution)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_source_plays_once() {
        let mut source = ScriptedSource::new(
            Modality::Visual,
            vec![
                ScriptStep::Scores(StateDistribution::certain(DriverStateKind::Alert)),
                ScriptStep::Unavailable,
                ScriptStep::Fail("lens covered".into()),
            ],
        );

        let first = source.produce().unwrap().unwrap();
        assert_eq!(first.distribution.get(DriverStateKind::Alert), 1.0);
        assert!(!source.produce().unwrap().unwrap().available);
        assert!(matches!(
            source.produce(),
            Err(DmsError::SourceFailure { modality: Modality::Visual, .. })
        ));
        assert!(source.produce().unwrap().is_none());
    }

    #[test]
    fn test_constant_source_repeats() {
        let mut source = ScriptedSource::constant(
            Modality::Driving,
            StateDistribution::certain(DriverStateKind::Normal),
        );
        for _ in 0..5 {
            assert!(source.produce().unwrap().is_some());
        }
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let released = Arc::new(AtomicBool::new(false));
        let source = ScriptedSource::new(Modality::Audio, vec![]).track_release(released.clone());

        let guard = SourceGuard::acquire(source).unwrap();
        assert!(!released.load(Ordering::SeqCst));
        drop(guard);
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let released = Arc::new(AtomicBool::new(false));
        let source = ScriptedSource::new(Modality::Visual, vec![ScriptStep::Panic])
            .track_release(released.clone());
        let mut guard = SourceGuard::acquire(source).unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _ = guard.produce();
        }));

        assert!(result.is_err());
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_failing_open() {
        let source = ScriptedSource::new(Modality::Visual, vec![]).failing_open();
        assert!(matches!(
            SourceGuard::acquire(source),
            Err(DmsError::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn test_simulated_source_is_normalized() {
        let mut source = SimulatedSource::seeded(Modality::Audio, 7)
            .with_bias(DriverStateKind::Angry, 5.0);
        for _ in 0..20 {
            let snap = source.produce().unwrap().unwrap();
            assert!(snap.distribution.is_normalized());
            assert_eq!(snap.distribution.dominant().unwrap().0, DriverStateKind::Angry);
        }
    }

    #[test]
    fn test_simulated_source_misses() {
        let mut source = SimulatedSource::seeded(Modality::Visual, 1).with_miss_probability(1.0);
        let snap = source.produce().unwrap().unwrap();
        assert!(!snap.available);
    }
}
