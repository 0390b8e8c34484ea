use motion_config::TuningParameters;
use tokio::sync::watch;

/// Writable end of the live tuning values.
///
/// Any thread may adjust parameters at any time; the scheduler copies a whole
/// `TuningParameters` out of the channel at the start of every tick, so a
/// tick never sees a half-written value.
#[derive(Debug)]
pub struct TuningSource {
    tx: watch::Sender<TuningParameters>,
}

impl TuningSource {
    pub fn new(initial: TuningParameters) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// A reader for the scheduler (or any other observer).
    pub fn subscribe(&self) -> watch::Receiver<TuningParameters> {
        self.tx.subscribe()
    }

    /// Current values.
    pub fn get(&self) -> TuningParameters {
        *self.tx.borrow()
    }

    /// Replace every value at once.
    pub fn set(&self, params: TuningParameters) {
        self.tx.send_replace(params);
    }

    /// Edit values in place.
    pub fn update(&self, f: impl FnOnce(&mut TuningParameters)) {
        self.tx.send_modify(f);
    }

    pub fn set_accel_scale(&self, value: f64) {
        self.update(|p| p.accel_scale = value);
    }

    pub fn set_damping(&self, value: f64) {
        self.update(|p| p.damping = value);
    }

    pub fn set_hp_alpha(&self, value: f64) {
        self.update(|p| p.hp_alpha = value);
    }

    pub fn set_arrow_scale(&self, value: f64) {
        self.update(|p| p.arrow_scale = value);
    }

    pub fn set_arrow_max(&self, value: f64) {
        self.update(|p| p.arrow_max = value);
    }
}

impl Default for TuningSource {
    fn default() -> Self {
        Self::new(TuningParameters::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_see_latest_values() {
        let source = TuningSource::default();
        let rx = source.subscribe();

        source.set_damping(0.95);
        source.set_accel_scale(3.0);

        let seen = *rx.borrow();
        assert_eq!(seen.damping, 0.95);
        assert_eq!(seen.accel_scale, 3.0);
        assert_eq!(seen.hp_alpha, TuningParameters::default().hp_alpha);
    }

    #[test]
    fn values_are_not_clamped() {
        let source = TuningSource::default();
        source.set_damping(1.5);
        source.set_hp_alpha(-2.0);
        assert_eq!(source.get().damping, 1.5);
        assert_eq!(source.get().hp_alpha, -2.0);
    }

    #[test]
    fn writes_from_another_thread_are_whole() {
        let uniform = |v: f64| TuningParameters {
            accel_scale: v,
            damping: v,
            hp_alpha: v,
            arrow_scale: v,
            arrow_max: v,
        };
        // Every field equal from the start, so any mixed read is a torn write.
        let source = std::sync::Arc::new(TuningSource::new(uniform(-1.0)));
        let rx = source.subscribe();

        let writer = {
            let source = source.clone();
            std::thread::spawn(move || {
                for i in 0..1_000 {
                    source.set(uniform(i as f64));
                }
            })
        };

        for _ in 0..1_000 {
            let p = *rx.borrow();
            assert_eq!(p.accel_scale, p.arrow_max);
            assert_eq!(p.damping, p.hp_alpha);
            assert_eq!(p.accel_scale, p.damping);
        }
        writer.join().unwrap();
        assert_eq!(source.get().accel_scale, 999.0);
    }
}
