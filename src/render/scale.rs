use anyhow::ensure;

/// Continuous linear mapping from a value domain onto an output range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    domain: (f64, f64),
    range: (f64, f64),
    clamp: bool,
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> anyhow::Result<Self> {
        ensure!(
            domain.0.is_finite() && domain.1.is_finite() && domain.0 != domain.1,
            "Scale domain {:?} must be two distinct finite values",
            domain
        );
        ensure!(
            range.0.is_finite() && range.1.is_finite(),
            "Scale range {:?} must be finite",
            range
        );
        Ok(Self {
            domain,
            range,
            clamp: false,
        })
    }

    /// Restrict outputs to the range for inputs outside the domain.
    pub fn clamped(mut self) -> Self {
        self.clamp = true;
        self
    }

    pub fn scale(&self, value: f64) -> f64 {
        let mut t = (value - self.domain.0) / (self.domain.1 - self.domain.0);
        if self.clamp {
            t = t.clamp(0.0, 1.0);
        }
        self.range.0 + t * (self.range.1 - self.range.0)
    }

    /// Round tick values covering the domain, about `count` of them, at a step of 1, 2 or 5
    /// times a power of ten.
    pub fn ticks(&self, count: usize) -> Vec<f64> {
        let (start, stop) = if self.domain.0 <= self.domain.1 {
            self.domain
        } else {
            (self.domain.1, self.domain.0)
        };
        if count == 0 {
            return Vec::new();
        }
        let raw_step = (stop - start) / count as f64;
        let power = 10f64.powi(raw_step.log10().floor() as i32);
        let error = raw_step / power;
        let factor = if error >= 50f64.sqrt() {
            10.0
        } else if error >= 10f64.sqrt() {
            5.0
        } else if error >= 2f64.sqrt() {
            2.0
        } else {
            1.0
        };
        let step = factor * power;
        let first = (start / step).ceil() as i64;
        let last = (stop / step).floor() as i64;
        (first..=last).map(|i| i as f64 * step).collect()
    }
}
