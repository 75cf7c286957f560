//! Formula catalogue for the synthetic generator.
//!
//! Each function is `y = f(x; A, B)` with documented meanings and defaults for
//! the two parameters, a natural sampling step and an optional domain
//! restriction.

use std::fmt;
use std::str::FromStr;

/// Step used when a function has no period.
pub const DEFAULT_STEP: f64 = 0.001;

/// Period of the sawtooth wave.
pub const SAWTOOTH_PERIOD: f64 = 3.0;

/// Supported formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// `y = A·sin(Bx)`.
    Sine,
    /// `y = A·x^B`.
    Power,
    /// Falling ramp of period 3, scaled by A and shifted by B.
    Sawtooth,
}

impl Function {
    /// Every function, in menu order.
    pub const ALL: [Function; 3] = [Function::Sine, Function::Power, Function::Sawtooth];

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            Function::Sine => "Sine Wave y = Asin(Bx)",
            Function::Power => "Power Graph y = Ax^B",
            Function::Sawtooth => "Sawtooth wave",
        }
    }

    /// Meaning of parameter A.
    pub fn a_description(self) -> &'static str {
        match self {
            Function::Sine => "The amplitude of the wave",
            Function::Power => "A constant multiplier",
            Function::Sawtooth => "Vertical Scaling",
        }
    }

    /// Meaning of parameter B.
    pub fn b_description(self) -> &'static str {
        match self {
            Function::Sine => "The frequency of the wave",
            Function::Power => "The power by which x is raised",
            Function::Sawtooth => "Vertical Shift",
        }
    }

    /// Default A.
    pub fn default_a(self) -> f64 {
        match self {
            Function::Sine | Function::Power => 1.0,
            Function::Sawtooth => 2.0,
        }
    }

    /// Default B.
    pub fn default_b(self) -> f64 {
        match self {
            Function::Sine | Function::Sawtooth => 1.0,
            Function::Power => 2.0,
        }
    }

    /// Period for the given B, `None` if the function is not periodic.
    pub fn period(self, b: f64) -> Option<f64> {
        match self {
            Function::Sine if b != 0.0 => Some(1.0 / b.abs()),
            Function::Sine | Function::Power => None,
            Function::Sawtooth => Some(SAWTOOTH_PERIOD),
        }
    }

    /// Sampling step: ten samples per period, integer steps for the sawtooth.
    pub fn step(self, b: f64) -> f64 {
        match self {
            Function::Sawtooth => 1.0,
            _ => self.period(b).map_or(DEFAULT_STEP, |p| p / 10.0),
        }
    }

    /// Evaluate at `x`, `None` outside the domain or for a non-finite result.
    pub fn evaluate(self, x: f64, a: f64, b: f64) -> Option<f64> {
        let y = match self {
            Function::Sine => a * (b * x).sin(),
            Function::Power => {
                if b < 1.0 {
                    if is_integral(b) && x == 0.0 {
                        return None;
                    }
                    if !is_integral(b) && x <= 0.0 {
                        return None;
                    }
                }
                a * x.powf(b)
            },
            Function::Sawtooth => a * sawtooth(x) + b,
        };
        y.is_finite().then_some(y)
    }

    /// Explanation of a domain restriction for these parameters.
    pub fn domain_note(self, b: f64) -> Option<&'static str> {
        match self {
            Function::Power if b < 1.0 && is_integral(b) => {
                Some("Domain modified: Output excludes x = 0 (0 is a point of singularity)")
            },
            Function::Power if b < 1.0 => Some("Domain modified: Output only valid for x > 0"),
            _ => None,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn is_integral(b: f64) -> bool {
    (b - b.round()).abs() < 1e-9
}

/// Unit sawtooth: `-0.5` at multiples of the period, `1 - 0.5·p` in between.
pub fn sawtooth(x: f64) -> f64 {
    let phase = x.rem_euclid(SAWTOOTH_PERIOD);
    if phase == 0.0 {
        -0.5
    } else {
        1.0 - 0.5 * phase
    }
}

/// A function with its parameters bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waveform {
    /// Formula.
    pub function: Function,
    /// Parameter A.
    pub a: f64,
    /// Parameter B.
    pub b: f64,
}

impl Waveform {
    /// Waveform with the function's default parameters.
    pub fn new(function: Function) -> Self {
        Self {
            function,
            a: function.default_a(),
            b: function.default_b(),
        }
    }

    /// Evaluate at `x`.
    pub fn evaluate(&self, x: f64) -> Option<f64> {
        self.function.evaluate(x, self.a, self.b)
    }

    /// Natural sampling step.
    pub fn step(&self) -> f64 {
        self.function.step(self.b)
    }

    /// Title with bound parameters, e.g. `Sine Wave y = Asin(Bx) (A = 1, B = 1)`.
    pub fn label(&self) -> String {
        format!("{} (A = {}, B = {})", self.function.name(), self.a, self.b)
    }
}

impl Default for Waveform {
    fn default() -> Self {
        Self::new(Function::Sine)
    }
}

impl FromStr for Waveform {
    type Err = String;

    /// Parse `kind[:A[:B]]`, e.g. `sine`, `power:1:0.5`, `sawtooth:2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let kind = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        let function = match kind.as_str() {
            "sine" | "sin" => Function::Sine,
            "power" | "pow" => Function::Power,
            "sawtooth" | "saw" => Function::Sawtooth,
            other => {
                return Err(format!(
                    "unknown function '{}' (expected sine, power or sawtooth)",
                    other
                ))
            },
        };

        let mut wave = Waveform::new(function);
        let mut param = |name: &str, slot: &mut f64| -> Result<(), String> {
            if let Some(raw) = parts.next() {
                *slot = raw
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid {} '{}'", name, raw))?;
            }
            Ok(())
        };
        param("A", &mut wave.a)?;
        param("B", &mut wave.b)?;

        if parts.next().is_some() {
            return Err(format!("too many parameters in '{}'", s));
        }
        Ok(wave)
    }
}
