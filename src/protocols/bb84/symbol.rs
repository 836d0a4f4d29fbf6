//! Classical description of transmitted symbols and the per-party run record.

use std::fmt;

use rand::Rng;

/// Measurement reference frame for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Basis {
    /// Computational basis {|0>, |1>}, wire token `Z`.
    Rectilinear,
    /// Hadamard basis {|+>, |->}, wire token `X`.
    Diagonal,
}

impl Basis {
    /// Picks either basis with equal probability.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.random_bool(0.5) {
            Basis::Diagonal
        } else {
            Basis::Rectilinear
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Basis::Rectilinear => "Z",
            Basis::Diagonal => "X",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "Z" => Some(Basis::Rectilinear),
            "X" => Some(Basis::Diagonal),
            _ => None,
        }
    }
}

impl fmt::Display for Basis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.token())
    }
}

/// One transmission event as seen by one party.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// Zero-based position in the run.
    pub index: usize,
    pub bit: bool,
    pub basis: Basis,
}

impl Symbol {
    /// Draws a uniformly random bit and basis for position `index`.
    pub fn generate<R: Rng + ?Sized>(index: usize, rng: &mut R) -> Self {
        Self {
            index,
            bit: rng.random_bool(0.5),
            basis: Basis::random(rng),
        }
    }
}

/// Ordered symbols of one party. Position `i` on both sides refers to the
/// same transmission, though bits and bases may differ.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRecord {
    symbols: Vec<Symbol>,
}

impl RunRecord {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            symbols: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, symbol: Symbol) {
        self.symbols.push(symbol);
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn bases(&self) -> Vec<Basis> {
        self.symbols.iter().map(|s| s.basis).collect()
    }

    pub fn bits(&self) -> Vec<bool> {
        self.symbols.iter().map(|s| s.bit).collect()
    }

    pub fn bit(&self, index: usize) -> Option<bool> {
        self.symbols.get(index).map(|s| s.bit)
    }
}

/// Renders the measurement matrix, one row per symbol (1-based numbering).
impl fmt::Display for RunRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>6} {:>6} {:>4}", "Bit #", "Basis", "Bit")?;
        for s in &self.symbols {
            writeln!(f, "{:>6} {:>6} {:>4}", s.index + 1, s.basis, u8::from(s.bit))?;
        }
        Ok(())
    }
}
