//! The debug-phase tracer (spec §9: "Wire an explicit 'tracer' object... do
//! not reach into global state"; spec §6.1/§6.3: `DEBUG_PHASES` categories).
//!
//! Every pass takes a `&Tracer` explicitly — there is no ambient logger
//! singleton. The tracer itself forwards to `log::debug!`, matching how
//! `cranelift-codegen` logs from deep inside its passes
//! (`binemit/relaxation.rs` uses `log::debug!` directly); a consumer's own
//! `log` backend (or none at all) decides what actually gets printed.

use std::str::FromStr;

/// One trace category named in spec §6.1/§6.3.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Ir,
    Ssa,
    Regalloc,
    Codegen,
}

impl Phase {
    fn bit(self) -> u8 {
        match self {
            Phase::Ir => 0b0001,
            Phase::Ssa => 0b0010,
            Phase::Regalloc => 0b0100,
            Phase::Codegen => 0b1000,
        }
    }

    fn target(self) -> &'static str {
        match self {
            Phase::Ir => "cot::ir",
            Phase::Ssa => "cot::ssa",
            Phase::Regalloc => "cot::regalloc",
            Phase::Codegen => "cot::codegen",
        }
    }
}

/// A bitset of enabled trace categories, parsed from `DEBUG_PHASES`
/// (spec §6.3: `DEBUG_PHASES=ir,ssa,regalloc,codegen,all`).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DebugPhases(u8);

impl DebugPhases {
    pub const NONE: DebugPhases = DebugPhases(0);
    pub const ALL: DebugPhases = DebugPhases(0b1111);

    pub fn enabled(self, phase: Phase) -> bool {
        self.0 & phase.bit() != 0
    }

    pub fn with(mut self, phase: Phase) -> Self {
        self.0 |= phase.bit();
        self
    }

    /// Parse the comma-separated `DEBUG_PHASES` env var format.
    pub fn parse_env(value: &str) -> Self {
        let mut out = DebugPhases::NONE;
        for part in value.split(',') {
            match part.trim() {
                "all" => out = DebugPhases::ALL,
                other => {
                    if let Ok(phase) = Phase::from_str(other) {
                        out = out.with(phase);
                    }
                }
            }
        }
        out
    }

    /// Read and parse the `DEBUG_PHASES` env var, defaulting to `NONE`.
    pub fn from_env() -> Self {
        std::env::var("DEBUG_PHASES")
            .map(|v| Self::parse_env(&v))
            .unwrap_or(DebugPhases::NONE)
    }
}

impl FromStr for Phase {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ir" => Ok(Phase::Ir),
            "ssa" => Ok(Phase::Ssa),
            "regalloc" => Ok(Phase::Regalloc),
            "codegen" => Ok(Phase::Codegen),
            _ => Err(()),
        }
    }
}

/// A bitset plus a writer: a no-op when the category bit is off, so
/// disabled traces don't even format their message (spec §9).
#[derive(Copy, Clone, Default)]
pub struct Tracer {
    phases: DebugPhases,
}

impl Tracer {
    pub fn new(phases: DebugPhases) -> Self {
        Self { phases }
    }

    pub fn disabled() -> Self {
        Self::new(DebugPhases::NONE)
    }

    pub fn is_enabled(&self, phase: Phase) -> bool {
        self.phases.enabled(phase)
    }

    /// Trace a message under `phase`; a no-op (the closure is never called)
    /// if that category's bit is off.
    pub fn trace(&self, phase: Phase, msg: impl FnOnce() -> String) {
        if self.is_enabled(phase) {
            log::debug!(target: phase.target(), "{}", msg());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_list() {
        let p = DebugPhases::parse_env("ir,regalloc");
        assert!(p.enabled(Phase::Ir));
        assert!(p.enabled(Phase::Regalloc));
        assert!(!p.enabled(Phase::Ssa));
    }

    #[test]
    fn all_enables_everything() {
        let p = DebugPhases::parse_env("all");
        assert_eq!(p, DebugPhases::ALL);
    }

    #[test]
    fn disabled_tracer_never_calls_closure() {
        let t = Tracer::disabled();
        let mut called = false;
        t.trace(Phase::Ir, || {
            called = true;
            String::new()
        });
        assert!(!called);
    }
}
