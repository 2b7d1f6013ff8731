// ============================================================================
// VISIBILITY GATE — per-region state machine deciding if effects show
// ============================================================================
//
// Transition table:
//
//   mode       initial                    Enter           Exit        passes when
//   none       Inactive                   -               -           always
//   enter      Armed (Active if latched)  Armed→Latched   -           Latched/Active
//   enterExit  Inactive (Latched if so)   →Latched        →Inactive   Latched
//   pov        Active                     -               -           controlled viewer in window
//   targets    Active                     -               -           controlled target in window
//
// An enter latch is promoted to Active the first time it is evaluated.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GateMode {
    #[default]
    None,
    Enter,
    EnterExit,
    Pov,
    Targets,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateState {
    Inactive,
    Armed,
    Active,
    Latched,
}

/// Boundary crossing reported by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GateEvent {
    Enter,
    Exit,
}

/// Elevation range; a missing end is unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ElevationWindow {
    #[serde(default)]
    pub bottom: Option<f32>,
    #[serde(default)]
    pub top: Option<f32>,
}

impl ElevationWindow {
    pub fn contains(&self, elevation: f32) -> bool {
        elevation.is_finite()
            && elevation >= self.bottom.unwrap_or(f32::NEG_INFINITY)
            && elevation <= self.top.unwrap_or(f32::INFINITY)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GateConfig {
    pub mode: GateMode,
    pub latched: bool,
    pub gm_always_visible: bool,
    /// Target viewer ids for `targets` mode.
    pub targets: Vec<String>,
    pub elevation: Option<ElevationWindow>,
}

/// A token the local user may be viewing through.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    pub id: String,
    #[serde(default)]
    pub controlled: bool,
    #[serde(default)]
    pub elevation: Option<f32>,
}

/// Host state the gate reads during evaluation.
#[derive(Clone, Copy, Debug)]
pub struct GateContext<'a> {
    pub viewers: &'a [Viewer],
    pub user_is_gm: bool,
}

#[derive(Clone, Debug)]
pub struct RegionGate {
    config: GateConfig,
    state: GateState,
    last_pass: Option<bool>,
}

impl RegionGate {
    pub fn new(config: GateConfig) -> Self {
        let state = Self::initial_state(&config);
        Self { config, state, last_pass: None }
    }

    fn initial_state(config: &GateConfig) -> GateState {
        match config.mode {
            GateMode::None => GateState::Inactive,
            GateMode::Enter if config.latched => GateState::Active,
            GateMode::Enter => GateState::Armed,
            GateMode::EnterExit if config.latched => GateState::Latched,
            GateMode::EnterExit => GateState::Inactive,
            GateMode::Pov | GateMode::Targets => GateState::Active,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Replace the configuration.  The state restarts unless the config is
    /// unchanged.
    pub fn reconfigure(&mut self, config: GateConfig) {
        if config == self.config {
            return;
        }
        self.state = Self::initial_state(&config);
        self.config = config;
        self.last_pass = None;
    }

    pub fn handle(&mut self, event: GateEvent) {
        self.state = match (self.config.mode, self.state, event) {
            (GateMode::Enter, GateState::Armed, GateEvent::Enter) => GateState::Latched,
            (GateMode::EnterExit, _, GateEvent::Enter) => GateState::Latched,
            (GateMode::EnterExit, _, GateEvent::Exit) => GateState::Inactive,
            (_, state, _) => state,
        };
    }

    /// Whether the region's effects should currently show.
    pub fn evaluate(&mut self, ctx: &GateContext<'_>) -> bool {
        if self.config.gm_always_visible && ctx.user_is_gm {
            return true;
        }
        match self.config.mode {
            GateMode::None => true,
            GateMode::EnterExit => self.state == GateState::Latched,
            GateMode::Enter => {
                if self.state == GateState::Latched {
                    self.state = GateState::Active;
                }
                self.state == GateState::Active
            }
            GateMode::Pov => self.any_in_window(ctx.viewers.iter().filter(|v| v.controlled)),
            GateMode::Targets => {
                if self.config.targets.is_empty() {
                    return false;
                }
                let targets = &self.config.targets;
                self.any_in_window(ctx.viewers.iter().filter(|v| v.controlled && targets.contains(&v.id)))
            }
        }
    }

    fn any_in_window<'a>(&self, mut viewers: impl Iterator<Item = &'a Viewer>) -> bool {
        match &self.config.elevation {
            None => viewers.next().is_some(),
            Some(win) => viewers.any(|v| v.elevation.is_some_and(|e| win.contains(e))),
        }
    }

    /// Evaluate and report the result only when it differs from the last
    /// reported one.
    pub fn update(&mut self, ctx: &GateContext<'_>) -> Option<bool> {
        let pass = self.evaluate(ctx);
        if self.last_pass == Some(pass) {
            return None;
        }
        self.last_pass = Some(pass);
        Some(pass)
    }

    /// Forget the reported result so the next `update` reports again.
    pub fn reset_cache(&mut self) {
        self.last_pass = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewer(id: &str, controlled: bool, elevation: Option<f32>) -> Viewer {
        Viewer { id: id.to_string(), controlled, elevation }
    }

    fn ctx(viewers: &[Viewer]) -> GateContext<'_> {
        GateContext { viewers, user_is_gm: false }
    }

    #[test]
    fn no_gate_always_passes() {
        let mut g = RegionGate::new(GateConfig::default());
        assert_eq!(g.state(), GateState::Inactive);
        assert!(g.evaluate(&ctx(&[])));
    }

    #[test]
    fn enter_needs_a_latch_and_stays_active() {
        let mut g = RegionGate::new(GateConfig { mode: GateMode::Enter, ..Default::default() });
        assert_eq!(g.state(), GateState::Armed);
        assert!(!g.evaluate(&ctx(&[])));
        g.handle(GateEvent::Enter);
        assert_eq!(g.state(), GateState::Latched);
        assert!(g.evaluate(&ctx(&[])));
        assert_eq!(g.state(), GateState::Active);
        g.handle(GateEvent::Exit);
        assert!(g.evaluate(&ctx(&[])));
    }

    #[test]
    fn enter_exit_follows_events() {
        let mut g = RegionGate::new(GateConfig { mode: GateMode::EnterExit, latched: true, ..Default::default() });
        assert!(g.evaluate(&ctx(&[])));
        g.handle(GateEvent::Exit);
        assert_eq!(g.state(), GateState::Inactive);
        assert!(!g.evaluate(&ctx(&[])));
        g.handle(GateEvent::Enter);
        assert!(g.evaluate(&ctx(&[])));
    }

    #[test]
    fn pov_checks_controlled_viewers_against_the_window() {
        let cfg = GateConfig {
            mode: GateMode::Pov,
            elevation: Some(ElevationWindow { bottom: Some(0.0), top: Some(10.0) }),
            ..Default::default()
        };
        let mut g = RegionGate::new(cfg);
        assert!(!g.evaluate(&ctx(&[viewer("a", false, Some(5.0))])));
        assert!(!g.evaluate(&ctx(&[viewer("a", true, Some(20.0))])));
        assert!(!g.evaluate(&ctx(&[viewer("a", true, None)])));
        assert!(g.evaluate(&ctx(&[viewer("a", true, Some(20.0)), viewer("b", true, Some(10.0))])));

        let mut open = RegionGate::new(GateConfig { mode: GateMode::Pov, ..Default::default() });
        assert!(open.evaluate(&ctx(&[viewer("a", true, None)])));
        assert!(!open.evaluate(&ctx(&[])));
    }

    #[test]
    fn targets_need_a_listed_controlled_viewer() {
        let mut g = RegionGate::new(GateConfig {
            mode: GateMode::Targets,
            targets: vec!["b".into()],
            ..Default::default()
        });
        assert!(!g.evaluate(&ctx(&[viewer("a", true, Some(0.0))])));
        assert!(!g.evaluate(&ctx(&[viewer("b", false, Some(0.0))])));
        assert!(g.evaluate(&ctx(&[viewer("b", true, Some(0.0))])));

        let mut empty = RegionGate::new(GateConfig { mode: GateMode::Targets, ..Default::default() });
        assert!(!empty.evaluate(&ctx(&[viewer("b", true, Some(0.0))])));
    }

    #[test]
    fn gm_override_and_change_reporting() {
        let mut g = RegionGate::new(GateConfig {
            mode: GateMode::Enter,
            gm_always_visible: true,
            ..Default::default()
        });
        let gm = GateContext { viewers: &[], user_is_gm: true };
        assert!(g.evaluate(&gm));
        assert_eq!(g.update(&ctx(&[])), Some(false));
        assert_eq!(g.update(&ctx(&[])), None);
        assert_eq!(g.update(&gm), Some(true));
        g.reset_cache();
        assert_eq!(g.update(&gm), Some(true));
    }
}
