use std::f32::consts::{PI, TAU};

pub const SPIN_PERIOD_SECS: f32 = 10.0;
pub const POP_SECS: f32 = 0.6;
const POP_PEAK_SCALE: f32 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MenuState {
    #[default]
    Collapsed,
    Expanded,
}

impl MenuState {
    fn toggled(self) -> Self {
        match self {
            MenuState::Collapsed => MenuState::Expanded,
            MenuState::Expanded => MenuState::Collapsed,
        }
    }
}

/// What the disc is currently doing on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationState {
    Spinning,
    Frozen,
    Popping,
}

/// Continuous rotation, one full turn per `period_secs`.
#[derive(Debug, Clone)]
pub struct DiscSpin {
    angle: f32,
    speed: f32,
}

impl DiscSpin {
    pub fn new(period_secs: f32) -> Self {
        Self {
            angle: 0.0,
            speed: TAU / period_secs.max(0.1),
        }
    }

    pub fn advance(&mut self, dt: f32, spinning: bool) {
        if spinning && dt > 0.0 {
            self.angle = (self.angle + self.speed * dt).rem_euclid(TAU);
        }
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }
}

/// One-shot "pop and spin": a full turn while the scale swells to 1.2 and
/// settles back.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PopAnimation {
    started_at: f64,
    duration: f32,
}

impl PopAnimation {
    fn progress(&self, now: f64) -> Option<f32> {
        let t = ((now - self.started_at) as f32 / self.duration.max(f32::EPSILON)).max(0.0);
        (t < 1.0).then_some(t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscPose {
    pub angle: f32,
    pub scale: f32,
}

/// Menu expansion plus the rotation sub-state of the disc.
#[derive(Debug, Clone)]
pub struct DiscPresentation {
    menu: MenuState,
    spin: DiscSpin,
    pop: Option<PopAnimation>,
    pop_secs: f32,
}

impl DiscPresentation {
    pub fn new(spin_period_secs: f32, pop_secs: f32) -> Self {
        Self {
            menu: MenuState::Collapsed,
            spin: DiscSpin::new(spin_period_secs),
            pop: None,
            pop_secs,
        }
    }

    pub fn menu(&self) -> MenuState {
        self.menu
    }

    pub fn is_expanded(&self) -> bool {
        self.menu == MenuState::Expanded
    }

    /// A tap on the disc: toggles the menu and plays the pop animation.
    pub fn tap(&mut self, now: f64) {
        self.menu = self.menu.toggled();
        self.pop = Some(PopAnimation {
            started_at: now,
            duration: self.pop_secs,
        });
    }

    /// The ✖ in the menu header. Collapses with the same pop as a tap; a
    /// no-op when already collapsed.
    pub fn close(&mut self, now: f64) {
        if self.menu == MenuState::Expanded {
            self.tap(now);
        }
    }

    pub fn force_collapse(&mut self) {
        if self.menu == MenuState::Expanded {
            tracing::trace!("menu collapsed by drag");
        }
        self.menu = MenuState::Collapsed;
    }

    /// Steps the animations. The continuous spin is suspended while a pop is
    /// running and picks up from the same angle afterwards.
    pub fn advance(&mut self, now: f64, dt: f32, is_playing: bool) {
        if let Some(pop) = self.pop {
            if pop.progress(now).is_none() {
                self.pop = None;
            }
        }
        if self.pop.is_none() {
            self.spin.advance(dt, is_playing);
        }
    }

    pub fn rotation_state(&self, now: f64, is_playing: bool) -> RotationState {
        match self.pop.and_then(|pop| pop.progress(now)) {
            Some(_) => RotationState::Popping,
            None if is_playing => RotationState::Spinning,
            None => RotationState::Frozen,
        }
    }

    pub fn pose(&self, now: f64) -> DiscPose {
        let base = self.spin.angle();
        match self.pop.and_then(|pop| pop.progress(now)) {
            Some(t) => {
                let eased = t * t * (3.0 - 2.0 * t);
                DiscPose {
                    angle: (base + TAU * eased).rem_euclid(TAU),
                    scale: 1.0 + (POP_PEAK_SCALE - 1.0) * (PI * t).sin(),
                }
            }
            None => DiscPose {
                angle: base,
                scale: 1.0,
            },
        }
    }

    /// Target width of the menu panel for the current state.
    pub fn menu_width(&self, expanded_width: f32) -> f32 {
        match self.menu {
            MenuState::Expanded => expanded_width,
            MenuState::Collapsed => 0.0,
        }
    }
}

impl Default for DiscPresentation {
    fn default() -> Self {
        Self::new(SPIN_PERIOD_SECS, POP_SECS)
    }
}
