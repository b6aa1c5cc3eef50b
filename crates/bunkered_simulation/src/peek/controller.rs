//! PeekController: классификация input'а (клиент) + authoritative ramps (сервер).
//!
//! Фазы: Idle → RampingOut → Holding | RampingIn → Idle.
//! Burst: RampingOut → сразу RampingIn. Полный retract запускает refractory.
//! Смена направления во время peek'а отменяет текущий без refractory.

use super::proxies::PeekProxies;
use super::settings::{body_point, PeekSettings};
use super::state::{PeekAnchor, PeekMode, PeekNetState, PeekPhase, PeekRamp, PeekRequest};
use crate::bunker::{BunkerId, BunkerRegistry};
use crate::components::CameraBoom;
use crate::cover::{BunkerCover, CoverTuning};
use crate::error::{CoverError, CoverResult};
use crate::logger::log;
use crate::surface::{PeekDirection, PositionRef};
use bevy::prelude::*;

/// Последний запрос, отправленный этим персонажем (локально, для release/toggle)
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct RequestedPeek {
    pub direction: PeekDirection,
    pub mode: PeekMode,
}

#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct PeekController {
    pub settings: PeekSettings,
    /// Authority пишет, клиенты получают репликой
    pub net: PeekNetState,
    pub phase: PeekPhase,
    /// Текущая глубина (alpha, не квантованная)
    pub depth_alpha: f32,
    pub ramp: Option<PeekRamp>,
    /// Legal max depth текущего peek'а (alpha)
    pub legal_alpha: f32,
    /// Глубина, при которой muzzle проходит край с запасом
    pub clear_alpha: f32,
    pub anchor: Option<PeekAnchor>,
    pub proxies: PeekProxies,

    clock: f64,
    anchored_at: Option<(BunkerId, PositionRef)>,
    last_retract: Option<f64>,
    /// Время последнего нажатия: Left, Right, Over
    last_press: [Option<f64>; 3],
    press_started: f64,
    hold_candidate: bool,
    requested: Option<RequestedPeek>,
    /// net уже был активен с момента последнего запроса
    net_seen_active: bool,
}

impl Default for PeekController {
    fn default() -> Self {
        Self::new(PeekSettings::default())
    }
}

fn press_slot(direction: PeekDirection) -> Option<usize> {
    match direction {
        PeekDirection::None => None,
        PeekDirection::Left => Some(0),
        PeekDirection::Right => Some(1),
        PeekDirection::Over => Some(2),
    }
}

impl PeekController {
    pub fn new(settings: PeekSettings) -> Self {
        let proxies = PeekProxies::new(&settings);
        Self {
            settings,
            net: PeekNetState::default(),
            phase: PeekPhase::Idle,
            depth_alpha: 0.0,
            ramp: None,
            legal_alpha: 0.0,
            clear_alpha: 0.0,
            anchor: None,
            proxies,
            clock: 0.0,
            anchored_at: None,
            last_retract: None,
            last_press: [None; 3],
            press_started: 0.0,
            hold_candidate: false,
            requested: None,
            net_seen_active: false,
        }
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn advance_clock(&mut self, dt: f32) {
        self.clock += dt as f64;
        self.sync_requested_with_net();
    }

    /// Локальный запрос живёт, пока authority не вернула net в default
    ///
    /// Cancel/refractory/finish на сервере → requested сбрасывается.
    fn sync_requested_with_net(&mut self) {
        if self.net.is_active() {
            self.net_seen_active = true;
        } else if self.net_seen_active {
            self.net_seen_active = false;
            self.requested = None;
            self.hold_candidate = false;
        }
    }

    pub fn is_out(&self) -> bool {
        self.phase != PeekPhase::Idle
    }

    pub fn requested(&self) -> Option<RequestedPeek> {
        self.requested
    }

    pub fn depth_cm(&self) -> f32 {
        self.depth_alpha * self.settings.max_offset
    }

    // --- input classification (owning side) ---

    /// Кнопка peek нажата/отпущена → запрос к authority (или ничего)
    ///
    /// Решения по Toggle/Stop берутся из реплицированного `net`, не из локального запроса.
    /// Press: Hold; Toggle только при double-tap, пока peek уже out в ту же сторону.
    /// Повторное нажатие при активном Toggle → Stop.
    /// Release: Toggle игнорирует; короткий Hold превращается в Burst; иначе Stop.
    pub fn handle_input(
        &mut self,
        direction: PeekDirection,
        pressed: bool,
        tuning: &CoverTuning,
    ) -> Option<PeekRequest> {
        let slot = press_slot(direction)?;
        self.sync_requested_with_net();
        let now = self.clock;
        let depth_hint = self.settings.default_hint();

        if pressed {
            let double = self.last_press[slot]
                .is_some_and(|last| now - last <= tuning.peek_double_tap_window as f64);
            self.last_press[slot] = Some(now);

            let out_same = self.net.is_active() && self.net.direction == direction;
            if out_same && self.net.mode == PeekMode::Toggle {
                self.requested = None;
                self.hold_candidate = false;
                return Some(PeekRequest::Stop);
            }

            let toggle = double && out_same;
            let mode = if toggle { PeekMode::Toggle } else { PeekMode::Hold };
            self.hold_candidate = !toggle;
            self.press_started = now;
            self.requested = Some(RequestedPeek { direction, mode });
            self.net_seen_active = self.net.is_active();
            return Some(PeekRequest::Begin {
                direction,
                mode,
                depth_hint,
            });
        }

        let requested = self.requested.filter(|r| r.direction == direction)?;
        if requested.mode == PeekMode::Toggle {
            return None;
        }

        let held = now - self.press_started;
        if self.hold_candidate && held < tuning.peek_tap_threshold as f64 {
            self.hold_candidate = false;
            self.requested = Some(RequestedPeek {
                direction,
                mode: PeekMode::Burst,
            });
            return Some(PeekRequest::Begin {
                direction,
                mode: PeekMode::Burst,
                depth_hint,
            });
        }

        self.hold_candidate = false;
        self.requested = None;
        Some(PeekRequest::Stop)
    }

    // --- authority ---

    /// Выполнить запрос. Begin возвращает целевую глубину (cm).
    pub fn apply_request(
        &mut self,
        cover: &mut BunkerCover,
        registry: &BunkerRegistry,
        transform: &Transform,
        request: PeekRequest,
    ) -> CoverResult<f32> {
        match request {
            PeekRequest::Begin {
                direction,
                mode,
                depth_hint,
            } => self.begin(cover, registry, transform, direction, mode, depth_hint),
            PeekRequest::Stop => {
                self.stop();
                Ok(0.0)
            }
            PeekRequest::AdjustDepth { steps } => self.adjust_depth(steps),
        }
    }

    pub fn begin(
        &mut self,
        cover: &mut BunkerCover,
        registry: &BunkerRegistry,
        transform: &Transform,
        direction: PeekDirection,
        mode: PeekMode,
        depth_hint: u8,
    ) -> CoverResult<f32> {
        if direction == PeekDirection::None || mode == PeekMode::None {
            return Err(CoverError::IllegalPeek(direction));
        }
        let (bunker_id, position) = cover.current().ok_or(CoverError::NotInCover)?;
        if cover.is_busy() {
            return Err(CoverError::Busy);
        }
        let bunker = registry
            .get(bunker_id)
            .ok_or(CoverError::UnknownBunker(bunker_id))?;
        let legal_cm = bunker
            .peek_allowance(position, direction)
            .ok_or(CoverError::IllegalPeek(direction))?;
        let (Some(origin), Some(normal)) = (bunker.transform_at(position), bunker.normal_at(position))
        else {
            return Err(CoverError::InvalidPosition {
                bunker: bunker_id,
                position,
            });
        };
        let anchor = PeekAnchor::new(origin.translation, normal, direction)
            .ok_or(CoverError::IllegalPeek(direction))?;

        let same_peek = self.is_out() && self.net.direction == direction;
        if self.is_out() && !same_peek {
            // Смена направления: без refractory
            log(&format!(
                "Peek: switching {:?} → {:?}, cancelling",
                self.net.direction, direction
            ));
            self.cancel(cover);
        } else if !self.is_out() {
            if let Some(last) = self.last_retract {
                let remaining = self.settings.refractory - (self.clock - last) as f32;
                if remaining > 1e-6 {
                    return Err(CoverError::Refractory { remaining });
                }
            }
        }

        cover.set_peek(registry, direction, true)?;

        let max_offset = self.settings.max_offset.max(1e-3);
        self.anchor = Some(anchor);
        self.anchored_at = Some((bunker_id, position));
        self.legal_alpha = (legal_cm / max_offset).clamp(0.0, 1.0);
        self.clear_alpha = self.clearance_alpha(transform, &anchor);

        let hint = depth_hint as f32 / 255.0;
        let target = hint.max(self.clear_alpha).min(self.legal_alpha);
        let mut out = target.max(self.settings.min_burst_alpha());
        if mode == PeekMode::Hold {
            out = out.max(self.depth_alpha);
        }
        let out = out.min(self.legal_alpha);

        self.net.direction = direction;
        self.net.mode = mode;
        self.phase = PeekPhase::RampingOut;
        self.ramp = Some(PeekRamp::out(self.depth_alpha, out, self.settings.time_out));
        self.net.depth_q = PeekNetState::quantize(self.depth_alpha);

        log(&format!(
            "Peek: {:?} {:?} → {:.1}cm (legal {:.1}, clear {:.2})",
            direction,
            mode,
            out * max_offset,
            legal_cm,
            self.clear_alpha
        ));
        Ok(out * max_offset)
    }

    /// Минимальная глубина, при которой gun proxy проходит плоскость края + margin
    fn clearance_alpha(&self, transform: &Transform, anchor: &PeekAnchor) -> f32 {
        let muzzle = body_point(transform, self.settings.gun_local);
        let behind = self.settings.margin_clearance - anchor.signed_distance(muzzle);
        let per_alpha = (self.settings.max_offset * anchor.edge.dot(anchor.edge)).max(1e-3);
        (behind / per_alpha).clamp(0.0, 1.0)
    }

    /// Начать retract (идемпотентно)
    pub fn stop(&mut self) {
        match self.phase {
            PeekPhase::Idle | PeekPhase::RampingIn => {}
            PeekPhase::RampingOut | PeekPhase::Holding => self.start_retract(),
        }
    }

    fn start_retract(&mut self) {
        self.phase = PeekPhase::RampingIn;
        self.ramp = Some(PeekRamp::retract(self.depth_alpha, self.settings.time_in));
    }

    /// Глубина колесом мыши (Hold/Toggle, не Burst)
    pub fn adjust_depth(&mut self, steps: i8) -> CoverResult<f32> {
        if !matches!(self.phase, PeekPhase::RampingOut | PeekPhase::Holding)
            || self.net.mode == PeekMode::Burst
        {
            return Err(CoverError::IllegalPeek(self.net.direction));
        }
        let floor = self.clear_alpha.min(self.legal_alpha);
        let target = (self.depth_alpha + steps as f32 * self.settings.depth_step_alpha)
            .clamp(floor, self.legal_alpha);
        self.phase = PeekPhase::RampingOut;
        self.ramp = Some(PeekRamp::out(self.depth_alpha, target, self.settings.time_out));
        Ok(target * self.settings.max_offset)
    }

    /// Немедленный сброс без refractory (выход из укрытия, смена позиции/направления)
    pub fn cancel(&mut self, cover: &mut BunkerCover) {
        if !self.is_out() {
            return;
        }
        if cover.peek == self.net.direction {
            cover.clear_peek();
        }
        self.clear_state();
    }

    fn finish_retract(&mut self, cover: &mut BunkerCover) {
        if cover.peek == self.net.direction {
            cover.clear_peek();
        }
        self.clear_state();
        self.last_retract = Some(self.clock);
    }

    fn clear_state(&mut self) {
        self.net = PeekNetState::default();
        self.phase = PeekPhase::Idle;
        self.depth_alpha = 0.0;
        self.ramp = None;
        self.anchor = None;
        self.anchored_at = None;
        self.legal_alpha = 0.0;
        self.clear_alpha = 0.0;
        self.proxies.disable();
    }

    /// Authority tick: clock + ramp + отмена, если cover ушёл с позиции
    pub fn tick(&mut self, cover: &mut BunkerCover, dt: f32) {
        self.advance_clock(dt);
        if !self.is_out() {
            return;
        }

        if cover.current() != self.anchored_at || cover.peek != self.net.direction || cover.is_busy() {
            log(&format!(
                "Peek: cover moved/reset under {:?} peek, cancelling",
                self.net.direction
            ));
            self.cancel(cover);
            return;
        }

        if let Some(mut ramp) = self.ramp {
            ramp.elapsed += dt;
            self.depth_alpha = ramp.value().clamp(0.0, self.legal_alpha);
            if ramp.is_done() {
                self.ramp = None;
                match self.phase {
                    PeekPhase::RampingOut if self.net.mode == PeekMode::Burst => self.start_retract(),
                    PeekPhase::RampingOut => self.phase = PeekPhase::Holding,
                    PeekPhase::RampingIn => {
                        self.finish_retract(cover);
                        return;
                    }
                    PeekPhase::Idle | PeekPhase::Holding => {}
                }
            } else {
                self.ramp = Some(ramp);
            }
        }

        self.net.depth_q = PeekNetState::quantize(self.depth_alpha);
    }

    // --- presentation (все стороны, только из net state) ---

    /// Proxies + camera из replicated state
    ///
    /// Hit-testing proxy'ей включается только на authority при depth > 0.
    pub fn update_presentation(
        &mut self,
        cover: &BunkerCover,
        registry: &BunkerRegistry,
        transform: &Transform,
        camera: Option<&mut CameraBoom>,
        authority: bool,
    ) {
        let net = self.net;
        let anchor = net
            .is_active()
            .then(|| cover.current())
            .flatten()
            .and_then(|(bunker_id, position)| {
                let bunker = registry.get(bunker_id)?;
                let origin = bunker.transform_at(position)?.translation;
                PeekAnchor::new(origin, bunker.normal_at(position)?, net.direction)
            });

        let depth_cm = net.depth_alpha() * self.settings.max_offset;
        match anchor {
            Some(anchor) => {
                let hit_enabled = authority && net.depth_q > 0;
                self.proxies
                    .update(&self.settings, transform, anchor.edge, depth_cm, hit_enabled);
            }
            None => self.proxies.disable(),
        }

        let Some(camera) = camera else {
            return;
        };
        if anchor.is_none() {
            camera.peek_offset = Vec3::ZERO;
            camera.roll_deg = 0.0;
            return;
        }
        let sign = net.direction.lateral_sign();
        let lift = if net.direction == PeekDirection::Over {
            depth_cm
        } else {
            0.0
        };
        camera.peek_offset = Vec3::new(sign * depth_cm, lift, 0.0);
        camera.roll_deg = sign * self.settings.camera_tilt_deg * net.depth_alpha();
    }
}
