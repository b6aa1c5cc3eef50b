//! Occupancy table: кто держит какую позицию bunker'а.
//!
//! Явная таблица (position → claimant Entity) вместо back-pointer'ов: ни bunker, ни
//! персонаж не владеют друг другом, проверка "жив ли claimant": снаружи
//! (`release_orphaned_claims`).

use crate::logger::{log, log_warning};
use crate::surface::{PositionRef, ALPHA_EPSILON};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Проверять ли claimant при release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect, Serialize, Deserialize)]
pub enum ReleasePolicy {
    /// Release по валидной позиции всегда успешен, кто бы ни звал (trusted single-writer server)
    Lenient,
    /// Release от не-claimant'а игнорируется
    Strict,
}

impl Default for ReleasePolicy {
    fn default() -> Self {
        Self::Lenient
    }
}

/// Сколько персонажей может одновременно стоять на одном spline bunker'е
#[derive(Debug, Clone, Copy, PartialEq, Reflect, Serialize, Deserialize)]
pub enum SplineOccupancy {
    /// Весь bunker: один ресурс
    SingleOccupant,
    /// Несколько claimant'ов, alpha которых разнесены минимум на `min_separation`
    MultipleAlphas { min_separation: f32 },
}

impl Default for SplineOccupancy {
    fn default() -> Self {
        Self::SingleOccupant
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Claims {
    Slots(Vec<Option<Entity>>),
    Spline(Vec<(Entity, f32)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyTable {
    pub release_policy: ReleasePolicy,
    pub spline_occupancy: SplineOccupancy,
    claims: Claims,
}

impl OccupancyTable {
    pub fn for_slots(count: usize) -> Self {
        Self {
            release_policy: ReleasePolicy::default(),
            spline_occupancy: SplineOccupancy::default(),
            claims: Claims::Slots(vec![None; count]),
        }
    }

    pub fn for_spline() -> Self {
        Self {
            release_policy: ReleasePolicy::default(),
            spline_occupancy: SplineOccupancy::default(),
            claims: Claims::Spline(Vec::new()),
        }
    }

    /// Кто держит позицию
    pub fn claimant_at(&self, position: PositionRef) -> Option<Entity> {
        match (&self.claims, position) {
            (Claims::Slots(slots), PositionRef::Slot(index)) => slots.get(index).copied().flatten(),
            (Claims::Spline(claims), PositionRef::Alpha(alpha)) => self
                .blocking_claim(claims, alpha, None)
                .map(|(claimant, _)| claimant),
            _ => None,
        }
    }

    pub fn is_occupied(&self, position: PositionRef) -> bool {
        self.claimant_at(position).is_some()
    }

    /// Может ли `claimant` занять позицию (свободна или уже его)
    pub fn is_free_for(&self, position: PositionRef, claimant: Entity) -> bool {
        match (&self.claims, position) {
            (Claims::Slots(slots), PositionRef::Slot(index)) => match slots.get(index) {
                Some(holder) => holder.is_none_or(|holder| holder == claimant),
                None => false,
            },
            (Claims::Spline(claims), PositionRef::Alpha(alpha)) => {
                self.blocking_claim(claims, alpha, Some(claimant)).is_none()
            }
            _ => false,
        }
    }

    /// Claim позиции. Fails: позиция невалидна или занята другим.
    ///
    /// Re-claim holder'ом = re-entry: успех без изменений (traversal claim'ит новую
    /// позицию до release старой, и цель может совпасть с текущей).
    /// На spline повторный claim переносит claim на новую alpha.
    pub fn claim(&mut self, position: PositionRef, claimant: Entity) -> bool {
        if let (Claims::Slots(slots), PositionRef::Slot(index)) = (&self.claims, position) {
            if slots.get(index).copied().flatten() == Some(claimant) {
                log(&format!(
                    "Occupancy: {:?} re-entered {:?} it already holds",
                    claimant, position
                ));
                return true;
            }
        }

        if !self.is_free_for(position, claimant) {
            log(&format!(
                "Occupancy: {:?} claim {:?} rejected (holder {:?})",
                claimant,
                position,
                self.claimant_at(position)
            ));
            return false;
        }

        match (&mut self.claims, position) {
            (Claims::Slots(slots), PositionRef::Slot(index)) => {
                if let Some(holder) = slots.get_mut(index) {
                    *holder = Some(claimant);
                }
                true
            }
            (Claims::Spline(claims), PositionRef::Alpha(alpha)) => {
                match claims.iter_mut().find(|(holder, _)| *holder == claimant) {
                    Some(claim) => claim.1 = alpha,
                    None => claims.push((claimant, alpha)),
                }
                true
            }
            _ => false,
        }
    }

    /// Release позиции. Идемпотентен; невалидная позиция: no-op.
    ///
    /// Возвращает true, если claim был снят.
    pub fn release(&mut self, position: PositionRef, claimant: Entity) -> bool {
        let policy = self.release_policy;
        let single = self.spline_occupancy == SplineOccupancy::SingleOccupant;

        match (&mut self.claims, position) {
            (Claims::Slots(slots), PositionRef::Slot(index)) => {
                let Some(holder) = slots.get_mut(index) else {
                    return false;
                };
                match *holder {
                    None => false,
                    Some(current) if current != claimant && policy == ReleasePolicy::Strict => {
                        log_warning(&format!(
                            "Occupancy: {:?} tried to release slot {} held by {:?} (strict)",
                            claimant, index, current
                        ));
                        false
                    }
                    Some(_) => {
                        *holder = None;
                        true
                    }
                }
            }
            (Claims::Spline(claims), PositionRef::Alpha(alpha)) => {
                if let Some(own) = claims.iter().position(|(holder, _)| *holder == claimant) {
                    claims.remove(own);
                    return true;
                }
                if policy == ReleasePolicy::Strict {
                    if !claims.is_empty() {
                        log_warning(&format!(
                            "Occupancy: {:?} tried to release alpha {:.3} it does not hold (strict)",
                            claimant, alpha
                        ));
                    }
                    return false;
                }
                let before = claims.len();
                claims.retain(|(_, held)| !single && (held - alpha).abs() > ALPHA_EPSILON);
                claims.len() != before
            }
            _ => false,
        }
    }

    /// Снять все claims данного claimant'а (end-of-play, orphan cleanup)
    pub fn release_all_by(&mut self, claimant: Entity) -> usize {
        match &mut self.claims {
            Claims::Slots(slots) => {
                let mut released = 0;
                for holder in slots.iter_mut().filter(|h| **h == Some(claimant)) {
                    *holder = None;
                    released += 1;
                }
                released
            }
            Claims::Spline(claims) => {
                let before = claims.len();
                claims.retain(|(holder, _)| *holder != claimant);
                before - claims.len()
            }
        }
    }

    /// Все текущие claimant'ы (с повторами, если держат несколько slots)
    pub fn claimants(&self) -> Vec<Entity> {
        match &self.claims {
            Claims::Slots(slots) => slots.iter().flatten().copied().collect(),
            Claims::Spline(claims) => claims.iter().map(|(holder, _)| *holder).collect(),
        }
    }

    /// Позиции, которые держит claimant
    pub fn positions_of(&self, claimant: Entity) -> Vec<PositionRef> {
        match &self.claims {
            Claims::Slots(slots) => slots
                .iter()
                .enumerate()
                .filter(|(_, holder)| **holder == Some(claimant))
                .map(|(index, _)| PositionRef::Slot(index))
                .collect(),
            Claims::Spline(claims) => claims
                .iter()
                .filter(|(holder, _)| *holder == claimant)
                .map(|(_, alpha)| PositionRef::Alpha(*alpha))
                .collect(),
        }
    }

    /// Заполненность bunker'а ∈ [0, 1] (для occupancy penalty в selection)
    pub fn occupancy_ratio(&self) -> f32 {
        match &self.claims {
            Claims::Slots(slots) if slots.is_empty() => 0.0,
            Claims::Slots(slots) => slots.iter().filter(|h| h.is_some()).count() as f32 / slots.len() as f32,
            Claims::Spline(claims) => match self.spline_occupancy {
                SplineOccupancy::SingleOccupant => {
                    if claims.is_empty() {
                        0.0
                    } else {
                        1.0
                    }
                }
                SplineOccupancy::MultipleAlphas { .. } => {
                    claims.len() as f32 / (claims.len() + 1) as f32
                }
            },
        }
    }

    /// Claim другого персонажа, мешающий стоять на alpha
    fn blocking_claim(
        &self,
        claims: &[(Entity, f32)],
        alpha: f32,
        ignore: Option<Entity>,
    ) -> Option<(Entity, f32)> {
        claims
            .iter()
            .filter(|(holder, _)| Some(*holder) != ignore)
            .find(|(_, held)| match self.spline_occupancy {
                SplineOccupancy::SingleOccupant => true,
                SplineOccupancy::MultipleAlphas { min_separation } => {
                    (held - alpha).abs() < min_separation.max(ALPHA_EPSILON)
                }
            })
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const A: Entity = Entity::from_raw(1);
    const B: Entity = Entity::from_raw(2);

    #[test]
    fn test_slot_contention() {
        let mut table = OccupancyTable::for_slots(2);

        assert!(table.claim(PositionRef::Slot(0), A));
        assert!(!table.claim(PositionRef::Slot(0), B), "already held by A");
        assert!(table.claim(PositionRef::Slot(0), A), "re-claim by holder");
        assert!(!table.claim(PositionRef::Slot(5), A), "invalid index");
        assert!(!table.claim(PositionRef::Alpha(0.5), A), "alpha on slot table");

        assert!(table.release(PositionRef::Slot(0), A));
        assert!(table.claim(PositionRef::Slot(0), B));
    }

    #[test]
    fn test_reclaim_by_holder_is_reentry() {
        let mut table = OccupancyTable::for_slots(2);
        assert!(table.claim(PositionRef::Slot(1), A));

        assert!(table.claim(PositionRef::Slot(1), A), "holder re-enters");
        assert_eq!(table.claimants(), vec![A], "no duplicate claim");
        assert_eq!(table.positions_of(A), vec![PositionRef::Slot(1)]);
        assert!(!table.claim(PositionRef::Slot(1), B), "still held against others");

        // один release снимает re-entered claim целиком
        assert!(table.release(PositionRef::Slot(1), A));
        assert!(!table.is_occupied(PositionRef::Slot(1)));
    }

    #[test]
    fn test_lenient_release_ignores_claimant() {
        let mut table = OccupancyTable::for_slots(1);
        table.claim(PositionRef::Slot(0), A);

        assert!(table.release(PositionRef::Slot(0), B));
        assert!(!table.is_occupied(PositionRef::Slot(0)));
        assert!(!table.release(PositionRef::Slot(0), B), "idempotent");
        assert!(!table.release(PositionRef::Slot(9), B), "invalid index is a no-op");
    }

    #[test]
    fn test_strict_release_requires_claimant() {
        let mut table = OccupancyTable::for_slots(1);
        table.release_policy = ReleasePolicy::Strict;
        table.claim(PositionRef::Slot(0), A);

        assert!(!table.release(PositionRef::Slot(0), B));
        assert_eq!(table.claimant_at(PositionRef::Slot(0)), Some(A));
        assert!(table.release(PositionRef::Slot(0), A));
    }

    #[test]
    fn test_single_occupant_spline() {
        let mut table = OccupancyTable::for_spline();

        assert!(table.claim(PositionRef::Alpha(0.2), A));
        assert!(!table.claim(PositionRef::Alpha(0.9), B), "whole bunker is one resource");

        // тот же claimant переезжает
        assert!(table.claim(PositionRef::Alpha(0.6), A));
        assert_eq!(table.positions_of(A), vec![PositionRef::Alpha(0.6)]);
        assert_eq!(table.occupancy_ratio(), 1.0);

        assert!(table.release(PositionRef::Alpha(0.0), B), "lenient: anyone frees the bunker");
        assert!(table.claim(PositionRef::Alpha(0.9), B));
    }

    #[test]
    fn test_multiple_alphas_respect_separation() {
        let mut table = OccupancyTable::for_spline();
        table.spline_occupancy = SplineOccupancy::MultipleAlphas { min_separation: 0.1 };

        assert!(table.claim(PositionRef::Alpha(0.2), A));
        assert!(!table.claim(PositionRef::Alpha(0.25), B));
        assert!(table.claim(PositionRef::Alpha(0.35), B));
        assert!(table.is_free_for(PositionRef::Alpha(0.22), A), "own claim never blocks");

        assert_eq!(table.release_all_by(A), 1);
        assert_eq!(table.claimants(), vec![B]);
    }

    proptest! {
        #[test]
        fn prop_second_claimant_blocked_until_release(count in 1usize..8, pick in 0usize..8) {
            let index = pick % count;
            let mut table = OccupancyTable::for_slots(count);

            prop_assert!(table.claim(PositionRef::Slot(index), A));
            prop_assert!(!table.claim(PositionRef::Slot(index), B));
            prop_assert!(!table.claim(PositionRef::Slot(index), B));

            table.release(PositionRef::Slot(index), A);
            prop_assert!(table.claim(PositionRef::Slot(index), B));
        }
    }
}
