//! Suggestions: короткий список укрытий для UI ("куда можно перебежать").
//!
//! Refresh берёт K·2 кандидатов, отсекает текущий bunker и то, что вне обзора
//! (cos < min_cos_to_view), и оставляет K. Confirm = `enter_cover` в выбранную позицию.

use super::controller::{CoverActor, CoverEnv};
use super::state::BunkerCover;
use crate::error::{CoverError, CoverResult};
use crate::logger::log;

impl BunkerCover {
    /// Пересобрать список; возвращает количество suggestions
    pub fn refresh_suggestions(&mut self, actor: &CoverActor, env: &CoverEnv) -> usize {
        let k = actor.tuning.suggestion_count;
        let min_cos = actor.tuning.min_cos_to_view;

        let mut pool = self.gather_suggestion_pool(actor, env, k * 2);
        pool.retain(|candidate| candidate.angle_cos >= min_cos);
        pool.truncate(k);

        self.suggestions = pool;
        self.suggestion_index = 0;
        log(&format!(
            "Cover: {:?} refreshed {} suggestions",
            actor.entity,
            self.suggestions.len()
        ));
        self.suggestions.len()
    }

    pub fn next_suggestion(&mut self) -> CoverResult<()> {
        self.cycle_suggestion(1)
    }

    pub fn previous_suggestion(&mut self) -> CoverResult<()> {
        self.cycle_suggestion(-1)
    }

    fn cycle_suggestion(&mut self, step: isize) -> CoverResult<()> {
        let count = self.suggestions.len();
        if count == 0 {
            return Err(CoverError::NoCandidates);
        }
        let index = (self.suggestion_index as isize + step).rem_euclid(count as isize);
        self.suggestion_index = index as usize;
        Ok(())
    }

    /// Войти в выбранную suggestion; не вышло → одна попытка со следующей
    pub fn confirm_selected_suggestion(
        &mut self,
        actor: &mut CoverActor,
        env: &mut CoverEnv,
    ) -> CoverResult<()> {
        let count = self.suggestions.len();
        if count == 0 {
            return Err(CoverError::NoCandidates);
        }
        let index = self.suggestion_index.min(count - 1);
        let picked = self.suggestions[index];

        let first = self.enter_cover(actor, env, picked.bunker, picked.position);
        if first.is_ok() || count < 2 {
            return first;
        }

        let next_index = (index + 1) % count;
        let next = self.suggestions[next_index];
        self.enter_cover(actor, env, next.bunker, next.position)?;
        self.suggestion_index = next_index;
        Ok(())
    }
}
