//! Spring-arm камеры персонажа.
//!
//! Cover меняет socket offset / arm length / collision test при входе и восстанавливает
//! при выходе; peek добавляет roll и боковой offset пропорционально depth.

use bevy::prelude::*;

/// Spring-arm + control rotation
///
/// Оси socket offset в local space камеры: X = вправо, Y = вверх, Z = назад.
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct CameraBoom {
    pub socket_offset: Vec3,
    pub arm_length: f32,
    pub do_collision_test: bool,
    /// Добавка к socket offset от peek (cover её не трогает, кроме сброса на выходе)
    pub peek_offset: Vec3,
    /// Roll (градусы), пишется peek sub-system
    pub roll_deg: f32,
    /// Control rotation (куда смотрит игрок/AI)
    pub view_rotation: Quat,
}

impl Default for CameraBoom {
    fn default() -> Self {
        Self {
            socket_offset: Vec3::ZERO,
            arm_length: 400.0,
            do_collision_test: true,
            peek_offset: Vec3::ZERO,
            roll_deg: 0.0,
            view_rotation: Quat::IDENTITY,
        }
    }
}

impl CameraBoom {
    /// Итоговый socket offset (cover плечо + peek)
    pub fn effective_socket_offset(&self) -> Vec3 {
        self.socket_offset + self.peek_offset
    }

    pub fn view_forward(&self) -> Vec3 {
        self.view_rotation * Vec3::NEG_Z
    }

    pub fn view_right(&self) -> Vec3 {
        self.view_rotation * Vec3::X
    }

    /// Повернуть control rotation на yaw заданного направления (pitch/roll сбрасываются)
    pub fn align_yaw_to(&mut self, facing: Vec3) {
        let flat = Vec3::new(facing.x, 0.0, facing.z);
        if flat.length_squared() < 1e-6 {
            return;
        }
        self.view_rotation = Transform::default().looking_to(flat, Vec3::Y).rotation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_yaw_to_faces_direction() {
        let mut boom = CameraBoom::default();
        boom.align_yaw_to(Vec3::new(1.0, 0.5, 0.0));

        let forward = boom.view_forward();
        assert!((forward - Vec3::X).length() < 1e-4, "forward = {:?}", forward);
        assert!((boom.view_right() - Vec3::Z).length() < 1e-4);
    }
}
