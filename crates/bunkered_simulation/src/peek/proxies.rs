//! Hit proxies: сферы головы/плеча/оружия, выдвигаемые за край укрытия на depth.

use super::settings::{body_point, PeekSettings};
use bevy::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum ProxyKind {
    Head,
    Shoulder,
    Gun,
}

#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct PeekProxy {
    pub kind: ProxyKind,
    pub radius: f32,
    pub world: Vec3,
    pub hit_enabled: bool,
}

/// Proxy'и одного персонажа
#[derive(Debug, Clone, PartialEq, Reflect)]
pub struct PeekProxies {
    pub proxies: [PeekProxy; 3],
}

impl PeekProxies {
    pub fn new(settings: &PeekSettings) -> Self {
        let proxy = |kind, radius| PeekProxy {
            kind,
            radius,
            world: Vec3::ZERO,
            hit_enabled: false,
        };
        Self {
            proxies: [
                proxy(ProxyKind::Head, settings.head_radius),
                proxy(ProxyKind::Shoulder, settings.shoulder_radius()),
                proxy(ProxyKind::Gun, settings.gun_radius()),
            ],
        }
    }

    fn local_for(settings: &PeekSettings, kind: ProxyKind) -> Vec3 {
        match kind {
            ProxyKind::Head => settings.head_local,
            ProxyKind::Shoulder => settings.shoulder_local,
            ProxyKind::Gun => settings.gun_local,
        }
    }

    /// Пересчитать world позиции: тело + edge × depth (cm)
    pub fn update(
        &mut self,
        settings: &PeekSettings,
        transform: &Transform,
        edge: Vec3,
        depth_cm: f32,
        hit_enabled: bool,
    ) {
        let offset = edge * depth_cm;
        for proxy in &mut self.proxies {
            proxy.world = body_point(transform, Self::local_for(settings, proxy.kind)) + offset;
            proxy.hit_enabled = hit_enabled;
        }
    }

    pub fn disable(&mut self) {
        for proxy in &mut self.proxies {
            proxy.hit_enabled = false;
        }
    }

    pub fn any_enabled(&self) -> bool {
        self.proxies.iter().any(|proxy| proxy.hit_enabled)
    }

    pub fn get(&self, kind: ProxyKind) -> &PeekProxy {
        &self.proxies[kind as usize]
    }

    /// Ближайшее попадание отрезка по включённым proxy'ям: (kind, distance от start)
    pub fn hit_test(&self, start: Vec3, end: Vec3) -> Option<(ProxyKind, f32)> {
        self.proxies
            .iter()
            .filter(|proxy| proxy.hit_enabled)
            .filter_map(|proxy| {
                segment_sphere(start, end, proxy.world, proxy.radius).map(|d| (proxy.kind, d))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Первое пересечение отрезка со сферой (distance от start)
fn segment_sphere(start: Vec3, end: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let segment = end - start;
    let length = segment.length();
    if length < 1e-6 {
        return (start.distance(center) <= radius).then_some(0.0);
    }
    let dir = segment / length;
    let to_start = start - center;
    let b = to_start.dot(dir);
    let c = to_start.length_squared() - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let t = -b - discriminant.sqrt();
    (0.0..=length).contains(&t).then_some(t)
}
