//! Cosmetic particles
//!
//! Dust, landing puffs and pickup sparkles for the renderer. They run on
//! their own PCG stream so gameplay streams never see a draw from here, and
//! they are never serialized.

use glam::{DVec2, Vec2};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

/// Maximum live particles
pub const MAX_PARTICLES: usize = 256;

/// Downward pull on particles (px/s²)
const PARTICLE_GRAVITY: f32 = 420.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticleKind {
    Dust,
    Landing,
    Coin,
    Fuel,
    Boost,
}

/// A particle for visual effects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    pub kind: ParticleKind,
    pub life: f32, // 0-1, decreases over time
    pub size: f32,
}

#[derive(Debug, Clone)]
pub struct ParticleField {
    rng: Pcg32,
    particles: Vec<Particle>,
}

impl ParticleField {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
            particles: Vec::new(),
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Emit `count` particles in a cone around `direction` (radians)
    pub fn burst(
        &mut self,
        kind: ParticleKind,
        origin: DVec2,
        count: usize,
        direction: f32,
        spread: f32,
        speed: (f32, f32),
    ) {
        let origin = origin.as_vec2();
        for _ in 0..count {
            if self.particles.len() >= MAX_PARTICLES {
                // Oldest first
                self.particles.remove(0);
            }
            let angle = direction + self.rng.random_range(-0.5..0.5) * spread;
            let speed = self.rng.random_range(speed.0..=speed.1);
            self.particles.push(Particle {
                pos: origin,
                vel: Vec2::new(angle.cos(), angle.sin()) * speed,
                kind,
                life: self.rng.random_range(0.6..1.0),
                size: self.rng.random_range(2.0..5.0),
            });
        }
    }

    pub fn update(&mut self, dt: f32) {
        for particle in self.particles.iter_mut() {
            particle.pos += particle.vel * dt;
            particle.vel.y -= PARTICLE_GRAVITY * dt;
            particle.vel *= 0.98;
            particle.life -= dt * 1.5;
            particle.size *= 0.995;
        }
        self.particles.retain(|p| p.life > 0.0);
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_capped() {
        let mut field = ParticleField::new(1);
        for _ in 0..20 {
            field.burst(ParticleKind::Dust, DVec2::ZERO, 40, 0.0, 1.0, (50.0, 100.0));
        }
        assert_eq!(field.len(), MAX_PARTICLES);
    }

    #[test]
    fn test_particles_expire() {
        let mut field = ParticleField::new(2);
        field.burst(ParticleKind::Coin, DVec2::new(10.0, 10.0), 16, 1.57, 3.0, (20.0, 80.0));
        assert_eq!(field.len(), 16);
        for _ in 0..60 {
            field.update(1.0 / 60.0);
        }
        assert!(field.is_empty());
    }

    #[test]
    fn test_same_seed_same_burst() {
        let mut a = ParticleField::new(7);
        let mut b = ParticleField::new(7);
        a.burst(ParticleKind::Landing, DVec2::ZERO, 8, 0.0, 2.0, (10.0, 30.0));
        b.burst(ParticleKind::Landing, DVec2::ZERO, 8, 0.0, 2.0, (10.0, 30.0));
        for (pa, pb) in a.particles().iter().zip(b.particles()) {
            assert_eq!(pa.vel, pb.vel);
        }
    }
}
